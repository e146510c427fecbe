// src/council/parser.rs — Parse free-text reviewer responses
//
// Reviewers answer with SCORE / REASONING / CONCERNS lines. Model output is
// never trusted to follow the format exactly, so every extraction degrades
// to a documented default instead of failing: missing or malformed score
// becomes 70, missing reasoning becomes empty, missing concerns become an
// empty list. The defaults are part of the contract; downstream scoring
// depends on them.

/// Score used when a response carries no parseable SCORE line.
pub const DEFAULT_SCORE: u8 = 70;

/// Structured fields extracted from one reviewer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFields {
    pub score: u8,
    pub reasoning: String,
    pub concerns: Vec<String>,
}

/// Extract all three fields. The extractions are independent: a response
/// missing any one field still yields the others.
pub fn parse_review(response: &str) -> ReviewFields {
    ReviewFields {
        score: extract_score(response),
        reasoning: extract_reasoning(response),
        concerns: extract_concerns(response),
    }
}

/// First line containing a `SCORE:` or `FINAL_SCORE:` marker wins; the first
/// digit run after the marker is the score, clamped to [0, 100].
pub fn extract_score(response: &str) -> u8 {
    for line in response.lines() {
        let upper = line.to_ascii_uppercase();
        let Some(idx) = upper.find("SCORE:") else {
            continue;
        };
        let rest = &line[idx + "SCORE:".len()..];

        let digits: String = rest
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            continue;
        }

        // Saturating fold so absurdly long digit runs clamp instead of
        // overflowing.
        let value = digits.chars().fold(0u64, |acc, c| {
            acc.saturating_mul(10).saturating_add((c as u8 - b'0') as u64)
        });
        return value.min(100) as u8;
    }

    DEFAULT_SCORE
}

/// Value of the `REASONING:` line plus following lines, up to the next
/// all-caps field marker or blank line, joined with single spaces.
pub fn extract_reasoning(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let upper = line.to_ascii_uppercase();
        let Some(idx) = upper.find("REASONING:") else {
            continue;
        };

        let mut parts: Vec<String> = Vec::new();
        let first = line[idx + "REASONING:".len()..].trim();
        if !first.is_empty() {
            parts.push(first.to_string());
        }

        for next in &lines[i + 1..] {
            let trimmed = next.trim();
            if trimmed.is_empty() || is_field_marker(trimmed) {
                break;
            }
            parts.push(trimmed.to_string());
        }

        return parts.join(" ");
    }

    String::new()
}

/// Comma-separated `CONCERNS:` value; the literal "none" (any case) maps to
/// an empty list.
pub fn extract_concerns(response: &str) -> Vec<String> {
    for line in response.lines() {
        let upper = line.to_ascii_uppercase();
        let Some(idx) = upper.find("CONCERNS:") else {
            continue;
        };

        let value = line[idx + "CONCERNS:".len()..].trim();
        if value.eq_ignore_ascii_case("none") {
            return Vec::new();
        }

        return value
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }

    Vec::new()
}

/// A field marker is an all-caps identifier followed by a colon, e.g.
/// `CONCERNS:` or `FINAL_SCORE:`.
fn is_field_marker(line: &str) -> bool {
    let Some((head, _)) = line.split_once(':') else {
        return false;
    };
    let head = head.trim();
    !head.is_empty()
        && head
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ─── extract_score tests ────────────────────────────────────

    #[test]
    fn test_score_basic() {
        assert_eq!(extract_score("SCORE: 85"), 85);
    }

    #[test]
    fn test_score_final_score_marker() {
        assert_eq!(extract_score("FINAL_SCORE: 92"), 92);
    }

    #[test]
    fn test_score_lowercase_marker() {
        assert_eq!(extract_score("score: 41"), 41);
    }

    #[test]
    fn test_score_clamped_to_100() {
        assert_eq!(extract_score("SCORE: 250"), 100);
    }

    #[test]
    fn test_score_huge_digit_run_clamped() {
        assert_eq!(extract_score("SCORE: 99999999999999999999999"), 100);
    }

    #[test]
    fn test_score_missing_marker_defaults() {
        assert_eq!(extract_score("This looks fine to me."), DEFAULT_SCORE);
    }

    #[test]
    fn test_score_marker_without_digits_defaults() {
        assert_eq!(extract_score("SCORE: excellent"), DEFAULT_SCORE);
    }

    #[test]
    fn test_score_marker_without_digits_then_later_line() {
        let text = "SCORE: pending\nFINAL_SCORE: 63";
        assert_eq!(extract_score(text), 63);
    }

    #[test]
    fn test_score_zero() {
        assert_eq!(extract_score("SCORE: 0"), 0);
    }

    #[test]
    fn test_score_embedded_in_prose() {
        assert_eq!(extract_score("My SCORE: 77 overall"), 77);
    }

    // ─── extract_reasoning tests ────────────────────────────────

    #[test]
    fn test_reasoning_single_line() {
        let text = "SCORE: 80\nREASONING: Clear and well structured.\nCONCERNS: None";
        assert_eq!(extract_reasoning(text), "Clear and well structured.");
    }

    #[test]
    fn test_reasoning_spans_lines_until_marker() {
        let text = "REASONING: The spec is solid\nbut error handling is thin.\nCONCERNS: error paths";
        assert_eq!(
            extract_reasoning(text),
            "The spec is solid but error handling is thin."
        );
    }

    #[test]
    fn test_reasoning_stops_at_blank_line() {
        let text = "REASONING: First part.\n\nTrailing prose that is not reasoning.";
        assert_eq!(extract_reasoning(text), "First part.");
    }

    #[test]
    fn test_reasoning_missing_is_empty() {
        assert_eq!(extract_reasoning("SCORE: 50"), "");
    }

    // ─── extract_concerns tests ─────────────────────────────────

    #[test]
    fn test_concerns_comma_split() {
        let text = "CONCERNS: no tests, unclear auth, missing docs";
        assert_eq!(
            extract_concerns(text),
            vec!["no tests", "unclear auth", "missing docs"]
        );
    }

    #[test]
    fn test_concerns_none_literal() {
        assert_eq!(extract_concerns("CONCERNS: None"), Vec::<String>::new());
        assert_eq!(extract_concerns("CONCERNS: none"), Vec::<String>::new());
        assert_eq!(extract_concerns("CONCERNS: NONE"), Vec::<String>::new());
    }

    #[test]
    fn test_concerns_missing_is_empty() {
        assert_eq!(extract_concerns("SCORE: 90"), Vec::<String>::new());
    }

    #[test]
    fn test_concerns_drops_empty_segments() {
        assert_eq!(extract_concerns("CONCERNS: a,, b,"), vec!["a", "b"]);
    }

    // ─── combined parsing ───────────────────────────────────────

    #[test]
    fn test_fields_order_agnostic() {
        let text = "CONCERNS: latency\nREASONING: Decent overall.\nSCORE: 66";
        let fields = parse_review(text);
        assert_eq!(fields.score, 66);
        assert_eq!(fields.reasoning, "Decent overall.");
        assert_eq!(fields.concerns, vec!["latency"]);
    }

    #[test]
    fn test_fields_independent_extraction() {
        // No score marker at all; other fields still come through.
        let text = "REASONING: Thorough.\nCONCERNS: None";
        let fields = parse_review(text);
        assert_eq!(fields.score, DEFAULT_SCORE);
        assert_eq!(fields.reasoning, "Thorough.");
        assert!(fields.concerns.is_empty());
    }

    #[test]
    fn test_is_field_marker() {
        assert!(is_field_marker("CONCERNS: x"));
        assert!(is_field_marker("FINAL_SCORE: 3"));
        assert!(!is_field_marker("notes: x"));
        assert!(!is_field_marker("no colon here"));
    }
}
