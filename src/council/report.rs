// src/council/report.rs — Review report and feedback formatting

use super::ReviewOpinion;

/// Sentinel used when no reviewer raised a concern, so the feedback block
/// handed to the next generation attempt is never empty.
pub const NO_ISSUES_FEEDBACK: &str = "No major issues were raised by the council.";

const RULE: &str =
    "----------------------------------------------------------------------";

/// Render the full council report: summary table, per-reviewer detail,
/// score deltas against the previous round (when one exists), and the
/// arbitration verdict.
pub fn generate_report(
    opinions: &[ReviewOpinion],
    prior: &[ReviewOpinion],
    final_score: u8,
    arbitration: &str,
) -> String {
    let mut lines: Vec<String> = vec![
        "======================================================================".into(),
        "COUNCIL REVIEW REPORT".into(),
        "======================================================================".into(),
        String::new(),
        "INDIVIDUAL REVIEWS:".into(),
        RULE.into(),
        format!(
            "{:<15} {:<28} {:<8} {:<10}",
            "Reviewer", "Model", "Score", "Concerns"
        ),
        RULE.into(),
    ];

    for op in opinions {
        lines.push(format!(
            "{:<15} {:<28} {:>3}/100  {:>2}",
            op.reviewer,
            op.model,
            op.score,
            op.concerns.len()
        ));
    }

    lines.push(RULE.into());
    lines.push(String::new());
    lines.push("DETAILED OPINIONS:".into());
    lines.push(RULE.into());

    for op in opinions {
        lines.push(format!("\n{} ({}):", op.reviewer, op.model));
        lines.push(format!("  Score: {}/100", op.score));
        lines.push(format!("  Reasoning: {}", op.reasoning));
        let concerns = if op.concerns.is_empty() {
            "None".to_string()
        } else {
            op.concerns.join(", ")
        };
        lines.push(format!("  Concerns: {}", concerns));
    }

    if let Some(delta_block) = delta_block(opinions, prior) {
        lines.push(String::new());
        lines.push("SCORE TREND:".into());
        lines.push(RULE.into());
        lines.push(delta_block);
    }

    lines.push(String::new());
    lines.push(RULE.into());
    lines.push("FINAL ARBITRATION:".into());
    lines.push(RULE.into());
    lines.push(format!("Final Score: {}/100", final_score));
    lines.push(format!("Reasoning: {}", arbitration));
    lines.push("======================================================================".into());

    lines.join("\n")
}

/// One delta line per reviewer with a prior opinion. Returns `None` when no
/// reviewer has history, so first-round reports carry no trend section.
fn delta_block(opinions: &[ReviewOpinion], prior: &[ReviewOpinion]) -> Option<String> {
    let mut lines = Vec::new();

    for op in opinions {
        let Some(previous) = prior.iter().rev().find(|p| p.reviewer == op.reviewer) else {
            continue;
        };
        let delta = op.score as i32 - previous.score as i32;
        lines.push(format!(
            "{:<15} {:>3} -> {:>3}  ({}{})",
            op.reviewer,
            previous.score,
            op.score,
            if delta >= 0 { "+" } else { "-" },
            delta.abs()
        ));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Concatenate reviewer concerns with score context into the feedback block
/// that seeds the next generation attempt.
pub fn format_feedback(opinions: &[ReviewOpinion]) -> String {
    let mut blocks: Vec<String> = Vec::new();

    for op in opinions {
        if op.concerns.is_empty() {
            continue;
        }
        blocks.push(format!(
            "{} (scored {}/100) raised: {}",
            op.reviewer,
            op.score,
            op.concerns.join(", ")
        ));
    }

    if blocks.is_empty() {
        NO_ISSUES_FEEDBACK.to_string()
    } else {
        blocks.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opinion(reviewer: &str, score: u8, concerns: &[&str]) -> ReviewOpinion {
        ReviewOpinion {
            reviewer: reviewer.into(),
            model: "test-model".into(),
            score,
            reasoning: "Reasoning.".into(),
            concerns: concerns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_report_contains_table_and_arbitration() {
        let ops = vec![opinion("Claude", 80, &["auth"]), opinion("Gemini", 72, &[])];
        let report = generate_report(&ops, &[], 78, "Weighted consensus.");

        assert!(report.contains("COUNCIL REVIEW REPORT"));
        assert!(report.contains("Claude"));
        assert!(report.contains("80/100"));
        assert!(report.contains("Final Score: 78/100"));
        assert!(report.contains("Weighted consensus."));
    }

    #[test]
    fn test_report_no_delta_block_without_history() {
        let ops = vec![opinion("Claude", 80, &[])];
        let report = generate_report(&ops, &[], 80, "ok");
        assert!(!report.contains("SCORE TREND"));
    }

    #[test]
    fn test_report_delta_block_with_history() {
        let ops = vec![opinion("Claude", 80, &[])];
        let prior = vec![opinion("Claude", 70, &["missing tests"])];
        let report = generate_report(&ops, &prior, 80, "ok");

        assert!(report.contains("SCORE TREND"));
        assert!(report.contains("(+10)"));
    }

    #[test]
    fn test_delta_negative_sign_explicit() {
        let ops = vec![opinion("Gemini", 55, &[])];
        let prior = vec![opinion("Gemini", 70, &[])];
        let block = delta_block(&ops, &prior).unwrap();
        assert!(block.contains("(-15)"));
    }

    #[test]
    fn test_delta_uses_latest_prior_opinion() {
        let ops = vec![opinion("Claude", 90, &[])];
        let prior = vec![opinion("Claude", 60, &[]), opinion("Claude", 80, &[])];
        let block = delta_block(&ops, &prior).unwrap();
        assert!(block.contains("80 ->  90"), "block was: {}", block);
    }

    #[test]
    fn test_feedback_concatenates_concerns_with_scores() {
        let ops = vec![
            opinion("Claude", 62, &["no input validation", "thin tests"]),
            opinion("GPT", 70, &["unclear naming"]),
        ];
        let feedback = format_feedback(&ops);

        assert!(feedback.contains("Claude (scored 62/100)"));
        assert!(feedback.contains("no input validation, thin tests"));
        assert!(feedback.contains("GPT (scored 70/100) raised: unclear naming"));
    }

    #[test]
    fn test_feedback_sentinel_when_no_concerns() {
        let ops = vec![opinion("Claude", 95, &[]), opinion("Gemini", 91, &[])];
        assert_eq!(format_feedback(&ops), NO_ISSUES_FEEDBACK);
    }

    #[test]
    fn test_feedback_never_empty() {
        assert_eq!(format_feedback(&[]), NO_ISSUES_FEEDBACK);
    }
}
