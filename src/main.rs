// src/main.rs — ForgeFlow entry point

use clap::Parser;

use forgeflow::cli::{self, Cli, Commands};
use forgeflow::infra::config::Config;
use forgeflow::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG for overrides
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Some(Commands::Lessons { action }) => cli::run_lessons(action, config),
        Some(Commands::Status) => cli::show_status(&config),
        None => {
            let requirement = cli.requirement.join(" ");
            if requirement.trim().is_empty() {
                anyhow::bail!("no requirement given; try: forgeflow \"build a todo API\"");
            }
            cli::run_factory(requirement, cli.env, config).await
        }
    }
}
