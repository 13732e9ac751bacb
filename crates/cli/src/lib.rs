pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pricebot",
    about = "Pricebot operator CLI",
    long_about = "Ask the pricing agent questions, inspect effective configuration, and debug filter broadening.",
    after_help = "Examples:\n  pricebot ask \"how much is a D8s v4 in east us?\"\n  pricebot config\n  pricebot broaden \"armRegionName eq 'eastus' and contains(tolower(meterName), 'd8s v4 spot')\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Send one prompt to a running server and stream the answer")]
    Ask {
        #[arg(help = "Question to ask the pricing agent")]
        prompt: String,
        #[arg(long, default_value = "http://127.0.0.1:8080", help = "Base URL of the server")]
        server: String,
        #[arg(long, help = "Continuation token from a previous turn")]
        session_token: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Print the broadening chain a filter would follow on zero results")]
    Broaden {
        #[arg(help = "OData-style $filter expression")]
        filter: String,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { prompt, server, session_token } => {
            commands::ask::run(&server, &prompt, session_token).await
        }
        Command::Config => commands::config::run(),
        Command::Broaden { filter } => commands::broaden::run(&filter),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
