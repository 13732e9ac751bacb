use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    pricebot_cli::run().await
}
