use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = pgmodel_cli::run(std::env::args().collect()).await {
        let status = pgmodel_cli::status_code(&e);
        eprintln!("{} {status}: {e:#}", "error".red().bold());
        std::process::exit(1);
    }
}
