use clap::Parser;
use infrastructure::config::Config;
use presentation::cli::{Cli, ServerApp};
use shared::telemetry::init_tracing;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(Config::load()?);
    init_tracing("info");
    ServerApp::new(config).run().await
}
