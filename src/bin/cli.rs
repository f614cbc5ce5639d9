//! kinmap CLI entry point.

use clap::Parser;
use kinmap_core::cli::Cli;
use kinmap_core::config::AppConfig;
use kinmap_core::context::AppContext;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|d| d.join("kinmap")))
        .expect("could not determine a data directory");

    let config = match AppConfig::load_or_create(&data_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    let ctx = match AppContext::bootstrap(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to start: {e}");
            std::process::exit(2);
        }
    };

    let code = kinmap_core::cli::run(cli, &ctx).await;
    ctx.shutdown().await;
    std::process::exit(code);
}
