use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use fun_euchre_core::config::RuntimeConfig;
use fun_euchre_core::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let config = RuntimeConfig::parse()
        .validated()
        .context("invalid runtime configuration")?;
    init_tracing(config.log_json);
    tracing::info!(target = "bin::fun_euchre_server", ?config, "starting");
    run_server(config).await
}

fn load_dotenv() {
    let manifest_env_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }
}
