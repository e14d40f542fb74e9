//! lensmirror - render-sync engine for head-worn display demo apps
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use lensmirror::HeadlessOptions;
use lensmirror_app::config::{default_config_path, init_config_file};
use lensmirror_app::AppKind;

/// lensmirror - drive a demo app on the glasses and a local mirror at once
#[derive(Parser, Debug)]
#[command(name = "lensmirror")]
#[command(about = "Render-sync engine for head-worn display demo apps", long_about = None)]
struct Args {
    /// App to run: base, clock, timer, notif, restapi, quicktest
    #[arg(value_name = "APP", value_parser = parse_app, required_unless_present = "init_config")]
    app: Option<AppKind>,

    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Bridge hub URL, overriding `[bridge] url`
    #[arg(long, value_name = "URL")]
    bridge: Option<String>,

    /// Layout file loaded by the quicktest app at startup
    #[arg(long, value_name = "PATH")]
    layout: Option<PathBuf>,

    /// Write a default config file if none exists, then exit
    #[arg(long)]
    init_config: bool,
}

fn parse_app(s: &str) -> Result<AppKind, String> {
    s.parse::<AppKind>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.init_config {
        let path = args
            .config
            .or_else(default_config_path)
            .ok_or_else(|| color_eyre::eyre::eyre!("no config directory available"))?;
        init_config_file(&path)?;
        eprintln!("Config file ready at {}", path.display());
        return Ok(());
    }

    let Some(app) = args.app else {
        color_eyre::eyre::bail!("an APP is required unless --init-config is given");
    };

    // Logging goes to a file; stdout carries the NDJSON stream
    lensmirror_core::logging::init()?;

    lensmirror::run_headless(HeadlessOptions {
        app,
        config: args.config,
        bridge: args.bridge,
        layout: args.layout,
    })
    .await?;
    Ok(())
}
