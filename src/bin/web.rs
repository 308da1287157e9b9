#![cfg(not(tarpaulin_include))]

use clap::Parser;
use gymdesk::Session;
use gymdesk::app;
use gymdesk::config::{Config, init_logging};

#[derive(Parser)]
#[command(name = "gymdesk-web", about = "Gym membership front desk (web)")]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Address to listen on
    #[arg(long, env = "GYM_BIND", default_value = "127.0.0.1:3000")]
    bind: String,
}

/// Main entry point for the web front desk
///
/// Loads the member table once at startup so a corrupt data file is reported
/// before the server starts accepting scans.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let session = Session::open(args.config.store())?;
    app::run(&args.bind, session, args.config.qr_options()).await
}
