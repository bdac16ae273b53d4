use clap::Parser;
use client::network::{Client, ClientOptions};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown to other players
    #[arg(short = 'n', long, default_value = shared::DEFAULT_PLAYER_NAME)]
    name: String,

    /// Only watch the arena instead of steering toward food
    #[arg(long)]
    no_autopilot: bool,

    /// Seconds between status log lines
    #[arg(long, default_value = "5")]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.no_autopilot {
        info!("Autopilot disabled, spectating only");
    }

    let options = ClientOptions {
        name: args.name,
        autopilot: !args.no_autopilot,
        status_interval: Duration::from_secs(args.status_interval.max(1)),
    };

    let mut client = Client::new(&args.server, options).await?;

    client.run().await?;

    Ok(())
}
