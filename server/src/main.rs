use clap::Parser;
use log::{error, info};
use server::game::World;
use server::network::{Server, ServerError, ServerMessage, ServerSettings};
use shared::{GameConfig, BROADCAST_RATE, TICK_RATE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Snapshot broadcasts per second
    #[arg(short, long, default_value_t = BROADCAST_RATE)]
    broadcast_rate: u32,

    /// Width of the arena
    #[arg(long, default_value = "1200")]
    width: u32,

    /// Height of the arena (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "800")]
    height: u32,

    /// Amount of food kept on the field
    #[arg(short, long, default_value = "50")]
    food: usize,

    /// Segments of a freshly spawned snake
    #[arg(long, default_value = "5")]
    initial_length: usize,

    /// Distance moved per tick
    #[arg(long, default_value = "3.0")]
    speed: f32,

    /// Segment spacing of a freshly spawned snake
    #[arg(long, default_value = "10")]
    grid_size: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout: u64,

    /// Seed for a reproducible world
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn game_config(&self) -> Result<GameConfig, ServerError> {
        if self.width == 0 || self.height == 0 {
            return Err(ServerError::InvalidConfig(
                "arena dimensions must be positive".to_string(),
            ));
        }
        if self.initial_length == 0 || !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ServerError::InvalidConfig(
                "initial length and speed must be positive".to_string(),
            ));
        }

        Ok(GameConfig {
            width: self.width,
            height: self.height,
            grid_size: self.grid_size,
            initial_length: self.initial_length,
            food_count: self.food,
            speed: self.speed,
        })
    }

    fn settings(&self) -> Result<ServerSettings, ServerError> {
        if self.tick_rate == 0 || self.broadcast_rate == 0 {
            return Err(ServerError::InvalidConfig(
                "tick and broadcast rates must be positive".to_string(),
            ));
        }

        let settings = ServerSettings {
            tick_duration: Duration::from_secs_f64(1.0 / self.tick_rate as f64),
            broadcast_duration: Duration::from_secs_f64(1.0 / self.broadcast_rate as f64),
            max_clients: self.max_clients,
            client_timeout: Duration::from_secs(self.client_timeout),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.game_config()?;
    let settings = args.settings()?;

    let world = match args.seed {
        Some(seed) => {
            info!("Using world seed {}", seed);
            World::with_seed(config, seed)
        }
        None => World::new(config),
    };

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} ({}x{} arena, {} food, {} Hz ticks, {} Hz snapshots)",
        address, config.width, config.height, config.food_count, args.tick_rate, args.broadcast_rate
    );

    let mut server = Server::new(&address, world, settings).await?;
    let shutdown = server.handle();

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    }

    Ok(())
}
