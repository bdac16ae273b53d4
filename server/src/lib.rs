//! # Snake Arena Server Library
//!
//! This library provides the authoritative server for the multiplayer snake
//! arena. It owns the one true copy of the world, applies player commands,
//! advances the simulation at a fixed rate and broadcasts snapshots of it to
//! every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Snakes move continuously on a toroidal field. Every tick each living snake
//! turns a bounded amount toward the heading its player asked for, moves
//! forward, eats nearby food and is checked against every other body. Clients
//! never decide anything; they only send intents.
//!
//! ### Food Economy
//! The field is kept stocked with a target amount of food. Dead snakes and
//! snakes whose player left are turned into food along their bodies, so a big
//! snake dying is worth chasing.
//!
//! ### State Broadcasting
//! Snapshots are value copies built between ticks. The broadcast cadence is
//! half the simulation cadence by default (60 Hz ticks, 30 Hz snapshots), and
//! clients interpolate between consecutive snapshots.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! The world is mutated from exactly one place: the `select!` loop in
//! [`network::Server::run`]. Commands, ticks and broadcasts are therefore
//! strictly ordered and a snapshot can never observe a half-finished tick.
//! Socket I/O and timeout detection run in their own tasks and talk to the
//! loop through channels.
//!
//! ### Deterministic Ordering
//! Players are stored in id order and ids are handed out monotonically, so
//! when two snakes die in the same tick the outcome is reproducible. A world
//! built with [`game::World::with_seed`] replays identically.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Snakes, the world and the tick: steering, movement with wrap-around,
//! eating and growth, collisions, death and respawn.
//!
//! ### Food Module (`food`)
//! Food placement, corpse food and replenishment.
//!
//! ### Sanitize Module (`sanitize`)
//! Cleans player supplied display names.
//!
//! ### Snapshot Module (`snapshot`)
//! Builds the broadcast view of the world.
//!
//! ### Client Manager Module (`client_manager`)
//! Address to player bookkeeping, connection cap and timeouts.
//!
//! ### Network Module (`network`)
//! UDP transport, packet dispatch and the tick/broadcast scheduler.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::World;
//! use server::network::{Server, ServerSettings};
//! use shared::GameConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = World::new(GameConfig::default());
//!     let mut server = Server::new("127.0.0.1:8080", world, ServerSettings::default()).await?;
//!
//!     // Runs until a Shutdown message arrives on `server.handle()`
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod food;
pub mod game;
pub mod network;
pub mod sanitize;
pub mod snapshot;
