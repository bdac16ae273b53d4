//! # Snake Arena Client Library
//!
//! This library provides a headless client for the multiplayer snake arena.
//! It connects to a server, keeps a smoothed view of the world and can steer
//! a snake on its own, which makes it useful for load testing a server and
//! for watching a match from a terminal.
//!
//! ## Architecture Overview
//!
//! The server is fully authoritative. The client never predicts or
//! simulates; it only sends intents (a desired heading, a respawn request)
//! and displays what the server reports.
//!
//! ### Snapshot Interpolation
//! Snapshots arrive at the broadcast cadence, 30 times per second by default,
//! while the client refreshes its view every frame. Only the two most recent
//! snapshots are kept and every frame blends from the older toward the newer
//! one. The blend always takes the shorter way around the wrapping arena.
//!
//! ### Connection Liveness
//! A heartbeat goes out every second so an idle client is not dropped. If
//! the server itself falls silent, the client gives up after a few seconds.
//!
//! ## Module Organization
//!
//! ### Interpolation Module (`interpolation`)
//! The two-snapshot state machine and the wrap-aware blend:
//! - `Uninitialized` until the init message arrives
//! - First appearances snap into place instead of sliding in
//! - Departed players disappear on the next frame
//!
//! ### Autopilot Module (`autopilot`)
//! Steers toward the nearest food and asks to respawn after dying.
//!
//! ### Reassembly Module (`reassembly`)
//! A snapshot too large for one datagram arrives in parts sharing a tick.
//! The parts are buffered until all of them are in; a newer tick abandons an
//! incomplete older one.
//!
//! ### Network Module (`network`)
//! UDP socket handling, packet dispatch and the frame, heartbeat and status
//! timers. A `Disconnected` from the server ends `run` right away.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions {
//!         name: "Viper".to_string(),
//!         ..ClientOptions::default()
//!     };
//!     let mut client = Client::new("127.0.0.1:8080", options).await?;
//!
//!     // Runs until Ctrl+C or until the server stops answering
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod autopilot;
pub mod interpolation;
pub mod network;
pub mod reassembly;
