//! Local recording server: streamed uploads into one recording directory,
//! playback downloads, a compact JSON listing, and oldest-first eviction when
//! the volume runs low.

pub mod capacity;
pub mod config;
pub mod error;
pub mod handlers;
pub mod paths;
pub mod router;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::AppError;
pub use server::{AppState, Server};
