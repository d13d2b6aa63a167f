pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod stats_source;

pub use server::{AdminServer, AppState};
pub use stats_source::{NoStats, StatsSource};
