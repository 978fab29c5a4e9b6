pub mod error;
pub mod leaderboard;
pub mod server;

pub use server::{ApiState, router, run_api_server};
