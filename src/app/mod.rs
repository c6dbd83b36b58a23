pub mod config;
pub mod state;

pub use config::{AppConfig, Theme};
pub use state::{AppEvent, AppState};
