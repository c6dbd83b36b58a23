// ABOUTME: Main library module that exports the public API
// Central module for the Wavedash terminal dashboard

pub mod app;
pub mod data;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use app::{AppConfig, AppEvent, AppState};
pub use utils::{Result, WavedashError};
