// ABOUTME: Data layer module exports
// Trackers poll external state files; the collector drives them on one tick

pub mod collector;
pub mod history;
pub mod logs;
pub mod phase;
pub mod projects;
pub mod session;
pub mod status;
pub mod subagent;
pub mod token;
