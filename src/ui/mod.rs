// ABOUTME: UI module exports
// Dashboard rendering plus pure layout helpers

pub mod dashboard;
pub mod layout;

pub use dashboard::Dashboard;
pub use layout::ColumnWidths;
