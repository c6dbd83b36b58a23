pub mod cost;
pub mod error;
pub mod textwidth;
pub mod timefmt;

pub use cost::{normalize_model, short_model, CostModel, ModelRates};
pub use error::{Result, WavedashError};
