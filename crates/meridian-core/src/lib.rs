pub mod error;
pub mod settings;
pub mod types;
pub mod watchlist;

pub use error::MeridianError;
pub use settings::{get_settings, Settings};
pub use types::*;
