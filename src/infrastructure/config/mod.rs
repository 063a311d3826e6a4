pub mod loader;
pub mod model;

pub use loader::{ConfigError, ConfigLoader};
pub use model::AppConfig;
