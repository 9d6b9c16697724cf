pub mod aggregator;
pub mod cancel;
pub mod controller;
pub mod error;
pub mod pool;
pub mod range;
pub mod task;

// Re-export common types
pub use controller::PictureCollector;
pub use error::{CollectError, ErrorKind};
pub use pool::DEFAULT_WORKERS;
pub use task::DayKey;
