pub mod aggregate;
pub mod config;
pub mod error;
pub mod providers;
pub mod scan;
pub mod store;

pub use aggregate::{aggregate_parameter, LookupResult, Outcome, TrainPipeline};
pub use config::{Config, ConfigError};
pub use error::{LookupError, StoreError};
pub use providers::{CandidateDate, DetailRecord, TrainSource, ViaggiaTrenoClient};
pub use scan::{RunSummary, ScanCoordinator, ScanHandle};
pub use store::{Store, TrainRecord};
