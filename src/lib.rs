pub mod azure;
pub mod config;
pub mod converters;
pub mod db;
pub mod error;
pub mod graph;
pub mod jobstate;
pub mod resolver;
pub mod steps;

pub use config::Config;
pub use error::{ConnectorError, Result};
pub use jobstate::{JobState, MemoryJobState};
