#![doc = "Common types shared across the utimer workspace."]

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use metrics::*;
