pub mod config;
pub mod error;
pub mod guard;
pub mod label;
pub mod lastgood;
pub mod runner;
pub mod secret;
pub mod staging;

pub use config::{ConfigResolver, ResolvedConfig, Tools};
pub use error::{Error, Result};
pub use guard::{DestinationGuard, DestinationLock};
pub use lastgood::LastGoodTracker;
pub use runner::{CommandLine, CommandOutput, Runner, SystemRunner};
pub use secret::Passphrase;
pub use staging::CacheStager;
