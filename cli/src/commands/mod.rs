pub mod ship;
pub mod snapshot;
