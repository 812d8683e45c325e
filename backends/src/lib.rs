pub mod backend;
pub mod local;
pub mod rclone;

pub use backend::Sink;
pub use local::LocalSink;
pub use rclone::RcloneSink;
