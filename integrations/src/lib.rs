pub mod gpg;
pub mod ledger;
pub mod md5sum;
pub mod rsync;

pub use gpg::{encrypted_name, Encryptor};
pub use ledger::{ChecksumLedger, MANIFEST_FILE};
pub use md5sum::Checksummer;
pub use rsync::{SyncInvoker, SyncRequest};
