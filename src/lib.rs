pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod store;

pub use directory::{Confirm, Directory, DirectoryOptions};
pub use error::{DirectoryError, DirectoryResult};
pub use store::{HttpRepository, MemoryRepository, RecordRepository, Session};
