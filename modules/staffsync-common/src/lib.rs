pub mod config;
pub mod document;
pub mod error;
pub mod properties;
pub mod types;

pub use config::Config;
pub use document::*;
pub use error::{CommitError, SyncError};
pub use properties::PropertyTable;
pub use types::*;
