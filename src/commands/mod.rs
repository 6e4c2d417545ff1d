//! CLI commands implementation

pub mod categorize;
pub mod import;
pub mod init;
pub mod reindex;
pub mod search;
pub mod status;

pub use categorize::*;
pub use import::*;
pub use init::*;
pub use reindex::*;
pub use search::*;
pub use status::*;
