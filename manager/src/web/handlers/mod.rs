//! HTTP request handlers for the backup API.
//!
//! - `backups` - backup creation, listing, verification, restore and deletion
//! - `common` - Response envelope, query structs and error mapping
//! - `operations` - In-flight operation status

pub mod backups;
pub mod common;
pub mod operations;

pub use backups::*;
pub use operations::*;
