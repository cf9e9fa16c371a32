//! Models describing tables, their files and the tasks a catalog hands out
//! when enumerating a snapshot.
//!
//! These types mirror what the catalog reports. The data file and delete file
//! structs serialize in the kebab-case layout used by manifest files.

pub(crate) mod files;
pub(crate) mod literal;
pub(crate) mod schema;

pub use files::*;
pub use literal::*;
pub use schema::*;
