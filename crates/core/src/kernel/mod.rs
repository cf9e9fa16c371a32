//! Kernel module
//!
//! The kernel module holds the table, file and delete models shared by the
//! catalog integration and the scan planner.

pub mod deletes;
pub mod models;

pub use deletes::*;
pub use models::*;
