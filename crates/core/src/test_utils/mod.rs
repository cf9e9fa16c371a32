#![allow(dead_code, missing_docs)]
mod factories;

pub use factories::*;
