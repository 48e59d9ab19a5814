//! # Burrow Core
//!
//! Error and on-disk format types shared by the Burrow engine crates.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Burrow.**
//!
//! Users should depend on the main [`burrow`](https://crates.io/crates/burrow) crate
//! instead, which provides the stable public API and its own error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod format;

pub use error::{Error, Result};
