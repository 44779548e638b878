//! # IVTS Common Library
//!
//! Shared code for the interview transcript services including:
//! - Database initialization and models
//! - Configuration loading
//! - Error types
//! - Clock abstraction

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
