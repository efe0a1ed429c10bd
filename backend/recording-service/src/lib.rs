//! Recording Service
//!
//! Cloud-recording orchestration for RTC channels: starts and stops vendor
//! recordings, tracks their sessions and hands out playback links for the
//! files they leave in S3.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
