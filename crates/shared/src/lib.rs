//! Shared types, errors, and configuration for Splitledger.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Validated currency codes
//! - Pagination types for list queries
//! - Application-wide error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};
