//! Shared configuration and error types for webden.

pub mod config;
pub mod error;
