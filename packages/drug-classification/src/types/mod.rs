//! Data types for classification, caching and configuration.

pub mod cache;
pub mod classification;
pub mod config;
