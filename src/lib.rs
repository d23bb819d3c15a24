//! Tagvault - cached photo metadata pipeline
//!
//! This library crate exposes the core pipeline for integration testing.

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod parse;
pub mod paths;
pub mod scan;
pub mod write;
