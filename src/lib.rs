pub mod cli;
pub mod config;
pub mod core;
pub mod observability;
pub mod platform;
pub mod service;

pub use anyhow::{Context, Result};
