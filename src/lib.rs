// src/lib.rs

#[macro_use]
pub mod macros;

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod model;
pub mod progress;
pub mod specs;
pub mod store;

pub mod bridge;
pub mod bus;
pub mod currency;
pub mod extract;
pub mod filter;
pub mod listing;
pub mod pipeline;
pub mod watcher;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
