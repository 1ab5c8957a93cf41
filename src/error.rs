// src/error.rs
//! Error types for the extraction pipeline and its collaborators.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("listing: {0}")]
    Read(#[from] ReadError),

    #[error("watcher: {0}")]
    Watch(#[from] WatchError),

    #[error("exchange rates: {0}")]
    Rates(#[from] RateError),

    #[error("logging setup failed: {0}")]
    Log(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failures of the key-value stores backing settings and persisted state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a JSON object")]
    Corrupt { path: PathBuf },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key `{key}` holds an unexpected shape: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reading the page snapshot that carries the listing.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("reading snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("filesystem watch: {0}")]
    Notify(#[from] notify::Error),

    #[error("watch target {0} has no parent directory")]
    NoParent(PathBuf),
}

/// Exchange-rate fetch failures. Always recovered locally.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered {0}")]
    Status(reqwest::StatusCode),

    #[error("provider reported `{0}`")]
    Provider(String),
}
