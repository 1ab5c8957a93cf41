// src/listing.rs
//! Listing reader capability: where raw list items come from.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReadError;
use crate::specs;

/// One list item as found on the page, before any interpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawItem {
    /// Raw `data-testid` of the item, e.g. `"study-65f1c0"`.
    pub test_id: Option<String>,
    pub title: Option<String>,
    /// Host line including its leading label word, e.g. `"By Oxford Lab"`.
    pub host: Option<String>,
    pub reward: Option<String>,
    pub reward_per_hour: Option<String>,
    pub completion_time: Option<String>,
}

pub trait ListingReader: Send + Sync {
    /// Current items of the listing; `None` when the listing container is not on the page.
    fn read_listing(&self) -> Result<Option<Vec<RawItem>>, ReadError>;
}

/// HTML snapshot of the page on disk, rewritten by whatever renders the page.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListingReader for SnapshotFile {
    fn read_listing(&self) -> Result<Option<Vec<RawItem>>, ReadError> {
        let html = match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            // Not written yet: same as a page that hasn't rendered the list.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ReadError::Io { path: self.path.clone(), source }),
        };
        Ok(specs::studies::parse_listing(&html))
    }
}
