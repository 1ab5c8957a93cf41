// src/specs/mod.rs
//! # Page "specs"
//!
//! Page-specific scraping specifications. Each spec encodes *where the ground
//! truth lives in the HTML* of one page and *how to read it tolerantly*.
//!
//! ## What lives here
//! - **Pure HTML parsing** of a page snapshot via `core::html` (case-insensitive
//!   tag and attribute scanning, nesting-aware element bounds, entity and
//!   whitespace normalization).
//! - **Selector contract**: the `data-testid` hooks and class names the page
//!   exposes, kept in `config::consts`.
//! - **Light shaping** into [`RawItem`](crate::listing::RawItem)s: raw text
//!   only, no currency conversion, no id splitting.
//!
//! ## What does **not** live here
//! - Deciding what is new, filtering, persistence: `extract`, `filter`, `store`.
//! - When to read the page: `watcher`.
//!
//! ## Conventions
//! - A missing container is `None`, never an error: the page may not be rendered yet.
//! - A missing sub-element is a `None` field, never a dropped item.
//! - Specs are testable offline against saved fixtures.

pub mod studies;
