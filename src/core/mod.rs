// src/core/mod.rs

pub mod html;
pub mod money;
pub mod sanitize;

pub use html::{Document, Element};
pub use money::{Money, parse_duration, parse_money};
