// src/specs/studies.rs
//! Scraping spec for the studies listing.
//!
//! ```text
//! <div data-testid="studies-list">
//!   <ul>
//!     <li class="list-item" data-testid="study-<id>">
//!       … [data-testid="title"]                     study title
//!       … [data-testid="host"]                      "By <researcher>"
//!       … [data-testid="study-tag-reward"]          "£1.50"
//!       … [data-testid="study-tag-reward-per-hour"] "£9.00/hr"
//!       … [data-testid="study-tag-completion-time"] "10 mins"
//!     </li>
//! ```

use crate::config::consts::{
    HOST_TESTID, ITEM_CLASS, ITEM_TAG, LISTING_TESTID, REWARD_PER_HOUR_TESTID, REWARD_TESTID,
    TESTID_ATTR, TIME_TESTID, TITLE_TESTID,
};
use crate::core::html::{Document, Element, has_attr, is_tag_with_class};
use crate::listing::RawItem;

/// Raw list items of the listing, `None` when the container is absent.
pub fn parse_listing(html: &str) -> Option<Vec<RawItem>> {
    let doc = Document::new(html);
    let container = doc.find(0, doc.len(), |open| has_attr(open, TESTID_ATTR, LISTING_TESTID))?;
    let (from, to) = container.inner_range();

    let items = doc
        .find_all(from, to, |open| is_tag_with_class(open, ITEM_TAG, ITEM_CLASS))
        .into_iter()
        .map(|li| read_item(&doc, &li))
        .collect();
    Some(items)
}

fn read_item(doc: &Document<'_>, li: &Element<'_>) -> RawItem {
    RawItem {
        test_id: li.attr(TESTID_ATTR).map(str::to_string),
        title: field_text(doc, li, TITLE_TESTID),
        host: field_text(doc, li, HOST_TESTID),
        reward: field_text(doc, li, REWARD_TESTID),
        reward_per_hour: field_text(doc, li, REWARD_PER_HOUR_TESTID),
        completion_time: field_text(doc, li, TIME_TESTID),
    }
}

/// Text of the first descendant carrying `data-testid=<testid>`; empty text reads as `None`.
fn field_text(doc: &Document<'_>, li: &Element<'_>, testid: &str) -> Option<String> {
    let (from, to) = li.inner_range();
    let el = doc.find(from, to, |open| has_attr(open, TESTID_ATTR, testid))?;
    let text = el.text();
    (!text.is_empty()).then_some(text)
}
