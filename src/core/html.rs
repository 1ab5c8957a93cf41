// src/core/html.rs
//! Tolerant, case-insensitive HTML scanning.
//!
//! No tree is built. A [`Document`] keeps the source next to an ASCII-lowercased
//! copy (identical byte offsets) and hands out [`Element`] ranges into the source.
//! Good enough for one fixed page contract; not a general parser.

use super::sanitize::{normalize_entities, normalize_ws};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub struct Document<'a> {
    src: &'a str,
    lc: String,
}

/// One element located in a [`Document`]: opening tag, inner range, end.
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    src: &'a str,
    start: usize,
    open_end: usize,
    inner_end: usize,
    end: usize,
}

impl<'a> Document<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, lc: src.to_ascii_lowercase() }
    }

    pub fn len(&self) -> usize { self.src.len() }
    pub fn is_empty(&self) -> bool { self.src.is_empty() }

    /// First element inside `[from, to)` whose opening tag satisfies `pred`.
    pub fn find<P>(&self, from: usize, to: usize, pred: P) -> Option<Element<'a>>
    where
        P: Fn(&str) -> bool,
    {
        let mut pos = from;
        while let Some((s, e)) = self.next_open_tag(pos, to) {
            if pred(&self.src[s..e]) {
                return Some(self.element(s, e, to));
            }
            pos = e;
        }
        None
    }

    /// All non-overlapping elements inside `[from, to)` matching `pred`, in document order.
    pub fn find_all<P>(&self, from: usize, to: usize, pred: P) -> Vec<Element<'a>>
    where
        P: Fn(&str) -> bool,
    {
        let mut out = Vec::new();
        let mut pos = from;
        while let Some(el) = self.find(pos, to, &pred) {
            pos = el.end.max(el.open_end);
            out.push(el);
        }
        out
    }

    /// Next opening tag at or after `from`. Comments, closing tags and `<!doctype>` are skipped.
    fn next_open_tag(&self, from: usize, to: usize) -> Option<(usize, usize)> {
        let b = self.src.as_bytes();
        let mut i = from;
        while i < to {
            let lt = i + self.src.get(i..to)?.find('<')?;
            if self.src[lt..to].starts_with("<!--") {
                i = lt + self.src[lt..to].find("-->")? + 3;
                continue;
            }
            match b.get(lt + 1) {
                Some(c) if c.is_ascii_alphabetic() => {
                    let end = tag_end(b, lt, to)?;
                    return Some((lt, end));
                }
                _ => i = lt + 1,
            }
        }
        None
    }

    /// Build the element opened at `[start, open_end)`. Unclosed elements run to `limit`.
    fn element(&self, start: usize, open_end: usize, limit: usize) -> Element<'a> {
        let open = &self.lc[start..open_end];
        let name = tag_name(open);

        let (inner_end, end) = if open.ends_with("/>") || VOID_TAGS.contains(&name) {
            (open_end, open_end)
        } else {
            self.matching_close(name, open_end, limit).unwrap_or((limit, limit))
        };

        Element { src: self.src, start, open_end, inner_end, end }
    }

    /// Walk forward counting same-name nesting until the closing tag balances.
    fn matching_close(&self, name: &str, from: usize, limit: usize) -> Option<(usize, usize)> {
        let open_pat = join_tag("<", name);
        let close_pat = join_tag("</", name);
        let b = self.src.as_bytes();

        let mut depth = 1usize;
        let mut i = from;
        loop {
            let close = self.find_tag(&close_pat, i, limit)?;
            match self.find_tag(&open_pat, i, close) {
                Some(open) => {
                    let open_end = tag_end(b, open, limit)?;
                    if !self.lc[open..open_end].ends_with("/>") {
                        depth += 1;
                    }
                    i = open_end;
                }
                None => {
                    let close_end = close + self.src[close..limit].find('>')? + 1;
                    depth -= 1;
                    if depth == 0 {
                        return Some((close, close_end));
                    }
                    i = close_end;
                }
            }
        }
    }

    /// Position of `pat` (`<li` / `</li`) in `[from, to)` followed by a tag-name boundary.
    fn find_tag(&self, pat: &str, from: usize, to: usize) -> Option<usize> {
        let mut i = from;
        while i < to {
            let p = i + self.lc.get(i..to)?.find(pat)?;
            let after = self.lc.as_bytes().get(p + pat.len()).copied();
            match after {
                Some(c) if c.is_ascii_whitespace() || c == b'>' || c == b'/' => return Some(p),
                _ => i = p + pat.len(),
            }
        }
        None
    }
}

impl<'a> Element<'a> {
    pub fn open_tag(&self) -> &'a str { &self.src[self.start..self.open_end] }
    pub fn inner(&self) -> &'a str { &self.src[self.open_end..self.inner_end] }
    pub fn outer(&self) -> &'a str { &self.src[self.start..self.end] }

    /// Byte range of the element's content; feed back into [`Document::find`].
    pub fn inner_range(&self) -> (usize, usize) { (self.open_end, self.inner_end) }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        attr_value(self.open_tag(), name)
    }

    /// Visible text with tags removed, entities decoded and whitespace collapsed.
    pub fn text(&self) -> String {
        strip_tags(self.inner())
    }
}

/// Lowercase tag name of an opening tag slice (`<Li class=..>` → `li`).
pub fn tag_name(open: &str) -> &str {
    let body = open.strip_prefix('<').unwrap_or(open);
    let end = body
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
        .unwrap_or(body.len());
    &body[..end]
}

/// Value of attribute `name` in an opening tag. Bare attributes yield `""`.
pub fn attr_value<'a>(open: &'a str, name: &str) -> Option<&'a str> {
    let b = open.as_bytes();
    let n = b.len();
    let mut i = 1 + tag_name(open).len();

    loop {
        while i < n && (b[i].is_ascii_whitespace() || b[i] == b'/') { i += 1; }
        if i >= n || b[i] == b'>' { return None; }

        let key_start = i;
        while i < n && !b[i].is_ascii_whitespace() && !matches!(b[i], b'=' | b'>' | b'/') { i += 1; }
        let key = &open[key_start..i];

        while i < n && b[i].is_ascii_whitespace() { i += 1; }
        let value = if i < n && b[i] == b'=' {
            i += 1;
            while i < n && b[i].is_ascii_whitespace() { i += 1; }
            match b.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let close = open[i + 1..].find(q as char).map(|p| i + 1 + p).unwrap_or(n);
                    let v = &open[(i + 1).min(close)..close];
                    i = (close + 1).min(n);
                    v
                }
                _ => {
                    let s = i;
                    while i < n && !b[i].is_ascii_whitespace() && b[i] != b'>' { i += 1; }
                    &open[s..i]
                }
            }
        } else {
            ""
        };

        if key.eq_ignore_ascii_case(name) {
            return Some(value);
        }
    }
}

/// `true` when the opening tag carries attribute `name` equal to `value`.
pub fn has_attr(open: &str, name: &str, value: &str) -> bool {
    attr_value(open, name) == Some(value)
}

/// `true` when the opening tag is a `tag` with `class` among its class tokens.
pub fn is_tag_with_class(open: &str, tag: &str, class: &str) -> bool {
    tag_name(open).eq_ignore_ascii_case(tag)
        && attr_value(open, "class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|t| t == class))
}

/// Remove markup, decode entities, collapse whitespace. Mirrors `textContent` + trim.
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();
    let b = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0usize;

    while i < b.len() {
        if b[i] == b'<' {
            let rest = &s[i..];
            if rest.starts_with("<!--") {
                i += rest.find("-->").map(|p| p + 3).unwrap_or(rest.len());
                continue;
            }
            if matches!(b.get(i + 1), Some(c) if c.is_ascii_alphabetic() || *c == b'/' || *c == b'!') {
                i = tag_end(b, i, b.len()).unwrap_or(b.len());
                continue;
            }
        }
        let ch = s[i..].chars().next().unwrap_or(' ');
        out.push(ch);
        i += ch.len_utf8();
    }
    normalize_ws(&normalize_entities(&out))
}

/// One past the `>` closing the tag that opens at `lt`, ignoring `>` inside quotes.
fn tag_end(b: &[u8], lt: usize, to: usize) -> Option<usize> {
    let mut in_s = false;
    let mut in_d = false;
    let mut i = lt + 1;
    while i < to.min(b.len()) {
        match b[i] {
            b'\'' if !in_d => in_s = !in_s,
            b'"' if !in_s => in_d = !in_d,
            b'>' if !in_s && !in_d => return Some(i + 1),
            _ => {}
        }
        i += 1;
    }
    None
}

fn join_tag(prefix: &str, name: &str) -> String {
    let mut s = s!(prefix);
    s.push_str(name);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_same_name_elements_balance() {
        let html = r#"<div id="a"><div>x</div><div><div>y</div></div></div><div id="b"></div>"#;
        let doc = Document::new(html);
        let a = doc.find(0, doc.len(), |o| has_attr(o, "id", "a")).unwrap();
        assert_eq!(a.text(), "xy");
        assert!(a.outer().ends_with("</div></div></div>"));
    }

    #[test]
    fn attributes_with_either_quote_style() {
        let open = r#"<li class='list-item  active' data-testid="study-abc" hidden>"#;
        assert_eq!(attr_value(open, "data-testid"), Some("study-abc"));
        assert_eq!(attr_value(open, "DATA-TESTID"), Some("study-abc"));
        assert_eq!(attr_value(open, "hidden"), Some(""));
        assert_eq!(attr_value(open, "id"), None);
        assert!(is_tag_with_class(open, "li", "list-item"));
        assert!(!is_tag_with_class(open, "li", "list"));
    }

    #[test]
    fn strip_tags_matches_text_content() {
        assert_eq!(strip_tags("<span>£1.50</span>\n  <b>fixed</b>"), "£1.50 fixed");
        assert_eq!(strip_tags("<p title=\"a>b\">Fish &amp; chips</p>"), "Fish & chips");
        assert_eq!(strip_tags("a <!-- hidden --> b"), "a b");
    }
}
