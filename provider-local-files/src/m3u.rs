//! Minimal M3U playlist handling
//!
//! Entries are one per line. Lines starting with `#` (including `#EXTM3U`
//! and `#EXTINF`) are kept verbatim on rewrite but are not entries.

/// A playlist entry: a file path or a `provider://item_id` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Path(String),
    Uri { provider: String, item_id: String },
}

impl Entry {
    pub fn parse(line: &str) -> Option<Entry> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        match line.split_once("://") {
            Some((provider, item_id)) if !provider.is_empty() && !item_id.is_empty() => {
                Some(Entry::Uri {
                    provider: provider.to_string(),
                    item_id: item_id.to_string(),
                })
            }
            _ => Some(Entry::Path(line.to_string())),
        }
    }
}

/// Entries of a playlist in file order.
pub fn entries(content: &str) -> Vec<Entry> {
    content.lines().filter_map(Entry::parse).collect()
}

/// `content` with `lines` appended, one per line.
pub fn append(content: &str, lines: &[String]) -> String {
    let mut out = String::with_capacity(content.len() + lines.iter().map(|l| l.len() + 1).sum::<usize>());
    if content.trim().is_empty() {
        out.push_str("#EXTM3U\n");
    } else {
        out.push_str(content);
        if !content.ends_with('\n') {
            out.push('\n');
        }
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// `content` without the entry lines matching `remove`, and how many were
/// dropped. An `#EXTINF` line directly above a dropped entry goes with it.
pub fn retain<F>(content: &str, mut remove: F) -> (String, usize)
where
    F: FnMut(&Entry) -> bool,
{
    let mut kept: Vec<&str> = Vec::new();
    let mut removed = 0;

    for line in content.lines() {
        match Entry::parse(line) {
            Some(entry) if remove(&entry) => {
                removed += 1;
                if kept.last().is_some_and(|prev| prev.starts_with("#EXTINF")) {
                    kept.pop();
                }
            }
            _ => kept.push(line),
        }
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    (out, removed)
}
