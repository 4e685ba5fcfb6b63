//! Document header scanning.
//!
//! Reads the part of an AsciiDoc document that carries metadata: optional
//! front matter, the `= Title` line, the author and revision lines right
//! under it, and attribute entries (`:name: value`). Scanning stops at the
//! first blank line after header content. Everything below the header is
//! left to the converter.
//!
//! ```text
//! ---
//! category: guide          ← front matter (see frontmatter.rs)
//! ---
//! :product: Widget         ← attribute entries may precede the title
//! = Installation Guide     ← title
//! Ada Lovelace <ada@example.com>   ← author line
//! v2.1, 2024-03-01: Rewrite        ← revision line
//! :toc: left               ← more attribute entries
//!
//! Body starts here.
//! ```

use crate::frontmatter::split_front_matter;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ATTRIBUTE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^:(!?)([A-Za-z0-9_][A-Za-z0-9_-]*)(!?):(?:[ \t]+(.*))?$")
        .expect("attribute entry pattern is valid")
});

/// Metadata found at the top of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHeader {
    pub front_matter: Option<String>,
    pub title: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BeforeTitle,
    Author,
    Revision,
    Attributes,
}

impl DocumentHeader {
    pub fn parse(content: &str) -> Self {
        let (front_matter, body) = split_front_matter(content);
        let mut header = DocumentHeader {
            front_matter: front_matter.map(str::to_string),
            ..Default::default()
        };

        let mut phase = Phase::BeforeTitle;
        let mut in_block_comment = false;
        let mut lines = body.lines();

        while let Some(raw) = lines.next() {
            let line = raw.trim_end();

            if in_block_comment {
                in_block_comment = line != "////";
                continue;
            }
            if line == "////" {
                in_block_comment = true;
                continue;
            }
            if line.starts_with("//") {
                continue;
            }
            if line.is_empty() {
                if phase == Phase::BeforeTitle {
                    continue;
                }
                break;
            }

            if let Some(caps) = ATTRIBUTE_ENTRY.captures(line) {
                let name = caps[2].to_lowercase();
                let unset = !caps[1].is_empty() || !caps[3].is_empty();
                if unset {
                    header.attributes.remove(&name);
                } else {
                    let value = caps.get(4).map_or("", |m| m.as_str());
                    let value = read_continuations(value, &mut lines);
                    header.attributes.insert(name, value);
                }
                if phase != Phase::BeforeTitle {
                    phase = Phase::Attributes;
                }
                continue;
            }

            match phase {
                Phase::BeforeTitle => match line.strip_prefix("= ") {
                    Some(title) => {
                        let title = title.trim().to_string();
                        header.attributes.insert("doctitle".into(), title.clone());
                        header.title = Some(title);
                        phase = Phase::Author;
                    }
                    None => break,
                },
                Phase::Author => {
                    apply_author_line(line, &mut header.attributes);
                    phase = Phase::Revision;
                }
                Phase::Revision => {
                    apply_revision_line(line, &mut header.attributes);
                    phase = Phase::Attributes;
                }
                Phase::Attributes => break,
            }
        }

        header
    }
}

/// Follow ` \` line continuations of an attribute value.
fn read_continuations<'a>(first: &str, lines: &mut impl Iterator<Item = &'a str>) -> String {
    let mut value = first.trim().to_string();
    while let Some(stripped) = value.strip_suffix(" \\") {
        value = stripped.trim_end().to_string();
        match lines.next() {
            Some(next) => {
                value.push(' ');
                value.push_str(next.trim());
            }
            None => break,
        }
    }
    value
}

/// `Name <email>; Other Name <email>`
fn apply_author_line(line: &str, attributes: &mut BTreeMap<String, String>) {
    let mut names = Vec::new();
    for (i, part) in line.split(';').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
        let (name, email) = match part.split_once('<') {
            Some((name, rest)) => (name.trim(), rest.trim_end_matches('>').trim()),
            None => (part, ""),
        };
        if i == 0 {
            attributes.insert("author".into(), name.to_string());
            if !email.is_empty() {
                attributes.insert("email".into(), email.to_string());
            }
        }
        names.push(name.to_string());
    }
    if !names.is_empty() {
        attributes.insert("authors".into(), names.join(", "));
    }
}

/// `v1.2, 2024-03-01: remark`, `2024-03-01`, or `v1.2`.
fn apply_revision_line(line: &str, attributes: &mut BTreeMap<String, String>) {
    let (main, remark) = match line.split_once(": ") {
        Some((main, remark)) => (main.trim(), Some(remark.trim())),
        None => (line.trim(), None),
    };

    let (number, date) = match main.split_once(',') {
        Some((number, date)) => (Some(number.trim()), Some(date.trim())),
        None if looks_like_revnumber(main) => (Some(main), None),
        None => (None, Some(main)),
    };

    if let Some(number) = number {
        let number = number.trim_start_matches(|c: char| !c.is_ascii_digit());
        if !number.is_empty() {
            attributes.insert("revnumber".into(), number.to_string());
        }
    }
    if let Some(date) = date.filter(|d| !d.is_empty()) {
        attributes.insert("revdate".into(), date.to_string());
    }
    if let Some(remark) = remark.filter(|r| !r.is_empty()) {
        attributes.insert("revremark".into(), remark.to_string());
    }
}

fn looks_like_revnumber(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some('v' | 'V')) && chars.next().is_some_and(|c| c.is_ascii_digit())
}
