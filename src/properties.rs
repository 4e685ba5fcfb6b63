//! Reader and writer for the `key=value` property format of the hash store.
//!
//! The layout is the common `.properties` format, so hash files written by
//! other tools that share the work directory stay readable.
//! Only what the hash store needs is supported: `#`/`!` comments, the `=`,
//! `:` and whitespace separators, backslash line continuations, and the
//! usual backslash escapes including `\uXXXX`.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PropertiesError {
    #[error("malformed \\uxxxx escape on logical line {0}")]
    MalformedUnicode(usize),
}

const WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

/// Parse property text into an ordered map.
///
/// Later duplicates of a key replace earlier ones. A line without a
/// separator is a key with an empty value.
pub fn parse(text: &str) -> Result<BTreeMap<String, String>, PropertiesError> {
    let mut entries = BTreeMap::new();
    for (index, line) in logical_lines(text).iter().enumerate() {
        let (raw_key, raw_value) = split_key_value(line);
        let key = unescape(raw_key).ok_or(PropertiesError::MalformedUnicode(index + 1))?;
        let value = unescape(raw_value).ok_or(PropertiesError::MalformedUnicode(index + 1))?;
        entries.insert(key, value);
    }
    Ok(entries)
}

/// Serialize entries, preceded by a single `#` comment line.
pub fn write(entries: &BTreeMap<String, String>, comment: &str) -> String {
    let mut out = String::new();
    out.push('#');
    out.push_str(&comment.replace(['\n', '\r'], " "));
    out.push('\n');
    for (key, value) in entries {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

/// Join continuation lines and drop comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for natural in text.lines() {
        let trimmed = natural.trim_start_matches(WHITESPACE);
        let line = match current.take() {
            Some(mut pending) => {
                pending.push_str(trimmed);
                pending
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            let mut pending = line;
            pending.pop();
            current = Some(pending);
        } else {
            lines.push(line);
        }
    }

    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

/// Split a logical line at the first unescaped separator.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut value_start = line.len();
    let mut explicit_separator = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                value_start = i + 1;
                explicit_separator = true;
                break;
            }
            ' ' | '\t' | '\x0c' => {
                key_end = i;
                value_start = i + 1;
                break;
            }
            _ => {}
        }
    }

    let mut value = line[value_start..].trim_start_matches(WHITESPACE);
    if !explicit_separator
        && let Some(rest) = value.strip_prefix(['=', ':'])
    {
        value = rest.trim_start_matches(WHITESPACE);
    }
    (&line[..key_end], value)
}

/// Resolve backslash escapes. Returns `None` on a malformed `\u` escape.
fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_utf16(&mut units, &mut out);
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        if escaped == 'u' {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            units.push(u16::from_str_radix(&hex, 16).ok()?);
            continue;
        }
        flush_utf16(&mut units, &mut out);
        out.push(match escaped {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\x0c',
            other => other,
        });
    }
    flush_utf16(&mut units, &mut out);
    Some(out)
}

fn flush_utf16(units: &mut Vec<u16>, out: &mut String) {
    if units.is_empty() {
        return;
    }
    out.extend(char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
