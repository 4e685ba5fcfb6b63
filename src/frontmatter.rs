//! Front matter handling.
//!
//! A document may open with a block delimited by `---` lines holding YAML
//! (or JSON) metadata. The converter is told to skip the block; this module
//! pulls it out so the metadata can reach templates and schema validation.

use serde_json::{Map, Value};

const DELIMITER: &str = "---";

/// Split a leading front matter block from the document.
///
/// Returns `(Some(front_matter), body)` when the first line is `---` and a
/// later line closes the block, otherwise `(None, content)`.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(first_end) = content.find('\n') else {
        return (None, content);
    };
    if content[..first_end].trim_end() != DELIMITER {
        return (None, content);
    }

    let inner_start = first_end + 1;
    let mut offset = inner_start;
    for line in content[inner_start..].split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let front = &content[inner_start..offset];
            let front = front.strip_suffix('\n').unwrap_or(front);
            let front = front.strip_suffix('\r').unwrap_or(front);
            return (Some(front), &content[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

/// Parse front matter text into a JSON object.
///
/// YAML is tried first, then JSON. Anything that isn't a mapping in either
/// syntax yields an empty map.
pub fn parse_front_matter(text: &str) -> Map<String, Value> {
    match serde_yaml::from_str::<Map<String, Value>>(text) {
        Ok(map) => map,
        Err(yaml_err) => match serde_json::from_str::<Map<String, Value>>(text) {
            Ok(map) => map,
            Err(json_err) => {
                tracing::debug!(
                    yaml_error = %yaml_err,
                    json_error = %json_err,
                    "Failed to parse front matter as YAML or JSON"
                );
                Map::new()
            }
        },
    }
}
