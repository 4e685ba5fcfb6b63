//! Indentation cleanup for templates written inside indented config blocks.

/// Columns a tab counts for when measuring indentation.
const TAB_WIDTH: usize = 4;

/// Remove the indentation shared by all non-blank lines, keeping relative
/// indentation intact.
///
/// Blank lines don't take part in the minimum and are kept verbatim. Text
/// with no common indentation is returned unchanged.
pub fn remove_common_indentation(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();

    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| indent_width(line))
        .min();

    let min_indent = match min_indent {
        Some(n) if n > 0 => n,
        _ => return content.to_string(),
    };

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                strip_columns(line, min_indent).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .map_while(|c| match c {
            ' ' => Some(1),
            '\t' => Some(TAB_WIDTH),
            _ => None,
        })
        .sum()
}

/// Drop leading whitespace worth `columns`. A tab straddling the boundary
/// is removed whole.
fn strip_columns(line: &str, columns: usize) -> &str {
    let mut removed = 0;
    let mut offset = 0;
    for c in line.chars() {
        if removed >= columns {
            break;
        }
        match c {
            ' ' => removed += 1,
            '\t' => removed += TAB_WIDTH,
            _ => break,
        }
        offset += 1;
    }
    &line[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_unchanged() {
        assert_eq!(remove_common_indentation(""), "");
    }

    #[test]
    fn unindented_input_is_unchanged() {
        let text = "<div>\n  <p>x</p>\n</div>";
        assert_eq!(remove_common_indentation(text), text);
    }

    #[test]
    fn removes_shared_spaces_and_keeps_relative_indent() {
        let text = "    <div>\n      <p>x</p>\n    </div>";
        assert_eq!(remove_common_indentation(text), "<div>\n  <p>x</p>\n</div>");
    }

    #[test]
    fn blank_lines_do_not_count_and_are_preserved() {
        let text = "    a\n\n  \n    b";
        assert_eq!(remove_common_indentation(text), "a\n\n  \nb");
    }

    #[test]
    fn tabs_count_as_four_columns() {
        let text = "\ta\n        b";
        assert_eq!(remove_common_indentation(text), "a\n    b");
    }

    #[test]
    fn whitespace_only_input_is_unchanged() {
        let text = "   \n\t\n";
        assert_eq!(remove_common_indentation(text), text);
    }

    #[test]
    fn trailing_newline_is_kept() {
        assert_eq!(remove_common_indentation("  a\n  b\n"), "a\nb\n");
    }

    #[test]
    fn mixed_tab_and_space_prefix() {
        // 2 spaces + tab = 6 columns, minimum is 4
        let text = "  \tdeep\n    shallow";
        assert_eq!(remove_common_indentation(text), "deep\nshallow");
    }
}
