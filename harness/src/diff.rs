//! Expected-versus-actual output comparison.

use similar::{DiffTag, TextDiff};

/// How mismatches are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffStyle {
    /// `diff -u` style hunks
    #[default]
    Unified,
    /// Two columns, expected on the left, actual on the right
    SideBySide { width: usize },
}

/// Render the difference between `expected` and `actual`.
///
/// Returns `None` when the texts are identical.
pub fn render_diff(
    expected_label: &str,
    actual_label: &str,
    expected: &str,
    actual: &str,
    style: DiffStyle,
) -> Option<String> {
    if expected == actual {
        return None;
    }

    let diff = TextDiff::from_lines(expected, actual);
    let text = match style {
        DiffStyle::Unified => diff
            .unified_diff()
            .header(expected_label, actual_label)
            .to_string(),
        DiffStyle::SideBySide { width } => side_by_side(&diff, expected_label, actual_label, width),
    };
    Some(text)
}

fn side_by_side(
    diff: &TextDiff<'_, '_, '_, str>,
    expected_label: &str,
    actual_label: &str,
    width: usize,
) -> String {
    let old = diff.old_slices();
    let new = diff.new_slices();
    let rule = "=".repeat(width);
    let mut out = String::new();

    push_row(&mut out, &clip(expected_label, width), ' ', &clip(actual_label, width), width);
    push_row(&mut out, &rule, ' ', &rule, width);

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (left, right) in old[old_range].iter().zip(&new[new_range]) {
                    push_row(&mut out, &cell(left, width), ' ', &cell(right, width), width);
                }
            }
            DiffTag::Delete => {
                for left in &old[old_range] {
                    push_row(&mut out, &cell(left, width), '<', "", width);
                }
            }
            DiffTag::Insert => {
                for right in &new[new_range] {
                    push_row(&mut out, "", '>', &cell(right, width), width);
                }
            }
            DiffTag::Replace => {
                let lefts = &old[old_range];
                let rights = &new[new_range];
                for i in 0..lefts.len().max(rights.len()) {
                    match (lefts.get(i), rights.get(i)) {
                        (Some(left), Some(right)) => {
                            push_row(&mut out, &cell(left, width), '|', &cell(right, width), width)
                        }
                        (Some(left), None) => push_row(&mut out, &cell(left, width), '<', "", width),
                        (None, Some(right)) => push_row(&mut out, "", '>', &cell(right, width), width),
                        (None, None) => {}
                    }
                }
            }
        }
    }

    out
}

const NO_NEWLINE: &str = "\\ No newline";

fn push_row(out: &mut String, left: &str, marker: char, right: &str, width: usize) {
    let row = format!("{left:<width$} {marker} {right}");
    out.push_str(row.trim_end());
    out.push('\n');
}

/// Make tabs visible-width and clip to `width`
fn clip(text: &str, width: usize) -> String {
    text.replace('\t', "    ").chars().take(width).collect()
}

/// One diff line as a column cell. A line without a terminator (the last
/// line of a file missing its final newline) is marked, keeping the marker
/// inside `width`.
fn cell(line: &str, width: usize) -> String {
    let text = line.trim_end_matches(['\n', '\r']);
    if line.ends_with('\n') {
        return clip(text, width);
    }
    let room = width.saturating_sub(NO_NEWLINE.len() + 1);
    let marked = format!("{} {NO_NEWLINE}", clip(text, room));
    clip(&marked, width)
}
