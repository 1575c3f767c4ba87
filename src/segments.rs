/*!
 * Loading input text as generation segments.
 *
 * A `.json` file is read as an array of strings, one segment each. Any other
 * file is treated as plain text: paragraphs (separated by blank lines) are
 * packed greedily into segments of at most `max_chars` characters. A single
 * paragraph longer than the limit stays whole.
 */

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::path::Path;

/// Read the segments of an input file
pub fn load_segments<P: AsRef<Path>>(path: P, max_chars: usize) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {:?}", path))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let segments = if is_json {
        serde_json::from_str::<Vec<String>>(&content)
            .map_err(|e| anyhow!("Expected a JSON array of strings in {:?}: {}", path, e))?
    } else {
        split_text(&content, max_chars)
    };

    debug!("Loaded {} segment(s) from {:?}", segments.len(), path);
    Ok(segments)
}

/// Pack the paragraphs of `text` into segments of at most `max_chars` characters
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in paragraphs(text) {
        let len = paragraph.chars().count();
        // Joined with "\n\n"
        let joined_len = if current.is_empty() { len } else { current_len + 2 + len };

        if !current.is_empty() && joined_len > max_chars {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current.is_empty() {
            current.push_str(&paragraph);
            current_len = len;
        } else {
            current.push_str("\n\n");
            current.push_str(&paragraph);
            current_len += 2 + len;
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Paragraphs with inner line breaks kept, surrounding whitespace trimmed
fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                paragraphs.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line.trim_end());
        }
    }
    if !lines.is_empty() {
        paragraphs.push(lines.join("\n"));
    }

    paragraphs
}
