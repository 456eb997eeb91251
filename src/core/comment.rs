use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A review comment anchored to a line of the post-change file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// A comment harvested from a model response before a path is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedComment {
    pub line: u32,
    pub body: String,
}

impl ExtractedComment {
    pub fn into_line_comment(self, path: &str) -> LineComment {
        LineComment {
            path: path.to_string(),
            line: self.line,
            body: self.body,
        }
    }
}

// "Line 12:", "**Línea 12**:", "**Line 5:**", "_line 7_:" anywhere in the line.
static LINE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([*_]*)\b(?:line|l[ií]nea)\s+(\d+)([*_`]*)\s*:(.*)$")
        .expect("line marker pattern is valid")
});

const EMPHASIS: [&str; 4] = ["**", "__", "*", "_"];

pub struct CommentExtractor;

impl CommentExtractor {
    /// Harvests `Line N: text` annotations from a model response.
    ///
    /// Lines without a marker are dropped, as are markers with an empty body
    /// or a line number of zero. Source order is kept and repeated line
    /// numbers are not merged.
    pub fn extract(response: &str) -> Vec<ExtractedComment> {
        response
            .lines()
            .filter_map(Self::extract_line)
            .collect()
    }

    fn extract_line(line: &str) -> Option<ExtractedComment> {
        let caps = LINE_MARKER.captures(line)?;
        let line_number: u32 = caps.get(2)?.as_str().parse().ok()?;
        if line_number == 0 {
            return None;
        }

        let opening = caps.get(1).map_or("", |m| m.as_str());
        let closed_before_colon = caps.get(3).map_or(false, |m| !m.as_str().is_empty());
        let mut body = caps.get(4)?.as_str().trim();

        // "**Line 5:** text" closes the marker's emphasis after the colon.
        if !opening.is_empty() && !closed_before_colon {
            body = body.strip_prefix(opening).unwrap_or(body);
        }

        let body = clean_body(body);
        if body.is_empty() || body.chars().all(|c| matches!(c, '*' | '_')) {
            return None;
        }

        Some(ExtractedComment {
            line: line_number,
            body: body.to_string(),
        })
    }
}

/// Drops separators before the text and emphasis wrapping the whole body.
/// Unbalanced markup and code spans are left alone.
fn clean_body(body: &str) -> &str {
    let mut body = body.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    if let Some(rest) = body.strip_prefix("- ").or_else(|| body.strip_prefix("-\t")) {
        body = rest;
    }
    let mut body = body.trim();

    loop {
        let unwrapped = EMPHASIS.iter().find_map(|marker| {
            body.strip_prefix(marker)
                .and_then(|rest| rest.strip_suffix(marker))
                .filter(|inner| !inner.trim().is_empty())
        });
        match unwrapped {
            Some(inner) => body = inner.trim(),
            None => return body,
        }
    }
}
