//! Source file parsing and text extraction.

use sewana_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Read a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<(ContentType, String)> {
    let content_type = ContentType::from_path(path);
    if !content_type.is_supported() {
        return Err(AppError::Knowledge(format!(
            "Unsupported file type: {:?}",
            path
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if raw.contains('\0') {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge("Binary file not supported".to_string()));
    }

    Ok((content_type, extract_text(content_type, &raw)))
}

/// Extract clean text from raw content of a known type.
pub fn extract_text(content_type: ContentType, raw: &str) -> String {
    match content_type {
        ContentType::Markdown => clean_markdown(raw),
        ContentType::Html => clean_html(raw),
        ContentType::PlainText | ContentType::Unsupported => normalize_paragraphs(raw),
    }
}

/// Drop markdown markup but keep paragraph breaks.
fn clean_markdown(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence && trimmed.is_empty() {
            continue;
        }
        if !in_fence && is_horizontal_rule(trimmed) {
            lines.push(String::new());
            continue;
        }

        let content = trimmed
            .trim_start_matches('#')
            .trim_start_matches("> ")
            .trim();
        let content = content
            .strip_prefix("- ")
            .or_else(|| content.strip_prefix("* "))
            .unwrap_or(content);
        lines.push(content.replace("**", "").replace('`', ""));
    }

    normalize_paragraphs(&lines.join("\n"))
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3
        && (line.chars().all(|c| c == '-')
            || line.chars().all(|c| c == '*')
            || line.chars().all(|c| c == '_'))
}

/// Strip tags, scripts and styles; block elements become line breaks.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };

        let tag = after[1..close].trim().to_ascii_lowercase();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");

        if !tag.starts_with('/') && (name == "script" || name == "style") {
            let end_tag = format!("</{}", name);
            rest = match after.to_ascii_lowercase().find(&end_tag) {
                Some(end) => {
                    let tail = &after[end..];
                    tail.find('>').map(|gt| &tail[gt + 1..]).unwrap_or("")
                }
                None => "",
            };
            continue;
        }

        if matches!(
            name,
            "p" | "br" | "div" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "section"
        ) {
            result.push('\n');
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    normalize_paragraphs(&decoded)
}

/// Collapse runs of spaces within lines and runs of blank lines.
fn normalize_paragraphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if blank_run {
            out.push_str("\n\n");
        } else if !out.is_empty() {
            out.push('\n');
        }
        blank_run = false;
        out.push_str(&collapsed);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("visiting.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("VISITING.HTML")), ContentType::Html);
        assert_eq!(ContentType::from_path(Path::new("notes.txt")), ContentType::PlainText);
        assert_eq!(ContentType::from_path(Path::new("scan.pdf")), ContentType::Unsupported);
        assert_eq!(ContentType::from_path(Path::new("README")), ContentType::Unsupported);
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Visiting Hours\n\nWards are open **9am to 8pm**.\n\n---\n\n- ICU: 4pm only\n```\ncode line\n```";
        let output = clean_markdown(input);
        assert!(output.starts_with("Visiting Hours\n\nWards are open 9am to 8pm."));
        assert!(output.contains("ICU: 4pm only"));
        assert!(!output.contains("```"));
        assert!(!output.contains('#'));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>p { color: red; }</style></head><body><h1>Pharmacy</h1><p>Open <b>24 hours</b> &amp; weekends</p><script>alert(1)</script></body></html>";
        let output = clean_html(input);
        assert_eq!(output, "Pharmacy\n\nOpen 24 hours & weekends");
    }

    #[test]
    fn test_normalize_paragraphs() {
        let output = normalize_paragraphs("  a   b \n\n\n\nc\nd  ");
        assert_eq!(output, "a b\n\nc\nd");
    }

    #[test]
    fn test_parse_file_rejects_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image.png");
        fs::write(&path, "not really").unwrap();

        assert!(parse_file(&path).is_err());
    }

    #[test]
    fn test_parse_file_text() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("parking.txt");
        fs::write(&path, "Parking is free for patients.\n").unwrap();

        let (content_type, text) = parse_file(&path).unwrap();
        assert_eq!(content_type, ContentType::PlainText);
        assert_eq!(text, "Parking is free for patients.");
    }
}
