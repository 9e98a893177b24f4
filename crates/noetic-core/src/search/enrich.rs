//! Result enrichment (C6)
//!
//! Reads the backing file for a search result and extracts a title,
//! snippet, tag list, and best-effort date, following a fixed fallback
//! chain for each field.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub date: Option<String>,
}

fn h1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid h1 regex"))
}

fn h2_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^##\s+(.+)$").expect("valid h2 regex"))
}

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^---\n(.*?)\n---").expect("valid frontmatter regex"))
}

fn yaml_scalar_re(key: &str) -> Regex {
    Regex::new(&format!(r"(?m)^{key}:\s*(.+)$")).expect("valid yaml scalar regex")
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#([A-Za-z][A-Za-z0-9_-]*)").expect("valid hashtag regex"))
}

fn iso_date_in_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid iso date regex"))
}

fn ddmmyy_in_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2})-(\d{2})-(\d{2})(?:[^0-9]|$)").expect("valid ddmmyy regex"))
}

fn extract_frontmatter(content: &str) -> Option<&str> {
    frontmatter_re().captures(content)?.get(1).map(|m| m.as_str())
}

/// Title: H1 → H2 → YAML `title:` → first non-blank line → filename.
fn extract_title(content: &str, filename: &str) -> String {
    if let Some(caps) = h1_re().captures(content) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = h2_re().captures(content) {
        return caps[1].trim().to_string();
    }
    if let Some(fm) = extract_frontmatter(content) {
        if let Some(caps) = yaml_scalar_re("title").captures(fm) {
            return caps[1].trim().trim_matches('"').to_string();
        }
    }
    if let Some(line) = content.lines().find(|l| !l.trim().is_empty()) {
        return line.trim().to_string();
    }
    filename.to_string()
}

/// Snippet: first meaningful paragraph (skipping headings/frontmatter/anchor
/// comments), truncated to ~200 chars at a word boundary.
fn extract_snippet(content: &str) -> String {
    let body = match content.find("\n---").and_then(|_| extract_frontmatter(content)) {
        Some(fm) => content.splitn(2, fm).nth(1).unwrap_or(content),
        None => content,
    };

    let paragraph = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("<!--") && !l.starts_with("---"))
        .unwrap_or("");

    if paragraph.chars().count() <= 200 {
        return paragraph.to_string();
    }

    let truncated: String = paragraph.chars().take(200).collect();
    match truncated.rfind(' ') {
        Some(boundary) => format!("{}...", &truncated[..boundary]),
        None => format!("{truncated}..."),
    }
}

/// Tags: YAML `tags:` (comma or `[a, b]` list) plus inline `#hashtags`.
fn extract_tags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(fm) = extract_frontmatter(content) {
        if let Some(caps) = yaml_scalar_re("tags").captures(fm) {
            let raw = caps[1].trim().trim_start_matches('[').trim_end_matches(']');
            for part in raw.split(',') {
                let cleaned = part.trim().trim_matches('"').trim_matches('\'');
                if !cleaned.is_empty() {
                    tags.push(cleaned.to_string());
                }
            }
        }
    }

    for caps in hashtag_re().captures_iter(content) {
        let tag = caps[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}

/// Date: YAML `date:` → ISO date in filename → `DD-MM-YY` in filename → `None`.
fn extract_date(content: &str, filename: &str) -> Option<String> {
    if let Some(fm) = extract_frontmatter(content) {
        if let Some(caps) = yaml_scalar_re("date").captures(fm) {
            return Some(caps[1].trim().trim_matches('"').to_string());
        }
    }
    if let Some(caps) = iso_date_in_filename_re().captures(filename) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = ddmmyy_in_filename_re().captures(filename) {
        return Some(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]));
    }
    None
}

/// Enrich a search result from its backing file's content and filename.
pub fn enrich(content: &str, filename: &str) -> Enrichment {
    Enrichment {
        title: extract_title(content, filename),
        snippet: extract_snippet(content),
        tags: extract_tags(content),
        date: extract_date(content, filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_h1_over_everything() {
        let content = "---\ntitle: Frontmatter Title\n---\n# Real Title\n\nBody.\n";
        assert_eq!(extract_title(content, "file.md"), "Real Title");
    }

    #[test]
    fn title_falls_back_to_h2_when_no_h1() {
        let content = "## Section Title\n\nBody.\n";
        assert_eq!(extract_title(content, "file.md"), "Section Title");
    }

    #[test]
    fn title_falls_back_to_frontmatter() {
        let content = "---\ntitle: Frontmatter Title\n---\nBody without headings.\n";
        assert_eq!(extract_title(content, "file.md"), "Frontmatter Title");
    }

    #[test]
    fn title_falls_back_to_filename_when_nothing_else_matches() {
        let content = "";
        assert_eq!(extract_title(content, "notes.md"), "notes.md");
    }

    #[test]
    fn snippet_truncates_at_word_boundary() {
        let long_line = "word ".repeat(60);
        let content = format!("# Title\n\n{long_line}\n");
        let snippet = extract_snippet(&content);
        assert!(snippet.ends_with("..."));
        assert!(snippet.len() <= 205);
    }

    #[test]
    fn tags_merge_frontmatter_and_hashtags() {
        let content = "---\ntags: [alpha, beta]\n---\nSome text with #gamma inline.\n";
        let tags = extract_tags(content);
        assert_eq!(tags, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn date_prefers_frontmatter_over_filename() {
        let content = "---\ndate: 2026-01-05\n---\nBody\n";
        assert_eq!(extract_date(content, "notes-2026-02-02.md"), Some("2026-01-05".to_string()));
    }

    #[test]
    fn date_falls_back_to_iso_in_filename() {
        let content = "No frontmatter here.";
        assert_eq!(extract_date(content, "notes-2026-02-02.md"), Some("2026-02-02".to_string()));
    }

    #[test]
    fn date_falls_back_to_ddmmyy_in_filename() {
        let content = "No frontmatter here.";
        assert_eq!(extract_date(content, "notes-05-01-26.md"), Some("05-01-26".to_string()));
    }

    #[test]
    fn date_is_none_when_nothing_matches() {
        let content = "No frontmatter here.";
        assert_eq!(extract_date(content, "notes.md"), None);
    }
}
