use std::path::Path;

use kiln_core::ParsedDocument;

/// Which required frontmatter keys are missing from `parsed`, sorted.
/// `title` is considered present as long as the document resolved to
/// something other than the `Untitled` placeholder.
pub fn enforce_schema(parsed: &ParsedDocument, required: &[&str]) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|field| {
            if **field == "title" {
                parsed.title == "Untitled"
            } else {
                !parsed.frontmatter.contains_key(**field)
            }
        })
        .map(|field| field.to_string())
        .collect();
    missing.sort();
    missing
}

/// Derived fields auto-filled when not explicitly present: token count,
/// title, and category (parsed category or the file's parent directory
/// name).
#[derive(Debug, Clone, PartialEq)]
pub struct AutoFilled {
    pub token_count: u32,
    pub title: String,
    pub category: String,
}

pub fn auto_fill(parsed: &ParsedDocument, filepath: &Path) -> AutoFilled {
    let category = parsed.category.clone().unwrap_or_else(|| {
        filepath
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    });

    AutoFilled {
        token_count: parsed.token_estimate,
        title: parsed.title.clone(),
        category,
    }
}

const DEFAULT_MAX_SUMMARY_TOKENS: usize = 150;

/// Generate a structured summary, preferring the frontmatter summary when
/// present; otherwise a title sentence, a "Covers: ..." list of level-2
/// headings, and the first non-heading paragraph, truncated to
/// `max_tokens` words.
pub fn generate_summary(parsed: &ParsedDocument, max_tokens: Option<usize>) -> String {
    let max_tokens = max_tokens.unwrap_or(DEFAULT_MAX_SUMMARY_TOKENS);

    if let Some(summary) = parsed.frontmatter.get("summary") {
        if !summary.trim().is_empty() {
            return summary.clone();
        }
    }

    let mut parts = Vec::new();

    if parsed.title != "Untitled" {
        parts.push(format!("{}.", parsed.title));
    }

    let h2s: Vec<&str> = parsed
        .headings
        .iter()
        .filter(|h| h.level == 2)
        .map(|h| h.text.as_str())
        .collect();
    if !h2s.is_empty() {
        parts.push(format!("Covers: {}.", h2s.join(", ")));
    }

    for paragraph in parsed.body.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        parts.push(trimmed.to_string());
        break;
    }

    let joined = parts.join(" ");
    let words: Vec<&str> = joined.split_whitespace().collect();
    if words.len() > max_tokens {
        words[..max_tokens].join(" ")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_parser::parse_markdown;
    use std::path::PathBuf;

    #[test]
    fn enforce_schema_reports_missing_title() {
        let parsed = parse_markdown("body with no heading");
        let missing = enforce_schema(&parsed, &["title", "tags"]);
        assert!(missing.contains(&"title".to_string()));
    }

    #[test]
    fn enforce_schema_title_present_when_resolved_from_heading() {
        let parsed = parse_markdown("# A Title\nbody");
        let missing = enforce_schema(&parsed, &["title"]);
        assert!(missing.is_empty());
    }

    #[test]
    fn auto_fill_uses_parent_directory_as_category() {
        let parsed = parse_markdown("# T\nbody");
        let filled = auto_fill(&parsed, &PathBuf::from("/notes/ops/doc.md"));
        assert_eq!(filled.category, "ops");
    }

    #[test]
    fn auto_fill_prefers_parsed_category() {
        let parsed = parse_markdown("---\ncategory: infra\n---\n# T\nbody");
        let filled = auto_fill(&parsed, &PathBuf::from("/notes/ops/doc.md"));
        assert_eq!(filled.category, "infra");
    }

    #[test]
    fn generate_summary_prefers_frontmatter() {
        let parsed = parse_markdown("---\nsummary: Hand-written summary.\n---\n# T\nbody");
        assert_eq!(generate_summary(&parsed, None), "Hand-written summary.");
    }

    #[test]
    fn generate_summary_builds_from_title_and_headings() {
        let parsed = parse_markdown("# Rollouts\n## Staging\n## Production\n\nFirst real paragraph.");
        let summary = generate_summary(&parsed, None);
        assert!(summary.starts_with("Rollouts."));
        assert!(summary.contains("Covers: Staging, Production."));
        assert!(summary.contains("First real paragraph."));
    }
}
