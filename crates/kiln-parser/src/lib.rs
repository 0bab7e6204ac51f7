//! Turns a markup blob into an immutable [`kiln_core::ParsedDocument`].
//!
//! Parsing never fails: degenerate inputs yield a sparse but valid record
//! (`Untitled` title, no headings or links, a token estimate of at least 1).

mod chunk;
mod concepts;
mod frontmatter;
mod headings_links;
mod slug;

pub use concepts::STOPWORDS;
pub use slug::slugify;

use sha2::{Digest, Sha256};

use kiln_core::ParsedDocument;

const MAX_SUMMARY_CHARS: usize = 280;

/// Parse `input` into a [`ParsedDocument`]. Never fails.
pub fn parse_markdown(input: &str) -> ParsedDocument {
    let fm = frontmatter::parse_frontmatter(input);
    let body = fm.body;

    let headings = headings_links::extract_headings(&body);
    let links = headings_links::extract_links(&body);

    let title = resolve_title(&fm.fields, &headings);
    let summary = resolve_summary(&fm.fields, &body);
    let category = fm.fields.get("category").cloned();
    let tags = resolve_tags(&fm.fields);
    let concepts = resolve_concepts(&fm.fields, &body, &headings);

    let heading_path = headings
        .first()
        .map(|h| h.text.clone())
        .unwrap_or_default();
    let chunks = chunk::chunk_body(&body, &heading_path);

    let content_hash = hex::encode(Sha256::digest(input.as_bytes()));
    let token_estimate = chunk::word_count(&body).max(1);

    ParsedDocument {
        title,
        summary,
        category,
        body,
        tags,
        concepts,
        headings,
        links,
        chunks,
        content_hash,
        token_estimate,
        frontmatter: fm.fields,
    }
}

fn resolve_title(
    fields: &std::collections::BTreeMap<String, String>,
    headings: &[kiln_core::ParsedHeading],
) -> String {
    if let Some(title) = fields.get("title") {
        if !title.trim().is_empty() {
            return title.clone();
        }
    }
    if let Some(heading) = headings.first() {
        return heading.text.clone();
    }
    "Untitled".to_string()
}

fn resolve_summary(fields: &std::collections::BTreeMap<String, String>, body: &str) -> String {
    if let Some(summary) = fields.get("summary") {
        if !summary.trim().is_empty() {
            return summary.clone();
        }
    }
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(2)
        .collect();
    let joined = lines.join(" ");
    truncate_chars(&joined, MAX_SUMMARY_CHARS)
}

fn resolve_tags(fields: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    match fields.get("tags") {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

fn resolve_concepts(
    fields: &std::collections::BTreeMap<String, String>,
    body: &str,
    headings: &[kiln_core::ParsedHeading],
) -> Vec<String> {
    if let Some(value) = fields.get("concepts") {
        return value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
    }
    concepts::extract_concepts(body, headings)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document() {
        let parsed = parse_markdown("# Title\nbody");
        assert_eq!(parsed.title, "Title");
        assert_eq!(parsed.headings.len(), 1);
        assert_eq!(parsed.headings[0].level, 1);
        assert_eq!(parsed.headings[0].anchor, "title");
        assert_eq!(parsed.headings[0].position, 1);
        assert!(parsed.links.is_empty());
        assert!(parsed.token_estimate >= 1);
    }

    #[test]
    fn empty_input_yields_untitled_and_minimum_token_estimate() {
        let parsed = parse_markdown("");
        assert_eq!(parsed.title, "Untitled");
        assert_eq!(parsed.token_estimate, 1);
        assert!(parsed.headings.is_empty());
    }

    #[test]
    fn frontmatter_overrides_derived_fields() {
        let input = "---\ntitle: Custom Title\ntags: a, b, \ncategory: ops\n---\n# Heading\nbody text";
        let parsed = parse_markdown(input);
        assert_eq!(parsed.title, "Custom Title");
        assert_eq!(parsed.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(parsed.category.as_deref(), Some("ops"));
    }

    #[test]
    fn content_hash_is_stable_for_identical_bytes() {
        let a = parse_markdown("# A\nsame body");
        let b = parse_markdown("# A\nsame body");
        assert_eq!(a.content_hash, b.content_hash);
        let c = parse_markdown("# A\ndifferent body");
        assert_ne!(a.content_hash, c.content_hash);
    }

    #[test]
    fn summary_truncates_to_280_chars() {
        let long_line = "word ".repeat(100);
        let parsed = parse_markdown(&format!("# T\n{long_line}"));
        assert!(parsed.summary.chars().count() <= MAX_SUMMARY_CHARS);
    }

    #[test]
    fn chunking_assigns_sequential_indices_with_heading_path() {
        let input = "# Budget\none two three four five six";
        let parsed = parse_markdown(input);
        assert_eq!(parsed.chunks.len(), 1);
        assert_eq!(parsed.chunks[0].heading_path, "Budget");
        assert_eq!(parsed.chunks[0].chunk_index, 0);
    }
}
