use std::sync::OnceLock;

use regex::Regex;

use kiln_core::{ParsedHeading, ParsedLink};

use crate::slug::slugify;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*$").unwrap())
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]+\]\(([^)]+)\)").unwrap())
}

/// Extract headings from the body only (never from frontmatter, since the
/// frontmatter fence is stripped before this runs).
pub fn extract_headings(body: &str) -> Vec<ParsedHeading> {
    heading_re()
        .captures_iter(body)
        .enumerate()
        .map(|(idx, caps)| {
            let level = caps[1].len() as u8;
            let text = caps[2].trim().to_string();
            let anchor = slugify(&text);
            ParsedHeading {
                level,
                text,
                anchor,
                position: (idx + 1) as u32,
            }
        })
        .collect()
}

/// Extract `[label](target)` links from the body.
pub fn extract_links(body: &str) -> Vec<ParsedLink> {
    link_re()
        .captures_iter(body)
        .map(|caps| {
            let target = caps[1].trim().to_string();
            let is_external = target.starts_with("http://") || target.starts_with("https://");
            ParsedLink { target, is_external }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headings_with_level_and_anchor() {
        let headings = extract_headings("# Title\nsome text\n## Sub Heading\nmore");
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].text, "Title");
        assert_eq!(headings[0].anchor, "title");
        assert_eq!(headings[0].position, 1);
        assert_eq!(headings[1].level, 2);
        assert_eq!(headings[1].position, 2);
    }

    #[test]
    fn ignores_more_than_six_hashes() {
        let headings = extract_headings("####### not a heading\n# real one");
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].text, "real one");
    }

    #[test]
    fn extracts_links_and_flags_external() {
        let links = extract_links("[local](./a.md) and [remote](https://example.com)");
        assert_eq!(links.len(), 2);
        assert!(!links[0].is_external);
        assert_eq!(links[0].target, "./a.md");
        assert!(links[1].is_external);
    }
}
