use regex::Regex;
use std::sync::OnceLock;

fn non_slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\s]+").unwrap())
}

/// Lowercase, strip non-alphanumerics (keeping whitespace and hyphens),
/// collapse runs of whitespace/hyphens to a single hyphen, trim hyphens.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = non_slug_chars().replace_all(&lowered, "");
    let collapsed = whitespace_runs().replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_basic_heading() {
        assert_eq!(slugify("Getting Started"), "getting-started");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(slugify("a   b\tc"), "a-b-c");
    }

    #[test]
    fn trims_leading_trailing_hyphens() {
        assert_eq!(slugify("  --Title--  "), "title");
    }
}
