use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use kiln_core::ParsedHeading;

/// Fixed stop list excluded from concept term-frequency scoring.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "into", "your", "guide", "docs",
    "markdown", "are", "was", "were", "been", "being", "have", "has", "had", "does", "did",
    "will", "would", "could", "should", "may", "might", "can", "shall", "not", "but", "also",
    "than", "then", "when", "where", "how", "what", "which", "who", "whom", "why", "all", "each",
    "every", "both", "few", "more", "most", "other", "some", "such", "only", "own", "same",
    "too", "very", "just", "use", "using", "used",
];

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9_-]{2,}").unwrap())
}

/// Derive up to 10 concepts from the body and headings by term frequency,
/// case-folded, excluding the fixed stop list. Heading words count double.
/// Ranked by `(-frequency, alpha)`.
pub fn extract_concepts(body: &str, headings: &[ParsedHeading]) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();

    for word in word_re().find_iter(body) {
        let token = word.as_str().to_lowercase();
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    for heading in headings {
        for word in word_re().find_iter(&heading.text) {
            let token = word.as_str().to_lowercase();
            if STOPWORDS.contains(&token.as_str()) {
                continue;
            }
            *counts.entry(token).or_insert(0) += 2;
        }
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(10).map(|(term, _)| term).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_stopwords() {
        let concepts = extract_concepts("the and for with kubernetes cluster", &[]);
        assert_eq!(concepts, vec!["cluster".to_string(), "kubernetes".to_string()]);
    }

    #[test]
    fn heading_words_count_double() {
        let headings = vec![ParsedHeading {
            level: 1,
            text: "Rollout".to_string(),
            anchor: "rollout".to_string(),
            position: 1,
        }];
        let concepts = extract_concepts("rollout deployment deployment", &headings);
        // "rollout" appears once in body + 2 from heading = 3, "deployment" = 2.
        assert_eq!(concepts[0], "rollout");
    }

    #[test]
    fn caps_at_ten() {
        let body = (0..20)
            .map(|i| format!("term{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let concepts = extract_concepts(&body, &[]);
        assert_eq!(concepts.len(), 10);
    }
}
