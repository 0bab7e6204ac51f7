use std::collections::BTreeMap;

/// Parsed YAML-ish frontmatter: flat `key: value` pairs, plus the body that
/// follows the closing fence (or the whole input when there is none).
pub struct Frontmatter {
    pub fields: BTreeMap<String, String>,
    pub body: String,
}

/// Recognized only when `input` begins exactly with a three-dash fence line
/// and a matching closing fence is found later. A missing closing fence
/// means "no frontmatter" and the whole input is the body.
pub fn parse_frontmatter(input: &str) -> Frontmatter {
    const FENCE: &str = "---\n";
    if !input.starts_with(FENCE) {
        return Frontmatter {
            fields: BTreeMap::new(),
            body: input.to_string(),
        };
    }

    match input[FENCE.len()..].find("\n---\n") {
        Some(rel_end) => {
            let block_start = FENCE.len();
            let block_end = block_start + rel_end;
            let block = &input[block_start..block_end];
            let body_start = block_end + "\n---\n".len();
            let body = &input[body_start.min(input.len())..];

            let mut fields = BTreeMap::new();
            for line in block.lines() {
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim().to_string();
                    let value = unquote(value.trim());
                    if !key.is_empty() {
                        fields.insert(key, value);
                    }
                }
            }

            Frontmatter {
                fields,
                body: body.to_string(),
            }
        }
        None => Frontmatter {
            fields: BTreeMap::new(),
            body: input.to_string(),
        },
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fence_means_no_frontmatter() {
        let fm = parse_frontmatter("# Title\nbody");
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "# Title\nbody");
    }

    #[test]
    fn missing_closing_fence_means_no_frontmatter() {
        let fm = parse_frontmatter("---\ntitle: x\nbody text");
        assert!(fm.fields.is_empty());
    }

    #[test]
    fn parses_simple_fields() {
        let fm = parse_frontmatter("---\ntitle: Hello\nsummary: \"A quoted value\"\n---\nbody here");
        assert_eq!(fm.fields.get("title").map(String::as_str), Some("Hello"));
        assert_eq!(
            fm.fields.get("summary").map(String::as_str),
            Some("A quoted value")
        );
        assert_eq!(fm.body, "body here");
    }

    #[test]
    fn lines_without_colon_are_ignored() {
        let fm = parse_frontmatter("---\nnotkeyvalue\ntitle: X\n---\nbody");
        assert_eq!(fm.fields.len(), 1);
        assert_eq!(fm.fields.get("title").map(String::as_str), Some("X"));
    }
}
