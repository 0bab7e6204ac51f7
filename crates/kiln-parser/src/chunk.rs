use kiln_core::ParsedChunk;

const MAX_WORDS_PER_CHUNK: usize = 120;

/// Split `body` on blank lines into paragraphs, then window each paragraph
/// into chunks of at most `MAX_WORDS_PER_CHUNK` words, numbering chunks
/// sequentially across the whole document starting at 0.
pub fn chunk_body(body: &str, heading_path: &str) -> Vec<ParsedChunk> {
    let mut chunks = Vec::new();
    let mut next_index = 0u32;

    for paragraph in body.split("\n\n") {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        for window in words.chunks(MAX_WORDS_PER_CHUNK) {
            let content = window.join(" ");
            chunks.push(ParsedChunk {
                chunk_index: next_index,
                heading_path: heading_path.to_string(),
                token_count: window.len() as u32,
                content,
            });
            next_index += 1;
        }
    }

    chunks
}

pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
