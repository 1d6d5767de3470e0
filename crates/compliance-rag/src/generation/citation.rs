//! Citation extraction from generated answers

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use uuid::Uuid;

fn chunk_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[chunk:\s*([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\s*\]")
            .expect("Invalid regex")
    })
}

/// Link chunk tags in an answer back to the chunks that were in the prompt
///
/// Tags are kept in order of first appearance; tags naming chunks that were
/// not in the prompt are dropped. An answer with no usable tags cites every
/// prompt chunk in prompt order.
pub fn extract_cited_chunks(answer: &str, prompt_chunk_ids: &[Uuid]) -> Vec<Uuid> {
    let allowed: HashSet<&Uuid> = prompt_chunk_ids.iter().collect();
    let mut seen = HashSet::new();
    let mut cited = Vec::new();

    for cap in chunk_tag_pattern().captures_iter(answer) {
        let Some(id) = cap.get(1).and_then(|m| Uuid::parse_str(m.as_str()).ok()) else {
            continue;
        };
        if allowed.contains(&id) && seen.insert(id) {
            cited.push(id);
        }
    }

    if cited.is_empty() {
        return prompt_chunk_ids.to_vec();
    }
    cited
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_in_order_of_appearance() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let answer = format!(
            "Tramadol is Schedule H1 [chunk:{}]. It was amended in 2018 [chunk:{}] [chunk:{}].",
            b, a, b
        );
        assert_eq!(extract_cited_chunks(&answer, &[a, b]), vec![b, a]);
    }

    #[test]
    fn test_unknown_tags_dropped() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let shouted = a.to_string().to_uppercase();
        let answer = format!("See [chunk:{}] and [CHUNK: {}].", stranger, shouted);
        assert_eq!(extract_cited_chunks(&answer, &[a, b]), vec![a]);
    }

    #[test]
    fn test_no_tags_cites_all_prompt_chunks() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(extract_cited_chunks("Tramadol is Schedule H1.", &[a, b]), vec![a, b]);
    }
}
