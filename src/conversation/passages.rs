//! Splitting research articles into indexable passages.

use crate::research::{Article, CONTENT_NOT_FOUND, FETCH_ERROR_PREFIX, FETCH_FAILED_PREFIX};

/// Whether an article holds real text rather than a fetch placeholder.
pub fn has_content(article: &Article) -> bool {
    let content = article.content.trim();
    !content.is_empty()
        && content != CONTENT_NOT_FOUND
        && !content.starts_with(FETCH_FAILED_PREFIX)
        && !content.starts_with(FETCH_ERROR_PREFIX)
}

/// Split text into passages of roughly `max_chars`, breaking on paragraph
/// boundaries where possible and on whitespace otherwise.
pub fn split_passages(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut passages = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.chars().count() + paragraph.chars().count() + 2 > max_chars {
            passages.push(std::mem::take(&mut current));
        }

        if paragraph.chars().count() > max_chars {
            if !current.is_empty() {
                passages.push(std::mem::take(&mut current));
            }
            passages.extend(split_words(paragraph, max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        passages.push(current);
    }
    passages
}

fn split_words(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_passage() {
        assert_eq!(split_passages("one\n\ntwo", 100), vec!["one\n\ntwo".to_string()]);
        assert!(split_passages("  \n\n ", 100).is_empty());
    }

    #[test]
    fn test_paragraphs_are_grouped_up_to_limit() {
        let text = "aaaa aaaa\n\nbbbb bbbb\n\ncccc cccc";
        let passages = split_passages(text, 20);
        assert_eq!(passages, vec!["aaaa aaaa\n\nbbbb bbbb", "cccc cccc"]);
    }

    #[test]
    fn test_long_paragraph_splits_on_words() {
        let text = "alpha beta gamma delta epsilon";
        let passages = split_passages(text, 11);
        assert_eq!(passages, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(passages.iter().all(|p| p.chars().count() <= 11));
    }

    #[test]
    fn test_placeholders_are_not_content() {
        let article = |content: &str| Article {
            title: "t".into(),
            url: "u".into(),
            content: content.into(),
        };
        assert!(has_content(&article("Shares rose.")));
        assert!(!has_content(&article(CONTENT_NOT_FOUND)));
        assert!(!has_content(&article("Failed to fetch article: HTTP 404")));
        assert!(!has_content(&article("Error fetching the article: connection refused")));
        assert!(!has_content(&article("  ")));
    }
}
