//! Best-effort article text extraction.
//!
//! Looks for a content container with a configured class first, then falls
//! back to the first `<article>` element. Matching is done with a small tag
//! scanner rather than a full DOM, which is enough for the article pages the
//! research fetcher reads.

use super::TextExtractor;
use regex::Regex;

pub struct SelectorExtractor {
    container_open: Option<Regex>,
    div_tag: Regex,
    article_open: Regex,
    article_tag: Regex,
    cleaner: Cleaner,
}

impl SelectorExtractor {
    /// `content_class` names the primary container; an empty string skips
    /// straight to the `<article>` fallback.
    pub fn new(content_class: &str) -> Self {
        let container_open = (!content_class.trim().is_empty()).then(|| {
            let pattern = format!(
                r#"(?i)<div\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["'][^>]*>"#,
                regex::escape(content_class.trim())
            );
            Regex::new(&pattern).expect("escaped class pattern is valid")
        });

        Self {
            container_open,
            div_tag: Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("static regex"),
            article_open: Regex::new(r"(?i)<article\b[^>]*>").expect("static regex"),
            article_tag: Regex::new(r"(?i)<(/?)article\b[^>]*>").expect("static regex"),
            cleaner: Cleaner::new(),
        }
    }

    fn container<'a>(&self, html: &'a str) -> Option<&'a str> {
        let open = self.container_open.as_ref()?.find(html)?;
        balanced_inner(html, open.end(), &self.div_tag)
    }

    fn article<'a>(&self, html: &'a str) -> Option<&'a str> {
        let open = self.article_open.find(html)?;
        balanced_inner(html, open.end(), &self.article_tag)
    }
}

impl TextExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        [self.container(html), self.article(html)]
            .into_iter()
            .flatten()
            .map(|fragment| self.cleaner.to_text(fragment))
            .find(|text| !text.is_empty())
    }
}

/// Return the markup between `start` and the close tag that balances the
/// element opened just before `start`. Unclosed elements run to the end.
fn balanced_inner<'a>(html: &'a str, start: usize, tag: &Regex) -> Option<&'a str> {
    let mut depth = 1usize;

    for caps in tag.captures_iter(&html[start..]) {
        let whole = caps.get(0)?;
        if caps.get(1).is_some_and(|m| m.as_str() == "/") {
            depth -= 1;
            if depth == 0 {
                return Some(&html[start..start + whole.start()]);
            }
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }

    Some(&html[start..])
}

/// Converts an HTML fragment to readable plain text.
struct Cleaner {
    hidden: Regex,
    breaks: Regex,
    tags: Regex,
    numeric_entity: Regex,
}

impl Cleaner {
    fn new() -> Self {
        Self {
            hidden: Regex::new(r"(?is)<(script|style|noscript|template)\b.*?</(script|style|noscript|template)\s*>")
                .expect("static regex"),
            breaks: Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote|tr)\s*>").expect("static regex"),
            tags: Regex::new(r"(?s)<[^>]*>").expect("static regex"),
            numeric_entity: Regex::new(r"&#(x?[0-9a-fA-F]+);").expect("static regex"),
        }
    }

    fn to_text(&self, fragment: &str) -> String {
        let text = self.hidden.replace_all(fragment, "");
        let text = self.breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, "");
        let text = self.decode_entities(&text);

        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn decode_entities(&self, text: &str) -> String {
        let text = self.numeric_entity.replace_all(text, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x').or_else(|| raw.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        });

        text.replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_container_with_nested_divs() {
        let html = r#"<html><body>
            <div class="header">Menu</div>
            <div class="caas-body wide"><p>Apple shares rose 3%.</p><div class="ad"></div><p>Analysts were upbeat.</p></div>
            <div>Footer</div>
        </body></html>"#;

        let text = SelectorExtractor::new("caas-body").extract(html).unwrap();
        assert_eq!(text, "Apple shares rose 3%.\nAnalysts were upbeat.");
    }

    #[test]
    fn test_class_must_match_whole_token() {
        let html = r#"<div class="caas-body-wrapper">nope</div><article><p>Fallback body</p></article>"#;
        let text = SelectorExtractor::new("caas-body").extract(html).unwrap();
        assert_eq!(text, "Fallback body");
    }

    #[test]
    fn test_article_fallback_drops_scripts_and_decodes_entities() {
        let html = r#"<article><script>var x = 1;</script><h1>Q3 &amp; outlook</h1><p>Revenue &#8364;10bn&nbsp;up</p></article>"#;
        let text = SelectorExtractor::new("caas-body").extract(html).unwrap();
        assert_eq!(text, "Q3 & outlook\nRevenue €10bn up");
    }

    #[test]
    fn test_nothing_found() {
        let html = "<html><body><div id=app></div></body></html>";
        assert!(SelectorExtractor::new("caas-body").extract(html).is_none());
    }

    #[test]
    fn test_empty_container_falls_through() {
        let html = r#"<div class="caas-body"></div><article>Real text</article>"#;
        assert_eq!(SelectorExtractor::new("caas-body").extract(html).unwrap(), "Real text");
    }
}
