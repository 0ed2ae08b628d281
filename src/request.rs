//! The resolved request that flows through every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output medium of the finished brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Text,
    Audio,
    Video,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 3] = [MediaFormat::Text, MediaFormat::Audio, MediaFormat::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Text => "text",
            MediaFormat::Audio => "audio",
            MediaFormat::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(MediaFormat::Text),
            "audio" => Ok(MediaFormat::Audio),
            "video" => Ok(MediaFormat::Video),
            _ => Err(format!("Unknown media format: {}", s)),
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of subject the request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Market,
    Ticker,
    News,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Market, Category::Ticker, Category::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Market => "market",
            Category::Ticker => "ticker",
            Category::News => "news",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(Category::Market),
            "ticker" => Ok(Category::Ticker),
            "news" => Ok(Category::News),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved media request. Fields are private so a request can only
/// be built through [`MediaRequest::new`], which enforces a non-empty subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMediaRequest")]
pub struct MediaRequest {
    format: MediaFormat,
    category: Category,
    subject: String,
}

/// Wire shape of a request before validation.
#[derive(Deserialize)]
struct RawMediaRequest {
    format: MediaFormat,
    category: Category,
    subject: String,
}

impl TryFrom<RawMediaRequest> for MediaRequest {
    type Error = crate::NewsreelError;

    fn try_from(raw: RawMediaRequest) -> crate::Result<Self> {
        MediaRequest::new(raw.format, raw.category, &raw.subject)
    }
}

impl MediaRequest {
    /// Build a request, normalising the subject. Ticker symbols are upper-cased.
    pub fn new(format: MediaFormat, category: Category, subject: &str) -> crate::Result<Self> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(crate::NewsreelError::InvalidInput(
                "Request subject must not be empty".to_string(),
            ));
        }

        let subject = match category {
            Category::Ticker => subject.to_uppercase(),
            _ => subject.to_string(),
        };

        Ok(Self {
            format,
            category,
            subject,
        })
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Filesystem-safe key used for persisted research.
    pub fn store_key(&self) -> String {
        store_key(&self.subject)
    }

    /// One-line confirmation shown once the request has been understood.
    pub fn summary(&self) -> String {
        let article = match self.format {
            MediaFormat::Audio => "an",
            _ => "a",
        };
        format!(
            "Generating {} {} brief about {} ({})",
            article, self.format, self.subject, self.category
        )
    }
}

/// Reduce a subject to characters safe for a file name.
pub fn store_key(subject: &str) -> String {
    let key: String = subject
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let key = key.trim_matches('.').to_string();
    if key.is_empty() {
        "_".to_string()
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_subject_is_uppercased() {
        let req = MediaRequest::new(MediaFormat::Video, Category::Ticker, " aapl ").unwrap();
        assert_eq!(req.subject(), "AAPL");
        assert_eq!(req.store_key(), "AAPL");
    }

    #[test]
    fn test_empty_subject_rejected() {
        assert!(MediaRequest::new(MediaFormat::Text, Category::News, "   ").is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Video".parse::<MediaFormat>().unwrap(), MediaFormat::Video);
        assert_eq!("ticker".parse::<Category>().unwrap(), Category::Ticker);
        assert!("podcast".parse::<MediaFormat>().is_err());
        assert!("crypto".parse::<Category>().is_err());
    }

    #[test]
    fn test_store_key_strips_path_separators() {
        assert_eq!(store_key("../etc/passwd"), "_etc_passwd");
        assert_eq!(store_key("S&P 500"), "S_P_500");
        assert_eq!(store_key(".."), "_");
    }

    #[test]
    fn test_summary() {
        let req = MediaRequest::new(MediaFormat::Audio, Category::Market, "general").unwrap();
        assert_eq!(req.summary(), "Generating an audio brief about general (market)");
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let req: MediaRequest =
            serde_json::from_str(r#"{"format":"video","category":"ticker","subject":" tsla "}"#).unwrap();
        assert_eq!(req.subject(), "TSLA");
        assert_eq!(req.format(), MediaFormat::Video);

        let empty = serde_json::from_str::<MediaRequest>(r#"{"format":"text","category":"news","subject":"  "}"#);
        assert!(empty.unwrap_err().to_string().contains("must not be empty"));
    }
}
