use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Film slug taken from listing markup (e.g. "the-thing")
///
/// Never empty: construction goes through [`ItemHandle::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemHandle(String);

impl ItemHandle {
    pub fn new(slug: impl Into<String>) -> Option<Self> {
        let slug = slug.into();
        let slug = slug.trim();
        if slug.is_empty() {
            None
        } else {
            Some(Self(slug.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Readable fallback title ("the-thing" -> "the thing")
    pub fn dehyphenated(&self) -> String {
        self.0.replace('-', " ")
    }
}

impl Display for ItemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One parsed page of a list
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub page: u32,
    pub handles: Vec<ItemHandle>,
    pub has_next_page: bool,
}
