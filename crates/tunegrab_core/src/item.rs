use serde::{Deserialize, Serialize};

/// Externally supplied description of one media item to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub url: String,
    pub title: String,
    pub id: String,
}

impl ItemDescriptor {
    pub fn new(url: impl Into<String>, title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            id: id.into(),
        }
    }
}
