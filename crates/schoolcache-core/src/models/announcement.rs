use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author profile embedded through `author_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Box<AuthorProfile>>,
}

impl Announcement {
    pub fn author_name(&self) -> Option<&str> {
        self.profiles.as_deref().map(|p| p.full_name.as_str())
    }

    /// Short date such as "Mar 04".
    pub fn posted_on(&self) -> Option<String> {
        self.created_at.map(|t| t.format("%b %d").to_string())
    }
}
