//! Streaming provider badges

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A streaming provider offering a show in a region.
///
/// Two badges are equal when their ids match, regardless of name or logo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBadge {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub logo_ref: Option<String>,
}

impl ProviderBadge {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            logo_ref: None,
        }
    }

    pub fn with_logo(mut self, logo_ref: impl Into<String>) -> Self {
        self.logo_ref = Some(logo_ref.into());
        self
    }
}

impl PartialEq for ProviderBadge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProviderBadge {}

impl Hash for ProviderBadge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
