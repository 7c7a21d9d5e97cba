// src/models.rs
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub change_percent: f64,
}

/// A tradable instrument as shown in the recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub symbol: String,
    pub company_name: String,
    pub current_price: f64,
    pub price_changes: Vec<PriceChange>,
}

impl Stock {
    /// Sum of every recorded change percent. Derived on read, never stored.
    pub fn final_total(&self) -> f64 {
        self.price_changes
            .iter()
            .map(|change| change.change_percent)
            .sum()
    }
}

/// Payload of a purchase write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    #[serde(flatten)]
    pub stock: Stock,
    pub amount: f64,
}

/// An instrument the user owns, identified by its store document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStock {
    #[serde(flatten)]
    pub stock: Stock,
    pub amount: f64,
    pub doc_id: String,
}

impl SavedStock {
    pub fn from_new(doc_id: String, asset: NewAsset) -> Self {
        SavedStock {
            stock: asset.stock,
            amount: asset.amount,
            doc_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserPreference {
    Entertainment,
    Gastronomy,
    Healthcare,
    Sports,
    Technology,
}

impl UserPreference {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "entertainment" => Some(UserPreference::Entertainment),
            "gastronomy" => Some(UserPreference::Gastronomy),
            "healthcare" => Some(UserPreference::Healthcare),
            "sports" => Some(UserPreference::Sports),
            "technology" => Some(UserPreference::Technology),
            _ => None,
        }
    }
}

// Unknown labels are treated the same as an unset preference.
fn lenient_preference<'de, D>(deserializer: D) -> Result<Option<UserPreference>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.as_deref().and_then(UserPreference::from_label))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Username {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: Username,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_preference")]
    pub user_preference: Option<UserPreference>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.username.first_name, self.username.last_name)
    }
}

/// Identity and profile of the signed-in user, injected into the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub profile: Option<UserProfile>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, profile: UserProfile) -> Self {
        SessionContext {
            user_id: Some(user_id.into()),
            profile: Some(profile),
        }
    }

    /// Both identity and profile, or nothing while the session is loading.
    pub fn ready(&self) -> Option<(&str, &UserProfile)> {
        match (&self.user_id, &self.profile) {
            (Some(user_id), Some(profile)) if !user_id.is_empty() => {
                Some((user_id.as_str(), profile))
            }
            _ => None,
        }
    }

    pub fn preference(&self) -> Option<UserPreference> {
        self.profile.as_ref().and_then(|p| p.user_preference)
    }
}
