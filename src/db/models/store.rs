//! Store model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Store {
    pub id: String,
    pub project_id: Option<String>,
    pub owner_id: String,
    pub name: String,
    /// URL-safe unique identifier, immutable after creation
    pub slug: String,
    pub store_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quote: Option<String>,
    pub description: Option<String>,
    pub navbar_enabled: bool,
    pub logo_position: String,
    pub logo_url: Option<String>,
    pub logo_alt: Option<String>,
    pub created_at: String,
}

/// Where the storefront renders its logo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoPosition {
    Left,
    Center,
    Right,
    None,
}

impl LogoPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoPosition::Left => "left",
            LogoPosition::Center => "center",
            LogoPosition::Right => "right",
            LogoPosition::None => "none",
        }
    }
}

impl Default for LogoPosition {
    fn default() -> Self {
        LogoPosition::Left
    }
}

impl FromStr for LogoPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(LogoPosition::Left),
            "center" => Ok(LogoPosition::Center),
            "right" => Ok(LogoPosition::Right),
            "none" => Ok(LogoPosition::None),
            other => Err(format!(
                "Invalid logo position '{}' (expected left, center, right or none)",
                other
            )),
        }
    }
}

impl fmt::Display for LogoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public projection of a Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub id: String,
    pub project_id: Option<String>,
    pub owner_id: String,
    pub name: String,
    pub slug: String,
    pub store_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quote: Option<String>,
    pub description: Option<String>,
    pub navbar_enabled: bool,
    pub logo_position: String,
    pub logo_url: Option<String>,
    pub logo_alt: Option<String>,
    pub created_at: String,
}

impl From<Store> for StoreResponse {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            project_id: store.project_id,
            owner_id: store.owner_id,
            name: store.name,
            slug: store.slug,
            store_type: store.store_type,
            email: store.email,
            phone: store.phone,
            quote: store.quote,
            description: store.description,
            navbar_enabled: store.navbar_enabled,
            logo_position: store.logo_position,
            logo_url: store.logo_url,
            logo_alt: store.logo_alt,
            created_at: store.created_at,
        }
    }
}

/// Denormalized owner details attached to public store lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Store lookup response: public fields plus owner contact info for display.
#[derive(Debug, Serialize)]
pub struct StoreWithOwnerResponse {
    #[serde(flatten)]
    pub store: StoreResponse,
    pub owner_info: OwnerInfo,
}

/// Store creation response: the new store plus the owner's updated mapping.
#[derive(Debug, Serialize)]
pub struct CreateStoreResponse {
    #[serde(flatten)]
    pub store: StoreResponse,
    pub user_stores: BTreeMap<String, String>,
}
