//! User model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub plan: String,
    /// JSON object: store display-name -> store id
    pub stores: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Decode the denormalized store mapping. Corrupt JSON is treated as empty
    /// rather than failing the whole request.
    pub fn stores_map(&self) -> BTreeMap<String, String> {
        serde_json::from_str(&self.stores).unwrap_or_default()
    }

    /// Display name: explicit name, or "first last" assembled from parts.
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!(
                "{} {}",
                self.first_name.as_deref().unwrap_or(""),
                self.last_name.as_deref().unwrap_or("")
            )
            .trim()
            .to_string(),
        }
    }
}

/// Public-safe projection of a User. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub plan: String,
    pub stores: BTreeMap<String, String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let stores = user.stores_map();
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            role: user.role,
            plan: user.plan,
            stores,
            created_at: user.created_at,
        }
    }
}

/// Identity payload returned by the `me` and profile-update endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub name: String,
    pub plan: String,
    pub stores: BTreeMap<String, String>,
    /// Derived convenience mapping: store display-name -> slug
    pub stores_slugs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Minimal identity returned on login. The token itself travels only in the
/// HTTP-only cookie, never in the body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub role: String,
    pub name: String,
    pub email: String,
}

/// Partial profile update. `Some(None)` (explicit null or empty string)
/// clears a field, `None` leaves it untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, with = "crate::db::patch_field")]
    pub name: Option<Option<String>>,
    #[serde(default, alias = "firstName", with = "crate::db::patch_field")]
    pub first_name: Option<Option<String>>,
    #[serde(default, alias = "lastName", with = "crate::db::patch_field")]
    pub last_name: Option<Option<String>>,
    #[serde(default, with = "crate::db::patch_field")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "crate::db::patch_field")]
    pub plan: Option<Option<String>>,
}

/// Serde helper for PATCH semantics: a missing field deserializes to `None`
/// (untouched) while `null` or a value deserializes to `Some(..)`.
pub mod patch_field {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}
