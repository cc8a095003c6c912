//! Store endpoints: creation, public lookup by slug, partial updates.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateStoreResponse, DbPool, LogoPosition, OwnerInfo, Store, StoreResponse,
    StoreWithOwnerResponse, User,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{slugify, validate_name, validate_slug};
use super::{parse_bool_field, Upload};

/// Fields for a new store, with uploads already resolved to URLs.
#[derive(Debug)]
pub struct NewStore {
    pub name: String,
    pub slug: String,
    pub project_id: Option<String>,
    pub store_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quote: Option<String>,
    pub description: Option<String>,
    pub navbar_enabled: bool,
    pub logo_position: LogoPosition,
    pub logo_url: Option<String>,
    pub logo_alt: Option<String>,
}

impl Default for NewStore {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: String::new(),
            project_id: None,
            store_type: None,
            email: None,
            phone: None,
            quote: None,
            description: None,
            navbar_enabled: true,
            logo_position: LogoPosition::default(),
            logo_url: None,
            logo_alt: None,
        }
    }
}

/// Partial store update. `None` leaves a field untouched; `logo_alt` uses
/// tagged presence so a supplied empty value clears it.
#[derive(Debug, Default)]
pub struct StorePatch {
    pub name: Option<String>,
    pub quote: Option<String>,
    pub description: Option<String>,
    pub navbar_enabled: Option<bool>,
    pub logo_position: Option<LogoPosition>,
    pub logo_url: Option<String>,
    pub logo_alt: Option<Option<String>>,
}

impl StorePatch {
    /// Merge the patch into a store row. The slug is immutable and never
    /// touched here.
    pub fn apply(self, store: &mut Store) {
        if let Some(name) = self.name {
            store.name = name;
        }
        if let Some(quote) = self.quote {
            store.quote = Some(quote);
        }
        if let Some(description) = self.description {
            store.description = Some(description);
        }
        if let Some(navbar_enabled) = self.navbar_enabled {
            store.navbar_enabled = navbar_enabled;
        }
        if let Some(logo_position) = self.logo_position {
            store.logo_position = logo_position.as_str().to_string();
        }
        if let Some(logo_url) = self.logo_url {
            store.logo_url = Some(logo_url);
        }
        if let Some(logo_alt) = self.logo_alt {
            store.logo_alt = logo_alt.filter(|v| !v.is_empty());
        }
    }
}

/// Validate a slug and confirm no store has claimed it. Anything that writes
/// slug-keyed state (the logo blob in particular) must pass this gate first.
pub async fn ensure_slug_available(db: &DbPool, slug: &str) -> Result<(), ApiError> {
    if let Err(e) = validate_slug(slug) {
        return Err(ApiError::validation_field("slug", e));
    }

    let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM stores WHERE slug = ?")
        .bind(slug)
        .fetch_optional(db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict("Slug already exists"));
    }

    Ok(())
}

/// Fetch a store for mutation: missing id is 404, foreign owner is 403. The
/// existence check comes first so an unknown id is 404 even for strangers.
pub async fn store_for_update(
    db: &DbPool,
    caller_id: &str,
    store_id: &str,
) -> Result<Store, ApiError> {
    let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
        .bind(store_id)
        .fetch_optional(db)
        .await?;
    let store = store.ok_or_else(|| ApiError::not_found("Store not found"))?;

    if store.owner_id != caller_id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    Ok(store)
}

/// Create the store row and update the owner's denormalized store mapping in
/// a single transaction, keeping the secondary index consistent with actual
/// ownership.
pub async fn create_store_record(
    db: &DbPool,
    user: &User,
    new: NewStore,
) -> Result<(Store, BTreeMap<String, String>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&new.name) {
        errors.add("name", e);
    }
    errors.finish()?;

    ensure_slug_available(db, &new.slug).await?;

    if let Some(ref project_id) = new.project_id {
        let project: Option<(String,)> =
            sqlx::query_as("SELECT owner_id FROM projects WHERE id = ?")
                .bind(project_id)
                .fetch_optional(db)
                .await?;
        match project {
            None => return Err(ApiError::not_found("Project not found")),
            Some((owner_id,)) if owner_id != user.id => {
                return Err(ApiError::forbidden("Project belongs to another user"))
            }
            Some(_) => {}
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut stores_map = user.stores_map();
    stores_map.insert(new.name.clone(), id.clone());
    let stores_json = serde_json::to_string(&stores_map)
        .map_err(|e| ApiError::internal(format!("Failed to encode store mapping: {}", e)))?;

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO stores (id, project_id, owner_id, name, slug, store_type, email, phone,
                            quote, description, navbar_enabled, logo_position, logo_url,
                            logo_alt, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.project_id)
    .bind(&user.id)
    .bind(&new.name)
    .bind(&new.slug)
    .bind(&new.store_type)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.quote)
    .bind(&new.description)
    .bind(new.navbar_enabled)
    .bind(new.logo_position.as_str())
    .bind(&new.logo_url)
    .bind(&new.logo_alt)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET stores = ?, updated_at = ? WHERE id = ?")
        .bind(&stores_json)
        .bind(&now)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(slug = %new.slug, owner = %user.id, "Store created");

    let store: Store = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;

    Ok((store, stores_map))
}

/// Apply a partial update to a store owned by `caller_id`.
pub async fn update_store_record(
    db: &DbPool,
    caller_id: &str,
    store_id: &str,
    patch: StorePatch,
) -> Result<Store, ApiError> {
    let mut store = store_for_update(db, caller_id, store_id).await?;

    if let Some(ref name) = patch.name {
        if let Err(e) = validate_name(name) {
            return Err(ApiError::validation_field("name", e));
        }
    }

    patch.apply(&mut store);

    sqlx::query(
        r#"
        UPDATE stores SET
            name = ?, quote = ?, description = ?, navbar_enabled = ?,
            logo_position = ?, logo_url = ?, logo_alt = ?
        WHERE id = ?
        "#,
    )
    .bind(&store.name)
    .bind(&store.quote)
    .bind(&store.description)
    .bind(store.navbar_enabled)
    .bind(&store.logo_position)
    .bind(&store.logo_url)
    .bind(&store.logo_alt)
    .bind(&store.id)
    .execute(db)
    .await?;

    Ok(store)
}

#[derive(Debug, Default)]
struct StoreForm {
    name: Option<String>,
    slug: Option<String>,
    project_id: Option<String>,
    store_type: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    quote: Option<String>,
    description: Option<String>,
    navbar_enabled: Option<bool>,
    logo_position: Option<LogoPosition>,
    logo_alt: Option<String>,
    logo: Option<Upload>,
}

async fn read_store_form(mut multipart: Multipart) -> Result<StoreForm, ApiError> {
    let mut form = StoreForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "logo" => {
                let file_name = field.file_name().unwrap_or("logo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read logo: {}", e)))?;
                form.logo = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid field '{}': {}", name, e)))?;
                match name.as_str() {
                    "name" => form.name = Some(value),
                    "slug" => form.slug = Some(value.trim().to_lowercase()),
                    "project_id" => form.project_id = Some(value),
                    "store_type" => form.store_type = Some(value),
                    "email" => form.email = Some(value),
                    "phone" => form.phone = Some(value),
                    "quote" => form.quote = Some(value),
                    "description" => form.description = Some(value),
                    "navbar_enabled" => {
                        form.navbar_enabled = Some(parse_bool_field("navbar_enabled", &value)?)
                    }
                    "logo_position" => {
                        form.logo_position = Some(
                            LogoPosition::from_str(&value)
                                .map_err(|e| ApiError::validation_field("logo_position", e))?,
                        )
                    }
                    "logo_alt" => form.logo_alt = Some(value),
                    // Unknown fields are ignored
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

/// POST /api/stores/create
pub async fn create_store(
    State(state): State<Arc<AppState>>,
    super::auth::CurrentUser(user): super::auth::CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateStoreResponse>), ApiError> {
    let form = read_store_form(multipart).await?;

    let name = form.name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::validation_field("name", "Store name is required"));
    }

    let slug = match form.slug.filter(|s| !s.is_empty()) {
        Some(slug) => slug,
        None => slugify(&name),
    };

    // The logo blob is keyed by slug, so the slug must be valid and unclaimed
    // before anything touches disk; otherwise a rejected request could
    // overwrite another store's served logo
    ensure_slug_available(&state.db, &slug).await?;

    let (logo_url, logo_alt) = match form.logo {
        Some(upload) => {
            let url = state
                .media
                .save_logo(&slug, &upload.file_name, &upload.bytes)
                .await
                .map_err(|e| {
                    tracing::error!(slug = %slug, "Failed to store logo: {}", e);
                    ApiError::internal("Failed to store logo")
                })?;
            (Some(url), form.logo_alt.filter(|a| !a.is_empty()))
        }
        None => (None, None),
    };

    let new = NewStore {
        name,
        slug,
        project_id: form.project_id,
        store_type: form.store_type,
        email: form.email,
        phone: form.phone,
        quote: form.quote,
        description: form.description,
        navbar_enabled: form.navbar_enabled.unwrap_or(true),
        logo_position: form.logo_position.unwrap_or_default(),
        logo_url,
        logo_alt,
    };

    let (store, user_stores) = create_store_record(&state.db, &user, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateStoreResponse {
            store: StoreResponse::from(store),
            user_stores,
        }),
    ))
}

/// GET /api/stores/by-slug/:slug (public)
pub async fn store_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<StoreWithOwnerResponse>, ApiError> {
    let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&state.db)
        .await?;
    let store = store.ok_or_else(|| ApiError::not_found("Store not found"))?;

    let owner: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&store.owner_id)
        .fetch_optional(&state.db)
        .await?;

    let owner_info = match owner {
        Some(owner) => OwnerInfo {
            id: Some(owner.id.clone()),
            name: Some(owner.display_name()),
            email: Some(owner.email),
            phone: owner.phone,
        },
        None => OwnerInfo {
            id: None,
            name: None,
            email: None,
            phone: None,
        },
    };

    Ok(Json(StoreWithOwnerResponse {
        store: StoreResponse::from(store),
        owner_info,
    }))
}

/// PATCH|PUT /api/stores/update/:id
pub async fn update_store(
    State(state): State<Arc<AppState>>,
    super::auth::CurrentUser(user): super::auth::CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<StoreResponse>, ApiError> {
    let form = read_store_form(multipart).await?;

    // Ownership is settled before the logo write: the replacement reuses the
    // deterministic slug-keyed path, so a rejected caller must never reach
    // the overwrite
    let store = store_for_update(&state.db, &user.id, &id).await?;

    let logo_url = match form.logo {
        Some(upload) => {
            let url = state
                .media
                .save_logo(&store.slug, &upload.file_name, &upload.bytes)
                .await
                .map_err(|e| {
                    tracing::error!(slug = %store.slug, "Failed to store logo: {}", e);
                    ApiError::internal("Failed to store logo")
                })?;
            Some(url)
        }
        None => None,
    };

    let patch = StorePatch {
        name: form.name,
        quote: form.quote,
        description: form.description,
        navbar_enabled: form.navbar_enabled,
        logo_position: form.logo_position,
        logo_url,
        logo_alt: form.logo_alt.map(|alt| Some(alt).filter(|a| !a.is_empty())),
    };

    let store = update_store_record(&state.db, &user.id, &id, patch).await?;
    Ok(Json(StoreResponse::from(store)))
}
