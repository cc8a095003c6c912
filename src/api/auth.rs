//! Registration, login, identity resolution and profile updates.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    DbPool, LoginRequest, LoginResponse, MeResponse, RegisterRequest, UpdateProfileRequest, User,
    UserResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_email;

/// Name of the HTTP-only session cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Authenticated caller, resolved from the `access_token` cookie.
///
/// Rejections: 401 when the cookie is missing or the token fails
/// verification, 404 when the token's subject no longer exists.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let claims = state
            .tokens
            .verify(&token)
            .map_err(|_| ApiError::unauthorized("Invalid token"))?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db)
            .await?;

        user.map(CurrentUser)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}

/// Create a user record. Email is case-normalized; the password is one-way
/// hashed before storage and never returned.
pub async fn register_user(db: &DbPool, req: RegisterRequest) -> Result<UserResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&email) {
        errors.add("email", e);
    }
    if req.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let role = none_if_empty(req.role).unwrap_or_else(|| "client".to_string());
    let plan = none_if_empty(req.plan).unwrap_or_else(|| "free".to_string());

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, first_name, last_name, phone, role, plan, stores, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '{}', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(none_if_empty(req.name))
    .bind(none_if_empty(req.first_name))
    .bind(none_if_empty(req.last_name))
    .bind(none_if_empty(req.phone))
    .bind(&role)
    .bind(&plan)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::info!(email = %email, "Registered new user");

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;

    Ok(UserResponse::from(user))
}

/// Look up a user by normalized email and check the password. Both an unknown
/// email and a wrong password yield the same error, so the response never
/// reveals whether the email exists.
pub async fn authenticate(db: &DbPool, email: &str, password: &str) -> Result<User, ApiError> {
    let email = email.trim().to_lowercase();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    Ok(user)
}

/// Build the identity payload shared by `me` and `update_me`: profile fields,
/// the store mapping, and a derived name -> slug mapping. Stale store ids are
/// skipped rather than failing the whole request.
pub async fn me_payload(db: &DbPool, user: &User) -> Result<MeResponse, ApiError> {
    let stores = user.stores_map();
    let mut stores_slugs = BTreeMap::new();

    for (name, store_id) in &stores {
        let slug: Option<(String,)> = sqlx::query_as("SELECT slug FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(db)
            .await?;
        if let Some((slug,)) = slug {
            stores_slugs.insert(name.clone(), slug);
        }
    }

    Ok(MeResponse {
        id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        name: user.display_name(),
        plan: user.plan.clone(),
        stores,
        stores_slugs,
    })
}

/// Apply a partial profile update. Absent fields stay untouched; a present
/// empty string clears the field.
pub async fn apply_profile_update(
    db: &DbPool,
    user: &User,
    req: UpdateProfileRequest,
) -> Result<User, ApiError> {
    let mut user = user.clone();

    if let Some(name) = req.name {
        user.name = none_if_empty(name);
    }
    if let Some(first_name) = req.first_name {
        user.first_name = none_if_empty(first_name);
    }
    if let Some(last_name) = req.last_name {
        user.last_name = none_if_empty(last_name);
    }
    if let Some(phone) = req.phone {
        user.phone = none_if_empty(phone);
    }
    if let Some(plan) = req.plan {
        user.plan = none_if_empty(plan).unwrap_or_else(|| "free".to_string());
    }
    user.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            name = ?, first_name = ?, last_name = ?, phone = ?, plan = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.name)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(&user.plan)
    .bind(&user.updated_at)
    .bind(&user.id)
    .execute(db)
    .await?;

    Ok(user)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = register_user(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = authenticate(&state.db, &req.email, &req.password).await?;

    let token = state
        .tokens
        .issue(&user)
        .map_err(|_| ApiError::internal("Failed to issue session token"))?;

    let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.tokens.ttl().num_seconds()))
        .build();
    let jar = jar.add(cookie);

    Ok((
        jar,
        Json(LoginResponse {
            role: user.role.clone(),
            name: user.display_name(),
            email: user.email,
        }),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MeResponse>, ApiError> {
    Ok(Json(me_payload(&state.db, &user).await?))
}

/// PATCH|PUT /api/auth/update
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MeResponse>, ApiError> {
    let user = apply_profile_update(&state.db, &user, req).await?;
    Ok(Json(me_payload(&state.db, &user).await?))
}
