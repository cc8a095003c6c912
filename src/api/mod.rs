pub mod auth;
mod dashboard;
mod error;
mod orders;
mod products;
mod projects;
mod stores;
mod validation;

pub use error::{ApiError, ErrorBody, ErrorCode, ErrorResponse, ValidationErrorBuilder};

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// A file field lifted out of a multipart form.
#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Parse a boolean form field. Accepts true/false/1/0, case-insensitive.
pub(crate) fn parse_bool_field(field: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ApiError::validation_field(
            field,
            format!("Invalid boolean '{}' (expected true or false)", other),
        )),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Session endpoints; `me` and `update` resolve the caller themselves
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/update", patch(auth::update_me).put(auth::update_me));

    let api_routes = Router::new()
        // Projects
        .route("/projects/mine", get(projects::my_projects))
        .route("/projects", post(projects::create_project))
        .route("/projects/:id", delete(projects::delete_project))
        // Stores
        .route("/stores/create", post(stores::create_store))
        .route("/stores/by-slug/:slug", get(stores::store_by_slug))
        .route(
            "/stores/update/:id",
            patch(stores::update_store).put(stores::update_store),
        )
        // Products
        .route("/products/create", post(products::create_product))
        .route("/products/by-slug/:slug", get(products::products_by_slug))
        .route(
            "/products/update/:id",
            patch(products::update_product).put(products::update_product),
        )
        .route("/products/buy/:id", post(products::buy_product))
        // Dashboard
        .route("/dashboard/summary", get(dashboard::summary))
        .route("/dashboard/breakdown", get(dashboard::breakdown))
        // Orders
        .route("/orders/by-store/:id", get(orders::list_store_orders));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::db::{self, DbPool, RegisterRequest, User, UserResponse};
    use tempfile::TempDir;

    /// Fresh on-disk database in a temp dir. The dir must be kept alive for
    /// the duration of the test.
    pub(crate) async fn test_db() -> (TempDir, DbPool) {
        let dir = TempDir::new().expect("create temp dir");
        let pool = db::init(dir.path()).await.expect("init test database");
        (dir, pool)
    }

    pub(crate) async fn register_test_user(
        db: &DbPool,
        email: &str,
        password: &str,
    ) -> UserResponse {
        super::auth::register_user(
            db,
            RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                name: None,
                first_name: None,
                last_name: None,
                phone: None,
                role: None,
                plan: None,
            },
        )
        .await
        .expect("register test user")
    }

    pub(crate) async fn fetch_user(db: &DbPool, id: &str) -> User {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
            .expect("fetch user")
    }

    #[test]
    fn bool_field_parsing() {
        assert!(super::parse_bool_field("navbar_enabled", "TRUE").unwrap());
        assert!(!super::parse_bool_field("navbar_enabled", "0").unwrap());
        assert!(super::parse_bool_field("navbar_enabled", "yes").is_err());
    }
}
