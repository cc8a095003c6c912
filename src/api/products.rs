//! Product endpoints: creation, storefront listing, partial updates, and the
//! public purchase flow.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{DbPool, Product, ProductResponse, PurchaseResponse, Store, User};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{normalize_price, validate_name};
use super::Upload;

/// Fields for a new product, with uploads already resolved to URLs.
#[derive(Debug, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub image_alts: Vec<String>,
    pub old_price: Option<String>,
    pub current_price: Option<String>,
}

/// Partial product update. New images are appended to the existing list;
/// `image_alts` replaces the whole list when present. Prices use tagged
/// presence so a supplied empty value clears them.
#[derive(Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub new_images: Vec<String>,
    pub image_alts: Option<Vec<String>>,
    pub old_price: Option<Option<String>>,
    pub current_price: Option<Option<String>>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if !self.new_images.is_empty() {
            let mut images = product.images_list();
            images.extend(self.new_images);
            product.images = serde_json::to_string(&images).unwrap_or_else(|_| "[]".to_string());
        }
        if let Some(alts) = self.image_alts {
            product.image_alts =
                serde_json::to_string(&alts).unwrap_or_else(|_| "[]".to_string());
        }
        if let Some(old_price) = self.old_price {
            product.old_price = old_price;
        }
        if let Some(current_price) = self.current_price {
            product.current_price = current_price;
        }
    }
}

/// Resolve a store by id first, then by slug.
pub async fn resolve_store(
    db: &DbPool,
    store_id: Option<&str>,
    slug: Option<&str>,
) -> Result<Store, ApiError> {
    if let Some(store_id) = store_id {
        let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(db)
            .await?;
        if let Some(store) = store {
            return Ok(store);
        }
    }
    if let Some(slug) = slug {
        let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE slug = ?")
            .bind(slug)
            .fetch_optional(db)
            .await?;
        if let Some(store) = store {
            return Ok(store);
        }
    }
    Err(ApiError::not_found("Store not found"))
}

/// Insert a product under the given store with a zeroed order counter.
pub async fn create_product_record(
    db: &DbPool,
    user: &User,
    store: &Store,
    new: NewProduct,
) -> Result<Product, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&new.name) {
        errors.add("name", e);
    }
    errors.finish()?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let images = serde_json::to_string(&new.images)
        .map_err(|e| ApiError::internal(format!("Failed to encode images: {}", e)))?;
    let image_alts = serde_json::to_string(&new.image_alts)
        .map_err(|e| ApiError::internal(format!("Failed to encode image alts: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO products (id, store_id, owner_id, name, description, images, image_alts,
                              old_price, current_price, orders_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(&store.id)
    .bind(&user.id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(&images)
    .bind(&image_alts)
    .bind(&new.old_price)
    .bind(&new.current_price)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::info!(product = %new.name, store = %store.slug, "Product created");

    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;
    Ok(product)
}

/// Fetch a product for mutation: missing id is 404, foreign owner is 403. The
/// missing-row check comes first, so an unknown id is 404 even for strangers.
pub async fn product_for_update(
    db: &DbPool,
    caller_id: &str,
    product_id: &str,
) -> Result<Product, ApiError> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(db)
        .await?;
    let product = product.ok_or_else(|| ApiError::not_found("Product not found"))?;

    if product.owner_id != caller_id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    Ok(product)
}

/// Apply a partial update to a product owned by `caller_id`.
pub async fn update_product_record(
    db: &DbPool,
    caller_id: &str,
    product_id: &str,
    patch: ProductPatch,
) -> Result<Product, ApiError> {
    let mut product = product_for_update(db, caller_id, product_id).await?;

    if let Some(ref name) = patch.name {
        if let Err(e) = validate_name(name) {
            return Err(ApiError::validation_field("name", e));
        }
    }

    patch.apply(&mut product);

    sqlx::query(
        r#"
        UPDATE products SET
            name = ?, description = ?, images = ?, image_alts = ?,
            old_price = ?, current_price = ?
        WHERE id = ?
        "#,
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.images)
    .bind(&product.image_alts)
    .bind(&product.old_price)
    .bind(&product.current_price)
    .bind(&product.id)
    .execute(db)
    .await?;

    Ok(product)
}

/// Record a purchase. The counter increment is a single atomic UPDATE, so
/// concurrent purchases never lose updates. The order-ledger insert that
/// follows is best-effort: a failure is logged and swallowed, the counter
/// stays authoritative.
pub async fn record_purchase(db: &DbPool, product_id: &str) -> Result<i64, ApiError> {
    let result = sqlx::query("UPDATE products SET orders_count = orders_count + 1 WHERE id = ?")
        .bind(product_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_one(db)
        .await?;

    let total = product
        .current_price
        .clone()
        .unwrap_or_else(|| "0.00".to_string());
    let order_result = sqlx::query(
        "INSERT INTO orders (id, store_id, total, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&product.store_id)
    .bind(&total)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(db)
    .await;

    if let Err(e) = order_result {
        tracing::warn!(product = %product_id, "Order record failed after counter increment: {}", e);
    }

    Ok(product.orders_count)
}

#[derive(Debug, Default)]
struct ProductForm {
    store_id: Option<String>,
    slug: Option<String>,
    name: Option<String>,
    description: Option<String>,
    old_price: Option<String>,
    current_price: Option<String>,
    image_alts: Vec<String>,
    image_alts_present: bool,
    images: Vec<Upload>,
}

async fn read_product_form(mut multipart: Multipart) -> Result<ProductForm, ApiError> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read image: {}", e)))?;
                form.images.push(Upload {
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
                    "store_id" => form.store_id = Some(value),
                    "slug" => form.slug = Some(value),
                    "name" => form.name = Some(value),
                    "description" => form.description = Some(value),
                    "old_price" => form.old_price = Some(value),
                    "current_price" => form.current_price = Some(value),
                    // Repeated field: one alt text per entry
                    "image_alts" => {
                        form.image_alts_present = true;
                        form.image_alts.push(value);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

fn parse_price_field(field: &str, value: &str) -> Result<Option<String>, ApiError> {
    normalize_price(value).map_err(|e| ApiError::validation_field(field, e))
}

/// POST /api/products/create
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    super::auth::CurrentUser(user): super::auth::CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let form = read_product_form(multipart).await?;

    let store = resolve_store(&state.db, form.store_id.as_deref(), form.slug.as_deref()).await?;

    let name = form.name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::validation_field(
            "name",
            "Product name is required",
        ));
    }

    let old_price = match form.old_price {
        Some(ref v) => parse_price_field("old_price", v)?,
        None => None,
    };
    let current_price = match form.current_price {
        Some(ref v) => parse_price_field("current_price", v)?,
        None => None,
    };

    // Images are written before the product row; a mid-batch failure leaves
    // the already-saved blobs behind
    let mut images = Vec::with_capacity(form.images.len());
    for upload in &form.images {
        let url = state
            .media
            .save_product_image(&store.slug, &name, &upload.file_name, &upload.bytes)
            .await
            .map_err(|e| {
                tracing::error!(store = %store.slug, "Failed to store product image: {}", e);
                ApiError::internal("Failed to store product image")
            })?;
        images.push(url);
    }

    let new = NewProduct {
        name,
        description: form.description,
        images,
        image_alts: form.image_alts,
        old_price,
        current_price,
    };

    let product = create_product_record(&state.db, &user, &store, new).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

/// GET /api/products/by-slug/:slug (public)
pub async fn products_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&state.db)
        .await?;
    let store = store.ok_or_else(|| ApiError::not_found("Store not found"))?;

    let products: Vec<Product> =
        sqlx::query_as("SELECT * FROM products WHERE store_id = ? ORDER BY created_at DESC")
            .bind(&store.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(
        products.into_iter().map(ProductResponse::from).collect(),
    ))
}

/// PATCH|PUT /api/products/update/:id
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    super::auth::CurrentUser(user): super::auth::CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ProductResponse>, ApiError> {
    let form = read_product_form(multipart).await?;

    let old_price = match form.old_price {
        Some(ref v) => Some(parse_price_field("old_price", v)?),
        None => None,
    };
    let current_price = match form.current_price {
        Some(ref v) => Some(parse_price_field("current_price", v)?),
        None => None,
    };

    // Existence and ownership are settled before any image blob is written,
    // so a rejected request deposits nothing on disk
    let product = product_for_update(&state.db, &user.id, &id).await?;

    let mut new_images = Vec::with_capacity(form.images.len());
    if !form.images.is_empty() {
        let store_slug: Option<(String,)> = sqlx::query_as("SELECT slug FROM stores WHERE id = ?")
            .bind(&product.store_id)
            .fetch_optional(&state.db)
            .await?;
        let (store_slug,) = store_slug.ok_or_else(|| ApiError::not_found("Store not found"))?;

        for upload in &form.images {
            let url = state
                .media
                .save_product_image(&store_slug, &product.name, &upload.file_name, &upload.bytes)
                .await
                .map_err(|e| {
                    tracing::error!(store = %store_slug, "Failed to store product image: {}", e);
                    ApiError::internal("Failed to store product image")
                })?;
            new_images.push(url);
        }
    }

    let patch = ProductPatch {
        name: form.name,
        description: form.description,
        new_images,
        image_alts: form.image_alts_present.then_some(form.image_alts),
        old_price,
        current_price,
    };

    let product = update_product_record(&state.db, &user.id, &id, patch).await?;
    Ok(Json(ProductResponse::from(product)))
}

/// POST /api/products/buy/:id (public storefront flow, no authentication)
pub async fn buy_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let orders_count = record_purchase(&state.db, &id).await?;
    Ok(Json(PurchaseResponse { orders_count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stores::{create_store_record, NewStore};
    use crate::api::test_util::{fetch_user, register_test_user, test_db};
    use crate::api::ErrorCode;
    use crate::db::Order;

    async fn seed_store(db: &DbPool, email: &str, slug: &str) -> (User, Store) {
        let created = register_test_user(db, email, "hunter2secret").await;
        let user = fetch_user(db, &created.id).await;
        let (store, _) = create_store_record(
            db,
            &user,
            NewStore {
                name: format!("Store {}", slug),
                slug: slug.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (fetch_user(db, &user.id).await, store)
    }

    fn priced(name: &str, price: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            current_price: Some(price.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn purchase_increments_counter_and_records_order() {
        let (_dir, db) = test_db().await;
        let (user, store) = seed_store(&db, "owner@example.com", "acme").await;

        let product = create_product_record(&db, &user, &store, priced("Mug", "12.50"))
            .await
            .unwrap();
        assert_eq!(product.orders_count, 0);

        let count = record_purchase(&db, &product.id).await.unwrap();
        assert_eq!(count, 1);

        let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders WHERE store_id = ?")
            .bind(&store.id)
            .fetch_all(&db)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, "12.50");
    }

    #[tokio::test]
    async fn purchase_of_unpriced_product_records_zero_total() {
        let (_dir, db) = test_db().await;
        let (user, store) = seed_store(&db, "owner@example.com", "acme").await;

        let product = create_product_record(
            &db,
            &user,
            &store,
            NewProduct {
                name: "Freebie".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        record_purchase(&db, &product.id).await.unwrap();

        let order: Order = sqlx::query_as("SELECT * FROM orders WHERE store_id = ?")
            .bind(&store.id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(order.total, "0.00");
    }

    #[tokio::test]
    async fn purchase_of_missing_product_is_not_found() {
        let (_dir, db) = test_db().await;
        let err = record_purchase(&db, "nope").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn concurrent_purchases_lose_no_updates() {
        let (_dir, db) = test_db().await;
        let (user, store) = seed_store(&db, "owner@example.com", "acme").await;
        let product = create_product_record(&db, &user, &store, priced("Mug", "10.00"))
            .await
            .unwrap();

        const N: usize = 20;
        let mut handles = Vec::with_capacity(N);
        for _ in 0..N {
            let db = db.clone();
            let id = product.id.clone();
            handles.push(tokio::spawn(
                async move { record_purchase(&db, &id).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let row: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(&product.id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(row.orders_count, N as i64);
    }

    #[tokio::test]
    async fn non_owner_update_is_forbidden_and_leaves_product_unmodified() {
        let (_dir, db) = test_db().await;
        let (owner, store) = seed_store(&db, "owner@example.com", "acme").await;
        let intruder = register_test_user(&db, "intruder@example.com", "hunter2secret").await;

        let product = create_product_record(&db, &owner, &store, priced("Mug", "10.00"))
            .await
            .unwrap();

        let err = update_product_record(
            &db,
            &intruder.id,
            &product.id,
            ProductPatch {
                name: Some("Hijacked".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let row: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(&product.id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(row.name, "Mug");
        assert_eq!(row.current_price.as_deref(), Some("10.00"));
    }

    #[tokio::test]
    async fn mutation_fetch_rejects_non_owner_before_anything_is_written() {
        let (_dir, db) = test_db().await;
        let (owner, store) = seed_store(&db, "owner@example.com", "acme").await;
        let intruder = register_test_user(&db, "intruder@example.com", "hunter2secret").await;

        let product = create_product_record(&db, &owner, &store, priced("Mug", "10.00"))
            .await
            .unwrap();

        // The update handler runs this gate before saving uploaded images
        let err = product_for_update(&db, &intruder.id, &product.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let err = product_for_update(&db, &owner.id, "nope").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let fetched = product_for_update(&db, &owner.id, &product.id)
            .await
            .unwrap();
        assert_eq!(fetched.id, product.id);
    }

    #[tokio::test]
    async fn patch_appends_images_and_replaces_alts() {
        let (_dir, db) = test_db().await;
        let (user, store) = seed_store(&db, "owner@example.com", "acme").await;

        let mut new = priced("Mug", "10.00");
        new.images = vec!["http://localhost/media/products/a.jpg".to_string()];
        new.image_alts = vec!["first".to_string()];
        let product = create_product_record(&db, &user, &store, new).await.unwrap();

        let updated = update_product_record(
            &db,
            &user.id,
            &product.id,
            ProductPatch {
                new_images: vec!["http://localhost/media/products/b.jpg".to_string()],
                image_alts: Some(vec!["first".to_string(), "second".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.images_list().len(), 2);
        assert_eq!(updated.image_alts_list(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn present_empty_price_clears_it() {
        let (_dir, db) = test_db().await;
        let (user, store) = seed_store(&db, "owner@example.com", "acme").await;
        let product = create_product_record(&db, &user, &store, priced("Mug", "10.00"))
            .await
            .unwrap();

        let updated = update_product_record(
            &db,
            &user.id,
            &product.id,
            ProductPatch {
                current_price: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.current_price, None);
        // Untouched field survives
        assert_eq!(updated.name, "Mug");
    }

    #[tokio::test]
    async fn store_resolution_prefers_id_over_slug() {
        let (_dir, db) = test_db().await;
        let (_user_a, store_a) = seed_store(&db, "a@example.com", "store-a").await;
        let (_user_b, store_b) = seed_store(&db, "b@example.com", "store-b").await;

        let resolved = resolve_store(&db, Some(&store_a.id), Some(&store_b.slug))
            .await
            .unwrap();
        assert_eq!(resolved.id, store_a.id);

        let by_slug = resolve_store(&db, None, Some(&store_b.slug)).await.unwrap();
        assert_eq!(by_slug.id, store_b.id);

        let err = resolve_store(&db, None, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
