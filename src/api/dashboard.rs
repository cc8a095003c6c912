//! Owner dashboard: aggregate counts and revenue across a user's stores.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DbPool, Product, Store, User};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::ApiError;

/// Totals across every store the user owns.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_stores: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: f64,
}

/// Per-store counts for the breakdown view.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreBreakdown {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub products: i64,
    pub orders: i64,
}

/// Resolve the user's store mapping to live store rows. Stale ids that no
/// longer resolve are skipped.
async fn owned_stores(db: &DbPool, user: &User) -> Result<Vec<Store>, ApiError> {
    let mut stores = Vec::new();
    for store_id in user.stores_map().values() {
        let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(db)
            .await?;
        if let Some(store) = store {
            stores.push(store);
        }
    }
    stores.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(stores)
}

/// Aggregate totals across all owned stores. Revenue is accumulated as f64
/// from price times order count per product.
pub async fn compute_summary(db: &DbPool, user: &User) -> Result<DashboardSummary, ApiError> {
    let stores = owned_stores(db, user).await?;
    let mut summary = DashboardSummary {
        total_stores: stores.len() as i64,
        ..Default::default()
    };

    for store in &stores {
        let products: Vec<Product> =
            sqlx::query_as("SELECT * FROM products WHERE store_id = ?")
                .bind(&store.id)
                .fetch_all(db)
                .await?;
        for product in &products {
            summary.total_orders += product.orders_count;
            summary.total_revenue += product.current_price_f64() * product.orders_count as f64;
        }
        summary.total_products += products.len() as i64;
    }

    Ok(summary)
}

/// Same aggregation as the summary, grouped per store.
pub async fn compute_breakdown(db: &DbPool, user: &User) -> Result<Vec<StoreBreakdown>, ApiError> {
    let stores = owned_stores(db, user).await?;
    let mut breakdown = Vec::with_capacity(stores.len());

    for store in stores {
        let products: Vec<Product> =
            sqlx::query_as("SELECT * FROM products WHERE store_id = ?")
                .bind(&store.id)
                .fetch_all(db)
                .await?;
        let orders = products.iter().map(|p| p.orders_count).sum();
        breakdown.push(StoreBreakdown {
            id: store.id,
            name: store.name,
            slug: store.slug,
            products: products.len() as i64,
            orders,
        });
    }

    Ok(breakdown)
}

/// GET /api/dashboard/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(compute_summary(&state.db, &user).await?))
}

/// GET /api/dashboard/breakdown
pub async fn breakdown(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<StoreBreakdown>>, ApiError> {
    Ok(Json(compute_breakdown(&state.db, &user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::products::{create_product_record, NewProduct};
    use crate::api::stores::{create_store_record, NewStore};
    use crate::api::test_util::{fetch_user, register_test_user, test_db};

    async fn seed_product(
        db: &DbPool,
        user: &User,
        store: &Store,
        name: &str,
        price: &str,
        orders: i64,
    ) {
        let product = create_product_record(
            db,
            user,
            store,
            NewProduct {
                name: name.to_string(),
                current_price: Some(price.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        sqlx::query("UPDATE products SET orders_count = ? WHERE id = ?")
            .bind(orders)
            .bind(&product.id)
            .execute(db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn summary_aggregates_across_stores() {
        let (_dir, db) = test_db().await;
        let created = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let user = fetch_user(&db, &created.id).await;

        let (store_a, _) = create_store_record(
            &db,
            &user,
            NewStore {
                name: "Alpha".to_string(),
                slug: "alpha".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let user = fetch_user(&db, &user.id).await;
        let (store_b, _) = create_store_record(
            &db,
            &user,
            NewStore {
                name: "Beta".to_string(),
                slug: "beta".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let user = fetch_user(&db, &user.id).await;

        seed_product(&db, &user, &store_a, "Mug", "10.00", 2).await;
        seed_product(&db, &user, &store_b, "Tee", "5.00", 1).await;

        let summary = compute_summary(&db, &user).await.unwrap();
        assert_eq!(summary.total_stores, 2);
        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.total_orders, 3);
        assert!((summary.total_revenue - 25.0).abs() < f64::EPSILON);

        let breakdown = compute_breakdown(&db, &user).await.unwrap();
        assert_eq!(breakdown.len(), 2);
        let alpha = breakdown.iter().find(|s| s.slug == "alpha").unwrap();
        assert_eq!(alpha.products, 1);
        assert_eq!(alpha.orders, 2);
    }

    #[tokio::test]
    async fn stale_store_ids_are_skipped() {
        let (_dir, db) = test_db().await;
        let created = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let user = fetch_user(&db, &created.id).await;

        let (store, _) = create_store_record(
            &db,
            &user,
            NewStore {
                name: "Alpha".to_string(),
                slug: "alpha".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let user = fetch_user(&db, &user.id).await;

        // Delete the store out from under the mapping
        sqlx::query("DELETE FROM stores WHERE id = ?")
            .bind(&store.id)
            .execute(&db)
            .await
            .unwrap();

        let summary = compute_summary(&db, &user).await.unwrap();
        assert_eq!(summary.total_stores, 0);
        assert_eq!(summary.total_products, 0);

        let breakdown = compute_breakdown(&db, &user).await.unwrap();
        assert!(breakdown.is_empty());
    }

    #[tokio::test]
    async fn unpriced_products_contribute_no_revenue() {
        let (_dir, db) = test_db().await;
        let created = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let user = fetch_user(&db, &created.id).await;

        let (store, _) = create_store_record(
            &db,
            &user,
            NewStore {
                name: "Alpha".to_string(),
                slug: "alpha".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let user = fetch_user(&db, &user.id).await;

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
        sqlx::query("UPDATE products SET orders_count = 4 WHERE id = ?")
            .bind(&product.id)
            .execute(&db)
            .await
            .unwrap();

        let summary = compute_summary(&db, &user).await.unwrap();
        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.total_revenue, 0.0);
    }
}
