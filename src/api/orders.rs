//! Order listing for store owners.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::{Order, OrderResponse, Store};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::ApiError;

/// GET /api/orders/by-store/:id
pub async fn list_store_orders(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(store_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let store: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
        .bind(&store_id)
        .fetch_optional(&state.db)
        .await?;
    let store = store.ok_or_else(|| ApiError::not_found("Store not found"))?;

    if store.owner_id != user.id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE store_id = ? ORDER BY created_at DESC")
            .bind(&store.id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use crate::api::products::{create_product_record, record_purchase, NewProduct};
    use crate::api::stores::{create_store_record, NewStore};
    use crate::api::test_util::{fetch_user, register_test_user, test_db};
    use crate::db::Order;

    #[tokio::test]
    async fn purchases_land_in_the_store_ledger_newest_first() {
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

        let product = create_product_record(
            &db,
            &user,
            &store,
            NewProduct {
                name: "Mug".to_string(),
                current_price: Some("12.50".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        record_purchase(&db, &product.id).await.unwrap();
        record_purchase(&db, &product.id).await.unwrap();

        let orders: Vec<Order> =
            sqlx::query_as("SELECT * FROM orders WHERE store_id = ? ORDER BY created_at DESC")
                .bind(&store.id)
                .fetch_all(&db)
                .await
                .unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.total == "12.50"));
        assert!(orders[0].created_at >= orders[1].created_at);
    }
}
