//! Product model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON array of public image URLs
    pub images: String,
    /// JSON array of alt texts, parallel to `images`
    pub image_alts: String,
    /// Exact decimals stored as text, 2 decimal places
    pub old_price: Option<String>,
    pub current_price: Option<String>,
    pub orders_count: i64,
    pub created_at: String,
}

impl Product {
    pub fn images_list(&self) -> Vec<String> {
        serde_json::from_str(&self.images).unwrap_or_default()
    }

    pub fn image_alts_list(&self) -> Vec<String> {
        serde_json::from_str(&self.image_alts).unwrap_or_default()
    }

    /// Current price as a float for aggregation. Unset or unparsable is zero.
    pub fn current_price_f64(&self) -> f64 {
        self.current_price
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Public projection of a Product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub store_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub image_alts: Vec<String>,
    pub old_price: Option<String>,
    pub current_price: Option<String>,
    pub orders_count: i64,
    pub created_at: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        let images = product.images_list();
        let image_alts = product.image_alts_list();
        Self {
            id: product.id,
            store_id: product.store_id,
            owner_id: product.owner_id,
            name: product.name,
            description: product.description,
            images,
            image_alts,
            old_price: product.old_price,
            current_price: product.current_price,
            orders_count: product.orders_count,
            created_at: product.created_at,
        }
    }
}

/// Response for the purchase endpoint: the authoritative counter value.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub orders_count: i64,
}
