//! Local media storage for store logos and product images.
//!
//! Blobs live under `<data_dir>/media/{logos,products}` and are served back
//! at `/media/...`. Logo filenames are keyed by store slug so a re-upload
//! overwrites the previous logo; product image names carry a timestamp
//! component so repeated uploads never collide.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const LOGOS_DIR: &str = "logos";
const PRODUCTS_DIR: &str = "products";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_url: String,
}

impl MediaStore {
    /// Create the store rooted at `<data_dir>/media`, creating the directory
    /// layout if needed.
    pub fn new(data_dir: &Path, public_url: &str) -> Result<Self> {
        let root = data_dir.join("media");
        for sub in [LOGOS_DIR, PRODUCTS_DIR] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create media directory {}", dir.display()))?;
        }
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a store logo under a name derived from the slug, overwriting
    /// any previous logo for that slug. Returns the public URL.
    pub async fn save_logo(
        &self,
        slug: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let filename = format!(
            "{}{}",
            sanitize_component(slug),
            extension_of(original_name)
        );
        let path = self.root.join(LOGOS_DIR).join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write logo {}", path.display()))?;
        Ok(self.url(LOGOS_DIR, &filename))
    }

    /// Persist a product image. The filename carries the store slug, the
    /// product name and a microsecond timestamp so repeated uploads of the
    /// same image never overwrite each other.
    pub async fn save_product_image(
        &self,
        store_slug: &str,
        product_name: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let filename = format!(
            "{}-{}-{}{}",
            sanitize_component(store_slug),
            sanitize_component(product_name),
            chrono::Utc::now().timestamp_micros(),
            extension_of(original_name)
        );
        let path = self.root.join(PRODUCTS_DIR).join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write product image {}", path.display()))?;
        Ok(self.url(PRODUCTS_DIR, &filename))
    }

    fn url(&self, dir: &str, filename: &str) -> String {
        format!("{}/media/{}/{}", self.public_url, dir, filename)
    }
}

/// Restrict a filename component to `[A-Za-z0-9_-]`; everything else, path
/// separators and dots included, becomes a dash. Components come from
/// user-controlled slugs and product names and must never form a path.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// File extension including the dot, or empty when there is none. Only
/// alphanumeric extension characters survive.
fn extension_of(name: &str) -> String {
    let ext: String = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
        .unwrap_or_default();
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    }
}
