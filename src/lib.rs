pub mod api;
pub mod config;
pub mod db;
pub mod storage;
pub mod token;

pub use db::DbPool;

use config::Config;
use storage::MediaStore;
use token::TokenService;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenService,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, tokens: TokenService, media: MediaStore) -> Self {
        Self {
            config,
            db,
            tokens,
            media,
        }
    }
}
