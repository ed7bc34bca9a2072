use crate::config::Config;
use crate::db::DbPool;
use crate::render::ChromeRenderer;
use crate::storage::StorageBackend;
use std::sync::Arc;

pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub backend: Arc<dyn StorageBackend>,
    pub renderer: Arc<ChromeRenderer>,
}
