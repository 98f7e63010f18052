use std::sync::Arc;

use affinity_core::Engine;
use sqlx::PgPool;

use crate::store::PgScoreStore;

pub const ADMIN_TOKEN_ENV: &str = "AFFINITY_ADMIN_TOKEN";

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub engine: Arc<Engine<PgScoreStore>>,
    /// Bearer token for `/v1/admin/*`; `None` switches the admin surface off.
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn admin_token_from_env() -> Option<Arc<str>> {
        std::env::var(ADMIN_TOKEN_ENV)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Arc::from)
    }
}
