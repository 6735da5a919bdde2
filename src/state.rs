use std::sync::Arc;

use crate::{
    catalog::CatalogStore, clock::Clock, config::JsonConfigStore, session::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<JsonConfigStore>,
    pub catalog: Arc<CatalogStore>,
    pub sessions: SessionStore,
    /// Fixed-zone clock shared by activation, expiry checks and display.
    pub clock: Clock,
}
