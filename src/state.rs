use std::sync::Arc;

use crate::ranks::RankStore;
use crate::sessions::SessionManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManagerHandle,
    pub rank_store: Arc<dyn RankStore>,
}
