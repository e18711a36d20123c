use std::sync::Arc;

use db::DBService;
use services::services::{
    auth::CurrentUserProvider, config::Config, generation::GenerationService,
};
use tokio::sync::RwLock;

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
#[cfg(test)]
pub mod test_support;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<RwLock<Config>>,
    user_provider: Arc<dyn CurrentUserProvider>,
    generation: Arc<GenerationService>,
}

impl AppState {
    pub fn new(
        db: DBService,
        config: Config,
        user_provider: Arc<dyn CurrentUserProvider>,
        generation: Arc<GenerationService>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            user_provider,
            generation,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    pub fn user_provider(&self) -> &Arc<dyn CurrentUserProvider> {
        &self.user_provider
    }

    pub fn generation(&self) -> &GenerationService {
        &self.generation
    }
}
