use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::cache::{InMemoryTaskCache, TaskCache};
use crate::config::Config;
use crate::mail::{self, Mailer};
use crate::store::{CredentialStore, TaskStore};

/// Everything a handler needs, shared across workers through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn CredentialStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub cache: Arc<dyn TaskCache>,
    pub tokens: TokenIssuer,
    pub mailer: Arc<dyn Mailer>,
    pub frontend_url: String,
}

impl AppState {
    /// Builds the state around one backend that stores both users and tasks.
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: CredentialStore + TaskStore + 'static,
    {
        Self {
            users: store.clone(),
            tasks: store,
            cache: Arc::new(InMemoryTaskCache::new(config.cache_ttl)),
            tokens: TokenIssuer::new(&config.jwt_secret),
            mailer: mail::mailer_for(config.smtp.as_ref()),
            frontend_url: config.frontend_url.clone(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TaskCache>) -> Self {
        self.cache = cache;
        self
    }
}
