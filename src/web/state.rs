use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    auth::{AdminCredentials, TokenSettings},
    config::ServiceConfig,
    notify::{self, DynNotifier},
    store::{DynInquiryStore, PgInquiryStore},
};

#[derive(Clone)]
pub struct AppState {
    store: DynInquiryStore,
    notifier: DynNotifier,
    admin: Arc<AdminCredentials>,
    tokens: Arc<TokenSettings>,
    cors_origins: Option<Arc<str>>,
}

impl AppState {
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let store = PgInquiryStore::connect(&config.database_url, config.max_connections)
            .await
            .context("failed to initialize inquiry store")?;
        store
            .ensure_schema()
            .await
            .context("failed to prepare database schema")?;

        info!(admin = config.admin.username(), "admin identity configured");

        let state = Self::from_parts(
            Arc::new(store),
            notify::from_settings(config.mail),
            config.admin,
            config.token,
        );
        Ok(match config.cors_allowed_origins {
            Some(origins) => state.with_cors_origins(origins),
            None => state,
        })
    }

    pub fn from_parts(
        store: DynInquiryStore,
        notifier: DynNotifier,
        admin: AdminCredentials,
        tokens: TokenSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            admin: Arc::new(admin),
            tokens: Arc::new(tokens),
            cors_origins: None,
        }
    }

    pub fn with_cors_origins(mut self, origins: impl Into<Arc<str>>) -> Self {
        self.cors_origins = Some(origins.into());
        self
    }

    pub fn store(&self) -> &DynInquiryStore {
        &self.store
    }

    pub fn notifier(&self) -> DynNotifier {
        self.notifier.clone()
    }

    pub fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    pub fn tokens(&self) -> &TokenSettings {
        &self.tokens
    }

    pub fn cors_origins(&self) -> Option<&str> {
        self.cors_origins.as_deref()
    }
}
