//! Application context - dependency injection container

use std::sync::Arc;

use anyhow::{Context, Result};
use shopdesk_common::auth::{SessionManager, SessionState, TokenClient};
use shopdesk_common::storage::{
    FileSessionStore, KeychainSessionStore, MemorySessionStore, SessionStore,
};
use shopdesk_infra::config::{AppConfig, StorageBackend};
use shopdesk_infra::ApiClient;
use tracing::{debug, info};

/// Session store chosen at runtime from the configuration
pub type DynSessionStore = dyn SessionStore;

/// Session manager over the configured store
pub type Session = SessionManager<TokenClient, DynSessionStore>;

/// Everything a command needs
pub struct AppContext {
    pub config: AppConfig,
    pub session: Session,
}

impl AppContext {
    /// Wire the store, token client and session manager from `config`
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the token client
    /// cannot be built.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let store = open_store(&config);
        let oauth = config.oauth_config();
        let client = TokenClient::from_config(&oauth).context("failed to build token client")?;
        let session = SessionManager::new(oauth, client, store);

        Ok(Self { config, session })
    }

    /// Rebuild the session from the store
    ///
    /// # Errors
    /// Returns error if the store cannot be read.
    pub fn restore(&self) -> Result<SessionState> {
        let state = self.session.restore().context("failed to restore session")?;
        debug!(state = %state, "session restored");
        Ok(state)
    }

    /// API client authenticating with this session
    ///
    /// # Errors
    /// Returns error if the API settings are invalid.
    pub fn api_client(&self) -> Result<ApiClient<DynSessionStore>> {
        let authenticator = self.session.authenticator().context("failed to build authenticator")?;
        ApiClient::new(&self.config.api, authenticator).context("failed to build API client")
    }
}

fn open_store(config: &AppConfig) -> Arc<DynSessionStore> {
    match config.storage.backend {
        StorageBackend::File => {
            let path = config.storage.session_path();
            info!(path = %path.display(), "using file session store");
            Arc::new(FileSessionStore::new(path))
        }
        StorageBackend::Keychain => {
            info!(service = %config.storage.keychain_service, "using keychain session store");
            Arc::new(KeychainSessionStore::new(config.storage.keychain_service.clone()))
        }
        StorageBackend::Memory => {
            info!("using in-memory session store; the session ends with this process");
            Arc::new(MemorySessionStore::new())
        }
    }
}
