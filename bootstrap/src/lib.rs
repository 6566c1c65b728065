pub mod auth;
pub mod bootstrap;
pub mod client_hints;
pub mod config;
pub mod cookies;
pub mod env;
pub mod errors;
pub mod headers;
pub mod honeypot;
pub mod metrics_defs;
pub mod payload;
pub mod request_info;
pub mod service;
pub mod signing;
pub mod theme;
pub mod timing;
pub mod toast;

#[cfg(test)]
mod testutils;

use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

use crate::auth::session::SESSION_PURGE_INTERVAL;
use crate::auth::{CookieSessionStore, UserStore};
use crate::bootstrap::Bootstrapper;
use crate::errors::BootstrapError;
use crate::service::BootstrapService;
use crate::signing::Signer;

/// Serves page bootstraps on the main listener and health probes on the admin listener
/// until either listener fails. Expired sessions are purged in the background.
pub async fn run(config: config::Config, users: Arc<dyn UserStore>) -> Result<(), BootstrapError> {
    let sessions = Arc::new(CookieSessionStore::new(
        Signer::new(&config.secrets.session),
        config.cookies.clone(),
        config.session.ttl(),
    ));
    let bootstrapper = Bootstrapper::from_config(&config, sessions.clone(), users)?;

    let bootstrap_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        BootstrapService::new(Arc::new(bootstrapper)),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<BootstrapError>::new(|| true),
    );
    let purge_task = async {
        sessions.run_purger(SESSION_PURGE_INTERVAL).await;
        Ok::<(), BootstrapError>(())
    };

    tokio::try_join!(bootstrap_task, admin_task, purge_task)?;
    Ok(())
}
