//! An embeddable inbound SMTP server: accepts TCP connections, speaks
//! enough SMTP/ESMTP to receive one mail message per session,
//! authenticates the sender via SPF, and hands the finished message to
//! an application-supplied [`smtp::mail::MailHandler`].
//!
//! The core server lives in [`smtp`] and is configured programmatically
//! through [`smtp::ListenConfig`] — that's the reusable, embeddable
//! surface. [`config`] and [`webhook`] are the demo binary's own
//! wiring: an env-var-driven `Config` and a `MailHandler` that forwards
//! parsed mail to a webhook, included here as a complete, runnable
//! example of embedding the library.

pub mod config;
pub mod smtp;
pub mod webhook;

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

use config::Config;
use smtp::{ListenConfig, Server};
use webhook::WebhookMailHandler;

/// Builds a [`ListenConfig`] from the demo [`Config`] and runs the
/// server until the process is killed or the listener fails to bind.
pub async fn run() -> Result<()> {
    info!("starting {} v{} inbound SMTP server", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().map_err(|e| {
        error!("failed to load configuration: {e:#}");
        e
    })?;

    let mail_handler: Arc<dyn smtp::mail::MailHandler> = Arc::new(WebhookMailHandler::new(config.clone()));
    let mut listen_cfg = ListenConfig::basic(config.smtp_port, mail_handler)?;
    listen_cfg.listen_addr = format!("{}:{}", config.smtp_bind_address, config.smtp_port);
    listen_cfg.domains = config.domains.clone();
    listen_cfg.require_tls = config.require_tls;
    listen_cfg.idle_timeout = std::time::Duration::from_secs(config.idle_timeout_secs);

    let server_config = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => {
            smtp::tls::server_config_from_files(std::path::Path::new(cert), std::path::Path::new(key))?
        }
        _ => {
            info!("no MAIL_GATE_TLS_CERT_PATH/MAIL_GATE_TLS_KEY_PATH configured, generating a self-signed certificate for {}", listen_cfg.greet_domain);
            smtp::tls::self_signed_server_config(&listen_cfg.greet_domain)?
        }
    };
    listen_cfg.tls_acceptor = Some(smtp::tls::acceptor(server_config));

    Server::new(listen_cfg).run().await
}
