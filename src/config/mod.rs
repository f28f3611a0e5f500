//! Application configuration loaded from environment variables, via the
//! `dotenv` crate if a `.env` file is present.
//!
//! This is the demo binary's configuration layer — the library itself
//! is configured programmatically through `smtp::ListenConfig`. This
//! module's job is turning `MAIL_GATE_*` environment variables into the
//! values that build one.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime settings for the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Recipient addresses accepted for delivery and forwarded to the
    /// webhook. (Required: `MAIL_GATE_TARGET_EMAILS`, comma-separated)
    pub target_emails: Vec<String>,

    /// Where the parsed email payload is POSTed. (Required:
    /// `MAIL_GATE_WEBHOOK_URL`)
    pub webhook_url: String,

    /// IP address the SMTP server listens on. (Optional:
    /// `MAIL_GATE_BIND_ADDRESS`, default `0.0.0.0`)
    pub smtp_bind_address: String,

    /// Port the SMTP server listens on. (Optional: `MAIL_GATE_PORT`,
    /// default 2525)
    pub smtp_port: u16,

    /// Recipient domains accepted; `None` accepts all. (Optional:
    /// `MAIL_GATE_DOMAINS`, comma-separated)
    pub domains: Option<Vec<String>>,

    /// PEM certificate/key pair for STARTTLS. Both must be set to
    /// enable TLS; if unset, a self-signed certificate is generated.
    /// (Optional: `MAIL_GATE_TLS_CERT_PATH`, `MAIL_GATE_TLS_KEY_PATH`)
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    /// Whether STARTTLS must be available for the server to start.
    /// (Optional: `MAIL_GATE_REQUIRE_TLS`, default false)
    pub require_tls: bool,

    /// Seconds of inactivity before a connection is dropped. (Optional:
    /// `MAIL_GATE_IDLE_TIMEOUT`, default 100)
    pub idle_timeout_secs: u64,
}

impl Config {
    /// Loads settings from the environment, logging each resolved
    /// value the way the rest of this codebase does.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `MAIL_GATE_TARGET_EMAILS` or
    /// `MAIL_GATE_WEBHOOK_URL` are missing, or if a numeric variable is
    /// set but fails to parse.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let target_emails_str = env::var("MAIL_GATE_TARGET_EMAILS").map_err(|e| {
            log::error!("MAIL_GATE_TARGET_EMAILS environment variable must be set: {e}");
            anyhow!(e).context("MAIL_GATE_TARGET_EMAILS environment variable must be set")
        })?;
        let target_emails: Vec<String> = target_emails_str
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if target_emails.is_empty() {
            return Err(anyhow!("MAIL_GATE_TARGET_EMAILS must contain at least one address"));
        }
        log::info!("config: target_emails = {target_emails:?}");

        let webhook_url = env::var("MAIL_GATE_WEBHOOK_URL").map_err(|e| {
            log::error!("MAIL_GATE_WEBHOOK_URL environment variable must be set: {e}");
            anyhow!(e).context("MAIL_GATE_WEBHOOK_URL environment variable must be set")
        })?;
        log::info!("config: webhook_url = {webhook_url}");

        let smtp_bind_address = env::var("MAIL_GATE_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
        log::info!("config: smtp_bind_address = {smtp_bind_address}");

        let smtp_port: u16 = env::var("MAIL_GATE_PORT")
            .unwrap_or_else(|_| "2525".to_string())
            .parse()
            .map_err(|e| anyhow!("MAIL_GATE_PORT must be a valid u16: {e}"))?;
        log::info!("config: smtp_port = {smtp_port}");

        let domains = env::var("MAIL_GATE_DOMAINS").ok().map(|val| {
            val.split(',').map(|d| d.trim().to_string()).filter(|d| !d.is_empty()).collect()
        });
        log::info!("config: domains = {domains:?}");

        let tls_cert_path = env::var("MAIL_GATE_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("MAIL_GATE_TLS_KEY_PATH").ok();

        let require_tls: bool = env::var("MAIL_GATE_REQUIRE_TLS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .map_err(|e| anyhow!("MAIL_GATE_REQUIRE_TLS must be true or false: {e}"))?;
        log::info!("config: require_tls = {require_tls}");

        let idle_timeout_secs: u64 = env::var("MAIL_GATE_IDLE_TIMEOUT")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|e| anyhow!("MAIL_GATE_IDLE_TIMEOUT must be a valid u64: {e}"))?;
        log::info!("config: idle_timeout_secs = {idle_timeout_secs}");

        Ok(Config {
            target_emails,
            webhook_url,
            smtp_bind_address,
            smtp_port,
            domains,
            tls_cert_path,
            tls_key_path,
            require_tls,
            idle_timeout_secs,
        })
    }
}
