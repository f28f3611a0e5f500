//! The embeddable inbound SMTP server: binds a listening socket,
//! accepts connections, and drives each one through the protocol state
//! machine in [`connection`] and [`session`].

pub mod body;
pub mod connection;
pub mod log_handler;
pub mod mail;
pub mod response;
pub mod session;
pub mod spf;
pub mod tls;
pub mod tokenizer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use log_handler::{DefaultLogHandler, LogHandler};
use mail::MailHandler;
use spf::{MailAuthSpfChecker, SpfChecker};

/// The full set of knobs a single listening socket needs, with trait
/// objects standing in for pluggable behavior (mail handling, SPF
/// checking, logging).
pub struct ListenConfig {
    pub listen_addr: String,
    pub max_pkt_size: usize,
    pub max_msg_size: usize,
    pub mail_handler: Arc<dyn MailHandler>,
    pub log_handler: Arc<dyn LogHandler>,
    pub spf_checker: Arc<dyn SpfChecker>,
    /// Recipient domains accepted for delivery. `None` accepts all.
    pub domains: Option<Vec<String>>,
    pub greet_domain: String,
    /// `None` disables STARTTLS entirely (the driver replies
    /// `res_no_tls` if a client asks for it). Build one with
    /// [`tls::acceptor`].
    pub tls_acceptor: Option<TlsAcceptor>,
    pub require_tls: bool,
    pub idle_timeout: Duration,
}

impl ListenConfig {
    /// Sensible defaults for a basic deployment: no TLS, 24576-byte
    /// packets, a 24.576MB message cap, all recipient domains
    /// accepted.
    pub fn basic(port: u16, mail_handler: Arc<dyn MailHandler>) -> Result<Self> {
        Ok(Self {
            listen_addr: format!("0.0.0.0:{port}"),
            max_pkt_size: 24576,
            max_msg_size: 24576 * 1000,
            mail_handler,
            log_handler: Arc::new(DefaultLogHandler),
            spf_checker: Arc::new(MailAuthSpfChecker::new()?),
            domains: None,
            greet_domain: "localhost".into(),
            tls_acceptor: None,
            require_tls: false,
            idle_timeout: Duration::from_secs(100),
        })
    }
}

/// Thin handle around a [`ListenConfig`] so embedders have a type to
/// hold onto and call `run` on.
pub struct Server {
    cfg: Arc<ListenConfig>,
}

impl Server {
    pub fn new(cfg: ListenConfig) -> Self {
        Server { cfg: Arc::new(cfg) }
    }

    /// Binds the configured address and accepts connections until the
    /// process is killed or the bind itself fails.
    pub async fn run(&self) -> Result<()> {
        if self.cfg.tls_acceptor.is_none() {
            warn!("tls acceptor is not configured");
            if self.cfg.require_tls {
                anyhow::bail!("tls is required, but no tls acceptor is configured");
            }
        }

        let listener = TcpListener::bind(&self.cfg.listen_addr)
            .await
            .with_context(|| format!("failed to listen on {}", self.cfg.listen_addr))?;
        info!("SMTP server listening on {}", self.cfg.listen_addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("new connection from {peer}");
                    let cfg = Arc::clone(&self.cfg);
                    tokio::spawn(async move {
                        if let Err(e) = connection::handle_connection(stream, peer, cfg).await {
                            error!("error handling connection from {peer}: {e:#}");
                        }
                    });
                }
                Err(e) => {
                    error!("failed to accept connection: {e}");
                }
            }
        }
    }
}
