//! The finished message handed to the application once a session
//! completes successfully.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::smtp::spf::SpfResult;

/// One accepted mail message.
///
/// `recipients` carries every `RCPT TO` address the session
/// accumulated.
#[derive(Debug, Clone)]
pub struct Mail {
    pub sender_addr: SocketAddr,
    pub mail_from: String,
    pub recipients: Vec<String>,
    pub raw: Vec<u8>,
    pub spf_result: SpfResult,
}

/// Receives a completed [`Mail`]. Implementations typically forward it
/// to a webhook, a queue, or disk — whatever the embedding application
/// wants done with inbound mail.
#[async_trait]
pub trait MailHandler: Send + Sync {
    async fn handle_mail(&self, mail: Mail);
}
