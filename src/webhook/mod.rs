//! The demo sink: an application-supplied [`MailHandler`] that parses
//! the raw message the library hands back and forwards it to a
//! configured webhook URL via HTTPS POST.
//!
//! This is not part of the embeddable library surface — it's the demo
//! binary's wiring, kept here as a complete, runnable example of how an
//! embedder plugs a `MailHandler` into `mail_gate::smtp`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use log::{error, info, warn};
use mailparse::{MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::smtp::mail::{Mail, MailHandler};

type HttpsConn = hyper_rustls::HttpsConnector<HttpConnector>;
type WebhookHttpClient = Client<HttpsConn, Full<Bytes>>;

/// The JSON payload posted to the configured webhook URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub delivery_id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

/// Forwards accepted mail to a webhook, filtering to the configured
/// target recipients first.
pub struct WebhookMailHandler {
    config: Config,
    client: WebhookHttpClient,
    user_agent: String,
}

impl WebhookMailHandler {
    pub fn new(config: Config) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("failed to load native root certificates for hyper-rustls")
            .https_only()
            .enable_http1()
            .build();
        let client: WebhookHttpClient = Client::builder(TokioExecutor::new()).build(https);
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        Self { config, client, user_agent }
    }

    async fn forward(&self, payload: EmailPayload) -> Result<()> {
        let json_body = serde_json::to_string(&payload)?;
        let request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.config.webhook_url)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .body(Full::new(Bytes::from(json_body)))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        if status.is_success() {
            info!("forwarded email {} to webhook, status {status}", payload.delivery_id);
        } else {
            error!("webhook {} rejected email {} with status {status}", self.config.webhook_url, payload.delivery_id);
        }
        Ok(())
    }
}

#[async_trait]
impl MailHandler for WebhookMailHandler {
    async fn handle_mail(&self, mail: Mail) {
        let recipient = match mail
            .recipients
            .iter()
            .find(|r| self.config.target_emails.iter().any(|t| t.eq_ignore_ascii_case(r)))
        {
            Some(r) => r.clone(),
            None => {
                warn!("no configured target among recipients {:?}, dropping", mail.recipients);
                return;
            }
        };

        let (subject, body, html_body) = match parse_message(&mail.raw) {
            Ok(parts) => parts,
            Err(e) => {
                error!("failed to parse message from {}: {e:#}", mail.mail_from);
                return;
            }
        };

        let payload = EmailPayload {
            delivery_id: uuid::Uuid::new_v4().to_string(),
            sender: mail.mail_from.clone(),
            recipient,
            subject,
            body,
            html_body,
        };

        if let Err(e) = self.forward(payload).await {
            error!("failed to forward email from {}: {e:#}", mail.mail_from);
        }
    }
}

/// Extracts the subject and a plain-text body from a raw message,
/// preferring a `text/plain` part and falling back to `text/html`
/// rendered through `html2text` when only HTML is present.
fn parse_message(raw: &[u8]) -> Result<(String, String, Option<String>)> {
    let parsed = mailparse::parse_mail(raw).context("parsing mime message")?;
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();

    let plain_part = find_part(&parsed, "text/plain");
    let html_part = find_part(&parsed, "text/html");

    let html_body = html_part.and_then(|p| p.get_body().ok());

    let body = match (&plain_part, &html_body) {
        (Some(plain), _) => plain.get_body().context("decoding text/plain body")?,
        (None, Some(html)) => html2text::from_read(html.as_bytes(), 80)
            .context("converting html body to plain text")?,
        (None, None) => parsed.get_body().context("decoding message body")?,
    };

    Ok((subject, body, html_body))
}

fn find_part<'a>(parsed: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if parsed.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return Some(parsed);
    }
    for sub in &parsed.subparts {
        if let Some(found) = find_part(sub, mimetype) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_message() {
        let raw = b"Subject: hello\r\nContent-Type: text/plain\r\n\r\nhi there";
        let (subject, body, html) = parse_message(raw).unwrap();
        assert_eq!(subject, "hello");
        assert_eq!(body.trim(), "hi there");
        assert!(html.is_none());
    }

    #[test]
    fn falls_back_to_html2text_when_only_html_present() {
        let raw = b"Subject: hi\r\nContent-Type: text/html\r\n\r\n<p>hello <b>world</b></p>";
        let (subject, body, html) = parse_message(raw).unwrap();
        assert_eq!(subject, "hi");
        assert!(body.contains("hello"));
        assert!(body.contains("world"));
        assert!(html.is_some());
    }

    #[test]
    fn prefers_plain_part_in_multipart_alternative() {
        let raw = b"Subject: multi\r\nContent-Type: multipart/alternative; boundary=xyz\r\n\r\n--xyz\r\nContent-Type: text/plain\r\n\r\nplain body\r\n--xyz\r\nContent-Type: text/html\r\n\r\n<p>html body</p>\r\n--xyz--\r\n";
        let (subject, body, html) = parse_message(raw).unwrap();
        assert_eq!(subject, "multi");
        assert_eq!(body.trim(), "plain body");
        assert!(html.unwrap().contains("html body"));
    }
}
