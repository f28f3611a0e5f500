//! SPF authentication of the connecting client.
//!
//! The dispatcher treats SPF as an opaque capability: `(client_ip,
//! sender_domain) -> SpfResult`. [`MailAuthSpfChecker`] is the shipped
//! implementation, backed by real DNS lookups; embedders can substitute
//! their own [`SpfChecker`] for tests or a different evaluator.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mail_auth::{Resolver, SpfResult as MailAuthSpfResult};

/// Outcome of an SPF check, matching RFC 7208's result set one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpfResult {
    None,
    Neutral,
    Pass,
    SoftFail,
    Fail,
    TempError,
    PermError,
}

impl From<MailAuthSpfResult> for SpfResult {
    fn from(r: MailAuthSpfResult) -> Self {
        match r {
            MailAuthSpfResult::Pass => SpfResult::Pass,
            MailAuthSpfResult::Fail => SpfResult::Fail,
            MailAuthSpfResult::SoftFail => SpfResult::SoftFail,
            MailAuthSpfResult::Neutral => SpfResult::Neutral,
            MailAuthSpfResult::TempError => SpfResult::TempError,
            MailAuthSpfResult::PermError => SpfResult::PermError,
            MailAuthSpfResult::None => SpfResult::None,
        }
    }
}

/// Checks whether a client at `client_ip` is authorized to send mail
/// claiming `sender_domain`.
#[async_trait]
pub trait SpfChecker: Send + Sync {
    async fn check_host(&self, client_ip: IpAddr, sender_domain: &str) -> Result<SpfResult>;
}

/// Default [`SpfChecker`], backed by [`mail_auth::Resolver`].
///
/// The dispatcher only has the client IP and the `MAIL FROM` domain to
/// work with, so the HELO domain and envelope-from arguments
/// `verify_spf_sender` wants are synthesized from the domain itself:
/// `helo = sender_domain`, `envelope_from = postmaster@{sender_domain}`.
pub struct MailAuthSpfChecker {
    resolver: Arc<Resolver>,
}

impl MailAuthSpfChecker {
    pub fn new() -> Result<Self> {
        let resolver = Resolver::new_system_conf()
            .or_else(|_| Resolver::new_cloudflare_tls())
            .map_err(|e| anyhow::anyhow!("failed to build DNS resolver: {e}"))?;
        Ok(Self { resolver: Arc::new(resolver) })
    }
}

#[async_trait]
impl SpfChecker for MailAuthSpfChecker {
    async fn check_host(&self, client_ip: IpAddr, sender_domain: &str) -> Result<SpfResult> {
        let envelope_from = format!("postmaster@{sender_domain}");
        let output = self
            .resolver
            .verify_spf_sender(client_ip, sender_domain, sender_domain, &envelope_from)
            .await;
        Ok(output.result().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubChecker(SpfResult);

    #[async_trait]
    impl SpfChecker for StubChecker {
        async fn check_host(&self, _client_ip: IpAddr, _sender_domain: &str) -> Result<SpfResult> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn stub_checker_returns_configured_result() {
        let checker = StubChecker(SpfResult::Fail);
        let result = checker
            .check_host("203.0.113.1".parse().unwrap(), "example.com")
            .await
            .unwrap();
        assert_eq!(result, SpfResult::Fail);
    }

    #[test]
    fn mail_auth_result_mapping_is_total() {
        assert_eq!(SpfResult::from(MailAuthSpfResult::Pass), SpfResult::Pass);
        assert_eq!(SpfResult::from(MailAuthSpfResult::Fail), SpfResult::Fail);
        assert_eq!(SpfResult::from(MailAuthSpfResult::SoftFail), SpfResult::SoftFail);
        assert_eq!(SpfResult::from(MailAuthSpfResult::Neutral), SpfResult::Neutral);
        assert_eq!(SpfResult::from(MailAuthSpfResult::TempError), SpfResult::TempError);
        assert_eq!(SpfResult::from(MailAuthSpfResult::PermError), SpfResult::PermError);
        assert_eq!(SpfResult::from(MailAuthSpfResult::None), SpfResult::None);
    }
}
