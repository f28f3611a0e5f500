//! Loads (or generates) the server certificate used for the STARTTLS
//! handshake.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening certificate file {path:?}"))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading certificates from {path:?}"))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening key file {path:?}"))?;
    let mut reader = BufReader::new(file);
    match rustls_pemfile::read_one(&mut reader)? {
        Some(rustls_pemfile::Item::Pkcs1Key(key)) => Ok(PrivateKeyDer::Pkcs1(key)),
        Some(rustls_pemfile::Item::Pkcs8Key(key)) => Ok(PrivateKeyDer::Pkcs8(key)),
        Some(rustls_pemfile::Item::Sec1Key(key)) => Ok(PrivateKeyDer::Sec1(key)),
        _ => Err(anyhow!("no private key found in {path:?}")),
    }
}

/// Builds a `rustls` server config from a PEM certificate and key on
/// disk — the TLS material a deployment points at via
/// `ListenConfig`'s `tls_cert_path`/`tls_key_path`.
pub fn server_config_from_files(cert_path: &Path, key_path: &Path) -> Result<ServerConfig> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("building rustls server config")
}

/// Builds a server config around a freshly generated self-signed
/// certificate, for tests and dev deployments that don't have a real
/// certificate to point at.
pub fn self_signed_server_config(domain: &str) -> Result<ServerConfig> {
    let cert = rcgen::generate_simple_self_signed(vec![domain.to_string()])
        .context("generating self-signed certificate")?;
    let cert_der = cert.cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());
    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .context("building rustls server config from self-signed cert")
}

pub fn acceptor(config: ServerConfig) -> tokio_rustls::TlsAcceptor {
    tokio_rustls::TlsAcceptor::from(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_config_builds() {
        let config = self_signed_server_config("localhost");
        assert!(config.is_ok());
    }

    #[test]
    fn missing_cert_file_errors() {
        let result = server_config_from_files(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
        assert!(result.is_err());
    }
}
