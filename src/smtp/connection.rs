//! Drives a single accepted connection: reads one packet at a time,
//! hands it to the [`Session`] dispatcher, writes the reply, and
//! performs the STARTTLS upgrade when asked to.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use crate::smtp::log_handler::LogLevel;
use crate::smtp::response::{self, Response};
use crate::smtp::session::Session;
use crate::smtp::ListenConfig;

/// Wraps either a plain or a TLS-upgraded stream so the read loop below
/// doesn't need to know which one it's talking to.
pub enum Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    Plain { stream: Stream },
    Tls { stream: Box<TlsStream<Stream>> },
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Connection<Stream> {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain { stream } => stream.read(buf).await,
            Self::Tls { stream } => stream.read(buf).await,
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Plain { stream } => stream.write_all(bytes).await,
            Self::Tls { stream } => stream.write_all(bytes).await,
        }
    }

    /// Consumes a plain connection and performs the TLS handshake,
    /// returning the upgraded connection.
    async fn upgrade(self, acceptor: &tokio_rustls::TlsAcceptor) -> Result<Self> {
        match self {
            Self::Plain { stream } => {
                let tls_stream = acceptor.accept(stream).await?;
                Ok(Self::Tls { stream: Box::new(tls_stream) })
            }
            already_tls @ Self::Tls { .. } => Ok(already_tls),
        }
    }
}

/// Greets the client, then loops: read one packet, dispatch it, write
/// the reply, upgrade to TLS or close as directed.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, cfg: Arc<ListenConfig>) -> Result<()> {
    let mut conn = Connection::Plain { stream };
    let mut session = Session::new(peer);

    let greeting = response::res_greeting().with_msg(format!("{} ESMTP Service Ready", cfg.greet_domain));
    if write_response(&mut conn, &greeting, &cfg, peer).await.is_err() {
        return Ok(());
    }

    let mut pkt_buf = vec![0u8; cfg.max_pkt_size];
    loop {
        let read_result = tokio::time::timeout(cfg.idle_timeout, conn.read(&mut pkt_buf)).await;
        let mut res = match read_result {
            Ok(Ok(0)) => {
                cfg.log_handler.log(LogLevel::Debug, &format!("{peer} closed the connection"));
                return Ok(());
            }
            Ok(Ok(n)) if n >= cfg.max_pkt_size => {
                cfg.log_handler.log(LogLevel::Debug, "received oversized packet");
                response::res_pkt_too_big()
            }
            Ok(Ok(n)) => {
                cfg.log_handler.log(LogLevel::Debug, &format!("{peer}->{:?}", String::from_utf8_lossy(&pkt_buf[..n])));
                session.handle_req(&pkt_buf[..n], &cfg).await
            }
            Ok(Err(e)) => {
                cfg.log_handler.log(LogLevel::Error, &format!("failed to read packet from {peer}: {e}"));
                return Ok(());
            }
            Err(_) => {
                cfg.log_handler.log(LogLevel::Debug, &format!("{peer} idle timeout"));
                return Ok(());
            }
        };

        if res.upgrade_to_tls {
            match &cfg.tls_acceptor {
                None => res = response::res_no_tls(),
                Some(acceptor) => {
                    if write_response(&mut conn, &res, &cfg, peer).await.is_err() {
                        return Ok(());
                    }
                    conn = match conn.upgrade(acceptor).await {
                        Ok(upgraded) => upgraded,
                        Err(e) => {
                            // tokio-rustls doesn't hand the plain stream
                            // back on a failed handshake, so there's no
                            // channel left to report res_failed_tls on;
                            // the connection just closes instead of
                            // falling back to cleartext.
                            cfg.log_handler.log(LogLevel::Error, &format!("tls handshake with {peer} failed: {e}"));
                            return Ok(());
                        }
                    };
                    session.reset();
                    res = response::res_greeting().with_msg(format!("{} ESMTP Service Ready", cfg.greet_domain));
                }
            }
        }

        if !res.respond {
            continue;
        }
        if write_response(&mut conn, &res, &cfg, peer).await.is_err() {
            return Ok(());
        }
        if !res.keep_alive {
            cfg.log_handler.log(LogLevel::Debug, &format!("ending connection with {peer}"));
            return Ok(());
        }
    }
}

async fn write_response<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync>(
    conn: &mut Connection<Stream>,
    res: &Response,
    cfg: &ListenConfig,
    peer: SocketAddr,
) -> Result<()> {
    let rendered = res.render();
    cfg.log_handler.log(LogLevel::Debug, &format!("{peer}<-{rendered:?}"));
    conn.write_all(rendered.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::log_handler::DefaultLogHandler;
    use crate::smtp::mail::{Mail, MailHandler};
    use crate::smtp::spf::{SpfChecker, SpfResult};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::Mutex;
    use tokio::io::{duplex, DuplexStream};
    use tokio::net::{TcpListener, TcpStream};

    struct RecordingHandler(Arc<Mutex<Vec<Mail>>>);
    #[async_trait]
    impl MailHandler for RecordingHandler {
        async fn handle_mail(&self, mail: Mail) {
            self.0.lock().unwrap().push(mail);
        }
    }

    struct AlwaysPass;
    #[async_trait]
    impl SpfChecker for AlwaysPass {
        async fn check_host(&self, _ip: IpAddr, _domain: &str) -> AnyResult<SpfResult> {
            Ok(SpfResult::Pass)
        }
    }

    fn test_cfg(mail_handler: Arc<dyn MailHandler>) -> Arc<ListenConfig> {
        Arc::new(ListenConfig {
            listen_addr: "127.0.0.1:0".into(),
            max_pkt_size: 4096,
            max_msg_size: 1_000_000,
            mail_handler,
            log_handler: Arc::new(DefaultLogHandler),
            spf_checker: Arc::new(AlwaysPass),
            domains: None,
            greet_domain: "test.local".into(),
            tls_acceptor: None,
            require_tls: false,
            idle_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn full_dialogue_over_loopback_delivers_mail() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let cfg = test_cfg(Arc::new(RecordingHandler(delivered.clone())));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_cfg = cfg.clone();
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, server_cfg).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1024];

        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("220 "));

        client.write_all(b"HELO there\r\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("250 "));

        client.write_all(b"MAIL FROM:<a@example.com>\r\n").await.unwrap();
        client.read(&mut buf).await.unwrap();

        client.write_all(b"RCPT TO:<b@example.com>\r\n").await.unwrap();
        client.read(&mut buf).await.unwrap();

        client.write_all(b"DATA\r\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("354"));

        client.write_all(b"Subject: hi\r\n\r\nhello\r\n.\r\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("250"));

        client.write_all(b"QUIT\r\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("221"));

        server.await.unwrap();
        let mails = delivered.lock().unwrap();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].mail_from, "a@example.com");
    }

    #[tokio::test]
    async fn duplex_stream_satisfies_connection_bounds() {
        // Exercises Connection<Stream> against a non-TcpStream transport
        // to confirm it's generic, not accidentally TcpStream-specific.
        let (client, server): (DuplexStream, DuplexStream) = duplex(64);
        let mut conn = Connection::Plain { stream: server };
        let mut client = client;
        tokio::spawn(async move {
            let mut buf = [0u8; 5];
            client.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
        });
        conn.write_all(b"hello").await.unwrap();
    }
}
