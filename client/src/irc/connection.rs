use std::fs::File;
use std::io::BufReader as StdBufReader;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig as TlsConfig, RootCertStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{IdentitySection, ServerSection};
use crate::engine::client::IrcClient;
use crate::engine::events::ClientEvent;

use super::formatter;
use super::handler::handle_server_message;
use super::parser::IrcMessage;
use super::sender::CommandSender;

/// Maximum bytes per IRC line (RFC 2812 says 512; servers with IRCv3 tags send more).
const MAX_LINE_LENGTH: usize = 8192;
/// Give up on a server that sends nothing (not even PING) for 5 minutes.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A running client session.
pub struct Session {
    pub client: IrcClient,
    /// Subscribed before the read loop starts, so it sees every event
    /// including `Registered`.
    pub events: broadcast::Receiver<ClientEvent>,
    pub handle: JoinHandle<()>,
}

/// Read a line from the server, capped at MAX_LINE_LENGTH bytes.
/// Returns Ok(0) on EOF, Ok(n) on success, Err on I/O error or line too long.
async fn read_bounded_line<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut String,
) -> std::io::Result<usize> {
    let mut line = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break; // EOF
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            break;
        }
        // fill_buf only reads more once the buffer is drained, so take what is there.
        let len = available.len();
        line.extend_from_slice(available);
        reader.consume(len);
        if line.len() > MAX_LINE_LENGTH {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "IRC line exceeds maximum length",
            ));
        }
    }

    if line.len() > MAX_LINE_LENGTH {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "IRC line exceeds maximum length",
        ));
    }
    buf.push_str(&String::from_utf8_lossy(&line));
    Ok(line.len())
}

/// Connect to the configured server (TLS if enabled) and start a session.
pub async fn connect(
    server: &ServerSection,
    identity: &IdentitySection,
    cancel: CancellationToken,
) -> Result<Session> {
    let tcp = TcpStream::connect(&server.address)
        .await
        .with_context(|| format!("failed to connect to {}", server.address))?;

    if !server.tls {
        info!(address = %server.address, "connected (plaintext)");
        return Ok(spawn_session(tcp, identity, cancel));
    }

    let connector = tls_connector(server.ca_file.as_deref())?;
    let host = server
        .address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(server.address.as_str())
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let server_name =
        ServerName::try_from(host.clone()).with_context(|| format!("invalid TLS server name {host}"))?;
    let tls = connector
        .connect(server_name, tcp)
        .await
        .context("TLS handshake failed")?;

    info!(address = %server.address, "connected (TLS)");
    Ok(spawn_session(tls, identity, cancel))
}

fn tls_connector(ca_file: Option<&str>) -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        let file = File::open(path).with_context(|| format!("failed to open CA file {path}"))?;
        for cert in rustls_pemfile::certs(&mut StdBufReader::new(file)) {
            let cert = cert.with_context(|| format!("invalid certificate in {path}"))?;
            roots
                .add(cert)
                .with_context(|| format!("unusable certificate in {path}"))?;
        }
    }

    let config = TlsConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Register on `stream` and run the session in the background.
/// Accepts any stream implementing AsyncRead + AsyncWrite (plain TCP, TLS, or
/// an in-memory pipe).
///
/// The spawned read loop is the single writer for the client's channel
/// collection. When it ends (EOF, error, idle timeout or cancellation) every
/// channel is removed and `ClientEvent::Disconnected` is emitted.
pub fn spawn_session<S>(stream: S, identity: &IdentitySection, cancel: CancellationToken) -> Session
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let reader = BufReader::new(reader);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let sender = CommandSender::new(out_tx);
    let client = IrcClient::new(identity.nickname.clone(), Arc::new(sender.clone()));
    let events = client.subscribe_events();

    if let Some(ref password) = identity.password {
        sender.send_line(formatter::pass(password));
    }
    sender.send_line(formatter::nick(&identity.nickname));
    sender.send_line(formatter::user(&identity.username, &identity.realname));

    // Stops the writer once the read loop is done, after flushing queued lines.
    let flush = CancellationToken::new();
    let writer_flush = flush.clone();
    let write_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                line = out_rx.recv() => {
                    let Some(line) = line else { break };
                    if write_line(&mut writer, &line).await.is_err() {
                        break;
                    }
                }
                _ = writer_flush.cancelled() => {
                    while let Ok(line) = out_rx.try_recv() {
                        if write_line(&mut writer, &line).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }
        let _ = writer.shutdown().await;
    });

    let loop_client = client.clone();
    let handle = tokio::spawn(async move {
        let reason = read_loop(&loop_client, reader, &sender, &cancel).await;

        loop_client.channels().clear();
        info!(nickname = %loop_client.nickname(), reason = ?reason, "disconnected");
        loop_client.emit(ClientEvent::Disconnected { reason });

        flush.cancel();
        let _ = write_handle.await;
    });

    Session {
        client,
        events,
        handle,
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    debug!(%line, "send");
    writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
    writer.flush().await
}

/// Process server lines until the connection ends. Returns the disconnect reason.
async fn read_loop<R: AsyncRead + Unpin>(
    client: &IrcClient,
    mut reader: BufReader<R>,
    sender: &CommandSender,
    cancel: &CancellationToken,
) -> Option<String> {
    let mut line_buf = String::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                sender.send_line(formatter::quit(None));
                return Some("client quit".into());
            }
            result = tokio::time::timeout(IDLE_TIMEOUT, read_bounded_line(&mut reader, &mut line_buf)) => {
                match result {
                    Ok(Ok(0)) => return Some("connection closed".into()),
                    Ok(Err(e)) => {
                        warn!(error = %e, "read failed");
                        return Some(e.to_string());
                    }
                    Err(_) => return Some("idle timeout".into()),
                    Ok(Ok(_)) => {}
                }
            }
        }

        let line = line_buf.trim_end().to_string();
        line_buf.clear();

        if line.is_empty() {
            continue;
        }

        let msg = match IrcMessage::parse(&line) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, %line, "unparseable line");
                continue;
            }
        };

        if msg.command == "ERROR" {
            return msg.param(0).map(str::to_string);
        }

        for reply in handle_server_message(client, &msg) {
            sender.send_line(reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_bounded_line_splits_lines() {
        let data: &[u8] = b"PING :a\r\nPING :b\r\n";
        let mut reader = BufReader::new(data);
        let mut buf = String::new();

        assert_eq!(read_bounded_line(&mut reader, &mut buf).await.unwrap(), 9);
        assert_eq!(buf, "PING :a\r\n");
        buf.clear();
        read_bounded_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(buf, "PING :b\r\n");
        buf.clear();
        assert_eq!(read_bounded_line(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_bounded_line_joins_partial_reads() {
        let data: &[u8] = b"PING :split\r\n";
        let mut reader = BufReader::with_capacity(4, data);
        let mut buf = String::new();
        assert_eq!(read_bounded_line(&mut reader, &mut buf).await.unwrap(), 13);
        assert_eq!(buf, "PING :split\r\n");
    }

    #[tokio::test]
    async fn test_read_bounded_line_rejects_overlong_line() {
        let data = vec![b'A'; MAX_LINE_LENGTH * 2];
        let mut reader = BufReader::with_capacity(MAX_LINE_LENGTH, data.as_slice());
        let mut buf = String::new();
        let err = read_bounded_line(&mut reader, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
