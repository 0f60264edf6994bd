//! TLS handshakes against a loopback server with a self-signed certificate.

use std::sync::Arc;

use mailprobe_transport::{
    CommandChannel, CompletionRule, ConnectionConfig, Connector, IoGuard, TcpConnector, Transport,
};
use rustls::ServerConfig;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// Three-digit reply code followed by a space ends the reply.
struct CodeSpace;

impl CompletionRule for CodeSpace {
    fn is_final(&self, line: &str) -> bool {
        line.as_bytes().get(3) == Some(&b' ')
    }
}

fn acceptor() -> TlsAcceptor {
    let certified =
        rcgen::generate_simple_self_signed(vec!["localhost".into(), "127.0.0.1".into()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![certified.cert.der().clone()], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

async fn listener() -> (TcpListener, ConnectionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, ConnectionConfig::new("127.0.0.1", port))
}

/// Reads one CRLF line byte by byte so nothing past it is consumed.
async fn read_plain_line(socket: &mut TcpStream) -> String {
    let mut line = Vec::new();
    loop {
        let byte = socket.read_u8().await.unwrap();
        if byte == b'\n' {
            break;
        }
        line.push(byte);
    }
    String::from_utf8(line).unwrap().trim_end().to_string()
}

/// Greets, then answers one EHLO over an established stream.
async fn greet_and_answer_ehlo<S>(stream: S) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    write.write_all(b"220 secure ready\r\n").await.unwrap();
    let ehlo = lines.next_line().await.unwrap().unwrap();
    write
        .write_all(b"250-localhost\r\n250 AUTH LOGIN\r\n")
        .await
        .unwrap();
    write.flush().await.unwrap();
    ehlo
}

#[tokio::test]
async fn test_implicit_tls_rejects_self_signed_certificate() {
    let (listener, config) = listener().await;
    let acceptor = acceptor();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        acceptor.accept(socket).await.is_err()
    });

    let result = TcpConnector
        .connect(&config, true, &IoGuard::default())
        .await;

    assert!(result.is_err());
    assert!(server.await.unwrap(), "server handshake should fail too");
}

#[tokio::test]
async fn test_implicit_tls_with_invalid_certificates_allowed() {
    let (listener, config) = listener().await;
    let acceptor = acceptor();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let tls = acceptor.accept(socket).await.unwrap();
        greet_and_answer_ehlo(tls).await
    });

    let config = ConnectionConfig::builder(config.host, config.port)
        .allow_invalid_certificates(true)
        .build();
    let guard = IoGuard::default();
    let stream = TcpConnector
        .connect(&config, true, &guard)
        .await
        .unwrap();
    assert!(stream.is_tls());

    let mut channel = CommandChannel::new(stream, guard);
    let greeting = channel.read_response(&CodeSpace).await.unwrap();
    assert_eq!(greeting.code_or_keyword, "220");

    let reply = channel.execute("EHLO mail\r\n", &CodeSpace).await.unwrap();
    assert_eq!(reply.lines, vec!["250-localhost", "250 AUTH LOGIN"]);
    assert_eq!(server.await.unwrap(), "EHLO mail");
}

#[tokio::test]
async fn test_starttls_upgrade_then_ehlo() {
    let (listener, config) = listener().await;
    let acceptor = acceptor();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"220 plain ready\r\n").await.unwrap();
        let command = read_plain_line(&mut socket).await;
        assert_eq!(command, "STARTTLS");
        socket.write_all(b"220 go ahead\r\n").await.unwrap();

        let tls = acceptor.accept(socket).await.unwrap();
        greet_and_answer_ehlo(tls).await
    });

    let guard = IoGuard::default();
    let stream = TcpConnector
        .connect(&config, false, &guard)
        .await
        .unwrap();
    let mut channel = CommandChannel::new(stream, guard);
    assert!(!channel.is_tls());

    channel.read_response(&CodeSpace).await.unwrap();
    let reply = channel.execute("STARTTLS\r\n", &CodeSpace).await.unwrap();
    assert_eq!(reply.code_or_keyword, "220");

    let mut channel = channel.upgrade_to_tls("localhost", true).await.unwrap();
    assert!(channel.is_tls());

    let greeting = channel.read_response(&CodeSpace).await.unwrap();
    assert_eq!(greeting.last_line(), "220 secure ready");
    let reply = channel.execute("EHLO mail\r\n", &CodeSpace).await.unwrap();
    assert_eq!(reply.code_or_keyword, "250");
    assert_eq!(server.await.unwrap(), "EHLO mail");
}

#[tokio::test]
async fn test_starttls_upgrade_rejects_self_signed_certificate() {
    let (listener, config) = listener().await;
    let acceptor = acceptor();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        acceptor.accept(socket).await.is_err()
    });

    let guard = IoGuard::default();
    let stream = TcpConnector
        .connect(&config, false, &guard)
        .await
        .unwrap();
    let channel = CommandChannel::new(stream, guard);

    assert!(channel.upgrade_to_tls("localhost", false).await.is_err());
    assert!(server.await.unwrap());
}
