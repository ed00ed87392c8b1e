//! Transporte HTTP/1.1 sobre TCP para o host.
//!
//! Resolução de nome e conexão rodam numa thread auxiliar; `start_post` só
//! dispara essa thread, então o prazo do cliente (em ticks) cobre também a
//! fase de conexão. Depois o socket fica não bloqueante e cada `poll`
//! escreve/lê o que estiver disponível.

use datalogger_core::network::{HttpTransport, NetworkError, PostStatus};
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Destino de um POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Interpreta `http://host[:porta][/caminho]`.
pub fn parse_url(url: &str) -> Result<HttpTarget, NetworkError> {
    let invalid = || NetworkError::InvalidUrl(url.to_string());
    let rest = url.strip_prefix("http://").ok_or_else(invalid)?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(HttpTarget {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

/// Código do status line (`HTTP/1.x NNN ...`), se já recebido por completo.
fn status_code(response: &[u8]) -> Option<Result<u16, String>> {
    let end = response.windows(2).position(|w| w == b"\r\n")?;
    let line = String::from_utf8_lossy(&response[..end]);
    let code = line
        .split_whitespace()
        .nth(1)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| format!("Resposta inválida: {line}"));
    Some(code)
}

struct Exchange {
    stream: TcpStream,
    request: Vec<u8>,
    written: usize,
    response: Vec<u8>,
}

/// Fases de um POST.
enum State {
    /// Resolução e conexão em andamento na thread "http-connect".
    Connecting {
        result: Receiver<std::io::Result<TcpStream>>,
        request: Vec<u8>,
    },
    Exchanging(Exchange),
}

/// Transporte TCP não bloqueante.
pub struct TcpHttpTransport {
    connect_timeout: Duration,
    state: Option<State>,
}

impl TcpHttpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            state: None,
        }
    }

    fn step(exchange: &mut Exchange) -> std::io::Result<PostStatus> {
        while exchange.written < exchange.request.len() {
            match exchange.stream.write(&exchange.request[exchange.written..]) {
                Ok(0) => return Ok(PostStatus::Failed("Conexão fechada no envio".into())),
                Ok(n) => exchange.written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(PostStatus::InProgress),
                Err(e) => return Err(e),
            }
        }

        let mut buf = [0u8; 512];
        loop {
            match exchange.stream.read(&mut buf) {
                Ok(0) => {
                    return Ok(match status_code(&exchange.response) {
                        Some(Ok(code)) => PostStatus::Completed(code),
                        Some(Err(reason)) => PostStatus::Failed(reason),
                        None => PostStatus::Failed("Conexão fechada sem resposta".into()),
                    });
                }
                Ok(n) => {
                    exchange.response.extend_from_slice(&buf[..n]);
                    match status_code(&exchange.response) {
                        Some(Ok(code)) => return Ok(PostStatus::Completed(code)),
                        Some(Err(reason)) => return Ok(PostStatus::Failed(reason)),
                        None => {}
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(PostStatus::InProgress),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Resolve `host` e conecta com prazo. Roda fora do superloop.
fn connect(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(ErrorKind::NotFound, format!("{host} sem endereço")))?;
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| std::io::Error::new(e.kind(), format!("{addr}: {e}")))?;
    stream.set_nonblocking(true)?;
    debug!("Conectado a {addr}");
    Ok(stream)
}

impl HttpTransport for TcpHttpTransport {
    fn start_post(&mut self, url: &str, body: &str) -> Result<(), NetworkError> {
        self.state = None;
        let target = parse_url(url)?;

        let request = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}:{}\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {body}",
            target.path,
            target.host,
            target.port,
            body.len(),
        );

        let (tx, rx) = bounded(1);
        let timeout = self.connect_timeout;
        let HttpTarget { host, port, .. } = target;
        std::thread::Builder::new()
            .name("http-connect".into())
            .spawn(move || {
                // O receptor some se o envio for abortado antes
                let _ = tx.send(connect(&host, port, timeout));
            })?;
        debug!("Conexão iniciada, {} bytes a enviar", request.len());

        self.state = Some(State::Connecting {
            result: rx,
            request: request.into_bytes(),
        });
        Ok(())
    }

    fn poll(&mut self) -> PostStatus {
        let status = match self.state.as_mut() {
            None => return PostStatus::Failed("Nenhum envio em andamento".into()),
            Some(State::Connecting { result, request }) => match result.try_recv() {
                Err(TryRecvError::Empty) => PostStatus::InProgress,
                Err(TryRecvError::Disconnected) => {
                    PostStatus::Failed("Conexão interrompida".into())
                }
                Ok(Err(e)) => PostStatus::Failed(e.to_string()),
                Ok(Ok(stream)) => {
                    let exchange = Exchange {
                        stream,
                        request: std::mem::take(request),
                        written: 0,
                        response: Vec::new(),
                    };
                    self.state = Some(State::Exchanging(exchange));
                    return self.poll();
                }
            },
            Some(State::Exchanging(exchange)) => {
                Self::step(exchange).unwrap_or_else(|e| PostStatus::Failed(e.to_string()))
            }
        };
        if status != PostStatus::InProgress {
            self.state = None;
        }
        status
    }

    fn abort(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn parses_urls() {
        assert_eq!(
            parse_url("http://127.0.0.1:8080/api/hello").unwrap(),
            HttpTarget {
                host: "127.0.0.1".into(),
                port: 8080,
                path: "/api/hello".into()
            }
        );
        let bare = parse_url("http://example.com").unwrap();
        assert_eq!((bare.port, bare.path.as_str()), (80, "/"));
        assert!(parse_url("https://example.com").is_err());
        assert!(parse_url("http://:80/").is_err());
        assert!(parse_url("http://host:porta/").is_err());
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(status_code(b"HTTP/1.1 201 Created\r\n"), Some(Ok(201)));
        assert_eq!(status_code(b"HTTP/1.1 20"), None);
        assert!(matches!(status_code(b"garbage\r\n"), Some(Err(_))));
    }

    /// Servidor de uma requisição: devolve o corpo recebido pelo channel.
    fn one_shot_server(reply: &'static str) -> (u16, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" {
                    break;
                }
                if let Some(v) = line.strip_prefix("Content-Length: ") {
                    length = v.trim().parse().unwrap();
                }
            }
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();
            let mut stream = stream;
            stream.write_all(reply.as_bytes()).unwrap();
            String::from_utf8(body).unwrap()
        });
        (port, handle)
    }

    fn drive(transport: &mut TcpHttpTransport) -> PostStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = transport.poll();
            if status != PostStatus::InProgress || Instant::now() > deadline {
                return status;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn posts_body_and_reads_status() {
        let (port, server) = one_shot_server("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let mut transport = TcpHttpTransport::new(Duration::from_secs(1));
        let url = format!("http://127.0.0.1:{port}/api/hello");

        transport.start_post(&url, "1;01/01/2025 00:00:00;20.00;;;\n").unwrap();
        assert_eq!(drive(&mut transport), PostStatus::Completed(200));
        assert_eq!(server.join().unwrap(), "1;01/01/2025 00:00:00;20.00;;;\n");
    }

    #[test]
    fn reports_error_status() {
        let (port, server) = one_shot_server("HTTP/1.1 500 Internal Server Error\r\n\r\n");
        let mut transport = TcpHttpTransport::new(Duration::from_secs(1));

        transport.start_post(&format!("http://127.0.0.1:{port}/"), "x").unwrap();
        assert_eq!(drive(&mut transport), PostStatus::Completed(500));
        server.join().unwrap();
    }

    #[test]
    fn refused_connection_fails_on_poll() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut transport = TcpHttpTransport::new(Duration::from_millis(500));
        transport.start_post(&format!("http://127.0.0.1:{port}/"), "x").unwrap();
        assert!(matches!(drive(&mut transport), PostStatus::Failed(_)));
    }

    #[test]
    fn start_post_returns_before_connecting() {
        // 192.0.2.0/24 (TEST-NET-1) não roteia; a conexão fica pendente
        let mut transport = TcpHttpTransport::new(Duration::from_secs(2));
        let begin = Instant::now();
        transport.start_post("http://192.0.2.1:9/", "x").unwrap();
        assert!(begin.elapsed() < Duration::from_millis(500));
        transport.abort();
        assert!(matches!(transport.poll(), PostStatus::Failed(_)));
    }

    #[test]
    fn invalid_url_fails_to_start() {
        let mut transport = TcpHttpTransport::new(Duration::from_secs(1));
        assert!(matches!(
            transport.start_post("ftp://host/", "x"),
            Err(NetworkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn poll_without_post_fails() {
        let mut transport = TcpHttpTransport::new(Duration::from_secs(1));
        assert!(matches!(transport.poll(), PostStatus::Failed(_)));
    }
}
