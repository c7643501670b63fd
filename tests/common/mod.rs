//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use config_client::config::{BootstrapSettings, ClientOptions, Environment};
use config_client::{Registry, RegistryBuilder};

/// What the mock service saw of one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
}

/// Requests recorded by a mock service, in arrival order.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<SeenRequest>>>);

impl RequestLog {
    pub fn all(&self) -> Vec<SeenRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.all().iter().filter(|r| r.path == path).count()
    }
}

/// Start a programmable mock config service on an ephemeral port.
///
/// `f` receives the request path and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, RequestLog)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<u8>)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = RequestLog::default();
    let f = Arc::new(f);

    let task_log = log.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let log = task_log.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request_head(&mut socket).await else {
                            return;
                        };
                        log.0.lock().unwrap().push(request.clone());

                        let (status, body) = f(request.path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let head = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            status_text,
                            body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

/// Serve fixed documents by path; anything else is a 404.
pub async fn start_document_backend(
    documents: Vec<(&'static str, Vec<u8>)>,
) -> (SocketAddr, RequestLog) {
    let documents = Arc::new(documents);
    start_programmable_backend(move |path| {
        let documents = documents.clone();
        async move {
            match documents.iter().find(|(p, _)| *p == path) {
                Some((_, body)) => (200, body.clone()),
                None => (404, Vec::new()),
            }
        }
    })
    .await
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buffer);
    let mut lines = head.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let authorization = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_string());

    Some(SeenRequest {
        path,
        authorization,
    })
}

/// Client options with a short retry interval.
pub fn fast_options() -> ClientOptions {
    ClientOptions {
        retry_interval_ms: 20,
        request_timeout_secs: 5,
        watch_local_overrides: false,
    }
}

pub fn bootstrap_for(addr: SocketAddr) -> BootstrapSettings {
    BootstrapSettings {
        uri: Some(format!("http://{}/config", addr)),
        username: "svc".to_string(),
        password: "pw".to_string(),
    }
}

/// Registry builder pointed at a mock service, isolated from the process environment.
pub fn builder_for(addr: SocketAddr, env: Environment) -> RegistryBuilder {
    Registry::builder("console")
        .bootstrap(bootstrap_for(addr))
        .environment(env)
        .options(fast_options())
}

/// Build a zip archive in memory.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// Poll `condition` every 10ms for up to 5s.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
