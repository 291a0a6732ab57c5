//! Loopback stand-ins for provider endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{ProviderConfig, ProviderContract, ProviderRegistry, ProviderSpec};
use shared::SubjectType;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub struct Upstream {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Answers every request with `status` and `body`.
pub async fn spawn_upstream(status: u16, body: &str) -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let body = body.to_string();

    let task_hits = hits.clone();
    let task_requests = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            task_hits.fetch_add(1, Ordering::SeqCst);
            if let Some(request) = read_request(&mut socket).await {
                task_requests.lock().unwrap().push(request);
            }
            let response = format!(
                "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    Upstream {
        base_url,
        hits,
        requests,
    }
}

/// Accepts connections and never answers.
pub async fn spawn_silent_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));

    let task_hits = hits.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            task_hits.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    Upstream {
        base_url,
        hits,
        requests: Arc::new(Mutex::new(Vec::new())),
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        head,
        body: buf[header_end..].to_vec(),
    })
}

pub fn provider(
    name: &str,
    base_url: &str,
    contract: ProviderContract,
    api_key: Option<&str>,
) -> ProviderConfig {
    let endpoint = match contract {
        ProviderContract::HealthAssessment => "/api/v3/health_assessment",
        ProviderContract::LegacyHealthAssessment => "/v2/health_assessment",
        ProviderContract::Identification => "/api/v1/identification",
    };
    ProviderConfig::from_spec(
        ProviderSpec {
            name: name.to_string(),
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
            contract,
        },
        api_key.map(str::to_string),
    )
}

pub fn registry_with(subject: SubjectType, provider: ProviderConfig) -> ProviderRegistry {
    ProviderRegistry::new().with_provider(subject, provider)
}

pub fn test_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .unwrap()
}
