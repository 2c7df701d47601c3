#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

pub const API_KEY: &str = "test-key";

/// In-memory stand-in for the hosted store.
#[derive(Clone, Default)]
pub struct MockStore {
    records: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Replaces the value, or merges top-level object fields when `partial`.
    pub fn write(&self, key: &str, value: &str, partial: bool) -> Result<(), String> {
        let mut records = self.records.lock().unwrap();
        if !partial {
            records.insert(key.to_string(), value.to_string());
            return Ok(());
        }

        let existing = records.get(key).ok_or("Record not found")?;
        let base: Value = serde_json::from_str(existing).map_err(|e| e.to_string())?;
        let patch: Value = serde_json::from_str(value).map_err(|e| e.to_string())?;
        match (base, patch) {
            (Value::Object(mut base), Value::Object(patch)) => {
                for (field, value) in patch {
                    base.insert(field, value);
                }
                records.insert(key.to_string(), Value::Object(base).to_string());
                Ok(())
            }
            _ => Err("partial update requires JSON objects".to_string()),
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.records.lock().unwrap().remove(key).is_some()
    }

    /// `Ok(None)` when the key is missing.
    pub fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, String> {
        let mut records = self.records.lock().unwrap();
        let Some(current) = records.get(key) else {
            return Ok(None);
        };
        let current: i64 = current
            .trim()
            .parse()
            .map_err(|_| "value is not a number".to_string())?;
        let next = current + delta;
        records.insert(key.to_string(), next.to_string());
        Ok(Some(next))
    }

    pub fn range(&self, start: &str, end: &str, limit: Option<usize>) -> (Vec<(String, String)>, bool) {
        let records = self.records.lock().unwrap();
        let matching: Vec<_> = records
            .range(start.to_string()..=end.to_string())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match limit {
            Some(limit) if matching.len() > limit => (matching[..limit].to_vec(), true),
            _ => (matching, false),
        }
    }
}

// ============================================================================
// HTTP mock
// ============================================================================

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

pub struct MockHttp {
    pub base_url: String,
    pub store: MockStore,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockHttp {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.requests().last().cloned().expect("no request captured")
    }
}

/// Serves the record API from `store`.
pub fn spawn_http(store: MockStore) -> MockHttp {
    spawn_http_inner(store, None)
}

/// Answers every request with the same status and body.
pub fn spawn_http_fixed(status: u16, body: &str) -> MockHttp {
    spawn_http_inner(MockStore::new(), Some((status, body.to_string())))
}

/// A base URL nobody listens on.
pub fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

fn spawn_http_inner(store: MockStore, fixed: Option<(u16, String)>) -> MockHttp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let requests = Arc::new(Mutex::new(Vec::new()));

    let server_store = store.clone();
    let server_requests = requests.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let store = server_store.clone();
            let requests = server_requests.clone();
            let fixed = fixed.clone();
            thread::spawn(move || {
                let _ = serve_connection(stream, &store, &requests, fixed.as_ref());
            });
        }
    });

    MockHttp {
        base_url: format!("http://{}", addr),
        store,
        requests,
    }
}

fn serve_connection(
    stream: TcpStream,
    store: &MockStore,
    requests: &Mutex<Vec<CapturedRequest>>,
    fixed: Option<&(u16, String)>,
) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut stream = stream;

    while let Some(request) = read_request(&mut reader)? {
        requests.lock().unwrap().push(request.clone());
        let (status, body) = match fixed {
            Some((status, body)) => (*status, body.clone()),
            None => route(&request, store),
        };
        write_response(&mut stream, status, &body)?;
    }
    Ok(())
}

fn read_request(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<CapturedRequest>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (target.clone(), Vec::new()),
    };

    Ok(Some(CapturedRequest {
        method,
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (percent_decode(name), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => out.push(b' '),
            b'%' if idx + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[idx + 1..idx + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        idx += 2;
                    }
                    Err(_) => out.push(b'%'),
                }
            }
            other => out.push(other),
        }
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn route(request: &CapturedRequest, store: &MockStore) -> (u16, String) {
    if request.header("x-api-key") != Some(API_KEY) {
        return (401, json!({"error": "Unauthorized"}).to_string());
    }

    let method = request.method.as_str();
    let path = request.path.as_str();
    let reply = match (method, path) {
        ("POST", "/record") => {
            let body = request.json();
            match (body["key"].as_str(), body["value"].as_str()) {
                (Some(key), Some(value)) => {
                    let partial = body["partialUpdate"].as_bool().unwrap_or(false);
                    match store.write(key, value, partial) {
                        Ok(()) => (200, json!({"success": true, "message": "Record inserted/updated successfully"})),
                        Err(message) => (404, json!({"error": message})),
                    }
                }
                _ => (400, json!({"error": "key and value are required"})),
            }
        }
        ("POST", "/record/atomic") => {
            let body = request.json();
            let key = body["key"].as_str().unwrap_or_default();
            let delta = body["increment"].as_i64().unwrap_or(0);
            match store.increment(key, delta) {
                Ok(Some(value)) => (200, json!({"success": true, "newValue": value})),
                Ok(None) => (404, json!({"error": "Record not found"})),
                Err(message) => (200, json!({"success": false, "message": message})),
            }
        }
        ("POST", "/token/websocket") => {
            let keys = request.json()["subscribeKeys"].clone();
            (200, json!({"token": format!("tok-{}", keys.as_array().map(|k| k.len()).unwrap_or(0))}))
        }
        ("GET", "/records") => {
            let start = request.query_param("startKey").unwrap_or_default();
            let end = request.query_param("endKey").unwrap_or_default();
            let limit = request.query_param("limit").and_then(|l| l.parse().ok());
            let (records, truncated) = store.range(start, end, limit);
            let records: Vec<Value> = records
                .into_iter()
                .map(|(key, value)| json!({"key": key, "value": value}))
                .collect();
            (200, json!({"count": records.len(), "truncated": truncated, "records": records}))
        }
        ("GET", _) if path.starts_with("/record/") => {
            let key = percent_decode(&path["/record/".len()..]);
            match store.get(&key) {
                Some(value) => (200, json!({"key": key, "value": value})),
                None => (404, json!({"error": "Record not found"})),
            }
        }
        ("DELETE", _) if path.starts_with("/record/") => {
            let key = percent_decode(&path["/record/".len()..]);
            if store.remove(&key) {
                (200, json!({"success": true, "message": "Record deleted successfully"}))
            } else {
                (404, json!({"error": "Record not found"}))
            }
        }
        _ => (404, json!({"error": "Not found"})),
    };
    (reply.0, reply.1.to_string())
}

fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )?;
    stream.flush()
}

// ============================================================================
// WebSocket mock
// ============================================================================

/// Answers one request frame against `store`, the way the service does.
pub fn handle_frame(store: &MockStore, text: &str) -> Value {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return json!({"error": "invalid JSON"}),
    };
    let id = frame["messageId"].clone();
    let key = frame["key"].as_str().unwrap_or_default();
    let value = frame["value"].as_str();

    match (frame["op"].as_u64(), value) {
        (Some(1), _) => match store.get(key) {
            Some(stored) => json!({"messageId": id, "key": key, "value": stored}),
            None => json!({"messageId": id, "error": "Record not found"}),
        },
        (Some(op @ (2 | 3)), Some(value)) => match store.write(key, value, op == 3) {
            Ok(()) => json!({"messageId": id, "code": 200, "message": "Record inserted successfully"}),
            Err(message) => json!({"messageId": id, "error": message}),
        },
        (Some(4), _) => {
            if store.remove(key) {
                json!({"messageId": id, "code": 200, "message": "Record deleted successfully"})
            } else {
                json!({"messageId": id, "error": "Record not found"})
            }
        }
        _ => json!({"messageId": id, "error": "invalid operation"}),
    }
}

pub struct MockWs {
    pub base_url: String,
    pub store: MockStore,
    /// Request URIs seen during handshakes.
    pub uris: Arc<Mutex<Vec<String>>>,
}

/// Serves the WebSocket API from `store` on a local port.
pub async fn spawn_ws(store: MockStore) -> MockWs {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let uris = Arc::new(Mutex::new(Vec::new()));

    let server_store = store.clone();
    let server_uris = uris.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let store = server_store.clone();
            let uris = server_uris.clone();
            tokio::spawn(async move {
                let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    uris.lock().unwrap().push(request.uri().to_string());
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(text) => {
                            let reply = handle_frame(&store, text.as_str());
                            if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            });
        }
    });

    MockWs {
        base_url: format!("http://{}", addr),
        store,
        uris,
    }
}
