//! In-process HTTP server for end-to-end tests.
//!
//! Routes are matched on method and path. Unknown routes answer 404.
//! Event-stream bodies are sent with chunked encoding so each chunk reaches
//! the client as a separate read.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Debug, Clone)]
enum MockBody {
    Full(Vec<u8>),
    Chunked {
        chunks: Vec<Vec<u8>>,
        delay: Duration,
        hold_open: bool,
    },
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: String,
    body: MockBody,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self::text(status, "")
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: MockBody::Full(body.as_bytes().to_vec()),
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: MockBody::Full(value.to_string().into_bytes()),
        }
    }

    pub fn event_stream(chunks: &[&str]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream; charset=utf-8".to_string(),
            body: MockBody::Chunked {
                chunks: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
                delay: Duration::from_millis(5),
                hold_open: false,
            },
        }
    }

    /// Keep the connection open after the last chunk until the client
    /// disconnects.
    pub fn hold_open(mut self) -> Self {
        if let MockBody::Chunked { hold_open, .. } = &mut self.body {
            *hold_open = true;
        }
        self
    }
}

struct Route {
    method: String,
    path: String,
    response: MockResponse,
}

pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(routes: Vec<(&str, &str, MockResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let routes: Arc<Vec<Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(method, path, response)| Route {
                    method: method.to_string(),
                    path: path.to_string(),
                    response,
                })
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, routes, recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            task,
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// A client that never routes through a proxy.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client should build")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && request.path == path)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    routes: Arc<Vec<Route>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> Result<(), String> {
    loop {
        let Some(request) = read_http_request(&mut stream).await? else {
            return Ok(());
        };
        recorded.lock().expect("request log").push(request.clone());

        let response = routes
            .iter()
            .find(|route| route.method == request.method && route.path == request.path)
            .map(|route| route.response.clone())
            .unwrap_or_else(|| MockResponse::status(404));

        let keep_going = write_response(&mut stream, &request.method, response).await?;
        if !keep_going {
            return Ok(());
        }
    }
}

async fn write_response(
    stream: &mut TcpStream,
    method: &str,
    response: MockResponse,
) -> Result<bool, String> {
    let reason = match response.status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: {}\r\n",
        response.status, reason, response.content_type
    );

    match response.body {
        MockBody::Full(body) => {
            let mut out = format!("{head}content-length: {}\r\n\r\n", body.len()).into_bytes();
            if method != "HEAD" {
                out.extend_from_slice(&body);
            }
            stream.write_all(&out).await.map_err(|err| err.to_string())?;
            Ok(true)
        }
        MockBody::Chunked {
            chunks,
            delay,
            hold_open,
        } => {
            let out = format!("{head}transfer-encoding: chunked\r\n\r\n");
            stream
                .write_all(out.as_bytes())
                .await
                .map_err(|err| err.to_string())?;
            for chunk in chunks {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                stream.write_all(&frame).await.map_err(|err| err.to_string())?;
                stream.flush().await.map_err(|err| err.to_string())?;
                tokio::time::sleep(delay).await;
            }

            if hold_open {
                let mut sink = [0_u8; 64];
                while matches!(stream.read(&mut sink).await, Ok(read) if read > 0) {}
                return Ok(false);
            }

            stream
                .write_all(b"0\r\n\r\n")
                .await
                .map_err(|err| err.to_string())?;
            Ok(true)
        }
    }
}

/// Read one request. `Ok(None)` means the client closed the connection.
async fn read_http_request(stream: &mut TcpStream) -> Result<Option<RecordedRequest>, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length.saturating_sub(body.len())];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    }))
}
