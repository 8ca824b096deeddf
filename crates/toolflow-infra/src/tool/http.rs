//! HTTP tool executor.
//!
//! Routes every tool call to `POST {endpoint}/{tool_id}` with the step's
//! resolved parameters as the JSON body. A 2xx response body becomes the
//! step result (parsed as JSON, falling back to the raw text).

use reqwest::StatusCode;
use serde_json::Value;
use toolflow_core::tool::{ToolError, ToolExecutor};

/// Calls tools through a single HTTP routing endpoint.
#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpToolExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("toolflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn tool_url(&self, tool_id: &str) -> String {
        format!("{}/{}", self.endpoint, tool_id)
    }
}

impl ToolExecutor for HttpToolExecutor {
    async fn execute(&self, tool_id: &str, params: &Value) -> Result<Value, ToolError> {
        let url = self.tool_url(tool_id);
        tracing::debug!(tool = tool_id, url = url.as_str(), "invoking tool");

        let resp = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("reading response from {url}: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ToolError::NotFound(tool_id.to_string()));
        }
        if !status.is_success() {
            return Err(ToolError::Failed(format!("{status}: {}", body.trim())));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// One-shot HTTP server answering every request with `status` and `body`,
    /// reporting each request line and body back to the test.
    async fn serve(status: &'static str, body: &'static str) -> (String, mpsc::UnboundedReceiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let header_end = loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();
                let _ = tx.send((request_line, request_body));

                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{addr}/tools/"), rx)
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let exec = HttpToolExecutor::new("http://localhost:9000/tools/");
        assert_eq!(exec.endpoint(), "http://localhost:9000/tools");
        assert_eq!(
            exec.tool_url("db.query"),
            "http://localhost:9000/tools/db.query"
        );
    }

    #[tokio::test]
    async fn test_success_posts_params_and_parses_json() {
        let (endpoint, mut requests) = serve("200 OK", r#"{"rows":3}"#).await;
        let exec = HttpToolExecutor::new(endpoint);

        let result = exec
            .execute("db.query", &json!({"table": "users"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"rows": 3}));

        let (line, body) = requests.recv().await.unwrap();
        assert!(line.starts_with("POST /tools/db.query "), "got {line}");
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"table": "users"}));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_unknown_tool() {
        let (endpoint, _requests) = serve("404 Not Found", "").await;
        let exec = HttpToolExecutor::new(endpoint);

        let err = exec.execute("missing", &json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let (endpoint, _requests) = serve("503 Service Unavailable", "overloaded").await;
        let exec = HttpToolExecutor::new(endpoint);

        let err = exec.execute("db.query", &json!({})).await.unwrap_err();
        match &err {
            ToolError::Failed(msg) => assert!(msg.contains("503") && msg.contains("overloaded")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let exec = HttpToolExecutor::new(format!("http://{addr}"));
        let err = exec.execute("x", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }
}
