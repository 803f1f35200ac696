use crate::config::{CompletionParams, Config};
use crate::event::AppEvent;
use crate::state::Submission;
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

pub mod prompt;

pub use prompt::build_prompt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("API response error, status: {0}")]
    Status(u16),
    #[error("No output from the model")]
    NoOutput,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("tokio runtime unavailable: {0}")]
    Runtime(String),
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    max_tokens: u32,
    n: u32,
    stop: Option<Vec<String>>,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

impl CompletionRequest {
    fn new(prompt: String, params: &CompletionParams) -> Self {
        Self {
            prompt,
            max_tokens: params.max_tokens,
            n: params.n,
            stop: None,
            temperature: params.temperature,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

/// A missing, null or empty `choices` list and a first choice without `text` are all no output.
fn first_choice_text(body: &[u8]) -> Result<String, CompletionError> {
    let response: CompletionResponse =
        serde_json::from_slice(body).map_err(|err| CompletionError::Decode(err.to_string()))?;
    response
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| choice.text)
        .map(|text| text.trim().to_string())
        .ok_or(CompletionError::NoOutput)
}

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    params: CompletionParams,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
    repaint: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl CompletionClient {
    pub fn new(config: &Config, tx: mpsc::Sender<AppEvent>) -> Result<Self, CompletionError> {
        let runtime_handle =
            Handle::try_current().map_err(|err| CompletionError::Runtime(err.to_string()))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            // A missing key is sent as an empty bearer token and surfaces as an API error.
            api_key: config.api_key.clone().unwrap_or_default(),
            params: config.params.clone(),
            tx,
            runtime_handle,
            repaint: None,
        })
    }

    /// Called after every resolution event is sent, typically `egui::Context::request_repaint`.
    pub fn with_repaint(mut self, repaint: impl Fn() + Send + Sync + 'static) -> Self {
        self.repaint = Some(Arc::new(repaint));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn complete(&self, code: &str, instruction: &str) -> Result<String, CompletionError> {
        let request = CompletionRequest::new(build_prompt(code, instruction), &self.params);
        debug!(
            endpoint = %self.endpoint,
            prompt_chars = request.prompt.len(),
            "sending completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;
        first_choice_text(&body)
    }

    /// Runs the request on the runtime and reports exactly one `CompletionResolved` event.
    pub fn submit(&self, submission: Submission) {
        let client = self.clone();
        info!(request_id = submission.id.0, "dispatching completion request");

        self.runtime_handle.spawn(async move {
            let outcome = client.complete(&submission.code, &submission.instruction).await;
            if let Err(err) = &outcome {
                error!(request_id = submission.id.0, error = %err, "error calling completion API");
            }
            let _ = client.tx.send(AppEvent::CompletionResolved {
                id: submission.id,
                outcome,
            });
            if let Some(repaint) = &client.repaint {
                repaint();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PlaygroundState, RequestId, SubmitPolicy};
    use std::io::{Read as _, Write as _};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    struct OneShotServer {
        addr: SocketAddr,
        join: JoinHandle<()>,
    }

    impl OneShotServer {
        fn respond(
            status_line: &'static str,
            body: &'static str,
            captured: Arc<Mutex<Vec<u8>>>,
        ) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind server");
            let addr = listener.local_addr().expect("server addr");
            let join = thread::spawn(move || {
                let (mut stream, _) = listener.accept().expect("accept");
                let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
                let request = read_http_request(&mut stream);
                *captured.lock().expect("capture lock") = request;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).expect("write response");
            });
            Self { addr, join }
        }

        fn url(&self) -> String {
            format!("http://127.0.0.1:{}/v1/completions", self.addr.port())
        }

        fn join(self) {
            self.join.join().expect("server thread");
        }
    }

    fn read_http_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut scratch = [0u8; 4096];

        loop {
            match stream.read(&mut scratch) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    buf.extend_from_slice(&scratch[..n]);
                    if let Some(headers_end) = find_double_crlf(&buf) {
                        let body_len = parse_content_length(&buf[..headers_end]).unwrap_or(0);
                        while buf.len() < headers_end + body_len {
                            match stream.read(&mut scratch) {
                                Ok(0) | Err(_) => break,
                                Ok(n) => buf.extend_from_slice(&scratch[..n]),
                            }
                        }
                        break;
                    }
                }
            }
        }

        buf
    }

    fn parse_content_length(headers: &[u8]) -> Option<usize> {
        let text = String::from_utf8_lossy(headers);
        text.split("\r\n").find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
    }

    fn find_double_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
    }

    fn client_for(url: String) -> (CompletionClient, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let config = Config {
            endpoint: url,
            api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let client =
            CompletionClient::new(&config, tx).expect("client should build inside runtime");
        (client, rx)
    }

    #[tokio::test]
    async fn complete_sends_contract_body_and_trims_first_choice() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let server = OneShotServer::respond(
            "200 OK",
            r#"{"choices":[{"text":"\n\nexport default App;\n  "},{"text":"ignored"}]}"#,
            Arc::clone(&captured),
        );
        let (client, _rx) = client_for(server.url());

        let text = client
            .complete("const a = 1;", "add b")
            .await
            .expect("completion should succeed");
        server.join();

        assert_eq!(text, "export default App;");
        let request = String::from_utf8_lossy(&captured.lock().expect("capture lock")).to_string();
        assert!(request.starts_with("POST /v1/completions HTTP/1.1\r\n"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test\r\n"));

        let (_, body) = request.split_once("\r\n\r\n").expect("request body");
        let body: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["n"], 1);
        assert!(body["stop"].is_null());
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["frequency_penalty"], 0.0);
        assert_eq!(body["presence_penalty"], 0.0);
        let prompt = body["prompt"].as_str().expect("prompt string");
        assert!(prompt.contains("const a = 1;"));
        assert!(prompt.contains("User: add b ."));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let server = OneShotServer::respond(
            "500 Internal Server Error",
            r#"{"error":"boom"}"#,
            captured,
        );
        let (client, _rx) = client_for(server.url());

        let error = client
            .complete("code", "prompt")
            .await
            .expect_err("500 should fail");
        server.join();

        assert_eq!(error, CompletionError::Status(500));
        assert_eq!(error.to_string(), "API response error, status: 500");
    }

    #[tokio::test]
    async fn empty_or_missing_choices_mean_no_output() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"id":"cmpl-1"}"#,
            r#"{"choices":null}"#,
            r#"{"choices":[{"finish_reason":"stop"}]}"#,
        ] {
            let captured = Arc::new(Mutex::new(Vec::new()));
            let server = OneShotServer::respond("200 OK", body, captured);
            let (client, _rx) = client_for(server.url());

            let error = client
                .complete("code", "prompt")
                .await
                .expect_err("no choices should fail");
            server.join();
            assert_eq!(error, CompletionError::NoOutput);
        }
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let server = OneShotServer::respond("200 OK", "not json", captured);
        let (client, _rx) = client_for(server.url());

        let error = client
            .complete("code", "prompt")
            .await
            .expect_err("garbage should fail");
        server.join();
        assert!(matches!(error, CompletionError::Decode(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_failure_lands_in_transcript_as_error() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let server = OneShotServer::respond("500 Internal Server Error", "{}", captured);
        let (client, rx) = client_for(server.url());
        let mut state = PlaygroundState::new("INITIAL", SubmitPolicy::AllowConcurrent);

        let submission = state.submit("break it").expect("submit");
        let id = submission.id;
        client.submit(submission);

        let event = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .expect("join receiver")
            .expect("resolution event");
        server.join();

        let AppEvent::CompletionResolved { id: resolved, outcome } = event;
        assert_eq!(resolved, id);
        state.request_resolved(resolved, outcome);

        let last = state.transcript().last().expect("error entry");
        assert!(last.is_error);
        assert!(!state.is_pending());
        assert_ne!(resolved, RequestId(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_requests_repaint_after_resolution() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let server = OneShotServer::respond("200 OK", r#"{"choices":[{"text":"ok"}]}"#, captured);
        let repaints = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&repaints);
        let (client, rx) = client_for(server.url());
        let client = client.with_repaint(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let mut state = PlaygroundState::new("INITIAL", SubmitPolicy::AllowConcurrent);

        client.submit(state.submit("anything").expect("submit"));
        let event = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .expect("join receiver")
            .expect("resolution event");
        server.join();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while repaints.load(std::sync::atomic::Ordering::SeqCst) == 0
            && std::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(repaints.load(std::sync::atomic::Ordering::SeqCst), 1);

        let AppEvent::CompletionResolved { outcome, .. } = event;
        assert_eq!(outcome, Ok("ok".to_string()));
    }

    #[test]
    fn client_requires_runtime() {
        let (tx, _rx) = mpsc::channel();
        let error = CompletionClient::new(&Config::default(), tx)
            .err()
            .expect("no runtime should fail");
        assert!(matches!(error, CompletionError::Runtime(_)));
    }
}
