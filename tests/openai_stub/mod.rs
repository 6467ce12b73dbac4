use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const STUB_API_KEY: &str = "sk-stub";

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubReply {
    Completion {
        text: &'static str,
        total_tokens: Option<u64>,
    },
    Error {
        status: u16,
        code: &'static str,
        kind: &'static str,
        message: &'static str,
    },
    Delayed {
        delay: Duration,
        text: &'static str,
    },
}

pub struct OpenAiStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(reply: StubReply) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/chat/completions"
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorized = request.headers().iter().any(|h| {
                    h.field.equiv("Authorization")
                        && h.value.as_str() == format!("Bearer {STUB_API_KEY}")
                });
                if !authorized {
                    let _ = request.respond(json_response(
                        401,
                        &error_body("missing bearer credential", "invalid_request_error", "invalid_api_key"),
                    ));
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };
                recorded.lock().expect("lock recorded requests").push(parsed.clone());

                let response = match &reply {
                    StubReply::Completion { text, total_tokens } => {
                        json_response(200, &completion_body(&parsed, text, *total_tokens))
                    }
                    StubReply::Error {
                        status,
                        code,
                        kind,
                        message,
                    } => json_response(*status, &error_body(message, kind, code)),
                    StubReply::Delayed { delay, text } => {
                        thread::sleep(*delay);
                        json_response(200, &completion_body(&parsed, text, Some(1)))
                    }
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Request bodies received so far, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("lock recorded requests").clone()
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn completion_body(request: &Value, text: &str, total_tokens: Option<u64>) -> Value {
    let mut body = serde_json::json!({
        "id": "chatcmpl-stub",
        "object": "chat.completion",
        "model": request.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }
        ]
    });
    if let (Some(total), Some(obj)) = (total_tokens, body.as_object_mut()) {
        obj.insert(
            "usage".to_owned(),
            serde_json::json!({ "prompt_tokens": total / 2, "completion_tokens": total - total / 2, "total_tokens": total }),
        );
    }
    body
}

fn error_body(message: &str, kind: &str, code: &str) -> Value {
    serde_json::json!({
        "error": { "message": message, "type": kind, "param": null, "code": code }
    })
}

fn json_response(status: u16, body: &Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}
