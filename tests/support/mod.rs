//! Shared fixtures for CLI integration tests
//!
//! `Workspace` lays out a config file, a prompt set and a results directory
//! in a temp dir. `StubServer` answers OpenAI-style chat completions on
//! 127.0.0.1 so the model-calling commands run offline.

#![allow(dead_code)]

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Get a Command for llm-eval with a clean environment
pub fn llm_eval() -> Command {
    let mut cmd = cargo_bin_cmd!("llm-eval");
    cmd.env_remove("LLM_EVAL_CONFIG")
        .env_remove("LLM_EVAL_LOG")
        .env_remove("RUST_LOG")
        .env("OPENAI_API_KEY", "test-key");
    cmd
}

/// Maps a decoded request body to a status code and JSON reply
pub type Reply = fn(&Value) -> (u16, Value);

/// Chat-completion reply carrying `content`
pub fn chat(content: &str) -> Value {
    json!({
        "model": "stub",
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8}
    })
}

/// Judge scores 4, scorer returns {0.8, 0.9}, every other model answers "42"
pub fn default_reply(request: &Value) -> (u16, Value) {
    match request["model"].as_str() {
        Some("stub-judge") => (200, chat(r#"{"score": 4, "rationale": "Correct and clear."}"#)),
        Some("stub-scorer") => (200, chat(r#"{"correctness": 0.8, "coherence": 0.9}"#)),
        Some("stub-broken") => (401, json!({"error": {"message": "invalid api key"}})),
        _ => (200, chat("The answer is 42.")),
    }
}

/// Minimal HTTP/1.1 server handling one request per connection
pub struct StubServer {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = handle(stream, reply);
            }
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            requests,
        }
    }

    /// Requests served so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn handle(stream: TcpStream, reply: Reply) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (status, payload) = reply(&request);
    let text = payload.to_string();

    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        if status < 400 { "OK" } else { "Error" },
        text.len(),
        text
    )?;
    stream.flush()
}

pub const PROMPTS: &str = r#"{
  "prompts": [
    {
      "id": "R01",
      "category": "Reasoning",
      "difficulty": "easy",
      "prompt": "What is 6 times 7?",
      "ideal": "42",
      "criteria": ["States 42"]
    },
    {
      "id": "R02",
      "category": "Reasoning",
      "difficulty": "hard",
      "prompt": "What is the answer to everything?",
      "ideal": "42",
      "check_type": "reasoning"
    },
    {
      "id": "W01",
      "category": "Writing",
      "difficulty": "medium",
      "prompt": "Write a 200 word story.",
      "check_type": "word_count",
      "target_words": 200
    }
  ]
}
"#;

/// Config with m1, m2, a broken model, a judge and a secondary scorer
pub fn full_config(base_url: &str) -> String {
    format!(
        r#"models:
  m1:
    provider: openai
    model: stub-m1
    base_url: {base}
  m2:
    provider: openai
    model: stub-m2
    base_url: {base}
  broken:
    provider: openai
    model: stub-broken
    base_url: {base}
  judge:
    provider: openai
    model: stub-judge
    base_url: {base}
  scorer:
    provider: openai
    model: stub-scorer
    base_url: {base}
judge:
  model: judge
secondary:
  model: scorer
  metrics: [correctness, coherence]
scoring:
  judge_weight: 0.5
  secondary_weight: 0.5
eval:
  timeout_secs: 10
  max_attempts: 2
  backoff_ms: 10
paths:
  prompts: prompts.json
  results: results
"#,
        base = base_url
    )
}

/// Temp dir holding `config.yaml`, `prompts.json` and `results/`
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.yaml"), config).unwrap();
        fs::write(dir.path().join("prompts.json"), PROMPTS).unwrap();
        Self { dir }
    }

    /// Full config pointed at a running stub
    pub fn with_stub(server: &StubServer) -> Self {
        Self::new(&full_config(&server.base_url))
    }

    /// Command running inside the workspace, picking up `config.yaml`
    pub fn cmd(&self) -> Command {
        let mut cmd = llm_eval();
        cmd.current_dir(self.dir.path());
        cmd
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Parsed history file of a model
    pub fn ledger(&self, model_id: &str) -> Value {
        let path = self.path("results").join(format!("{}.json", model_id));
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    /// Run `eval` for a model and assert success
    pub fn eval(&self, model_id: &str) {
        self.cmd().args(["eval", model_id]).assert().success();
    }
}

/// Parse stdout of a JSON-format command
pub fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Parse the error envelope written to stderr
pub fn stderr_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stderr).unwrap()
}
