//! Subprocess generation backend.
//!
//! Spawns the configured bridge program and talks to it with a JSON-lines
//! protocol over stdin/stdout:
//!
//! - bridge → `{"type":"ready"}` once at startup
//! - us → `{"type":"generate","id":..,"model":..,"prompt":..,"schema":{..}}`
//! - bridge → `{"type":"result","id":..,"output":{..},"tokens_in":..,"tokens_out":..}`
//!   or `{"type":"error","id":..,"error":".."}`
//! - us → `{"type":"shutdown"}`

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use blockwise_shared::{BlockwiseError, BridgeConfig, Result};

use crate::backend::GenerationBackend;
use crate::schema::{GenerationResponse, ResponseSchema};

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestMessage<'a> {
    Generate {
        id: String,
        model: &'a str,
        prompt: &'a str,
        schema: serde_json::Value,
    },
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseMessage {
    Ready,
    Result {
        id: String,
        #[serde(default)]
        output: Option<serde_json::Value>,
        #[serde(default)]
        tokens_in: u64,
        #[serde(default)]
        tokens_out: u64,
    },
    Error {
        id: String,
        error: String,
    },
}

/// Token usage accumulated over a bridge session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Turn a bridge `output` into a response map.
///
/// Accepts a JSON object, or a string holding one (raw model text). Anything
/// else is treated as no response.
fn into_response(output: serde_json::Value) -> Option<GenerationResponse> {
    match output {
        serde_json::Value::Object(map) => Some(map),
        serde_json::Value::String(text) => {
            match serde_json::from_str::<serde_json::Value>(text.trim()) {
                Ok(serde_json::Value::Object(map)) => Some(map),
                _ => None,
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Bridge backend
// ---------------------------------------------------------------------------

/// One live bridge process and its pipes.
struct Session {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl Session {
    /// Spawn the bridge and wait for its ready signal.
    async fn start(config: &BridgeConfig) -> Result<Self> {
        info!(cmd = %config.command, args = ?config.args, "spawning generation bridge");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(&config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Bridge logs go to parent stderr
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BlockwiseError::transport(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BlockwiseError::transport("failed to capture bridge stdin"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BlockwiseError::transport("failed to capture bridge stdout"))?;

        let mut session = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };

        session.wait_for_ready().await?;
        Ok(session)
    }

    async fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message().await? {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(())
            }
            other => Err(BlockwiseError::transport(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    async fn write_message(&mut self, msg: &RequestMessage<'_>) -> Result<()> {
        let mut json = serde_json::to_string(msg).map_err(|e| {
            BlockwiseError::generation(format!("failed to serialize request: {e}"))
        })?;
        json.push('\n');

        self.stdin.write_all(json.as_bytes()).await.map_err(|e| {
            BlockwiseError::transport(format!("failed to write to bridge stdin: {e}"))
        })?;
        self.stdin
            .flush()
            .await
            .map_err(|e| BlockwiseError::transport(format!("failed to flush bridge stdin: {e}")))
    }

    async fn read_message(&mut self) -> Result<ResponseMessage> {
        let line = self
            .lines
            .next_line()
            .await
            .map_err(|e| BlockwiseError::transport(format!("bridge read error: {e}")))?
            .ok_or_else(|| BlockwiseError::transport("bridge closed stdout unexpectedly"))?;

        serde_json::from_str(line.trim()).map_err(|e| {
            let preview: String = line.chars().take(200).collect();
            BlockwiseError::generation(format!("invalid bridge message: {e} (got: {preview})"))
        })
    }

    /// Kill the process without asking; used when its state is unknown.
    async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("bridge kill failed: {e}");
        }
        match self.child.wait().await {
            Ok(status) => debug!(?status, "abandoned bridge exited"),
            Err(e) => warn!("bridge wait error: {e}"),
        }
    }
}

/// Handle to the spawned bridge subprocess.
///
/// A request whose future is dropped before its reply arrives leaves the
/// session mid-exchange; the next [`GenerationBackend::recover`] (or the next
/// `generate`) replaces the process so later requests never wait behind it.
pub struct BridgeBackend {
    config: BridgeConfig,
    session: Session,
    in_flight: bool,
    request_counter: u64,
    restarts: u32,
    usage: TokenUsage,
}

impl BridgeBackend {
    /// Spawn the bridge and wait for its ready signal.
    pub async fn spawn(config: &BridgeConfig) -> Result<Self> {
        let session = Session::start(config).await?;
        Ok(Self {
            config: config.clone(),
            session,
            in_flight: false,
            request_counter: 0,
            restarts: 0,
            usage: TokenUsage::default(),
        })
    }

    /// Tokens reported by the bridge so far.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// How many times the bridge process was replaced after an abandoned request.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    async fn restart(&mut self) -> Result<()> {
        warn!(
            requests = self.request_counter,
            "restarting bridge after an abandoned request"
        );
        self.session.kill().await;
        self.session = Session::start(&self.config).await?;
        self.in_flight = false;
        self.restarts += 1;
        Ok(())
    }

    async fn exchange(
        &mut self,
        id: &str,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Option<GenerationResponse>> {
        self.session
            .write_message(&RequestMessage::Generate {
                id: id.to_string(),
                model: &self.config.model,
                prompt,
                schema: schema.to_json_schema(),
            })
            .await?;

        // Replies to an earlier request on this session may still be queued.
        loop {
            match self.session.read_message().await? {
                ResponseMessage::Result {
                    id: resp_id,
                    output,
                    tokens_in,
                    tokens_out,
                } => {
                    self.usage.tokens_in += tokens_in;
                    self.usage.tokens_out += tokens_out;
                    if resp_id != id {
                        debug!(expected = %id, got = %resp_id, "discarding stale bridge result");
                        continue;
                    }
                    return Ok(output.and_then(into_response));
                }
                ResponseMessage::Error { id: resp_id, error } => {
                    if resp_id != id {
                        debug!(expected = %id, got = %resp_id, "discarding stale bridge error");
                        continue;
                    }
                    warn!(id = %id, %error, "bridge reported a generation failure");
                    return Ok(None);
                }
                ResponseMessage::Ready => {
                    return Err(BlockwiseError::generation(
                        "unexpected ready message during generation",
                    ));
                }
            }
        }
    }

    /// Send shutdown and wait for the bridge to exit.
    pub async fn shutdown(mut self) -> Result<TokenUsage> {
        if self.in_flight {
            self.session.kill().await;
        } else {
            let _ = self.session.write_message(&RequestMessage::Shutdown).await;
            match self.session.child.wait().await {
                Ok(status) => info!(?status, "bridge exited"),
                Err(e) => warn!("bridge wait error: {e}"),
            }
        }

        info!(
            tokens_in = self.usage.tokens_in,
            tokens_out = self.usage.tokens_out,
            requests = self.request_counter,
            restarts = self.restarts,
            "bridge session finished"
        );
        Ok(self.usage)
    }
}

impl GenerationBackend for BridgeBackend {
    async fn generate(
        &mut self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Option<GenerationResponse>> {
        if self.in_flight {
            self.restart().await?;
        }

        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        // Cleared only when the exchange runs to completion; a dropped future
        // leaves it set.
        self.in_flight = true;
        let outcome = self.exchange(&id, prompt, schema).await;
        self.in_flight = false;
        outcome
    }

    async fn recover(&mut self) -> Result<()> {
        if self.in_flight {
            self.restart().await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_message_serializes_correctly() {
        let msg = RequestMessage::Generate {
            id: "req-1".into(),
            model: "test-model",
            prompt: "Summarize this",
            schema: ResponseSchema::summary().to_json_schema(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"generate"#));
        assert!(json.contains(r#""id":"req-1"#));
        assert!(json.contains(r#""model":"test-model"#));
        assert!(json.contains(r#""required":["analysis","summary"]"#));
    }

    #[test]
    fn shutdown_message_serializes_correctly() {
        let json = serde_json::to_string(&RequestMessage::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn response_message_deserializes_result() {
        let json = r#"{"type":"result","id":"req-1","output":{"analysis":"a","summary":"Revenue grew."},"tokens_in":100,"tokens_out":20}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        match msg {
            ResponseMessage::Result {
                id,
                output,
                tokens_in,
                tokens_out,
            } => {
                assert_eq!(id, "req-1");
                assert_eq!(tokens_in, 100);
                assert_eq!(tokens_out, 20);
                let map = output.and_then(into_response).unwrap();
                assert_eq!(map["summary"], "Revenue grew.");
            }
            _ => panic!("expected Result"),
        }
    }

    #[test]
    fn response_message_null_output() {
        let json = r#"{"type":"result","id":"req-3","output":null}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ResponseMessage::Result { output: None, .. }));
    }

    #[test]
    fn response_message_deserializes_error() {
        let json = r#"{"type":"error","id":"req-2","error":"rate limited"}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        match msg {
            ResponseMessage::Error { id, error } => {
                assert_eq!(id, "req-2");
                assert_eq!(error, "rate limited");
            }
            _ => panic!("expected Error"),
        }
    }

    #[test]
    fn into_response_accepts_objects_and_json_text() {
        let obj = serde_json::json!({"summary": "x"});
        assert!(into_response(obj).is_some());

        let text = serde_json::json!(" {\"analysis\":\"a\",\"summary\":\"Short text.\"} ");
        assert_eq!(into_response(text).unwrap()["summary"], "Short text.");

        assert!(into_response(serde_json::json!("not json")).is_none());
        assert!(into_response(serde_json::json!([1, 2])).is_none());
        assert!(into_response(serde_json::json!("[1, 2]")).is_none());
    }

    #[cfg(unix)]
    fn sh_bridge(script: &str) -> BridgeConfig {
        BridgeConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: ".".into(),
            model: "test-model".into(),
            ..BridgeConfig::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_roundtrip_with_shell_script() {
        let script = r#"
printf '{"type":"ready"}\n'
read line
printf '{"type":"result","id":"req-1","output":{"analysis":"a","summary":"A valid summary."},"tokens_in":7,"tokens_out":3}\n'
read line
printf '{"type":"error","id":"req-2","error":"quota exceeded"}\n'
read line
"#;
        let mut bridge = BridgeBackend::spawn(&sh_bridge(script)).await.unwrap();
        let schema = ResponseSchema::summary();

        let first = bridge.generate("prompt one", &schema).await.unwrap().unwrap();
        assert_eq!(first["summary"], "A valid summary.");

        let second = bridge.generate("prompt two", &schema).await.unwrap();
        assert!(second.is_none());

        let usage = bridge.shutdown().await.unwrap();
        assert_eq!(usage, TokenUsage { tokens_in: 7, tokens_out: 3 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_skips_stale_results() {
        let script = r#"
printf '{"type":"ready"}\n'
read line
printf '{"type":"result","id":"req-0","output":{"summary":"Old answer here."}}\n'
printf '{"type":"result","id":"req-1","output":{"summary":"Fresh answer here."}}\n'
read line
"#;
        let mut bridge = BridgeBackend::spawn(&sh_bridge(script)).await.unwrap();
        let out = bridge
            .generate("prompt", &ResponseSchema::summary())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out["summary"], "Fresh answer here.");
        bridge.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_closed_stdout_is_an_error() {
        let script = r#"
printf '{"type":"ready"}\n'
read line
"#;
        let mut bridge = BridgeBackend::spawn(&sh_bridge(script)).await.unwrap();
        let err = bridge
            .generate("prompt", &ResponseSchema::summary())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("closed stdout"));
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_restarts_after_abandoned_request() {
        use std::time::Duration;

        // First process answers after 2s; its replacement answers at once.
        let marker = std::env::temp_dir().join(format!("bw-bridge-restart-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let script = format!(
            r#"
printf '{{"type":"ready"}}\n'
if [ -e '{marker}' ]; then delay=0; else : > '{marker}'; delay=2; fi
while read line; do
  case "$line" in *'"shutdown"'*) exit 0;; esac
  id=$(printf '%s' "$line" | sed 's/.*"id":"\([^"]*\)".*/\1/')
  sleep $delay
  printf '{{"type":"result","id":"%s","output":{{"summary":"Answered promptly."}}}}\n' "$id"
done
"#,
            marker = marker.display()
        );
        let schema = ResponseSchema::summary();
        let mut bridge = BridgeBackend::spawn(&sh_bridge(&script)).await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(300), bridge.generate("slow", &schema)).await;
        assert!(abandoned.is_err());

        // No explicit recover: the next request replaces the busy process itself.
        let out = tokio::time::timeout(Duration::from_millis(1500), bridge.generate("fast", &schema))
            .await
            .expect("second request waited behind the abandoned one")
            .unwrap()
            .unwrap();
        assert_eq!(out["summary"], "Answered promptly.");
        assert_eq!(bridge.restarts(), 1);

        bridge.shutdown().await.unwrap();
        let _ = std::fs::remove_file(&marker);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recover_is_a_no_op_when_idle() {
        let script = r#"
printf '{"type":"ready"}\n'
read line
printf '{"type":"result","id":"req-1","output":{"summary":"A valid summary."}}\n'
read line
"#;
        let mut bridge = BridgeBackend::spawn(&sh_bridge(script)).await.unwrap();
        bridge.generate("prompt", &ResponseSchema::summary()).await.unwrap();
        bridge.recover().await.unwrap();
        assert_eq!(bridge.restarts(), 0);
        bridge.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bridge_without_ready_fails_to_spawn() {
        let script = r#"printf '{"type":"error","id":"x","error":"boot failed"}\n'"#;
        let err = BridgeBackend::spawn(&sh_bridge(script)).await.err().unwrap();
        assert!(err.is_fatal());
    }
}
