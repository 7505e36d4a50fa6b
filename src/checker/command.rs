//! External checker wrapper process
//!
//! The wrapper reads an encoded model on stdin and answers with one JSON
//! object on stdout:
//!
//! ```json
//! {"result": "verified"}
//! {"result": "counterexample", "events": [...]}
//! {"result": "counterexample", "trail": "...CSightTrace[0!m]..."}
//! {"result": "syntax-error", "message": "..."}
//! {"result": "timeout"}
//! ```

use super::{McOutcome, ModelChecker};
use crate::cfsm::Cfsm;
use crate::config::ModelFormat;
use crate::encode::{encode_for_check, parse_trace_events};
use crate::model::{BinaryInvariant, EventType};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum CheckerReply {
    Verified,
    Counterexample {
        #[serde(default)]
        events: Option<Vec<EventType>>,
        #[serde(default)]
        trail: Option<String>,
    },
    SyntaxError {
        message: String,
    },
    Timeout,
}

/// Runs a checker wrapper executable once per check
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: PathBuf,
    args: Vec<String>,
    format: ModelFormat,
    timeout: Duration,
    channel_bound: usize,
}

impl CommandChecker {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            format: ModelFormat::default(),
            timeout: Duration::from_secs(60),
            channel_bound: 5,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_channel_bound(mut self, bound: usize) -> Self {
        self.channel_bound = bound;
        self
    }

    async fn run(&self, model: String) -> Result<String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::checker(format!("failed to start {:?}: {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(model.as_bytes()).await?;
            // Dropping stdin closes the pipe so the wrapper sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::checker(format!(
                "{:?} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Maps a wrapper reply to a check outcome. Trail tags are resolved against
/// the alphabet of the checked model.
pub fn interpret_reply(reply: CheckerReply, cfsm: &Cfsm) -> Result<McOutcome> {
    match reply {
        CheckerReply::Verified => Ok(McOutcome::Verified),
        CheckerReply::Timeout => Ok(McOutcome::Inconclusive),
        CheckerReply::SyntaxError { message } => Err(Error::CheckerSyntax(message)),
        CheckerReply::Counterexample {
            events: Some(events), ..
        } => Ok(McOutcome::Counterexample(events)),
        CheckerReply::Counterexample {
            trail: Some(trail), ..
        } => Ok(McOutcome::Counterexample(parse_trace_events(&trail, &cfsm.alphabet())?)),
        CheckerReply::Counterexample { .. } => Err(Error::CheckerOutput(
            "counterexample reply carries neither events nor a trail".to_string(),
        )),
    }
}

#[async_trait]
impl ModelChecker for CommandChecker {
    async fn check(&self, cfsm: &Cfsm, invariant: &BinaryInvariant) -> Result<McOutcome> {
        let model = encode_for_check(cfsm, invariant, self.format, self.channel_bound);
        tracing::debug!("Checking {} ({} bytes of {:?})", invariant, model.len(), self.format);

        let stdout = match tokio::time::timeout(self.timeout, self.run(model)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Checker timed out after {:?} on {}", self.timeout, invariant);
                return Ok(McOutcome::Inconclusive);
            }
        };

        let reply: CheckerReply = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::CheckerOutput(format!("{}: {}", e, stdout.trim())))?;
        interpret_reply(reply, cfsm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfsm::Fsm;
    use crate::model::ChannelId;

    fn cfsm() -> (Cfsm, EventType) {
        let ch = ChannelId::new(0, 1, 0);
        let send = EventType::send("m", ch);
        let mut p0 = Fsm::new(0);
        let a = p0.add_state(true, false);
        let b = p0.add_state(false, true);
        p0.add_transition(a, send.clone(), b);
        let mut p1 = Fsm::new(1);
        p1.add_state(true, true);
        (Cfsm::new(2, vec![ch], vec![p0, p1]), send)
    }

    #[test]
    fn test_parse_replies() {
        let reply: CheckerReply = serde_json::from_str(r#"{"result":"verified"}"#).unwrap();
        assert_eq!(reply, CheckerReply::Verified);

        let reply: CheckerReply =
            serde_json::from_str(r#"{"result":"syntax-error","message":"line 3"}"#).unwrap();
        assert_eq!(
            reply,
            CheckerReply::SyntaxError {
                message: "line 3".to_string()
            }
        );

        let reply: CheckerReply = serde_json::from_str(r#"{"result":"timeout"}"#).unwrap();
        assert_eq!(reply, CheckerReply::Timeout);
    }

    #[test]
    fn test_interpret_replies() {
        let (cfsm, send) = cfsm();
        assert_eq!(interpret_reply(CheckerReply::Verified, &cfsm).unwrap(), McOutcome::Verified);
        assert_eq!(interpret_reply(CheckerReply::Timeout, &cfsm).unwrap(), McOutcome::Inconclusive);

        let trail = CheckerReply::Counterexample {
            events: None,
            trail: Some("CSightTrace[0!m]".to_string()),
        };
        assert_eq!(
            interpret_reply(trail, &cfsm).unwrap(),
            McOutcome::Counterexample(vec![send])
        );

        let err = interpret_reply(
            CheckerReply::SyntaxError {
                message: "bad".into(),
            },
            &cfsm,
        )
        .unwrap_err();
        assert!(err.is_checker_syntax());

        let empty = CheckerReply::Counterexample {
            events: None,
            trail: None,
        };
        assert!(interpret_reply(empty, &cfsm).is_err());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let (cfsm, send) = cfsm();
        let checker = CommandChecker::new("/nonexistent/cfsm-infer-checker");
        let inv = BinaryInvariant::eventually(send);
        let err = checker.check(&cfsm, &inv).await.unwrap_err();
        assert!(matches!(err, Error::Checker(_)));
    }
}
