//! Test utilities for common test setup.
//!
//! Provides a scripted [`BrewRunner`] so coordinator tests never spawn a real
//! backend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::{
    BrewRunner, CommandResult, OutputLine, OutputSink, OutputStream, RunnerError,
};

/// One scripted reply.
#[derive(Clone, Debug)]
enum Reply {
    Output(CommandResult),
    SpawnFailure(String),
}

/// What: Runner that answers from a table keyed by the exact argument list.
///
/// Details:
/// - Replies queue per argument list; the last reply repeats once the queue
///   is down to one entry.
/// - Unscripted calls exit 1 with an `unscripted` diagnostic.
/// - With a gate set, every call waits for one `notify_one` before replying.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<HashMap<Vec<String>, VecDeque<Reply>>>,
    calls: Mutex<Vec<Vec<String>>>,
    gate: Option<Arc<Notify>>,
}

fn key(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

impl ScriptedRunner {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn push(&self, args: &[&str], reply: Reply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key(args))
            .or_default()
            .push_back(reply);
    }

    /// Queue a successful reply with `stdout`.
    pub fn ok(&self, args: &[&str], stdout: &str) -> &Self {
        self.push(
            args,
            Reply::Output(CommandResult {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            }),
        );
        self
    }

    /// Queue a non-zero exit with `stderr`.
    pub fn fail(&self, args: &[&str], exit_code: i32, stderr: &str) -> &Self {
        self.push(
            args,
            Reply::Output(CommandResult {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            }),
        );
        self
    }

    /// Queue a spawn failure with `message` as the OS error text.
    pub fn spawn_failure(&self, args: &[&str], message: &str) -> &Self {
        self.push(args, Reply::SpawnFailure(message.to_string()));
        self
    }

    /// Every argument list seen so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `args` was called.
    pub fn call_count(&self, args: &[&str]) -> usize {
        let wanted = key(args);
        self.calls().iter().filter(|c| **c == wanted).count()
    }

    async fn answer(&self, args: &[String]) -> Result<CommandResult, RunnerError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.to_vec());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let reply = {
            let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
            replies.get_mut(args).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        match reply {
            Some(Reply::Output(result)) => Ok(result),
            Some(Reply::SpawnFailure(message)) => Err(RunnerError::Spawn {
                program: "brew".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }),
            None => Ok(CommandResult {
                stdout: String::new(),
                stderr: format!("unscripted: {}", args.join(" ")),
                exit_code: 1,
            }),
        }
    }
}

#[async_trait]
impl BrewRunner for ScriptedRunner {
    async fn run(&self, args: &[String]) -> Result<CommandResult, RunnerError> {
        self.answer(args).await
    }

    async fn run_streaming(
        &self,
        args: &[String],
        sink: OutputSink,
    ) -> Result<CommandResult, RunnerError> {
        let result = self.answer(args).await?;
        for (stream, text) in [
            (OutputStream::Stdout, &result.stdout),
            (OutputStream::Stderr, &result.stderr),
        ] {
            for line in text.lines() {
                let _ = sink.send(OutputLine {
                    stream,
                    text: line.to_string(),
                });
            }
        }
        Ok(result)
    }
}
