use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TryRecvError;

use super::input::InputReceiver;
use super::output::{OutputMessage, OutputSender, Tone};

/// The human at the other end of the session.
#[async_trait::async_trait]
pub trait Operator: Send {
    async fn say(&mut self, message: OutputMessage);

    /// Ask a question and wait for the reply. `None` once input is closed.
    async fn ask(&mut self, question: &str) -> Option<String>;

    /// Next pending line, without waiting.
    fn try_next(&mut self) -> Option<String>;

    /// Whether the operator can no longer send input.
    fn is_closed(&self) -> bool;
}

/// Operator reached through the session's input and output channels.
pub struct ChannelOperator {
    input: InputReceiver,
    output: OutputSender,
    closed: bool,
}

impl ChannelOperator {
    pub fn new(input: InputReceiver, output: OutputSender) -> Self {
        Self { input, output, closed: false }
    }
}

#[async_trait::async_trait]
impl Operator for ChannelOperator {
    async fn say(&mut self, message: OutputMessage) {
        if self.output.send(message).await.is_err() {
            tracing::debug!("output channel closed, message dropped");
        }
    }

    async fn ask(&mut self, question: &str) -> Option<String> {
        self.say(OutputMessage::new(Tone::Question, question)).await;
        let line = self.input.recv().await;
        if line.is_none() {
            self.closed = true;
        }
        line
    }

    fn try_next(&mut self) -> Option<String> {
        match self.input.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Shared record of everything said to a [`ScriptedOperator`].
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<OutputMessage>>>);

impl Transcript {
    fn push(&self, message: OutputMessage) {
        if let Ok(mut messages) = self.0.lock() {
            messages.push(message);
        }
    }

    pub fn messages(&self) -> Vec<OutputMessage> {
        self.0.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Whether any line of the given tone contains `needle`.
    pub fn contains(&self, tone: Tone, needle: &str) -> bool {
        self.messages().iter().any(|m| m.tone == tone && m.content.contains(needle))
    }
}

/// Operator that replays a fixed list of lines, for tests and demos.
/// Questions and pending input draw from the same queue.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    lines: VecDeque<String>,
    transcript: Transcript,
}

impl ScriptedOperator {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect(), transcript: Transcript::default() }
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }
}

#[async_trait::async_trait]
impl Operator for ScriptedOperator {
    async fn say(&mut self, message: OutputMessage) {
        self.transcript.push(message);
    }

    async fn ask(&mut self, question: &str) -> Option<String> {
        self.transcript.push(OutputMessage::new(Tone::Question, question));
        self.lines.pop_front()
    }

    fn try_next(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn is_closed(&self) -> bool {
        self.lines.is_empty()
    }
}
