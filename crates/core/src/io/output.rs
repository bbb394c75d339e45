use tokio::sync::mpsc;

/// How an operator-facing line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Robot narration and acknowledgements.
    Info,
    /// A successful conclusion.
    Success,
    /// A failure surfaced to the operator.
    Error,
    /// A question that expects an answer.
    Question,
    /// Decision and progress details.
    Detail,
}

/// An outbound line to deliver to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMessage {
    pub tone: Tone,
    pub content: String,
}

impl OutputMessage {
    pub fn new(tone: Tone, content: impl Into<String>) -> Self {
        Self { tone, content: content.into() }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(Tone::Info, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Tone::Error, content)
    }
}

/// Output channel sender. The orchestrator pushes lines here.
pub type OutputSender = mpsc::Sender<OutputMessage>;
/// Output channel receiver, consumed by the front end.
pub type OutputReceiver = mpsc::Receiver<OutputMessage>;

/// Create an output channel with the given buffer size.
pub fn channel(buffer: usize) -> (OutputSender, OutputReceiver) {
    mpsc::channel(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_tone() {
        assert_eq!(OutputMessage::info("hi").tone, Tone::Info);
        assert_eq!(OutputMessage::error("bad").content, "bad");
    }

    #[tokio::test]
    async fn channel_send_recv() {
        let (tx, mut rx) = channel(4);
        tx.send(OutputMessage::new(Tone::Success, "done")).await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, OutputMessage::new(Tone::Success, "done"));
    }
}
