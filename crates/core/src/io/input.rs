use tokio::sync::mpsc;

/// Input channel sender. The operator listener pushes raw lines here.
pub type InputSender = mpsc::Sender<String>;
/// Input channel receiver, drained by the session.
pub type InputReceiver = mpsc::Receiver<String>;

/// Create an input channel with the given buffer size.
pub fn channel(buffer: usize) -> (InputSender, InputReceiver) {
    mpsc::channel(buffer)
}

/// Submit one line of operator text. Surrounding whitespace is trimmed.
pub async fn submit_line(
    tx: &InputSender,
    text: impl AsRef<str>,
) -> Result<(), mpsc::error::SendError<String>> {
    tx.send(text.as_ref().trim().to_owned()).await
}
