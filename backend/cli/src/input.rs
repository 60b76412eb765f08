//! Operator input: one line of stdin per speak request.
//!
//! Reading runs on a dedicated OS thread so a blocked `read` never holds up
//! runtime shutdown.

use std::io::{self, BufRead};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use falabot_core::{FalaError, PipelineMessage, Result, SpeakRequest};

/// Forward every non-blank line as a `Speak` message. Returns the number of
/// requests sent once input ends.
///
/// Must not be called from inside the async runtime.
pub fn forward_lines<R: BufRead>(reader: R, tx: &mpsc::Sender<PipelineMessage>) -> Result<usize> {
    let mut sent = 0;
    for line in reader.lines() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            debug!("Skipping blank input line");
            continue;
        }
        tx.blocking_send(PipelineMessage::Speak(SpeakRequest::new(text)))
            .map_err(|_| FalaError::ChannelClosed("pipeline queue closed".into()))?;
        sent += 1;
    }
    Ok(sent)
}

/// Start the stdin reader thread; the receiver resolves when input ends.
pub fn spawn_stdin_reader(tx: mpsc::Sender<PipelineMessage>) -> Result<oneshot::Receiver<Result<usize>>> {
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            info!("Reading lines from standard input");
            let result = forward_lines(io::stdin().lock(), &tx);
            let _ = done_tx.send(result);
        })?;
    Ok(done_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_non_blank_lines_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = "ola\n\n  mundo  \r\n\t\nfim";

        let sent = forward_lines(input.as_bytes(), &tx).unwrap();
        assert_eq!(sent, 3);

        let mut texts = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                PipelineMessage::Speak(req) => texts.push(req.text),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(texts, vec!["ola", "mundo", "fim"]);
    }

    #[test]
    fn closed_queue_stops_reading() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = forward_lines("ola\n".as_bytes(), &tx).unwrap_err();
        assert!(matches!(err, FalaError::ChannelClosed(_)));
    }

    #[test]
    fn empty_input_sends_nothing() {
        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(forward_lines("".as_bytes(), &tx).unwrap(), 0);
    }
}
