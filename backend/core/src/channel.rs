use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{FalaError, Result};
use crate::message::PipelineMessage;

/// Default queue depth between producers and the coordinator.
const DEFAULT_BUFFER_SIZE: usize = 64;

/// The queue connecting the gateway handler and the operator input reader
/// to the single pipeline coordinator.
///
/// Producers clone the `Sender`; the coordinator takes the `Receiver` once.
/// Built on a bounded Tokio mpsc channel for backpressure.
pub struct PipelineBus {
    pub tx: mpsc::Sender<PipelineMessage>,
    rx: Option<mpsc::Receiver<PipelineMessage>>,
}

impl PipelineBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        info!(buffer_size = buffer, "PipelineBus initialized");
        Self { tx, rx: Some(rx) }
    }

    /// A new producer handle.
    pub fn sender(&self) -> mpsc::Sender<PipelineMessage> {
        self.tx.clone()
    }

    /// Take the coordinator receiver (can only be called once).
    pub fn take_rx(&mut self) -> Option<mpsc::Receiver<PipelineMessage>> {
        debug!("Pipeline receiver taken");
        self.rx.take()
    }

    /// Enqueue a message, mapping a closed queue to `ChannelClosed`.
    pub async fn send(&self, msg: PipelineMessage) -> Result<()> {
        let label = msg.label();
        self.tx
            .send(msg)
            .await
            .map_err(|_| FalaError::ChannelClosed(format!("pipeline queue dropped {label} message")))
    }
}

impl Default for PipelineBus {
    fn default() -> Self {
        Self::new()
    }
}
