//! Asynchronous error reporting for secure channels.
//!
//! A channel's background task reports transport and security failures on an
//! [`ErrorSink`] at any time. The owner of the receiving half must keep
//! draining it; [`spawn_error_drain`] does so on its own task.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::ProtocolError;
use crate::utils::metrics;

/// Sending half handed to a secure channel
pub type ErrorSink = mpsc::Sender<ProtocolError>;

/// Receiving half kept by the channel owner
pub type ErrorStream = mpsc::Receiver<ProtocolError>;

/// Create a bounded error channel
pub fn error_channel(capacity: usize) -> (ErrorSink, ErrorStream) {
    mpsc::channel(capacity.max(1))
}

/// Report `error` on `sink`. Returns `false` once nobody is draining.
pub async fn report(sink: &ErrorSink, error: ProtocolError) -> bool {
    match sink.send(error).await {
        Ok(()) => true,
        Err(mpsc::error::SendError(dropped)) => {
            warn!(error = %dropped, "Error sink closed, dropping channel error");
            false
        }
    }
}

/// Log and count every error until all senders are dropped.
///
/// The task resolves to the number of errors it drained.
pub fn spawn_error_drain(mut errors: ErrorStream) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut drained = 0u64;
        while let Some(e) = errors.recv().await {
            drained += 1;
            metrics::global().channel_error();
            error!(error = %e, "Secure channel error");
        }
        debug!(drained, "Error sink closed");
        drained
    })
}
