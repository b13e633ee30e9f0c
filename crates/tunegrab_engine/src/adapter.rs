use tokio_util::sync::CancellationToken;

use crate::{AdapterEvent, ConversionError, ConversionOutput, ConversionRequest};

/// Receives progress from an adapter. Called from the task that runs the
/// conversion, so events for one request arrive in order.
pub trait ProgressSink {
    fn emit(&mut self, event: AdapterEvent);
}

/// Fetches one item and transcodes it to audio.
///
/// Implementations must be safe to call concurrently for different requests.
/// They should check `cancel` between units of work and return
/// [`FailureKind::Interrupted`](crate::FailureKind::Interrupted) once it fires.
#[async_trait::async_trait]
pub trait ConversionAdapter: Send + Sync {
    async fn convert(
        &self,
        request: &ConversionRequest,
        sink: &mut (dyn ProgressSink + Send),
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConversionError>;
}
