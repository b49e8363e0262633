//! Health gate: refuse to start work against an endpoint that is not ready.

use crate::error::PipelineError;
use crate::pipeline::ocr::OcrBackend;
use tracing::{info, warn};

/// Probe `backend` once; anything but a healthy answer aborts the run.
///
/// Runs before the page workspace exists, so a failure here leaves nothing
/// behind on disk.
pub async fn ensure_healthy(backend: &dyn OcrBackend) -> Result<(), PipelineError> {
    if backend.check_health().await {
        info!("OCR endpoint {} is healthy", backend.endpoint());
        Ok(())
    } else {
        warn!("OCR endpoint {} failed its health check", backend.endpoint());
        Err(PipelineError::EndpointUnavailable {
            endpoint: backend.endpoint().to_string(),
        })
    }
}
