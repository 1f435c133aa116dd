pub mod http;
pub mod retry;

use std::future::Future;

use crate::error::VerdictError;

/// One model call: send a prompt, get raw text back. Implementations
/// classify failures into the crate's error taxonomy so the retry layer can
/// tell transient from fatal. The pipeline is generic over this seam — tests
/// substitute scripted transports.
pub trait ModelTransport: Send + Sync {
    fn call_once(
        &self,
        prompt: &str,
        max_tokens: u64,
    ) -> impl Future<Output = Result<String, VerdictError>> + Send;
}
