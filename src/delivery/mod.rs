//! Length-bounded, duty-cycle-aware reply delivery
//!
//! LoRa mesh frames carry a hard per-message character budget, and the
//! radio may only transmit a small fraction of the time. This module
//! adapts arbitrary-length agent replies to both constraints:
//!
//! - [`segmenter`] splits a reply into word-boundary chunks, each within
//!   the wire limit once its ` (i/n)` position marker is appended.
//! - [`pacer`] sends the chunks strictly in order, sleeping the mandatory
//!   inter-transmission delay and retrying transient send failures a
//!   bounded number of times.
//!
//! [`deliver`] composes the two and is the only entry point the daemon
//! uses.

pub mod pacer;
pub mod segmenter;

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::transport::{Destination, MeshTransport};

pub use pacer::{DeliveryReport, Pacer};
pub use segmenter::{Segmented, split_message};

/// Default maximum characters per wire message, matching common LoRa
/// mesh payload budgets
pub const DEFAULT_MESSAGE_LIMIT: usize = 120;

/// Default pause between transmissions (seconds), chosen for EU868-style
/// duty-cycle limits
pub const DEFAULT_INTER_CHUNK_DELAY_SECS: f64 = 5.0;

/// Default number of additional attempts after a failed send
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Errors from segmentation or paced delivery
///
/// Every variant is returned to the caller as a typed result; none of
/// them is fatal to the host process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Input text was empty or whitespace-only; rejected before any send
    #[error("reply content is empty")]
    EmptyContent,

    /// Configured limit cannot fit a single-word chunk plus its suffix
    #[error("message limit {limit} too small to fit a position suffix")]
    LimitTooSmall {
        /// The rejected limit
        limit: usize,
    },

    /// A chunk exhausted its retries; later chunks were not sent
    #[error("chunk {index} failed after all retry attempts")]
    ChunkSendFailed {
        /// 1-based index of the failed chunk
        index: usize,
    },

    /// Host cancelled the delivery between chunks
    #[error("delivery cancelled")]
    Cancelled,
}

/// Tuning for one delivery operation
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Maximum characters per wire message, including the position suffix
    pub limit: usize,
    /// Mandatory pause before every send attempt after the first
    pub inter_chunk_delay: Duration,
    /// Additional attempts after a failed send of the same chunk
    pub max_retries: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_MESSAGE_LIMIT,
            inter_chunk_delay: Duration::from_secs_f64(DEFAULT_INTER_CHUNK_DELAY_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Segment `text` and deliver the chunks to `destination` in order
///
/// This is the sole public delivery operation. Chunks already sent when
/// an error occurs are not recalled; callers must treat the operation as
/// a best-effort, at-most-once-per-chunk multi-chunk send.
///
/// # Errors
///
/// Returns [`DeliveryError::EmptyContent`] or
/// [`DeliveryError::LimitTooSmall`] before any send attempt,
/// [`DeliveryError::ChunkSendFailed`] when a chunk exhausts its retries,
/// and [`DeliveryError::Cancelled`] when the host cancels between chunks.
pub async fn deliver<T: MeshTransport + ?Sized>(
    transport: &T,
    destination: &Destination,
    text: &str,
    config: &DeliveryConfig,
    cancel: &CancellationToken,
) -> Result<DeliveryReport, DeliveryError> {
    let segmented = split_message(text, config.limit)?;

    if segmented.truncated_words > 0 {
        tracing::warn!(
            destination = %destination,
            truncated_words = segmented.truncated_words,
            limit = config.limit,
            "oversized word(s) truncated to fit the wire limit"
        );
    }

    let pacer = Pacer::new(config.inter_chunk_delay, config.max_retries);
    pacer
        .deliver(transport, destination, &segmented.chunks, cancel)
        .await
}
