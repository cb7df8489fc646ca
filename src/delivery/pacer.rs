//! Paced, retried chunk delivery
//!
//! The radio's duty cycle demands a mandatory pause between
//! transmissions; the pacer owns that pause, the per-chunk retry budget,
//! and the strict ordering guarantee. One delivery walks the state
//! machine `PENDING -> SENDING(i) -> {SENDING(i+1) | RETRYING(i) |
//! FAILED(i) | DONE}`; the loop below is that machine.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::DeliveryError;
use crate::transport::{Destination, MeshTransport};

/// Outcome of a fully successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of chunks delivered (all of them, in order, no gaps)
    pub chunks_sent: usize,
    /// Total send attempts made, including failed ones that were retried
    pub attempts: usize,
}

/// Sequences chunk sends with mandatory pacing and bounded retry
#[derive(Debug, Clone)]
pub struct Pacer {
    inter_chunk_delay: Duration,
    max_retries: u32,
}

impl Pacer {
    /// Create a pacer with the given pause and retry budget
    #[must_use]
    pub const fn new(inter_chunk_delay: Duration, max_retries: u32) -> Self {
        Self {
            inter_chunk_delay,
            max_retries,
        }
    }

    /// Deliver `chunks` to `destination` strictly in order
    ///
    /// The mandatory pause is applied before every send attempt after the
    /// very first — between successive chunks and again before each retry
    /// of the same chunk, staying conservative with the duty cycle. There
    /// is no pause after the final chunk.
    ///
    /// Cancellation is honored only between chunks: a chunk already in
    /// flight completes or fails per the normal retry policy first.
    /// Chunks sent before a failure or cancellation are not recalled.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ChunkSendFailed`] with the 1-based index
    /// of the chunk that exhausted its attempts, or
    /// [`DeliveryError::Cancelled`] when stopped between chunks.
    pub async fn deliver<T: MeshTransport + ?Sized>(
        &self,
        transport: &T,
        destination: &Destination,
        chunks: &[String],
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        let total = chunks.len();
        let mut attempts_made = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            let index = i + 1;

            // Honor cancellation before initiating the next chunk
            if cancel.is_cancelled() {
                tracing::info!(%destination, index, total, "delivery cancelled");
                return Err(DeliveryError::Cancelled);
            }

            let mut attempt = 0u32;
            loop {
                if i > 0 && attempt == 0 {
                    // Pause between chunks; a cancel here stops before the
                    // next send is initiated
                    tokio::select! {
                        () = cancel.cancelled() => {
                            tracing::info!(%destination, index, total, "delivery cancelled");
                            return Err(DeliveryError::Cancelled);
                        }
                        () = tokio::time::sleep(self.inter_chunk_delay) => {}
                    }
                } else if attempt > 0 {
                    // Retrying the in-flight chunk: the duty-cycle pause
                    // still applies, but cancellation does not
                    tokio::time::sleep(self.inter_chunk_delay).await;
                }

                attempts_made += 1;
                tracing::debug!(%destination, index, total, attempt, "sending chunk");

                match transport.send(destination, chunk).await {
                    Ok(()) => break,
                    Err(e) if attempt < self.max_retries => {
                        tracing::warn!(
                            %destination,
                            index,
                            attempt,
                            error = %e,
                            "chunk send failed, retrying"
                        );
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            %destination,
                            index,
                            total,
                            error = %e,
                            "chunk send failed, halting delivery"
                        );
                        return Err(DeliveryError::ChunkSendFailed { index });
                    }
                }
            }
        }

        tracing::debug!(%destination, total, attempts = attempts_made, "delivery complete");
        Ok(DeliveryReport {
            chunks_sent: total,
            attempts: attempts_made,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::{Error, Result};

    const DELAY: Duration = Duration::from_secs(5);

    /// Transport that records sends and fails according to a script
    struct ScriptedTransport {
        /// (chunk text, send instant) for every successful send
        sent: Mutex<Vec<(String, Instant)>>,
        /// Outcome per call in order; missing entries succeed
        failures: Mutex<VecDeque<bool>>,
        /// Every call, successful or not
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn always_ok() -> Self {
            Self::with_failures(&[])
        }

        fn with_failures(script: &[bool]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failures: Mutex::new(script.iter().copied().collect()),
                calls: Mutex::new(0),
            }
        }

        fn sent(&self) -> Vec<(String, Instant)> {
            self.sent.lock().unwrap().clone()
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl MeshTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn send(&self, _destination: &Destination, text: &str) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
            if fail {
                return Err(Error::Transport("scripted failure".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((text.to_string(), Instant::now()));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| (*s).to_string()).collect()
    }

    // ---- ordering and pacing ----

    #[tokio::test(start_paused = true)]
    async fn all_chunks_sent_in_order() {
        let transport = ScriptedTransport::always_ok();
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);

        let report = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["one", "two", "three"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.attempts, 3);

        let sent = transport.sent();
        let texts: Vec<&str> = sent.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_separated_by_mandatory_delay() {
        let transport = ScriptedTransport::always_ok();
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);

        pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["a", "b", "c"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let sent = transport.sent();
        for pair in sent.windows(2) {
            let gap = pair[1].1.duration_since(pair[0].1);
            assert!(gap >= DELAY, "gap {gap:?} below mandatory delay");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_before_first_or_after_last_chunk() {
        let transport = ScriptedTransport::always_ok();
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);
        let start = Instant::now();

        pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["a", "b", "c"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // Exactly two inter-chunk pauses for three chunks
        assert_eq!(start.elapsed(), DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_chunk_sends_immediately() {
        let transport = ScriptedTransport::always_ok();
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Node("abcd".to_string());
        let start = Instant::now();

        let report = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["only"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.chunks_sent, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // ---- retry behavior ----

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retried_then_sequence_continues() {
        // Chunk 1 ok, chunk 2 fails once then succeeds, chunk 3 ok
        let transport = ScriptedTransport::with_failures(&[false, true, false, false]);
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);

        let report = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["one", "two", "three"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // 3 chunks, 4 calls: the failed attempt plus its retry
        assert_eq!(report.chunks_sent, 3);
        assert_eq!(report.attempts, 4);
        assert_eq!(transport.calls(), 4);

        let sent = transport.sent();
        let texts: Vec<&str> = sent.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_reapplied_before_retry_of_same_chunk() {
        // First chunk fails once; the retry must wait the full pause
        let transport = ScriptedTransport::with_failures(&[true, false]);
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);
        let start = Instant::now();

        pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["only"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(start.elapsed(), DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_halt_the_sequence() {
        let transport = ScriptedTransport::with_failures(&[true, true, true, true]);
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);

        let err = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["one", "two"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        // max_retries = 1 means exactly two attempts on chunk 1, then halt
        assert_eq!(err, DeliveryError::ChunkSendFailed { index: 1 });
        assert_eq!(transport.calls(), 2);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_mid_sequence_reports_failing_index() {
        // Chunk 1 ok; chunk 2 fails both attempts
        let transport = ScriptedTransport::with_failures(&[false, true, true]);
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);

        let err = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["one", "two", "three"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DeliveryError::ChunkSendFailed { index: 2 });
        // Chunk 1's effects stand; chunk 3 never attempted
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_fail_on_first_error() {
        let transport = ScriptedTransport::with_failures(&[true]);
        let pacer = Pacer::new(DELAY, 0);
        let dest = Destination::Channel(0);

        let err = pacer
            .deliver(
                &transport,
                &dest,
                &chunks(&["one"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DeliveryError::ChunkSendFailed { index: 1 });
        assert_eq!(transport.calls(), 1);
    }

    // ---- cancellation ----

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_sends_nothing() {
        let transport = ScriptedTransport::always_ok();
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pacer
            .deliver(&transport, &dest, &chunks(&["one", "two"]), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, DeliveryError::Cancelled);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_between_chunks_stops_before_next_send() {
        let transport = std::sync::Arc::new(ScriptedTransport::always_ok());
        let pacer = Pacer::new(DELAY, 1);
        let dest = Destination::Channel(0);
        let cancel = CancellationToken::new();

        let task = {
            let transport = std::sync::Arc::clone(&transport);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                pacer
                    .deliver(
                        transport.as_ref(),
                        &dest,
                        &chunks(&["one", "two", "three"]),
                        &cancel,
                    )
                    .await
            })
        };

        // Let chunk 1 go out, then cancel during the inter-chunk pause
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.sent().len(), 1);
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, DeliveryError::Cancelled);
        assert_eq!(transport.sent().len(), 1);
    }
}
