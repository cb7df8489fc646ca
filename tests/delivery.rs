//! End-to-end delivery tests
//!
//! Exercises segmentation plus paced delivery against the mock
//! transport, covering the documented delivery contract.

use std::time::Duration;

use meshbot_gateway::delivery::{self, DeliveryConfig, DeliveryError};
use meshbot_gateway::transport::{Destination, MeshTransport, MockTransport};
use tokio_util::sync::CancellationToken;

fn config(limit: usize) -> DeliveryConfig {
    DeliveryConfig {
        limit,
        inter_chunk_delay: Duration::from_secs(5),
        max_retries: 1,
    }
}

async fn connected_mock() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.connect().await.expect("mock connect");
    transport
}

/// Strip a trailing ` (i/n)` marker
fn strip_suffix(chunk: &str) -> &str {
    chunk
        .rfind(" (")
        .filter(|_| chunk.ends_with(')'))
        .map_or(chunk, |pos| &chunk[..pos])
}

#[tokio::test(start_paused = true)]
async fn short_reply_is_a_single_unsuffixed_message() {
    let transport = connected_mock().await;
    let dest = Destination::Node("abcd1234".to_string());

    let report = delivery::deliver(
        &transport,
        &dest,
        "pong",
        &config(120),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.chunks_sent, 1);
    let sent = transport.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "pong");
}

#[tokio::test(start_paused = true)]
async fn long_reply_is_chunked_within_the_limit() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);
    let text = "This is a very long message that exceeds the maximum \
                allowed length for one transmission";

    let report = delivery::deliver(
        &transport,
        &dest,
        text,
        &config(50),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let sent = transport.sent_messages().await;
    assert_eq!(sent.len(), report.chunks_sent);
    assert!(sent.len() > 1);

    let total = sent.len();
    for (i, (_, chunk)) in sent.iter().enumerate() {
        assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
        let marker = format!(" ({}/{total})", i + 1);
        assert!(chunk.ends_with(&marker), "chunk {i} missing {marker:?}");
    }

    // Reassembly reproduces the original word sequence
    let rejoined = sent
        .iter()
        .map(|(_, c)| strip_suffix(c))
        .collect::<Vec<_>>()
        .join(" ");
    let got: Vec<&str> = rejoined.split_whitespace().collect();
    let want: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(got, want);
}

#[tokio::test(start_paused = true)]
async fn empty_reply_rejected_before_any_send() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);

    for text in ["", "   ", " \n\t "] {
        let err = delivery::deliver(
            &transport,
            &dest,
            text,
            &config(120),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, DeliveryError::EmptyContent);
    }

    assert!(transport.sent_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn tiny_limit_rejected_before_any_send() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);

    let err = delivery::deliver(
        &transport,
        &dest,
        "hello",
        &config(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err, DeliveryError::LimitTooSmall { limit: 5 });
    assert!(transport.sent_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_and_order_holds() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);
    // One failure, armed to hit the second chunk's first attempt
    let text = "alpha bravo charlie delta echo foxtrot golf hotel india \
                juliett kilo lima mike november oscar papa";

    // Work out how many chunks this text yields first
    let probe = connected_mock().await;
    delivery::deliver(&probe, &dest, text, &config(40), &CancellationToken::new())
        .await
        .unwrap();
    let total = probe.sent_messages().await.len();
    assert!(total >= 3, "test needs at least three chunks");

    // First chunk succeeds, then one transient failure
    transport.fail_next_sends(0).await;
    let task = {
        let transport = transport.clone();
        let dest = dest.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            delivery::deliver(
                &transport,
                &dest,
                &text,
                &config(40),
                &CancellationToken::new(),
            )
            .await
        })
    };
    // Arm the failure after chunk 1 went out
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(transport.sent_messages().await.len(), 1);
    transport.fail_next_sends(1).await;

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.chunks_sent, total);
    // One extra attempt for the retried chunk
    assert_eq!(report.attempts, total + 1);

    // Order preserved despite the retry
    let sent = transport.sent_messages().await;
    for (i, (_, chunk)) in sent.iter().enumerate() {
        assert!(chunk.contains(&format!("({}/", i + 1)));
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_halt_and_name_the_chunk() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);
    transport.fail_next_sends(10).await;

    let text = "alpha bravo charlie delta echo foxtrot golf hotel india \
                juliett kilo lima mike november oscar papa";
    let err = delivery::deliver(
        &transport,
        &dest,
        text,
        &config(40),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    // max_retries = 1: two attempts on chunk 1, nothing delivered
    assert_eq!(err, DeliveryError::ChunkSendFailed { index: 1 });
    assert!(transport.sent_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_between_chunks() {
    let transport = connected_mock().await;
    let dest = Destination::Channel(0);
    let cancel = CancellationToken::new();

    let text = "alpha bravo charlie delta echo foxtrot golf hotel india \
                juliett kilo lima mike november oscar papa";
    let task = {
        let transport = transport.clone();
        let dest = dest.clone();
        let cancel = cancel.clone();
        let text = text.to_string();
        tokio::spawn(
            async move { delivery::deliver(&transport, &dest, &text, &config(40), &cancel).await },
        )
    };

    tokio::time::sleep(Duration::from_millis(1)).await;
    let sent_before = transport.sent_messages().await.len();
    assert_eq!(sent_before, 1);
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err, DeliveryError::Cancelled);
    // Nothing further went out after cancellation
    assert_eq!(transport.sent_messages().await.len(), sent_before);
}

#[tokio::test(start_paused = true)]
async fn disconnected_transport_fails_without_panicking() {
    let transport = MockTransport::new(); // never connected
    let dest = Destination::Channel(0);

    let err = delivery::deliver(
        &transport,
        &dest,
        "hello there",
        &config(120),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err, DeliveryError::ChunkSendFailed { index: 1 });
}
