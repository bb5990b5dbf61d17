// tests/fanout.rs
//
// Fan-out orchestrator properties: every target attempted, no cross-target
// coupling, at-least-one-success aggregation, input ordering preserved.

use std::sync::Arc;

use signal_relay::notify::{ChannelKind, MockNotifier, OutboundMessage};
use signal_relay::relay::{fan_out, FanOutTarget};

fn target(notifier: &Arc<MockNotifier>, recipient: &str) -> FanOutTarget {
    FanOutTarget {
        notifier: Arc::clone(notifier) as Arc<dyn signal_relay::notify::Notifier>,
        recipient: recipient.to_string(),
    }
}

#[tokio::test]
async fn overall_success_iff_any_target_succeeds() {
    let ok = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let bad = Arc::new(MockNotifier::failing(ChannelKind::Telegram, "transport down"));
    let msg = OutboundMessage::text("hello");

    let result = fan_out(&msg, &[target(&bad, "a"), target(&ok, "b")]).await;
    assert!(result.overall_success());

    let result = fan_out(&msg, &[target(&bad, "a")]).await;
    assert!(!result.overall_success());
}

#[tokio::test]
async fn failing_target_does_not_block_the_other() {
    let ok = Arc::new(MockNotifier::succeeding(ChannelKind::Discord));
    let bad = Arc::new(MockNotifier::failing(ChannelKind::Telegram, "boom"));
    let msg = OutboundMessage::text("hello");

    let result = fan_out(&msg, &[target(&bad, "a"), target(&ok, "b")]).await;

    // Both attempted, independent outcomes.
    assert_eq!(bad.call_count(), 1);
    assert_eq!(ok.call_count(), 1);
    assert!(result.overall_success());
    assert!(!result.channels[0].success);
    assert!(result.channels[1].success);
}

#[tokio::test]
async fn results_follow_target_input_order() {
    let ok = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let msg = OutboundMessage::text("hello");

    let result = fan_out(
        &msg,
        &[target(&ok, "first"), target(&ok, "second"), target(&ok, "third")],
    )
    .await;

    let ids: Vec<&str> = result.channels.iter().map(|c| c.channel_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["telegram:first", "telegram:second", "telegram:third"]
    );
}

#[tokio::test]
async fn single_target_degrades_to_that_attempt() {
    let bad = Arc::new(MockNotifier::failing(ChannelKind::Discord, "410 gone"));
    let msg = OutboundMessage::text("hello");

    let result = fan_out(&msg, &[target(&bad, "hook")]).await;
    assert_eq!(result.channels.len(), 1);
    assert!(!result.overall_success());
    // Raw collaborator-supplied error is carried through, uninterpreted.
    assert!(result.channels[0].error.as_deref().unwrap().contains("410 gone"));
    assert!(result.channels[0].delivery_id.is_none());
}

#[tokio::test]
async fn successful_targets_carry_delivery_ids() {
    let ok = Arc::new(MockNotifier::succeeding(ChannelKind::Telegram));
    let msg = OutboundMessage::text("hello");

    let result = fan_out(&msg, &[target(&ok, "42")]).await;
    assert!(result.channels[0].success);
    assert!(result.channels[0].delivery_id.is_some());
    assert!(result.channels[0].error.is_none());
}
