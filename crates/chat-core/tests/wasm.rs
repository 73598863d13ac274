//! WASM-target tests for chat-core.
//!
//! Runs the synchronous reconciler, playback and lifecycle paths under
//! wasm32-unknown-unknown via `wasm-pack test --node`, and as plain
//! `#[test]`s everywhere else.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

use chat_core::event_bus::NotificationBus;
use chat_core::lifecycle::{Channel, CommandLedger};
use chat_core::reconciler::Reconciler;
use chat_types::error::ChatError;
use chat_types::event::{ChannelState, ClientEvent};
use chat_types::message::*;
use chat_types::protocol::*;

// ─── Reconciler Tests ────────────────────────────────────

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn streamed_reply_assembles() {
    let mut rec = Reconciler::new(NotificationBus::new());
    rec.apply_user_prompt("p1", "hi").unwrap();
    rec.apply(InboundMessage::new_response("r1")).unwrap();
    rec.apply(InboundMessage::new_response("r1")).unwrap();
    rec.apply(InboundMessage::chunk("c1", "r1", "Hel", None)).unwrap();
    rec.apply(InboundMessage::chunk("c2", "r1", "lo", Some("stop"))).unwrap();

    let t = rec.transcript();
    assert_eq!(t.len(), 2);
    let r1 = t.chunked("r1").unwrap();
    assert_eq!(r1.text(), "Hello");
    assert!(r1.is_complete());
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn orphan_chunk_is_reported() {
    let bus = NotificationBus::new();
    let mut rec = Reconciler::new(bus.clone());
    let err = rec.apply(InboundMessage::chunk("c1", "ghost", "x", None)).unwrap_err();
    assert!(matches!(err, ChatError::OrphanChunk { .. }));
    assert!(rec.transcript().is_empty());
    assert!(bus
        .drain()
        .iter()
        .any(|e| matches!(e, ClientEvent::Warning(ChatError::OrphanChunk { .. }))));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn chat_loaded_replaces_everything() {
    let mut rec = Reconciler::new(NotificationBus::new());
    rec.apply_user_prompt("old", "x").unwrap();
    rec.apply(InboundMessage::chat_loaded("B", vec![Message::user("b1", "y")]))
        .unwrap();
    assert!(!rec.transcript().contains("old"));
    assert!(rec.transcript().contains("b1"));
    assert_eq!(rec.active_conversation_id(), Some("B"));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn sentence_highlights_owner() {
    let mut rec = Reconciler::new(NotificationBus::new());
    rec.apply_new_response("r1").unwrap();
    rec.apply_chunk("r1", MessageChunk::new("c1", "Hel")).unwrap();
    rec.apply(InboundMessage::Sentence {
        payload: SentencePayload {
            id: "s1".to_string(),
            chunk_ids: vec!["c1".to_string()],
            text: "Hel".to_string(),
            audio: String::new(),
            order: 0,
        },
    })
    .unwrap();
    let hl = rec.state().sentence_highlight().unwrap();
    assert_eq!(hl.message_id, "r1");

    assert!(rec.acknowledge_sentence("s1").highlight_cleared);
    assert!(rec.state().sentence_highlight().is_none());
}

// ─── Lifecycle Tests ─────────────────────────────────────

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn channel_start_ready_stop() {
    let mut ch = Channel::new();
    ch.begin_start().unwrap();
    ch.mark_ready().unwrap();
    assert_eq!(ch.state(), ChannelState::Ready);
    ch.mark_stopped().unwrap();
    assert!(matches!(ch.ensure_ready(), Err(ChatError::NotReady(_))));
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn ledger_settles_on_implicit_ack() {
    let mut ledger = CommandLedger::new();
    ledger.record(&OutboundMessage::new_prompt("p1", "hi"));
    let settled = ledger.resolve(&InboundMessage::new_response("r1")).unwrap();
    assert_eq!(settled.message_type, "new-prompt");
    assert!(ledger.is_empty());
}
