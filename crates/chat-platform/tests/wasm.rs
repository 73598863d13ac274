//! WASM-target tests for chat-platform (Node.js runtime).
//!
//! Exercises the loopback transport and the scripted backend under
//! wasm32-unknown-unknown via `wasm-pack test --node`, and as plain
//! `#[test]`s everywhere else.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

use chat_core::ports::TransportPort;
use chat_platform::{channel_pair, LoopbackTransport, ScriptedBackend};
use chat_types::protocol::*;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

// ─── LoopbackTransport Tests ─────────────────────────────

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn loopback_name() {
    assert_eq!(LoopbackTransport::new().name(), "loopback");
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn loopback_inject_and_unsubscribe() {
    let transport = LoopbackTransport::new();
    let seen = Rc::new(RefCell::new(0));
    let counter = seen.clone();
    let mut sub = transport.subscribe(Box::new(move |_| *counter.borrow_mut() += 1));
    transport.inject(json!({"type": "generation-stopped"}));
    sub.unsubscribe();
    transport.inject(json!({"type": "generation-stopped"}));
    assert_eq!(*seen.borrow(), 1);
}

// ─── ChannelTransport Tests ──────────────────────────────

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn channel_pump_pending() {
    let (transport, backend) = channel_pair();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _sub = transport.subscribe(Box::new(move |env| sink.borrow_mut().push(env)));
    backend.events.unbounded_send(json!({"type": "ack"})).unwrap();
    assert_eq!(transport.pump_pending(), 1);
    assert_eq!(seen.borrow().len(), 1);
}

// ─── ScriptedBackend Tests ───────────────────────────────

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn scripted_backend_echoes() {
    let mut backend = ScriptedBackend::new();
    let events = backend.handle(&OutboundMessage::new_prompt("p1", "hi"));
    let text: String = events
        .iter()
        .filter_map(|e| e.as_chunk())
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(text, "echo: hi");
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), test)]
fn scripted_backend_lists_created_chat() {
    let mut backend = ScriptedBackend::new();
    backend.handle(&OutboundMessage::CreateNewChat);
    let events = backend.handle(&OutboundMessage::GetChatList);
    assert_eq!(events[0].as_chat_list().unwrap().chats[0].title, "New chat");
}
