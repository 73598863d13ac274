#[cfg(test)]
mod tests {
    use crate::backend::ScriptedBackend;
    use crate::channel::channel_pair;
    use crate::loopback::LoopbackTransport;
    use chat_core::ports::TransportPort;
    use chat_types::config::ApiConfig;
    use chat_types::error::ChatError;
    use chat_types::message::Message;
    use chat_types::protocol::*;
    use futures::executor::block_on;
    use futures::StreamExt;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(transport: &dyn TransportPort) -> Rc<RefCell<Vec<Envelope>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        // Dropping the handle leaves the handler registered
        let _sub = transport.subscribe(Box::new(move |env| sink.borrow_mut().push(env)));
        seen
    }

    // ─── LoopbackTransport Tests ─────────────────────────────

    #[test]
    fn test_loopback_name_and_initial_state() {
        let transport = LoopbackTransport::new();
        assert_eq!(transport.name(), "loopback");
        assert!(!transport.is_ready());
    }

    #[test]
    fn test_loopback_send_requires_live() {
        let transport = LoopbackTransport::manual();
        block_on(transport.start()).unwrap();
        assert!(!transport.is_ready());
        let err = block_on(transport.send(json!({"type": "get-chat-list"}))).unwrap_err();
        assert!(matches!(err, ChatError::NotReady(_)));

        transport.go_live();
        block_on(transport.send(json!({"type": "get-chat-list"}))).unwrap();
        assert_eq!(transport.sent_types(), vec!["get-chat-list"]);
    }

    #[test]
    fn test_loopback_failure_injection_is_one_shot() {
        let transport = LoopbackTransport::new();
        block_on(transport.start()).unwrap();
        transport.fail_next_send("broken pipe");
        assert_eq!(
            block_on(transport.send(json!({"type": "get-chat-list"}))),
            Err(ChatError::Delivery("broken pipe".to_string()))
        );
        block_on(transport.send(json!({"type": "get-chat-list"}))).unwrap();
        assert_eq!(transport.take_sent().len(), 1);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_loopback_inject_reaches_subscribers() {
        let transport = LoopbackTransport::new();
        let seen = recorder(&transport);
        let delivered = transport
            .inject_message(&InboundMessage::GenerationStopped)
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(seen.borrow()[0], json!({"type": "generation-stopped"}));
    }

    #[test]
    fn test_loopback_unsubscribe() {
        let transport = LoopbackTransport::new();
        let mut sub = transport.subscribe(Box::new(|_| {}));
        assert_eq!(transport.subscriber_count(), 1);
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(transport.subscriber_count(), 0);
        assert_eq!(transport.inject(json!({"type": "ack"})), 0);
    }

    #[test]
    fn test_loopback_responder_answers_commands() {
        let transport = LoopbackTransport::with_responder(ScriptedBackend::new().into_responder());
        let seen = recorder(&transport);
        block_on(transport.start()).unwrap();
        block_on(transport.send(OutboundMessage::GetApiConfig.to_envelope().unwrap())).unwrap();
        let reply = InboundMessage::from_envelope(&seen.borrow()[0]).unwrap();
        assert_eq!(reply.as_api_config(), Some(&ApiConfig::backend_defaults()));
    }

    #[test]
    fn test_loopback_stop() {
        let transport = LoopbackTransport::new();
        block_on(transport.start()).unwrap();
        block_on(transport.stop()).unwrap();
        assert!(!transport.is_ready());
        block_on(transport.stop()).unwrap();
    }

    // ─── ChannelTransport Tests ──────────────────────────────

    #[test]
    fn test_channel_delivers_commands_to_backend() {
        let (transport, mut backend) = channel_pair();
        assert!(matches!(
            block_on(transport.send(json!({"type": "get-chat-list"}))),
            Err(ChatError::NotReady(_))
        ));
        block_on(transport.start()).unwrap();
        block_on(transport.send(json!({"type": "get-chat-list"}))).unwrap();
        let received = block_on(backend.commands.next()).unwrap();
        assert_eq!(received, json!({"type": "get-chat-list"}));
    }

    #[test]
    fn test_channel_pump_pending_preserves_order() {
        let (transport, backend) = channel_pair();
        let seen = recorder(&transport);
        backend.events.unbounded_send(json!({"n": 1})).unwrap();
        backend.events.unbounded_send(json!({"n": 2})).unwrap();
        assert_eq!(transport.pump_pending(), 2);
        assert_eq!(transport.pump_pending(), 0);
        assert_eq!(*seen.borrow(), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_channel_run_inbound_until_hangup() {
        let (transport, backend) = channel_pair();
        let seen = recorder(&transport);
        block_on(transport.start()).unwrap();
        backend.events.unbounded_send(json!({"type": "generation-stopped"})).unwrap();
        drop(backend);

        assert_eq!(block_on(transport.run_inbound()).unwrap(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert!(!transport.is_ready());
        assert_eq!(
            block_on(transport.run_inbound()),
            Err(ChatError::Delivery("inbound channel already taken".to_string()))
        );
    }

    #[test]
    fn test_channel_pump_pending_notices_hangup() {
        let (transport, backend) = channel_pair();
        let seen = recorder(&transport);
        block_on(transport.start()).unwrap();
        backend.events.unbounded_send(json!({"type": "ack"})).unwrap();
        drop(backend);

        assert_eq!(transport.pump_pending(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert!(!transport.is_ready());
        assert_eq!(transport.pump_pending(), 0);
    }

    #[test]
    fn test_channel_send_after_backend_dropped() {
        let (transport, backend) = channel_pair();
        block_on(transport.start()).unwrap();
        drop(backend);
        assert!(matches!(
            block_on(transport.send(json!({"type": "get-chat-list"}))),
            Err(ChatError::Delivery(_))
        ));
    }

    #[test]
    fn test_channel_stop_ends_command_stream() {
        let (transport, mut backend) = channel_pair();
        block_on(transport.start()).unwrap();
        block_on(transport.stop()).unwrap();
        assert!(block_on(backend.commands.next()).is_none());
        assert!(block_on(transport.start()).is_err());
    }

    // ─── ScriptedBackend Tests ───────────────────────────────

    #[test]
    fn test_backend_streams_reply_in_chunks() {
        let mut backend = ScriptedBackend::new().with_reply(|_| "Hello there friend".to_string());
        let events = backend.handle(&OutboundMessage::new_prompt("p1", "hi"));
        let tags: Vec<&str> = events.iter().map(|e| e.message_type()).collect();
        assert_eq!(tags, vec!["new-response", "chunk", "chunk", "chunk"]);

        let response_id = events[0].as_new_response().unwrap().id.clone();
        let chunks: Vec<&ChunkPayload> = events.iter().filter_map(|e| e.as_chunk()).collect();
        assert!(chunks.iter().all(|c| c.response_id == response_id));
        let text: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(text, "Hello there friend");
        assert!(chunks[..2].iter().all(|c| c.finish_reason.is_none()));
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));

        let chat = backend.active_chat().unwrap().to_string();
        assert_eq!(backend.messages(&chat).unwrap().len(), 2);
    }

    #[test]
    fn test_backend_empty_reply_still_terminates() {
        let mut backend = ScriptedBackend::new().with_reply(|_| String::new());
        let events = backend.handle(&OutboundMessage::new_prompt("p1", "hi"));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_chunk().unwrap().finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_backend_speech_groups_sentences() {
        let mut backend = ScriptedBackend::new()
            .with_reply(|_| "Hi. How are you? Fine".to_string())
            .with_speech();
        let events = backend.handle(&OutboundMessage::new_prompt("p1", "hi"));
        let sentences: Vec<&SentencePayload> = events.iter().filter_map(|e| e.as_sentence()).collect();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "Hi.");
        assert_eq!(sentences[1].text, "How are you?");
        assert_eq!(sentences[1].chunk_ids.len(), 3);
        assert_eq!(sentences[2].order, 2);
    }

    #[test]
    fn test_backend_load_unknown_chat_errors() {
        let mut backend = ScriptedBackend::new();
        let events = backend.handle(&OutboundMessage::load_chat("nope"));
        let err = events[0].as_error().unwrap();
        assert_eq!(err.original_message_type.as_deref(), Some("load-chat"));
    }

    #[test]
    fn test_backend_load_seeded_chat() {
        let mut backend =
            ScriptedBackend::new().with_chat("c1", "First", vec![Message::user("m1", "hey")]);
        let events = backend.handle(&OutboundMessage::load_chat("c1"));
        let loaded = events[0].as_chat_loaded().unwrap();
        assert_eq!(loaded.chat_id, "c1");
        assert_eq!(loaded.messages, vec![Message::user("m1", "hey")]);
        assert_eq!(backend.active_chat(), Some("c1"));
    }

    #[test]
    fn test_backend_create_and_delete_all() {
        let mut backend = ScriptedBackend::new();
        let events = backend.handle(&OutboundMessage::CreateNewChat);
        assert_eq!(events[0].as_chat_list().unwrap().chats.len(), 1);
        let events = backend.handle(&OutboundMessage::DeleteAllChats);
        assert!(events[0].is_all_chats_deleted());
        assert_eq!(backend.chat_count(), 0);
        assert!(backend.active_chat().is_none());
    }

    #[test]
    fn test_backend_edit_and_delete() {
        let mut backend =
            ScriptedBackend::new().with_chat("c1", "First", vec![Message::user("m1", "hey")]);
        backend.handle(&OutboundMessage::load_chat("c1"));

        let events = backend.handle(&OutboundMessage::edit_message("m1", "hello"));
        assert_eq!(
            events[0].as_message_updated().unwrap().message,
            Message::user("m1", "hello")
        );
        let events = backend.handle(&OutboundMessage::delete_message("m1"));
        assert_eq!(events[0].as_message_deleted().unwrap().message_id, "m1");
        let events = backend.handle(&OutboundMessage::delete_message("m1"));
        assert!(events[0].as_error().is_some());
    }

    #[test]
    fn test_backend_merges_api_config() {
        let mut backend = ScriptedBackend::new();
        let update = ApiConfig {
            model: Some("other".to_string()),
            ..ApiConfig::default()
        };
        let events = backend.handle(&OutboundMessage::set_api_config(update));
        let config = events[0].as_api_config().unwrap();
        assert_eq!(config.model.as_deref(), Some("other"));
        assert_eq!(config.url, ApiConfig::backend_defaults().url);
        assert!(backend.handle(&OutboundMessage::sentence_done("s")).is_empty());
    }
}
