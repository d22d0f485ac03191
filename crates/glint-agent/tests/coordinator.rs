//! Request lifecycle tests against the mock provider client


use glint_agent::{
    CoordinatorState, EngineConfig, EngineEvent, EventStream, RequestCoordinator, StructuredReply,
};
use glint_protocol::Request;
use glint_tools::memory::{InMemoryPreferences, InMemoryTimeline};
use glint_tools::{
    register_builtin_tools, Arguments, CapabilitySet, Collaborators, ToolRegistry, ToolResult,
};
use mock_client::MockProviderClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

struct Harness {
    coordinator: RequestCoordinator,
    client: Arc<MockProviderClient>,
    timeline: Arc<InMemoryTimeline>,
    events: EventStream,
}

fn harness(client: MockProviderClient) -> Harness {
    harness_with(client, |collaborators| collaborators)
}

fn harness_with(
    client: MockProviderClient,
    extend: impl FnOnce(Collaborators) -> Collaborators,
) -> Harness {
    let timeline = Arc::new(InMemoryTimeline::new(4));
    let collaborators = extend(Collaborators::new().with_timeline(timeline.clone()));

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, &collaborators);

    let client = Arc::new(client);
    let coordinator = RequestCoordinator::new(registry, collaborators)
        .with_config(EngineConfig::default().with_interrupt_timeout(Duration::from_secs(1)))
        .with_client(client.clone());
    let events = coordinator.take_events().unwrap();

    Harness {
        coordinator,
        client,
        timeline,
        events,
    }
}

/// Events up to and including the first terminal one
async fn until_terminal(events: &mut EventStream) -> Vec<EngineEvent> {
    use futures::StreamExt;

    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), events.next())
            .await
            .expect("timed out waiting for events")
            .expect("event stream closed");
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            return seen;
        }
    }
}

fn drain(events: &mut EventStream) -> Vec<EngineEvent> {
    std::iter::from_fn(|| events.try_next()).collect()
}

fn function_results(events: &[EngineEvent]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::FunctionCalled { name, result, .. } => {
                Some((name.clone(), result.is_success()))
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn text_reply_is_interpreted_and_published() {
    let mut h = harness(MockProviderClient::new());
    h.client
        .queue_text("Queued it up.\n[ACTION:play_audio]\nstart_time=5\n[/ACTION]");

    assert!(h.coordinator.submit(Request::new("play from five seconds")));
    let events = until_terminal(&mut h.events).await;

    assert_eq!(events[0], EngineEvent::ThinkingStarted);
    assert!(matches!(
        events[1],
        EngineEvent::UsageUpdated { tokens: 15, .. }
    ));
    match events.last() {
        Some(EngineEvent::ResponseReceived {
            text,
            structured: StructuredReply::Text { interpretation },
        }) => {
            assert!(text.starts_with("Queued it up."));
            assert_eq!(interpretation.actions.len(), 1);
            assert_eq!(interpretation.actions[0].action_type, "play_audio");
        }
        other => panic!("unexpected terminal event: {:?}", other),
    }

    h.coordinator.wait_idle().await;
    assert_eq!(h.coordinator.state(), CoordinatorState::Idle);

    let sent = h.client.recorded_requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].system_message.is_some());
    let tools: Vec<_> = sent[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert!(tools.contains(&"create_segment"));
    // No analysis store was provided
    assert!(!tools.contains(&"get_beats"));
}

#[tokio::test]
async fn native_call_is_dispatched_and_summarized() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_tool_call(
        "create_segment",
        json!({"ball": 2, "start_time": 0.0, "end_time": 4.0, "color": "red"}),
    );

    assert!(h.coordinator.submit(Request::new("make ball 2 red for four seconds")));
    let events = until_terminal(&mut h.events).await;

    assert_eq!(
        function_results(&events),
        vec![("create_segment".to_string(), true)]
    );
    match events.last() {
        Some(EngineEvent::ResponseReceived {
            text,
            structured: StructuredReply::FunctionCall { name, retries, .. },
        }) => {
            assert_eq!(text, "Created 1 segment on ball 2");
            assert_eq!(name, "create_segment");
            assert_eq!(*retries, 0);
        }
        other => panic!("unexpected terminal event: {:?}", other),
    }
    assert_eq!(h.timeline.segment_count(), 1);
    assert_eq!(h.client.call_count(), 1);
}

#[tokio::test]
async fn tool_failure_retries_once_with_corrective_prompt() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_tool_call(
        "create_segment",
        json!({"ball": 9, "start_time": 0, "end_time": 1, "color": "blue"}),
    );
    h.client.queue_text("Ball 9 does not exist, there are only four balls.");

    assert!(h.coordinator.submit(Request::new("make ball 9 blue")));
    let events = until_terminal(&mut h.events).await;

    // The failure is reported, then a second round trip starts
    let failure = events
        .iter()
        .position(|e| matches!(e, EngineEvent::FunctionCalled { .. }))
        .unwrap();
    match &events[failure] {
        EngineEvent::FunctionCalled { result, .. } => {
            assert_eq!(result.error_message().as_deref(), Some("bad ball index 9"));
        }
        _ => unreachable!(),
    }
    assert!(!events[..failure]
        .iter()
        .any(|e| matches!(e, EngineEvent::ResponseReceived { .. })));
    assert_eq!(events[failure + 1], EngineEvent::ThinkingStarted);

    let sent = h.client.recorded_requests();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].prompt.contains("create_segment"));
    assert!(sent[1].prompt.contains("bad ball index 9"));
    assert!(sent[1].prompt.contains("make ball 9 blue"));
    assert!(sent[1].prompt.contains("clear_timeline"));

    assert!(matches!(
        events.last(),
        Some(EngineEvent::ResponseReceived {
            structured: StructuredReply::Text { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn retries_stop_after_two_corrections() {
    let mut h = harness(MockProviderClient::new());
    for _ in 0..4 {
        h.client.queue_tool_call(
            "create_segment",
            json!({"ball": 7, "start_time": 0, "end_time": 1, "color": "blue"}),
        );
    }

    assert!(h.coordinator.submit(Request::new("make ball 7 blue")));
    let events = until_terminal(&mut h.events).await;

    assert_eq!(h.client.call_count(), 3);
    assert_eq!(function_results(&events).len(), 3);

    let sent = h.client.recorded_requests();
    assert!(sent[1].prompt.contains("attempt 1 of 2"));
    assert!(sent[2].prompt.contains("attempt 2 of 2"));

    match events.last() {
        Some(EngineEvent::ResponseReceived {
            text,
            structured:
                StructuredReply::FunctionCall {
                    result, retries, ..
                },
        }) => {
            assert_eq!(text, "create_segment failed: bad ball index 7");
            assert!(result.is_failure());
            assert_eq!(*retries, 2);
        }
        other => panic!("unexpected terminal event: {:?}", other),
    }

    // Usage covers every round trip in the chain
    assert!(events.contains(&EngineEvent::UsageUpdated {
        tokens: 45,
        cost: h.coordinator.usage().totals.total_cost,
    }));
}

#[tokio::test]
async fn malformed_arguments_take_the_retry_path() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_raw_call("create_segment", "{\"ball\": 1,");
    h.client.queue_tool_call(
        "create_segment",
        json!({"ball": 1, "start_time": 0, "end_time": 2, "color": [0, 0, 255]}),
    );

    assert!(h.coordinator.submit(Request::new("ball 1 blue")));
    let events = until_terminal(&mut h.events).await;

    let calls: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::FunctionCalled { result, .. } => Some(result.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 2);
    assert!(calls[0]
        .error_message()
        .unwrap()
        .starts_with("malformed arguments for create_segment"));
    assert!(calls[1].is_success());
    assert_eq!(h.timeline.segment_count(), 1);
}

#[tokio::test]
async fn streamed_chunks_arrive_in_order_and_reassemble() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_chunks(&["The chorus ", "is now ", "blue."]);

    assert!(h
        .coordinator
        .submit(Request::new("color the chorus").with_streaming(true)));
    let events = until_terminal(&mut h.events).await;

    let chunks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ResponseChunk { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["The chorus ", "is now ", "blue."]);

    match events.last() {
        Some(EngineEvent::ResponseReceived { text, .. }) => assert_eq!(text, &chunks.concat()),
        other => panic!("unexpected terminal event: {:?}", other),
    }
}

#[tokio::test]
async fn streaming_falls_back_to_send_when_unsupported() {
    let mut h = harness(MockProviderClient::new().without_streaming());
    h.client.queue_text("Done.");

    assert!(h.coordinator.submit(Request::new("hi").with_streaming(true)));
    let events = until_terminal(&mut h.events).await;

    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ResponseChunk { .. })));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::ResponseReceived { text, .. }) if text == "Done."
    ));
}

#[tokio::test]
async fn provider_error_is_terminal_and_not_retried() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_error(503, "overloaded");
    h.client.queue_text("should never be requested");

    assert!(h.coordinator.submit(Request::new("hi")));
    let events = until_terminal(&mut h.events).await;

    assert_eq!(events.len(), 2);
    match &events[1] {
        EngineEvent::Error { message } => {
            assert_eq!(message, "Provider error: API error 503: overloaded")
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(h.client.call_count(), 1);

    h.coordinator.wait_idle().await;
    assert_eq!(h.coordinator.usage().totals.requests, 0);
}

#[tokio::test]
async fn interrupt_when_idle_does_nothing() {
    let mut h = harness(MockProviderClient::new());

    h.coordinator.interrupt().await;

    assert!(drain(&mut h.events).is_empty());
    assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn second_submit_while_busy_is_rejected() {
    let mut h = harness(MockProviderClient::new().with_latency(Duration::from_millis(200)));
    h.client.queue_text("first");
    h.client.queue_text("second");

    assert!(h.coordinator.submit(Request::new("first")));
    assert!(h.coordinator.is_busy());
    // A request that claims to be a retry gets no special treatment
    let mut sneaky = Request::new("second");
    sneaky.retry_count = 1;
    assert!(!h.coordinator.submit(sneaky));

    let events = until_terminal(&mut h.events).await;
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::Error { message } if message.starts_with("Configuration error:")
    )));

    // The first request still completes normally
    let events = until_terminal(&mut h.events).await;
    assert!(matches!(
        events.last(),
        Some(EngineEvent::ResponseReceived { text, .. }) if text == "first"
    ));
    assert_eq!(h.client.call_count(), 1);
}

#[tokio::test]
async fn unconfigured_engine_rejects_requests() {
    let collaborators = Collaborators::new();
    let coordinator = RequestCoordinator::new(ToolRegistry::new(), collaborators);
    let mut events = coordinator.take_events().unwrap();
    assert!(coordinator.take_events().is_none());

    assert!(!coordinator.is_configured());
    assert!(!coordinator.submit(Request::new("hi")));
    assert!(matches!(
        drain(&mut events).as_slice(),
        [EngineEvent::Error { message }] if message.starts_with("Configuration error:")
    ));

    coordinator.configure(Arc::new(MockProviderClient::new().with_model("  ")));
    assert!(!coordinator.is_configured());
    assert!(!coordinator.submit(Request::new("hi")));
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn interrupt_discards_in_flight_result() {
    let mut h = harness(MockProviderClient::new().with_latency(Duration::from_millis(300)));
    h.client.queue_tool_call(
        "create_segment",
        json!({"ball": 0, "start_time": 0, "end_time": 1, "color": "red"}),
    );

    assert!(h.coordinator.submit(Request::new("ball 0 red")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.coordinator.interrupt().await;

    assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
    assert!(!h.coordinator.is_busy());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let events = drain(&mut h.events);
    assert_eq!(
        events,
        vec![EngineEvent::ThinkingStarted, EngineEvent::Interrupted]
    );
    // No tool dispatch and no usage for the aborted request
    assert_eq!(h.timeline.segment_count(), 0);
    assert_eq!(h.coordinator.usage().totals.requests, 0);

    h.client.queue_text("ready again");
    assert!(h.coordinator.submit(Request::new("next")));
    let events = until_terminal(&mut h.events).await;
    assert!(matches!(
        events.last(),
        Some(EngineEvent::ResponseReceived { text, .. }) if text == "ready again"
    ));
}

#[tokio::test]
async fn interrupt_stops_streaming_between_chunks() {
    let mut h = harness(MockProviderClient::new().with_chunk_delay(Duration::from_millis(100)));
    h.client.queue_chunks(&["one ", "two ", "three ", "four ", "five"]);

    assert!(h
        .coordinator
        .submit(Request::new("count").with_streaming(true)));
    tokio::time::sleep(Duration::from_millis(150)).await;
    h.coordinator.interrupt().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let events = drain(&mut h.events);
    assert_eq!(events.last(), Some(&EngineEvent::Interrupted));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ResponseReceived { .. })));
    let chunks = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::ResponseChunk { .. }))
        .count();
    assert!(chunks < 5);
}

#[tokio::test]
async fn ambiguity_is_reported_with_the_original_prompt() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_text(
        "I'm not sure what you're asking. Did you want:\n1. The first chorus\n2. Every chorus",
    );

    assert!(h.coordinator.submit(Request::new("color the chorus")));
    let events = until_terminal(&mut h.events).await;

    let position = events
        .iter()
        .position(|e| matches!(e, EngineEvent::AmbiguityDetected { .. }))
        .unwrap();
    assert_eq!(
        events[position],
        EngineEvent::AmbiguityDetected {
            prompt: "color the chorus".into(),
            suggestions: vec!["The first chorus".into(), "Every chorus".into()],
        }
    );
    assert_eq!(position, events.len() - 3);
}

#[tokio::test]
async fn preferences_are_prepended_to_system_message() {
    let preferences = Arc::new(InMemoryPreferences::new());
    preferences.set("song-7", "Prefers cool colors.");

    let mut h = harness_with(MockProviderClient::new(), |c| {
        c.with_preferences(preferences.clone())
    });
    h.client.queue_text("ok");

    assert!(h.coordinator.submit(
        Request::new("anything")
            .with_system_message("Base prompt.")
            .with_song_id("song-7")
    ));
    until_terminal(&mut h.events).await;

    let sent = h.client.recorded_requests();
    assert_eq!(
        sent[0].system_message.as_deref(),
        Some("User preferences for this song:\nPrefers cool colors.\n\nBase prompt.")
    );
}

#[tokio::test]
async fn text_fallback_only_for_backends_without_native_tools() {
    let reply = r#"create_segment(ball=0, start_time=0, end_time=1, color="blue")"#;

    let mut native = harness(MockProviderClient::new());
    native.client.queue_text(reply);
    assert!(native.coordinator.submit(Request::new("ball 0 blue")));
    let events = until_terminal(&mut native.events).await;
    assert!(function_results(&events).is_empty());
    assert_eq!(native.timeline.segment_count(), 0);

    let mut local = harness(MockProviderClient::new().without_native_tools());
    local.client.queue_text(reply);
    assert!(local.coordinator.submit(Request::new("ball 0 blue")));
    let events = until_terminal(&mut local.events).await;
    assert_eq!(
        function_results(&events),
        vec![("create_segment".to_string(), true)]
    );
    assert_eq!(local.timeline.segment_count(), 1);
}

#[tokio::test]
async fn disabled_tools_are_not_advertised() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_text("plain answer");

    assert!(h.coordinator.submit(Request::new("hi").with_tools(false)));
    until_terminal(&mut h.events).await;

    assert!(h.client.recorded_requests()[0].tools.is_empty());
}

#[tokio::test]
async fn disabled_tools_ignore_calls_written_as_text() {
    let reply = r#"create_segment(ball=0, start_time=0, end_time=1, color="blue")"#;
    let mut h = harness(MockProviderClient::new().without_native_tools());
    h.client.queue_text(reply);

    assert!(h
        .coordinator
        .submit(Request::new("ball 0 blue").with_tools(false)));
    let events = until_terminal(&mut h.events).await;

    assert!(function_results(&events).is_empty());
    assert_eq!(h.timeline.segment_count(), 0);
    assert!(matches!(
        events.last(),
        Some(EngineEvent::ResponseReceived {
            text,
            structured: StructuredReply::Text { .. },
        }) if text == reply
    ));
}

#[tokio::test]
async fn interrupt_during_tool_dispatch_records_no_usage() {
    let mut registry = ToolRegistry::new();
    registry.register("slow_tool", CapabilitySet::new(), |_args: Arguments| async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok(ToolResult::success())
    });

    let client = Arc::new(MockProviderClient::new());
    client.queue_tool_call("slow_tool", json!({}));
    let coordinator = RequestCoordinator::new(registry, Collaborators::new())
        .with_config(EngineConfig::default().with_interrupt_timeout(Duration::from_secs(1)))
        .with_client(client.clone());
    let mut events = coordinator.take_events().unwrap();

    assert!(coordinator.submit(Request::new("take your time")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.state(), CoordinatorState::AwaitingTool);
    coordinator.interrupt().await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(
        drain(&mut events),
        vec![EngineEvent::ThinkingStarted, EngineEvent::Interrupted]
    );
    let usage = coordinator.usage();
    assert_eq!(usage.totals.total_tokens, 0);
    assert_eq!(usage.totals.requests, 0);
    assert!(usage.records.is_empty());
}

#[tokio::test]
async fn usage_accumulates_across_requests() {
    let mut h = harness(MockProviderClient::new());
    h.client.queue_text("one");
    h.client.queue_text("two");

    for prompt in ["one", "two"] {
        assert!(h.coordinator.submit(Request::new(prompt)));
        until_terminal(&mut h.events).await;
        h.coordinator.wait_idle().await;
    }

    let usage = h.coordinator.usage();
    assert_eq!(usage.totals.total_tokens, 30);
    assert_eq!(usage.totals.requests, 2);
    assert_eq!(usage.records.len(), 2);
    assert!(usage.totals.total_cost > 0.0);
}
