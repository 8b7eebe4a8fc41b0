//! Integration tests for event delivery.
//!
//! These tests require the `mock` feature to be enabled.

#![cfg(feature = "mock")]

use std::sync::Arc;
use std::time::Duration;

use dbg_session::mock::{MockEngine, MockModule};
use dbg_session::{
    Debugger, DebuggerConfig, EventData, EventMask, FileHandle, Listener, MemoryStream, StateType,
};

const APP: &str = "/usr/local/bin/daemon";

fn setup() -> (MockEngine, Debugger) {
    let engine = MockEngine::new()
        .with_module(APP, MockModule::new("aarch64-unknown-linux"))
        .with_stop_delay(None);
    let debugger = Debugger::builder()
        .engine(Arc::new(engine.clone()))
        .config(DebuggerConfig::new().async_mode(true))
        .build();
    debugger.set_output_file_handle(FileHandle::new(MemoryStream::new()), true);
    (engine, debugger)
}

/// Every subscribed listener gets its own copy of an event.
#[test]
fn fan_out_to_process_listeners() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let process = target.process();

    let first = Listener::new("first");
    let second = Listener::new("second");
    first.start_listening_for_events(process.broadcaster(), EventMask::PROCESS_ALL);
    second.start_listening_for_events(process.broadcaster(), EventMask::PROCESS_STDOUT);

    debugger.handle_command("run");
    assert!(engine.emit_output(target.id(), false, "hello\n"));

    let kinds: Vec<EventMask> = std::iter::from_fn(|| first.try_next())
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![EventMask::PROCESS_STATE_CHANGED, EventMask::PROCESS_STDOUT]
    );
    let event = second.try_next().unwrap();
    assert_eq!(event.output().map(|b| &b[..]), Some(&b"hello\n"[..]));
    assert!(second.is_empty());
    debugger.destroy();
}

/// Events from one source keep their post order.
#[test]
fn per_source_order() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("order");
    listener
        .start_listening_for_events(target.process().broadcaster(), EventMask::PROCESS_STDOUT);

    for i in 0..50 {
        engine.emit_output(target.id(), false, &format!("{i}\n"));
    }
    let sequences: Vec<u64> = std::iter::from_fn(|| listener.try_next())
        .map(|e| e.sequence())
        .collect();
    assert_eq!(sequences.len(), 50);
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    debugger.destroy();
}

/// The process record is updated before listeners see a state change.
#[test]
fn state_applied_before_delivery() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("state");
    listener.start_listening_for_events(
        target.process().broadcaster(),
        EventMask::PROCESS_STATE_CHANGED,
    );

    debugger.handle_command("run");
    let event = listener.wait(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(event.process_state(), Some(StateType::Running));
    assert_eq!(target.process().state(), StateType::Running);

    engine.emit_state(target.id(), StateType::Crashed, None);
    let event = listener.wait(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(event.process_state(), Some(StateType::Crashed));
    assert!(target.process().state().is_stopped());
    debugger.destroy();
}

/// A listener with nothing queued times out.
#[test]
fn wait_times_out() {
    let (_engine, mut debugger) = setup();
    let listener = Listener::new("idle");
    listener.start_listening_for_events(&debugger.broadcaster().unwrap(), EventMask::WARNING);
    assert!(listener.wait(Some(Duration::from_millis(20))).is_none());
    debugger.destroy();
}

/// Events posted from another thread wake a blocked listener.
#[test]
fn wait_wakes_on_post() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("blocked");
    listener
        .start_listening_for_events(target.process().broadcaster(), EventMask::PROCESS_STDERR);

    let id = target.id();
    let poster = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        engine.emit_output(id, true, "oops\n")
    });
    let event = listener.wait(None).unwrap();
    assert_eq!(event.kind(), EventMask::PROCESS_STDERR);
    assert!(poster.join().unwrap());
    debugger.destroy();
}

/// The async wait resolves when an event is posted.
#[tokio::test]
async fn wait_async_receives_event() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("async");
    listener.start_listening_for_events(target.broadcaster(), EventMask::BREAKPOINT_HIT);

    let sink = engine.sink().unwrap();
    let id = target.id();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.post_target_event(
            id,
            EventMask::BREAKPOINT_HIT,
            EventData::Breakpoint {
                id: 1,
                location: "main.c:10".to_string(),
            },
        );
    });

    let event = listener.wait_async(Some(Duration::from_secs(2))).await.unwrap();
    assert!(matches!(event.data(), EventData::Breakpoint { id: 1, .. }));
    assert!(listener.wait_async(Some(Duration::from_millis(10))).await.is_none());
    debugger.destroy();
}

/// Unsubscribed kinds stop arriving.
#[test]
fn stop_listening() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("toggle");
    let broadcaster = target.process().broadcaster().clone();
    listener.start_listening_for_events(&broadcaster, EventMask::PROCESS_STDOUT);

    engine.emit_output(target.id(), false, "a");
    assert!(listener.stop_listening_for_events(&broadcaster, EventMask::PROCESS_STDOUT));
    engine.emit_output(target.id(), false, "b");
    assert_eq!(listener.len(), 1);
    debugger.destroy();
}

/// Posting to a destroyed session does nothing.
#[test]
fn sink_disconnects_on_destroy() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let sink = engine.sink().unwrap();
    assert!(sink.is_connected());
    debugger.destroy();
    assert!(!sink.is_connected());
    assert!(!sink.post_process_state(target.id(), Some(1), StateType::Stopped, None));
    assert!(engine.sink().is_none());
}

/// Process events are rendered as one-line reports.
#[test]
fn process_event_reports() {
    let (engine, mut debugger) = setup();
    let target = debugger.create_target(APP, None, None, false).unwrap();
    let listener = Listener::new("report");
    listener.start_listening_for_events(target.process().broadcaster(), EventMask::PROCESS_ALL);
    let out = MemoryStream::new();
    let err = MemoryStream::new();
    let out_handle = FileHandle::new(out.clone());
    let err_handle = FileHandle::new(err.clone());

    debugger.handle_command("run");
    engine.emit_output(target.id(), false, "stdout text\n");
    engine.emit_output(target.id(), true, "stderr text\n");
    engine.emit_state(target.id(), StateType::Exited, Some(3));

    let process = target.process();
    while let Some(event) = listener.try_next() {
        assert_eq!(debugger.target_from_event(&event), Some(target.clone()));
        debugger
            .handle_process_event(&process, &event, &out_handle, &err_handle)
            .unwrap();
    }
    let pid = process.pid().unwrap();
    assert_eq!(
        out.contents(),
        format!("Process {pid} running\nstdout text\nProcess {pid} exited with status = 3\n")
    );
    assert_eq!(err.contents(), "stderr text\n");
    debugger.destroy();
}
