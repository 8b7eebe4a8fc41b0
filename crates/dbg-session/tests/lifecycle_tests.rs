//! Integration tests for process-wide state.
//!
//! Terminate and the default architecture affect every session in the
//! process, so everything here runs as one test.
//!
//! These tests require the `mock` feature to be enabled.

#![cfg(feature = "mock")]

use std::sync::Arc;

use dbg_session::mock::{MockEngine, MockModule};
use dbg_session::{Debugger, DebuggerConfig};

const UNIVERSAL: &str = "/usr/bin/fat";

#[test]
fn process_wide_state() {
    Debugger::initialize();
    let engine = MockEngine::new()
        .with_module(
            UNIVERSAL,
            MockModule::new("x86_64-apple-macosx").slice("arm64-apple-macosx"),
        )
        .with_cache_entries(3);
    let new_session = || {
        Debugger::builder()
            .engine(Arc::new(engine.clone()))
            .config(DebuggerConfig::new())
            .build()
    };

    // Default architecture picks the slice when no triple is given.
    assert!(Debugger::default_architecture().is_none());
    assert!(!Debugger::set_default_architecture("pdp11"));
    assert!(Debugger::set_default_architecture("arm64"));
    assert_eq!(Debugger::default_architecture().as_deref(), Some("arm64"));

    let first = new_session();
    let target = first.create_target(UNIVERSAL, None, None, false).unwrap();
    assert_eq!(target.triple(), "arm64-apple-macosx");

    assert!(Debugger::set_default_architecture(""));
    let plain = first.create_target(UNIVERSAL, None, None, false).unwrap();
    assert_eq!(plain.triple(), "x86_64-apple-macosx");
    Debugger::set_default_architecture("x86_64");

    // Memory pressure asks every engine to release caches.
    assert!(Debugger::memory_pressure_detected() >= 3);

    // Terminate destroys every live session and clears process-wide state.
    let second = new_session();
    let instance = second.instance_name().unwrap();
    Debugger::set_internal_variable("prompt", "> ", "debugger_offline").unwrap();
    Debugger::terminate();

    assert!(!first.is_valid());
    assert!(!second.is_valid());
    assert!(!target.is_valid());
    assert_eq!(engine.shutdown_count(), 2);
    assert!(Debugger::default_architecture().is_none());
    assert!(Debugger::internal_variable_value("prompt", "debugger_offline").is_empty());
    assert!(Debugger::internal_variable_value("prompt", &instance).is_empty());

    // Sessions can be created again afterwards.
    let mut third = new_session();
    assert!(third.is_valid());
    assert_ne!(third.id(), first.id());

    // Values set for an instance before it exists apply when it appears.
    let upcoming = format!("debugger_{}", third.id().unwrap().as_u64() + 1);
    Debugger::set_internal_variable("prompt", "(early) ", &upcoming).unwrap();
    Debugger::set_internal_variable("term-width", " 120 ", &upcoming).unwrap();
    let mut fourth = new_session();
    assert_eq!(fourth.instance_name().as_deref(), Some(upcoming.as_str()));
    assert_eq!(fourth.prompt(), "(early) ");
    assert_eq!(fourth.terminal_width(), 120);
    assert_eq!(
        Debugger::internal_variable_value("term-width", &upcoming),
        vec![" 120 "]
    );

    third.destroy();
    fourth.destroy();
}
