//! Error handling tests.
//!
//! Tests for the error types, error creation helpers, and error introspection.

use std::error::Error as _;
use std::io;

use dbg_session::DebugError;

// =============================================================================
// Creation and introspection
// =============================================================================

#[test]
fn module_errors_are_classified() {
    let errors = [
        DebugError::module_load("/bin/true", "not an object file"),
        DebugError::invalid_architecture("vax"),
        DebugError::architecture_mismatch("/bin/true", "x86_64", "aarch64"),
        DebugError::unknown_platform("amiga"),
    ];
    for err in &errors {
        assert!(err.is_module_error(), "{err}");
        assert!(!err.is_unknown_variable());
        assert!(!err.is_invalid_handle());
    }
    assert!(!DebugError::InvalidHandle.is_module_error());
    assert!(DebugError::InvalidHandle.is_invalid_handle());
}

#[test]
fn variable_errors_carry_details() {
    let err = DebugError::invalid_variable_value("term-width", "wide", "invalid digit");
    match &err {
        DebugError::InvalidVariableValue {
            name,
            value,
            reason,
        } => {
            assert_eq!(name, "term-width");
            assert_eq!(value, "wide");
            assert_eq!(reason, "invalid digit");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_unknown_variable());
    assert!(DebugError::unknown_variable("x").is_unknown_variable());
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn display_messages() {
    assert_eq!(
        DebugError::unknown_platform("amiga").to_string(),
        "unknown platform: amiga"
    );
    assert_eq!(
        DebugError::invalid_architecture("vax").to_string(),
        "invalid architecture 'vax'"
    );
    assert_eq!(
        DebugError::invalid_sdk_root("/nope").to_string(),
        "invalid SDK root: /nope"
    );
    assert_eq!(
        DebugError::engine("lost connection").to_string(),
        "engine error: lost connection"
    );
    assert_eq!(
        DebugError::InvalidHandle.to_string(),
        "invalid debugger handle"
    );
    let msg = DebugError::architecture_mismatch("a.out", "x86_64", "arm64").to_string();
    assert_eq!(
        msg,
        "architecture mismatch for 'a.out': module is x86_64, requested arm64"
    );
}

// =============================================================================
// Conversions and sources
// =============================================================================

#[test]
fn io_error_converts() {
    let err: DebugError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, DebugError::Io(_)));
    assert!(err.to_string().contains("denied"));
}

#[test]
fn io_context_keeps_source() {
    let err = DebugError::io_context(
        "reading init file",
        io::Error::new(io::ErrorKind::NotFound, "missing"),
    );
    assert_eq!(err.to_string(), "reading init file: missing");
    assert_eq!(err.source().map(ToString::to_string), Some("missing".into()));
}

#[test]
fn with_io_context_maps_errors() {
    let result: io::Result<()> = Err(io::Error::other("boom"));
    let err = DebugError::with_io_context(result, "closing handle").unwrap_err();
    assert!(matches!(err, DebugError::IoWithContext { .. }));
}

#[test]
fn regex_error_converts() {
    let err = dbg_session::TypeNameSpecifier::regex("(unclosed").unwrap_err();
    assert!(matches!(err, DebugError::Regex(_)));
}

#[test]
fn error_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync + 'static>() {}
    assert_send_sync::<DebugError>();
}
