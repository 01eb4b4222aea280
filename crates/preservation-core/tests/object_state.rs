// crates/preservation-core/tests/object_state.rs
// ============================================================================
// Module: Object State Machine Tests
// Description: Tests for stored object lifecycle transitions.
// ============================================================================
//! ## Overview
//! Validates legal SIP and XML transitions, local failure markers, and strict
//! state name parsing.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::str::FromStr;

use preservation_core::ObjectKind;
use preservation_core::ObjectState;
use preservation_core::PackageId;
use preservation_core::StoredObject;
use preservation_core::TransitionError;
use preservation_core::WorkflowId;
use preservation_core::WorkspaceError;
use preservation_core::WorkspaceLayout;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Tests every state round-trips through its wire name.
#[test]
fn test_state_names_parse_strictly() {
    for state in ObjectState::ALL {
        assert_eq!(ObjectState::from_str(state.as_str()).unwrap(), state);
    }
    assert!(ObjectState::from_str("archived").is_err());
    assert!(ObjectState::from_str("\"ARCHIVED\"").is_err());
    assert!(ObjectState::from_str("").is_err());
}

/// Tests serde uses the upper snake case wire names.
#[test]
fn test_state_serde_wire_names() {
    let json = serde_json::to_string(&ObjectState::RollbackFailure).unwrap();
    assert_eq!(json, "\"ROLLBACK_FAILURE\"");
    let parsed: ObjectState = serde_json::from_str("\"PRE_PROCESSING\"").unwrap();
    assert_eq!(parsed, ObjectState::PreProcessing);
}

// ============================================================================
// SECTION: SIP Lifecycle
// ============================================================================

/// Tests the SIP happy path through removal, renewal, and deletion.
#[test]
fn test_sip_lifecycle() {
    let mut sip = StoredObject::submit(PackageId::new("abc-123"), ObjectKind::Sip);
    assert_eq!(sip.state, ObjectState::Processing);

    sip.transition(ObjectState::Archived).unwrap();
    sip.transition(ObjectState::Removed).unwrap();
    sip.transition(ObjectState::Archived).unwrap();
    sip.transition(ObjectState::Removed).unwrap();
    sip.transition(ObjectState::Deleted).unwrap();
    assert!(sip.state.is_terminal());

    let err = sip.transition(ObjectState::Archived).unwrap_err();
    assert!(matches!(err, TransitionError::Illegal { .. }));
}

/// Tests a SIP cannot skip straight from processing to removal.
#[test]
fn test_sip_rejects_processing_to_removed() {
    let mut sip = StoredObject::submit(PackageId::new("abc-123"), ObjectKind::Sip);
    let err = sip.transition(ObjectState::Removed).unwrap_err();
    assert_eq!(
        err,
        TransitionError::Illegal {
            kind: ObjectKind::Sip,
            from: ObjectState::Processing,
            to: ObjectState::Removed,
        }
    );
    assert_eq!(sip.state, ObjectState::Processing);
}

/// Tests pre-processing advances to processing for SIPs.
#[test]
fn test_sip_pre_processing_advances() {
    assert!(ObjectKind::Sip.allows(ObjectState::PreProcessing, ObjectState::Processing, true));
    assert!(!ObjectKind::Sip.allows(ObjectState::PreProcessing, ObjectState::Archived, true));
}

// ============================================================================
// SECTION: XML Lifecycle
// ============================================================================

/// Tests XML versions can never be removed or deleted.
#[test]
fn test_xml_is_never_removed_or_deleted() {
    let kind = ObjectKind::Xml {
        version: 2,
    };
    assert!(!kind.allows(ObjectState::Archived, ObjectState::Removed, true));
    assert!(!kind.allows(ObjectState::Archived, ObjectState::Deleted, true));
    assert!(!kind.allows(ObjectState::Removed, ObjectState::Deleted, true));
}

/// Tests only unconfirmed archived XML versions may be rolled back.
#[test]
fn test_xml_rollback_requires_unconfirmed_version() {
    let kind = ObjectKind::Xml {
        version: 3,
    };
    let mut latest = StoredObject::submit(PackageId::new("abc-123"), kind);
    latest.transition(ObjectState::Archived).unwrap();
    latest.transition(ObjectState::RolledBack).unwrap();

    let mut confirmed = StoredObject::submit(PackageId::new("abc-123"), kind);
    confirmed.transition(ObjectState::Archived).unwrap();
    confirmed.confirm();
    assert!(confirmed.transition(ObjectState::RolledBack).is_err());
    assert_eq!(confirmed.state, ObjectState::Archived);
}

// ============================================================================
// SECTION: Local Markers
// ============================================================================

/// Tests failure markers are local-only and terminal.
#[test]
fn test_failure_markers_are_local_and_terminal() {
    let mut sip = StoredObject::submit(PackageId::new("abc-123"), ObjectKind::Sip);
    sip.mark_failure(ObjectState::RollbackFailure).unwrap();
    assert!(sip.state.is_local_only());
    assert!(sip.state.is_terminal());
    assert_eq!(
        sip.mark_failure(ObjectState::ArchivalFailure).unwrap_err(),
        TransitionError::AlreadyFailed(ObjectState::RollbackFailure)
    );
    assert!(sip.transition(ObjectState::Archived).is_err());
}

/// Tests markers are rejected when reported by the remote side.
#[test]
fn test_remote_cannot_report_local_markers() {
    let mut sip = StoredObject::submit(PackageId::new("abc-123"), ObjectKind::Sip);
    assert_eq!(
        sip.observe(ObjectState::DeletionFailure).unwrap_err(),
        TransitionError::LocalOnly(ObjectState::DeletionFailure)
    );
    assert!(sip.observe(ObjectState::RolledBack).unwrap());
    assert_eq!(sip.state, ObjectState::RolledBack);
    assert_eq!(
        sip.mark_failure(ObjectState::Archived).unwrap_err(),
        TransitionError::NotFailureMarker(ObjectState::Archived)
    );
}

/// Tests remote observations follow the legal transitions of the kind.
#[test]
fn test_observe_respects_kind_transitions() {
    let mut sip = StoredObject::submit(PackageId::new("abc-123"), ObjectKind::Sip);
    assert!(!sip.observe(ObjectState::Processing).unwrap());
    assert!(sip.observe(ObjectState::Archived).unwrap());
    assert!(sip.observe(ObjectState::Deleted).unwrap());
    assert!(matches!(
        sip.observe(ObjectState::RolledBack).unwrap_err(),
        TransitionError::Illegal { .. }
    ));
    assert_eq!(sip.state, ObjectState::Deleted);

    let mut xml = StoredObject::submit(
        PackageId::new("abc-123"),
        ObjectKind::Xml {
            version: 2,
        },
    );
    xml.observe(ObjectState::Archived).unwrap();
    xml.confirm();
    assert!(xml.observe(ObjectState::RolledBack).is_err());
    assert_eq!(xml.state, ObjectState::Archived);
}

// ============================================================================
// SECTION: Workspace Layout
// ============================================================================

/// Tests run directories are confined to the workspace root.
#[test]
fn test_workspace_rejects_escaping_ids() {
    let layout = WorkspaceLayout::new("/srv/workspace");
    assert_eq!(
        layout.run_dir(&WorkflowId::new("run-1")).unwrap(),
        std::path::Path::new("/srv/workspace/run-1")
    );
    for bad in ["..", "a/b", "/etc", ""] {
        let err = layout.run_dir(&WorkflowId::new(bad)).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidId(_)), "{bad}");
    }
}

/// Tests removing a run directory reports whether it existed.
#[test]
fn test_workspace_remove_run_dir() {
    let root = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(root.path());
    let workflow = WorkflowId::new("run-7");
    let dir = layout.run_dir(&workflow).unwrap();
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested/file.txt"), b"data").unwrap();

    assert!(layout.remove_run_dir(&workflow).unwrap());
    assert!(!dir.exists());
    assert!(!layout.remove_run_dir(&workflow).unwrap());
}
