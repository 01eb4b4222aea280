// crates/preservation-core/src/core/workspace.rs
// ============================================================================
// Module: Workspace Layout
// Description: Per-run workspace directory resolution and cleanup.
// Purpose: Keep workspace paths confined to the configured root.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! Each ingest run works inside `<root>/<workflow_id>`. Workflow identifiers
//! are validated as single path components before use so cleanup can never
//! reach outside the workspace root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::core::identifiers::WorkflowId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while resolving or cleaning workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    /// The workflow identifier cannot name a workspace directory.
    #[error("invalid workspace id: {0}")]
    InvalidId(String),
    /// Filesystem operation failed.
    #[error("workspace io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Root directory holding per-run workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Workspace root.
    root: PathBuf,
}

impl WorkspaceLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of one run.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::InvalidId`] when the identifier is not a
    /// single normal path component.
    pub fn run_dir(&self, workflow: &WorkflowId) -> Result<PathBuf, WorkspaceError> {
        let mut components = Path::new(workflow.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(workflow.as_str())),
            _ => Err(WorkspaceError::InvalidId(workflow.to_string())),
        }
    }

    /// Deletes the directory of one run.
    ///
    /// Returns `false` when the directory did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the id is invalid or deletion fails.
    pub fn remove_run_dir(&self, workflow: &WorkflowId) -> Result<bool, WorkspaceError> {
        let dir = self.run_dir(workflow)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "workspace removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(WorkspaceError::Io(err.to_string())),
        }
    }
}
