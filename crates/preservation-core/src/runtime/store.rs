// crates/preservation-core/src/runtime/store.rs
// ============================================================================
// Module: Preservation In-Memory Collaborators
// Description: In-memory issue store, object store, and search index.
// Purpose: Provide deterministic collaborator implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of the collaborator interfaces for tests, local
//! runs of the CLI, and embedding without a database. Clones share state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::identifiers::PackageId;
use crate::core::identifiers::WorkflowId;
use crate::core::issue::Issue;
use crate::core::state::ObjectKind;
use crate::core::state::StoredObject;
use crate::interfaces::IndexError;
use crate::interfaces::IndexNotifier;
use crate::interfaces::IssueStore;
use crate::interfaces::IssueStoreError;
use crate::interfaces::ObjectStateStore;
use crate::interfaces::ObjectStoreError;

// ============================================================================
// SECTION: Issue Store
// ============================================================================

/// In-memory issue store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIssueStore {
    /// Issues in insertion order.
    issues: Arc<Mutex<Vec<Issue>>>,
}

impl InMemoryIssueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueStoreError::Io`] when the store mutex is poisoned.
    pub fn all(&self) -> Result<Vec<Issue>, IssueStoreError> {
        let guard = self
            .issues
            .lock()
            .map_err(|_| IssueStoreError::Io("issue store mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

impl IssueStore for InMemoryIssueStore {
    fn save(&self, issues: &[Issue]) -> Result<(), IssueStoreError> {
        self.issues
            .lock()
            .map_err(|_| IssueStoreError::Io("issue store mutex poisoned".to_string()))?
            .extend_from_slice(issues);
        Ok(())
    }

    fn find_by_workflow(&self, workflow: &WorkflowId) -> Result<Vec<Issue>, IssueStoreError> {
        let guard = self
            .issues
            .lock()
            .map_err(|_| IssueStoreError::Io("issue store mutex poisoned".to_string()))?;
        Ok(guard.iter().filter(|issue| &issue.workflow == workflow).cloned().collect())
    }
}

// ============================================================================
// SECTION: Object State Store
// ============================================================================

/// In-memory stored object records.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStateStore {
    /// Records keyed by package id and kind label.
    objects: Arc<Mutex<BTreeMap<(PackageId, String), StoredObject>>>,
}

impl InMemoryObjectStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStateStore for InMemoryObjectStateStore {
    fn save_object(&self, object: &StoredObject) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object store mutex poisoned".to_string()))?
            .insert((object.id.clone(), object.kind.to_string()), object.clone());
        Ok(())
    }

    fn find_object(
        &self,
        id: &PackageId,
        kind: ObjectKind,
    ) -> Result<Option<StoredObject>, ObjectStoreError> {
        let guard = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object store mutex poisoned".to_string()))?;
        Ok(guard.get(&(id.clone(), kind.to_string())).cloned())
    }
}

// ============================================================================
// SECTION: Search Index
// ============================================================================

/// In-memory search index holding the set of indexed workflow runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIndex {
    /// Indexed workflow ids.
    entries: Arc<Mutex<BTreeSet<WorkflowId>>>,
}

impl InMemoryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry for a workflow run.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index mutex is poisoned.
    pub fn insert(&self, workflow: WorkflowId) -> Result<(), IndexError> {
        self.entries
            .lock()
            .map_err(|_| IndexError::Index("index mutex poisoned".to_string()))?
            .insert(workflow);
        Ok(())
    }

    /// Returns true when the workflow run is indexed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the index mutex is poisoned.
    pub fn contains(&self, workflow: &WorkflowId) -> Result<bool, IndexError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| IndexError::Index("index mutex poisoned".to_string()))?;
        Ok(guard.contains(workflow))
    }
}

impl IndexNotifier for InMemoryIndex {
    fn remove_entry(&self, workflow: &WorkflowId) -> Result<(), IndexError> {
        self.entries
            .lock()
            .map_err(|_| IndexError::Index("index mutex poisoned".to_string()))?
            .remove(workflow);
        Ok(())
    }
}
