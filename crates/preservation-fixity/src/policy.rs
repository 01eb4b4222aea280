// crates/preservation-fixity/src/policy.rs
// ============================================================================
// Module: Issue Policy Engine
// Description: Per-bucket policy decisions read from the run configuration.
// Purpose: Persist fixity issues and decide between continue, abort, and escalation.
// Dependencies: indexmap, preservation-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! The run configuration is a JSON tree. The policy for one issue kind lives
//! at `/fixityCheck/<invocation>/<option>`, scoped by the invocation counter
//! because one ingest run may check fixity more than once.
//!
//! Decision semantics:
//! - Absent or non-boolean option: escalate. Issues are persisted with
//!   `resolved_by_config = false` and an escalation fault is raised.
//! - `true`: persist issues as resolved and continue.
//! - `false`: persist issues as resolved and raise a terminal abort whose
//!   message lists the affected files.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use preservation_core::FixityFinding;
use preservation_core::FormatResolver;
use preservation_core::Issue;
use preservation_core::IssueKind;
use preservation_core::IssueStore;
use preservation_core::ToolRef;
use preservation_core::WorkflowId;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::error::FixityFault;
use crate::manifest::relative_to;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root of the fixity section in the run configuration.
pub const FIXITY_CHECK_SECTION: &str = "/fixityCheck";
/// Maximum length of an abort message before it is reduced.
pub const MAX_ABORT_MESSAGE_CHARS: usize = 3500;
/// Suffix appended to reduced abort messages.
const REDUCED_MESSAGE_SUFFIX: &str = "... message reduced";

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// What to do with one issue bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// The option is absent or invalid; wait for human resolution.
    Escalate,
    /// Record the issues and continue.
    Continue,
    /// Record the issues and fail the run.
    Abort,
}

/// Policy decision plus the note embedded in every issue description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePolicyDecision {
    /// Decision outcome.
    pub outcome: PolicyOutcome,
    /// Human-readable note naming the option path and value.
    pub note: String,
}

impl IssuePolicyDecision {
    /// Returns true when configuration resolved the bucket.
    #[must_use]
    pub const fn resolved_by_config(&self) -> bool {
        !matches!(self.outcome, PolicyOutcome::Escalate)
    }
}

/// Returns the JSON pointer of a policy option.
#[must_use]
pub fn option_pointer(invocation: u32, option: &str) -> String {
    format!("{FIXITY_CHECK_SECTION}/{invocation}/{option}")
}

/// Decides how to handle an issue kind for a fixity invocation.
#[must_use]
pub fn decide(config: &Value, invocation: u32, kind: IssueKind) -> IssuePolicyDecision {
    let pointer = option_pointer(invocation, kind.config_option());
    match config.pointer(&pointer) {
        None => IssuePolicyDecision {
            outcome: PolicyOutcome::Escalate,
            note: format!("missing config at: {pointer}"),
        },
        Some(Value::Bool(value)) => IssuePolicyDecision {
            outcome: if *value { PolicyOutcome::Continue } else { PolicyOutcome::Abort },
            note: format!("used config: {value} at: {pointer}"),
        },
        Some(other) => IssuePolicyDecision {
            outcome: PolicyOutcome::Escalate,
            note: format!("invalid config: {other} at: {pointer} supported values: [true, false]"),
        },
    }
}

/// Truncates an abort message to [`MAX_ABORT_MESSAGE_CHARS`] characters.
#[must_use]
pub fn trim_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ABORT_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}{REDUCED_MESSAGE_SUFFIX}", &message[.. cut]),
        None => message.to_string(),
    }
}

// ============================================================================
// SECTION: Run Context
// ============================================================================

/// Per-run inputs of a fixity check.
#[derive(Clone, Copy)]
pub struct FixityContext<'a> {
    /// Workflow run the issues belong to.
    pub workflow: &'a WorkflowId,
    /// Tool recorded on every issue.
    pub tool: &'a ToolRef,
    /// Fixity invocation counter within the run.
    pub invocation: u32,
    /// Run configuration tree.
    pub config: &'a Value,
    /// Formats identified upstream, keyed by package-relative path.
    pub formats: &'a dyn FormatResolver,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Applies policy decisions and persists issues.
#[derive(Clone)]
pub struct IssuePolicyEngine {
    /// Issue persistence collaborator.
    store: Arc<dyn IssueStore>,
}

impl IssuePolicyEngine {
    /// Creates an engine persisting into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self {
            store,
        }
    }

    /// Resolves the unsupported-algorithm bucket.
    ///
    /// # Errors
    ///
    /// Returns [`FixityFault`] unless the policy says to continue.
    pub fn resolve_unsupported(
        &self,
        context: &FixityContext<'_>,
        root: &Path,
        findings: &IndexMap<String, Vec<FixityFinding>>,
    ) -> Result<(), FixityFault> {
        let decision = decide(context.config, context.invocation, IssueKind::UnsupportedChecksumType);
        let mut issues = Vec::new();
        let mut files = Vec::new();
        for (algorithm, bucket) in findings {
            for finding in bucket {
                let (relative, manifest) = describe_paths(root, finding);
                issues.push(build_issue(
                    context,
                    IssueKind::UnsupportedChecksumType,
                    &relative,
                    format!(
                        "unsupported checksum algorithm: {algorithm} used for file: {relative} declared in: {manifest}. {}",
                        decision.note
                    ),
                    &decision,
                ));
                files.push(relative);
            }
        }
        let algorithms: Vec<&str> = findings.keys().map(String::as_str).collect();
        let message = format!(
            "{} issue occurred, unsupported checksum types: [{}] files: [{}]",
            IssueKind::UnsupportedChecksumType.code(),
            algorithms.join(", "),
            files.join(", ")
        );
        self.apply(context, IssueKind::UnsupportedChecksumType, &decision, issues, &message)
    }

    /// Resolves the missing-file bucket.
    ///
    /// # Errors
    ///
    /// Returns [`FixityFault`] unless the policy says to continue.
    pub fn resolve_missing(
        &self,
        context: &FixityContext<'_>,
        root: &Path,
        findings: &[FixityFinding],
    ) -> Result<(), FixityFault> {
        self.resolve_files(context, root, IssueKind::MissingFile, "missing file", findings)
    }

    /// Resolves the invalid-checksum bucket.
    ///
    /// # Errors
    ///
    /// Returns [`FixityFault`] unless the policy says to continue.
    pub fn resolve_invalid(
        &self,
        context: &FixityContext<'_>,
        root: &Path,
        findings: &[FixityFinding],
    ) -> Result<(), FixityFault> {
        self.resolve_files(
            context,
            root,
            IssueKind::InvalidChecksum,
            "invalid checksum of file",
            findings,
        )
    }

    /// Shared handling of the per-file buckets.
    fn resolve_files(
        &self,
        context: &FixityContext<'_>,
        root: &Path,
        kind: IssueKind,
        label: &str,
        findings: &[FixityFinding],
    ) -> Result<(), FixityFault> {
        let decision = decide(context.config, context.invocation, kind);
        let mut issues = Vec::with_capacity(findings.len());
        let mut files = Vec::with_capacity(findings.len());
        for finding in findings {
            let (relative, manifest) = describe_paths(root, finding);
            issues.push(build_issue(
                context,
                kind,
                &relative,
                format!("{label}: {relative} declared in: {manifest}. {}", decision.note),
                &decision,
            ));
            files.push(relative);
        }
        let message = format!("{} issue occurred, files: [{}]", kind.code(), files.join(", "));
        self.apply(context, kind, &decision, issues, &message)
    }

    /// Persists the issues and turns the decision into a result.
    fn apply(
        &self,
        context: &FixityContext<'_>,
        kind: IssueKind,
        decision: &IssuePolicyDecision,
        issues: Vec<Issue>,
        message: &str,
    ) -> Result<(), FixityFault> {
        warn!(
            workflow = %context.workflow,
            code = kind.code(),
            count = issues.len(),
            "fixity issue raised"
        );
        self.store.save(&issues)?;
        match decision.outcome {
            PolicyOutcome::Continue => {
                info!(workflow = %context.workflow, code = kind.code(), note = %decision.note, "fixity issue resolved by config, continuing");
                Ok(())
            }
            PolicyOutcome::Abort => {
                info!(workflow = %context.workflow, code = kind.code(), note = %decision.note, "fixity issue resolved by config, aborting");
                Err(FixityFault::Abort {
                    message: trim_message(message),
                })
            }
            PolicyOutcome::Escalate => {
                info!(workflow = %context.workflow, code = kind.code(), note = %decision.note, "fixity issue escalated");
                Err(FixityFault::Escalation {
                    issues,
                })
            }
        }
    }
}

/// Builds one issue record.
fn build_issue(
    context: &FixityContext<'_>,
    kind: IssueKind,
    relative: &str,
    description: String,
    decision: &IssuePolicyDecision,
) -> Issue {
    Issue {
        workflow: context.workflow.clone(),
        tool: context.tool.clone(),
        kind,
        related_format: context.formats.format_for(relative),
        description,
        resolved_by_config: decision.resolved_by_config(),
    }
}

/// Returns the finding's file and manifest relative to the package root.
fn describe_paths(root: &Path, finding: &FixityFinding) -> (String, String) {
    (relative_to(root, &finding.path), relative_to(root, &finding.manifest))
}
