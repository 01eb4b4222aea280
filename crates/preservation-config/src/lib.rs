// crates/preservation-config/src/lib.rs
// ============================================================================
// Module: Preservation Config Library
// Description: Configuration model and validation for preservation tooling.
// Purpose: Single source of truth for preservation.toml semantics.
// Dependencies: preservation-fixity, preservation-storage, preservation-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! `preservation-config` defines the configuration model shared by the
//! preservation CLI and embedders: workspace root, archival storage endpoint
//! and credentials, issue/object store backend, METS namespace, and logging.
//! Loading is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
