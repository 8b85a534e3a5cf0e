// crates/microcks-harness-config/src/lib.rs
// ============================================================================
// Module: Microcks Harness Config Library
// Description: Configuration model and validation for the harness.
// Purpose: Single source of truth for microcks-harness.toml semantics.
// Dependencies: microcks-harness-core, serde, toml
// ============================================================================

//! ## Overview
//! `microcks-harness-config` loads `microcks-harness.toml`, validates it
//! fail-closed, and converts it into the policies, client settings, and
//! artifact set consumed by `microcks-harness-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
