//! Purpose: Shared library crate used by the `fhandle` CLI and tests.
//! Exports: `api` (handles, paste reports, path helpers, errors) and `notice`.
//! Role: Stateful file handles whose cached metadata tracks rename/move/remove.
//! Invariants: Every filesystem-touching call is synchronous and never retried.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod core;
pub mod notice;
