//! vrctl - operator CLI for virtual router NICs.
//!
//! Wraps the reconciler from `nebula-reconcile` around an HTTP control-plane
//! client so operators can attach and detach router NICs and get an answer
//! only once the change is visible.
//!
//! ## Modules
//!
//! - `client`: `HttpControlPlane`, the reqwest-backed control plane
//! - `commands`: clap command tree
//! - `config`: layered configuration
//! - `output`: table and JSON rendering

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use client::HttpControlPlane;
pub use config::Config;
