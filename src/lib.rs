//! depgen — incremental `.d` fragment generator for C/C++ projects.
//!
//! This crate is the engine behind the `depgen` binary (see `src/main.rs`):
//! a file-search resolver that crawls `#include` graphs, a multi-tier
//! per-file cache, and a periodic scan controller that decides whether
//! each source file's makefile fragment needs regenerating. The binary
//! itself only wires this engine to a CLI and a `tracing` subscriber.

pub mod backparse;
pub mod config;
pub mod fragment;
pub mod pathutil;
pub mod relocate;
pub mod resolver;
pub mod scan;
pub mod searchpath;
pub mod types;
