//! Kube Intent - natural language to kubectl translation
//!
//! Short operational requests are normalized, matched against a fixed
//! intent table and turned into a single `kubectl` invocation. Requests the
//! rules cannot resolve are delegated to a structured-generation service.

pub mod command;
pub mod core;
pub mod llm;
pub mod pipeline;
pub mod usage;
