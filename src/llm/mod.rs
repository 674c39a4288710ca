//! Structured-generation fallback
//!
//! The service is only consulted for requests the rules cannot translate.

pub mod client;
pub mod fallback;

pub use client::{Generation, GenerationOutcome, GenerationRequest, LlmClient, StructuredGenerator};
pub use fallback::{
    extract_command, DisabledFallback, FallbackAdapter, FallbackError, FallbackErrorKind,
    LlmFallback,
};
