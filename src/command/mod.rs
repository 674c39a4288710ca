//! Rule-based translation and command execution
//!
//! raw text -> normalize -> IntentMatcher -> FilterExtractor -> CommandBuilder
//! The finished command line can then be run by the CommandExecutor.

pub mod builder;
pub mod executor;
pub mod filters;
pub mod intent;
pub mod normalize;
pub mod vocabulary;

pub use builder::{CommandBuilder, DelegateRequired};
pub use executor::CommandExecutor;
pub use filters::{FilterExtractor, FilterSet};
pub use intent::{IntentDefinition, IntentMatcher};
pub use normalize::normalize;
pub use vocabulary::Vocabulary;
