//! JSON Schema (draft-04-ish) compiler, resolver, and validator (§4.6-§4.8).

pub mod compiler;
pub mod resolver;
pub mod validator;

pub use compiler::{compile, CompiledSchema, JsonType, NodeId};
pub use resolver::{resolve, ResolveOutcome};
pub use validator::{apply, validate};
