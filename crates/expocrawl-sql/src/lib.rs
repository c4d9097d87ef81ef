//! Finding warehouse relations in raw SQL
//!
//! This crate handles:
//! - Building a registry of known relations from the manifest
//! - Scanning SQL text for relation names on token boundaries
//!
//! Matching is name-occurrence based. SQL is never parsed into an AST.

pub mod registry;
pub mod matcher;

pub use registry::{RelationRegistry, RegistryError};
pub use matcher::{find_models, ModelMatches, ScanError, SqlModelMatcher};
