//! Familiar JSON Schema
//!
//! Loads JSON Schema documents (draft 3, 4 and 6) into immutable, possibly
//! cyclic schema graphs and validates JSON values against them.
//!
//! ## Features
//!
//! - **Scoped references**: `$id`/`id` rebasing, JSON Pointer and plain-name
//!   `$ref` fragments, preloaded and fetched documents
//! - **Cycle-safe graphs**: schemas live in an arena, so recursive schemas are
//!   index cycles; loops that could never consume the instance are rejected
//! - **Diagnostics**: every loading problem is a coded issue in one report,
//!   with strict and flexible modes
//! - **Compile once, validate many**: one error tree per `validate` call
//!
//! ## Architecture
//!
//! ```text
//! JSON document
//!   └─ loader (keyword registry, cache, $ref resolution)
//!        └─ SchemaGraph
//!             └─ validator::compile
//!                  └─ CompiledValidator::validate(instance, report)
//! ```

pub mod config;
pub mod error;
pub mod keyword;
pub mod loader;
pub mod location;
pub mod number;
pub mod schema;
pub mod validator;

pub use config::ValidatorConfig;
pub use error::{FetchError, Result, SchemaError};
pub use keyword::{Draft, JsonType, KeywordMetadata};
pub use loader::{LoaderOptions, LoadingIssue, LoadingReport, SchemaLoader, Severity};
pub use location::{JsonPointer, SchemaLocation};
pub use schema::{Schema, SchemaGraph, SchemaId, SchemaKeyword, SchemaRef};
pub use validator::{
    compile, compile_with, CompileOptions, CompiledValidator, FormatRegistry, JsonSchema, ValidationError,
    ValidationReport,
};
