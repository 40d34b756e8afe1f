//! Schema Typegen
//!
//! Compiles JSON Schema documents into language-neutral type declarations,
//! and synthesizes a validate / unmarshal / marshal contract for every type.
//!
//! ## Pipeline
//!
//! ```text
//! Schema (serde)
//!   └─ normalize ──────────► SchemaGraph    canonical, deduplicated, $refs resolved
//!        └─ cycle analysis ► CycleAnalysis  reference cycles (SCCs)
//!             └─ build ────► TypeDecl[]     names, fields, enums, combinators
//!                  └─ synthesize ► Contract per TypeDecl
//! ```
//!
//! ## Example
//!
//! ```
//! use schema_typegen::{compile_str, CodegenConfig, Runtime};
//! use serde_json::json;
//!
//! let output = compile_str(
//!     r#"{"title": "User", "required": ["name"], "properties": {"name": {"type": "string"}}}"#,
//!     &CodegenConfig::default(),
//! ).unwrap();
//!
//! let runtime = Runtime::new(&output);
//! assert!(runtime.unmarshal("User", &json!({"name": "ada"})).is_ok());
//! assert!(runtime.unmarshal("User", &json!({})).is_err());
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod schema;

pub use codegen::{
    compile, compile_str, CodegenConfig, Contract, DeclKind, FieldDecl, GeneratedOutput,
    Instruction, TypeDecl, TypeRef,
};
pub use config::TypegenConfig;
pub use error::{CompileError, Result, RuntimeValidationError, SchemaError};
pub use graph::{normalize, DiagnosticCode, Diagnostics, SchemaGraph};
pub use runtime::{Instance, Runtime};
pub use schema::Schema;
