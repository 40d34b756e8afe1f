//! Code Generation
//!
//! Compiles a canonical [`SchemaGraph`] into an ordered list of [`TypeDecl`]s.
//!
//! Architecture:
//! - CodegenContext: per-compilation state (names, visited nodes, diagnostics)
//! - builder: walks the graph and emits declarations
//! - combinator / enums: sub-passes the builder delegates to
//! - contract: validate / unmarshal / marshal instruction lists per declaration
//!
//! Every compilation owns a fresh context. Nothing is shared between two
//! compilations, so independent documents can be compiled concurrently.

pub mod builder;
pub mod combinator;
pub mod config;
pub mod contract;
pub mod decl;
pub mod enums;
pub mod names;

pub use config::{CodegenConfig, DiagnosticLevel, DiagnosticsConfig, NamingConfig};
pub use contract::{BranchPolicy, BranchTrial, Contract, Instruction};
pub use decl::{
    Combinator, CombinatorPolicy, CombinatorVariant, DeclFlags, DeclKind, DefaultValue,
    EnumLiteral, EnumValue, FieldDecl, TypeDecl, TypeRef, ValidationRule,
};
pub use names::{NameHint, NameResolver};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CompileError, Result};
use crate::graph::{
    compute_cycle_analysis, normalize, CycleAnalysis, DiagnosticItem, Diagnostics, NodeId,
    PrimitiveType, SchemaGraph,
};
use crate::schema::Schema;

// =============================================================================
// CodegenContext
// =============================================================================

/// Materialized enumeration, kept for default and membership lookups
#[derive(Debug, Clone)]
pub(crate) struct EnumModel {
    pub base: PrimitiveType,
    pub values: Vec<EnumValue>,
}

/// Mutable state for one compilation, threaded through every pass
pub struct CodegenContext<'g> {
    graph: &'g SchemaGraph,
    config: &'g CodegenConfig,
    analysis: CycleAnalysis,
    names: NameResolver,

    /// Canonical node -> type reference (set before recursing, so cycles stop here)
    visited: HashMap<NodeId, TypeRef>,

    /// Declaration name -> kind, known before the declaration is finished
    kinds: HashMap<String, DeclKind>,

    enums: HashMap<String, EnumModel>,

    decls: Vec<TypeDecl>,
    diagnostics: Diagnostics,
}

impl<'g> CodegenContext<'g> {
    /// Create a context for a graph. Findings recorded by the normalizer are
    /// re-reported through the configured diagnostic levels.
    pub fn new(graph: &'g SchemaGraph, config: &'g CodegenConfig) -> Result<Self> {
        let analysis = compute_cycle_analysis(graph);

        let mut ctx = Self {
            graph,
            config,
            analysis,
            names: NameResolver::new(config.naming.clone()),
            visited: HashMap::new(),
            kinds: HashMap::new(),
            enums: HashMap::new(),
            decls: Vec::new(),
            diagnostics: Diagnostics::new(),
        };

        for item in graph.warnings() {
            ctx.report(item.clone())?;
        }

        Ok(ctx)
    }

    /// Record a diagnostic at its configured level
    pub(crate) fn report(&mut self, item: DiagnosticItem) -> Result<()> {
        match self.config.diagnostics.level(item.code) {
            DiagnosticLevel::Ignore => Ok(()),
            DiagnosticLevel::Warn => {
                self.diagnostics.push(item);
                Ok(())
            }
            DiagnosticLevel::Error => Err(CompileError::Escalated(Box::new(item))),
        }
    }

    pub fn graph(&self) -> &SchemaGraph {
        self.graph
    }

    pub fn analysis(&self) -> &CycleAnalysis {
        &self.analysis
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn names(&self) -> &NameResolver {
        &self.names
    }

    /// Synthesize contracts, sort by name and hand the declarations over
    pub fn finish(self) -> GeneratedOutput {
        let mut decls = self.decls;
        for decl in &mut decls {
            decl.contract = contract::synthesize(decl);
        }
        decls.sort_by(|a, b| a.name.cmp(&b.name));

        let stats = self.names.stats();
        tracing::debug!(
            decls = decls.len(),
            titled = stats.titled,
            derived = stats.derived,
            disambiguated = stats.disambiguated,
            warnings = self.diagnostics.warning_count(),
            "compiled schema"
        );

        GeneratedOutput {
            package: self.config.package.clone(),
            decls,
            diagnostics: self.diagnostics,
        }
    }
}

// =============================================================================
// Generated Output
// =============================================================================

/// Output of one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    /// Target package / namespace identifier
    pub package: String,
    /// Declarations, sorted by name
    pub decls: Vec<TypeDecl>,
    /// Non-terminal findings
    pub diagnostics: Diagnostics,
}

impl GeneratedOutput {
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decls.iter().map(|d| d.name.as_str())
    }

    pub fn type_count(&self) -> usize {
        self.decls.len()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Compile a parsed schema document
pub fn compile(schema: &Schema, config: &CodegenConfig) -> Result<GeneratedOutput> {
    let graph = normalize(schema)?;
    let mut ctx = CodegenContext::new(&graph, config)?;
    ctx.build()?;
    Ok(ctx.finish())
}

/// Parse and compile a schema document
pub fn compile_str(text: &str, config: &CodegenConfig) -> Result<GeneratedOutput> {
    let schema = Schema::from_json(text)?;
    compile(&schema, config)
}
