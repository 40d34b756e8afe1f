//! Name Resolution Pass
//!
//! Assigns a unique declared name to every canonical node that becomes a type,
//! and derives field and enum constant identifiers. Rules, in order:
//! 1. explicit `title`, else the `definitions` entry name
//! 2. a name derived from the parent path (`<Parent><Property>`, ...)
//! 3. the configured fallback (`Object`)
//!
//! A name that is already taken by another node is retried with the
//! path-derived name, then the definition name. If all of them are taken the
//! compilation fails with [`CompileError::NamingConflict`]; a declaration is
//! never overwritten.
//!
//! Results are cached per node, so asking twice returns the same name.

use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::config::NamingConfig;
use crate::error::{CompileError, Result};
use crate::graph::{NodeId, SchemaGraph};

// =============================================================================
// Name Source
// =============================================================================

/// Which rule produced a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Title,
    Definition,
    Derived,
    Fallback,
}

// =============================================================================
// Resolved Name Entry
// =============================================================================

/// Entry in the name resolution map
#[derive(Debug, Clone)]
pub struct ResolvedName {
    pub canonical_name: String,
    pub source: NameSource,
    /// JSON pointer of the node (for diagnostics)
    pub schema_path: String,
    /// Whether this name was qualified due to a collision
    pub disambiguated: bool,
}

/// Naming hint supplied by the caller that reaches a node
#[derive(Debug, Clone, Default)]
pub struct NameHint {
    /// Name derived from the parent path, e.g. `ParentChild`
    pub derived: Option<String>,
}

impl NameHint {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn derived(name: impl Into<String>) -> Self {
        Self {
            derived: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Node(NodeId),
    Constant,
}

#[derive(Debug, Clone)]
struct Claim {
    owner: Owner,
    description: String,
}

// =============================================================================
// Name Resolver
// =============================================================================

/// Per-compilation name registry. Never shared between compilations.
pub struct NameResolver {
    /// node -> resolved name entry
    resolved: HashMap<NodeId, ResolvedName>,

    /// Tracks which names are in use to detect collisions
    claims: HashMap<String, Claim>,

    naming_config: NamingConfig,

    separators: Regex,
}

impl NameResolver {
    pub fn new(naming_config: NamingConfig) -> Self {
        Self {
            resolved: HashMap::new(),
            claims: HashMap::new(),
            naming_config,
            separators: Regex::new(r"[^A-Za-z0-9]+").expect("valid separator pattern"),
        }
    }

    /// Name of a node, deriving and registering it on first request
    pub fn name_of(&mut self, graph: &SchemaGraph, id: NodeId, hint: NameHint) -> Result<String> {
        if let Some(resolved) = self.resolved.get(&id) {
            return Ok(resolved.canonical_name.clone());
        }

        let node = graph.node(id);
        let titled = node.title.as_deref().map(|t| self.type_name(t)).filter(|n| !n.is_empty());
        let defined = node
            .definition
            .as_deref()
            .map(|d| self.type_name(d))
            .filter(|n| !n.is_empty());
        let derived = hint.derived.filter(|n| !n.is_empty());

        let mut candidates: Vec<(String, NameSource)> = Vec::new();
        if let Some(name) = titled {
            candidates.push((name, NameSource::Title));
        }
        if let Some(name) = defined {
            candidates.push((name, NameSource::Definition));
        }
        if let Some(name) = derived.clone() {
            candidates.push((name, NameSource::Derived));
        }
        if candidates.is_empty() {
            candidates.push((self.naming_config.fallback_name.clone(), NameSource::Fallback));
        }

        // Collision order: primary, then path-derived, then definition name
        let (primary, primary_source) = candidates[0].clone();
        let mut order = vec![(primary.clone(), primary_source)];
        if let Some(name) = derived {
            order.push((name, NameSource::Derived));
        }
        order.extend(candidates.iter().skip(1).cloned());

        let description = format!("{} ({})", node.location, id);
        let mut conflict: Option<Claim> = None;
        for (index, (candidate, source)) in order.into_iter().enumerate() {
            if index > 0 && candidate == primary {
                continue;
            }
            match self.claims.get(&candidate) {
                Some(existing) if existing.owner != Owner::Node(id) => {
                    if conflict.is_none() {
                        conflict = Some(existing.clone());
                    }
                }
                _ => {
                    let disambiguated = index > 0;
                    if disambiguated {
                        tracing::debug!(
                            name = %candidate,
                            taken = %primary,
                            "qualified colliding type name"
                        );
                    }
                    self.claims.insert(
                        candidate.clone(),
                        Claim {
                            owner: Owner::Node(id),
                            description: description.clone(),
                        },
                    );
                    self.resolved.insert(
                        id,
                        ResolvedName {
                            canonical_name: candidate.clone(),
                            source,
                            schema_path: node.location.clone(),
                            disambiguated,
                        },
                    );
                    return Ok(candidate);
                }
            }
        }

        Err(CompileError::NamingConflict {
            name: primary,
            first: conflict.map(|c| c.description).unwrap_or_default(),
            second: description,
        })
    }

    /// Cached name of a node, if it has been named
    pub fn get(&self, id: NodeId) -> Option<&ResolvedName> {
        self.resolved.get(&id)
    }

    pub fn canonical_name(&self, id: NodeId) -> Option<&str> {
        self.resolved.get(&id).map(|r| r.canonical_name.as_str())
    }

    /// Register an enum constant identifier in the type namespace
    pub fn constant_name(&mut self, enum_name: &str, literal: &Value) -> Result<String> {
        let name = format!("{}{}", enum_name, self.literal_suffix(literal));
        let description = format!("constant {} of {}", literal, enum_name);

        if let Some(existing) = self.claims.get(&name) {
            return Err(CompileError::NamingConflict {
                name,
                first: existing.description.clone(),
                second: description,
            });
        }

        self.claims.insert(
            name.clone(),
            Claim {
                owner: Owner::Constant,
                description,
            },
        );
        Ok(name)
    }

    /// Declared identifier for a struct field.
    ///
    /// A JSON name ending in `id` (any case) always yields an identifier that
    /// ends in upper-case `ID`: `employeeId` -> `EmployeeID`.
    pub fn field_name(&self, json_name: &str) -> String {
        let mut name = self.type_name(json_name);
        if name.is_empty() {
            name = "Field".to_string();
        }
        if json_name.to_ascii_lowercase().ends_with("id")
            && !name.ends_with("ID")
            && name.len() >= 2
        {
            let cut = name.len() - 2;
            if name.is_char_boundary(cut) {
                name.truncate(cut);
                name.push_str("ID");
            }
        }
        name
    }

    /// PascalCase identifier usable as a type name
    pub fn type_name(&self, s: &str) -> String {
        let name = self.to_pascal_case(s);
        match name.chars().next() {
            Some(c) if c.is_ascii_digit() => format!("N{}", name),
            _ => name,
        }
    }

    /// Title-cased form of an enum literal
    fn literal_suffix(&self, literal: &Value) -> String {
        let text = match literal {
            Value::String(s) if s.parse::<f64>().is_ok() => numeric_words(s),
            Value::String(s) => self.to_pascal_case(s),
            Value::Number(n) => numeric_words(&n.to_string()),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Null => "Null".to_string(),
            other => self.to_pascal_case(&other.to_string()),
        };
        if text.is_empty() {
            "Empty".to_string()
        } else {
            text
        }
    }

    /// Convert string to PascalCase, respecting acronyms
    pub fn to_pascal_case(&self, s: &str) -> String {
        self.separators
            .split(s)
            .flat_map(split_camel_case)
            .map(|word| self.case_word(&word))
            .collect()
    }

    /// Apply casing to a word, preserving acronyms
    fn case_word(&self, word: &str) -> String {
        if self.naming_config.is_acronym(word) {
            return word.to_ascii_uppercase();
        }

        let all_caps = word.chars().any(|c| c.is_ascii_alphabetic())
            && word.chars().all(|c| !c.is_ascii_lowercase());
        if self.naming_config.preserve_screaming_case && all_caps {
            return word.to_string();
        }

        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = first.to_uppercase().to_string();
                for c in chars {
                    result.push(c.to_ascii_lowercase());
                }
                result
            }
        }
    }

    pub fn stats(&self) -> NameResolverStats {
        let mut stats = NameResolverStats::default();
        for entry in self.resolved.values() {
            match entry.source {
                NameSource::Title => stats.titled += 1,
                NameSource::Definition => stats.definitions += 1,
                NameSource::Derived => stats.derived += 1,
                NameSource::Fallback => stats.fallback += 1,
            }
            if entry.disambiguated {
                stats.disambiguated += 1;
            }
        }
        stats
    }
}

/// Statistics from name resolution
#[derive(Debug, Default)]
pub struct NameResolverStats {
    pub titled: usize,
    pub definitions: usize,
    pub derived: usize,
    pub fallback: usize,
    pub disambiguated: usize,
}

/// Split one separator-free chunk at camel-case boundaries:
/// `employeeId` -> `employee`, `Id`; `HTTPConfig` -> `HTTP`, `Config`.
fn split_camel_case(chunk: &str) -> Vec<String> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !current.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_ascii_lowercase() && c.is_ascii_uppercase())
                || (prev.is_ascii_uppercase()
                    && c.is_ascii_uppercase()
                    && next.map_or(false, |n| n.is_ascii_lowercase()));
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn numeric_words(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        match c {
            '-' => out.push_str("Minus"),
            '+' => out.push_str("Plus"),
            '.' => out.push_str("Point"),
            c if c.is_ascii_alphanumeric() => out.push(c.to_ascii_uppercase()),
            _ => {}
        }
    }
    out
}

// =============================================================================
// Field Names
// =============================================================================

/// Field identifiers claimed within one declaration.
///
/// Distinct JSON names can case to the same identifier (`fooBar`, `foo_bar`).
/// A later claim of a taken identifier gets the first free numeric suffix:
/// `FooBar`, `FooBar2`, ...
#[derive(Debug, Default)]
pub(crate) struct FieldNames {
    claimed: HashSet<String>,
}

impl FieldNames {
    pub(crate) fn claim(&mut self, base: String) -> String {
        if self.claimed.insert(base.clone()) {
            return base;
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if self.claimed.insert(candidate.clone()) {
                tracing::debug!(
                    field = %base,
                    renamed = %candidate,
                    "field identifier already taken"
                );
                return candidate;
            }
            suffix += 1;
        }
    }
}
