//! Contract Synthesizer
//!
//! Produces, per declaration, three ordered instruction lists:
//! - validate: required / enum membership / nested checks (callable standalone)
//! - unmarshal: structural decode through a plain alias, or branch trial for
//!   unions, then defaults, then validate
//! - marshal: validate, then structural encode (or the populated branch)
//!
//! Branch trial is a single instruction ([`Instruction::TryBranches`]) shared
//! by every `anyOf` / `oneOf` type. It decodes the input into each branch,
//! counts the successes and checks the count against the [`BranchPolicy`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::decl::{CombinatorPolicy, DeclKind, TypeDecl, TypeRef, ValidationRule};

/// How many branch decodes must succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    /// `anyOf`: N >= 1
    AtLeastOne,
    /// `oneOf`: N == 1
    ExactlyOne,
}

impl BranchPolicy {
    pub fn for_combinator(policy: CombinatorPolicy) -> Option<Self> {
        match policy {
            CombinatorPolicy::AnyOf => Some(BranchPolicy::AtLeastOne),
            CombinatorPolicy::OneOf => Some(BranchPolicy::ExactlyOne),
            CombinatorPolicy::AllOf => None,
        }
    }

    pub fn accepts(&self, matches: usize) -> bool {
        match self {
            BranchPolicy::AtLeastOne => matches >= 1,
            BranchPolicy::ExactlyOne => matches == 1,
        }
    }
}

impl fmt::Display for BranchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPolicy::AtLeastOne => write!(f, "at least one"),
            BranchPolicy::ExactlyOne => write!(f, "exactly one"),
        }
    }
}

/// One candidate in a branch trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchTrial {
    pub field: String,
    pub type_ref: TypeRef,
}

/// A single step of a generated method body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    // ---- validate ----
    /// Field must be present (non-nil)
    CheckRequired {
        field: String,
        json_name: Option<String>,
        message: String,
    },
    /// Field value, when present, must be one of `allowed`
    CheckEnum {
        field: String,
        enum_name: String,
        allowed: Vec<Value>,
        message: String,
    },
    /// Delegate to the nested type's validate
    ValidateNested {
        field: String,
        type_name: String,
        message: String,
    },
    /// The enum value itself must be one of its constants
    CheckSelfEnum { enum_name: String, allowed: Vec<Value> },
    /// Validate the aliased value
    ValidateAlias { target: TypeRef },
    /// Count populated branch fields against the policy
    CheckBranches { policy: BranchPolicy, fields: Vec<String> },

    // ---- unmarshal ----
    /// Structural decode via a plain alias of the same shape
    DecodeAlias { alias: String },
    /// Decode the whole input into an embedded `allOf` member
    DecodeEmbedded { field: String, type_ref: TypeRef },
    /// Decode the input into every branch and count successes
    TryBranches { policy: BranchPolicy, branches: Vec<BranchTrial> },
    /// Fill an absent field with its default
    ApplyDefault {
        field: String,
        json_name: Option<String>,
        value: Value,
        display: String,
    },
    InvokeValidate,

    // ---- marshal ----
    /// Structural encode via the plain alias
    EncodeAlias { alias: String },
    /// Merge an embedded member's encoding into the output
    MergeEmbedded { field: String },
    /// Encode the first populated branch in declaration order
    EncodePopulatedBranch { fields: Vec<String> },
}

/// Method bodies for one declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub validate: Vec<Instruction>,
    pub unmarshal: Vec<Instruction>,
    pub marshal: Vec<Instruction>,
}

/// Name of the plain alias used to decode without re-entering custom unmarshal
pub fn plain_alias(type_name: &str) -> String {
    format!("Plain{}", type_name)
}

/// Synthesize the contract for a declaration
pub fn synthesize(decl: &TypeDecl) -> Contract {
    Contract {
        validate: synthesize_validate(decl),
        unmarshal: synthesize_unmarshal(decl),
        marshal: synthesize_marshal(decl),
    }
}

fn branch_policy(decl: &TypeDecl) -> Option<BranchPolicy> {
    decl.combinator
        .as_ref()
        .and_then(|c| BranchPolicy::for_combinator(c.policy))
}

fn branch_fields(decl: &TypeDecl) -> Vec<String> {
    decl.fields.iter().map(|f| f.name.clone()).collect()
}

fn synthesize_validate(decl: &TypeDecl) -> Vec<Instruction> {
    let mut out = Vec::new();

    match decl.kind {
        DeclKind::Enum => {
            out.push(Instruction::CheckSelfEnum {
                enum_name: decl.name.clone(),
                allowed: decl.enum_values.iter().map(|v| v.value.to_json()).collect(),
            });
            return out;
        }
        DeclKind::Alias => {
            if let Some(target) = &decl.alias_of {
                if target.named().is_some() {
                    out.push(Instruction::ValidateAlias { target: target.clone() });
                }
            }
            return out;
        }
        DeclKind::Struct => {}
    }

    if let Some(policy) = branch_policy(decl) {
        out.push(Instruction::CheckBranches {
            policy,
            fields: branch_fields(decl),
        });
    }

    for field in &decl.fields {
        for rule in &field.rules {
            if let ValidationRule::Required { message } = rule {
                out.push(Instruction::CheckRequired {
                    field: field.name.clone(),
                    json_name: field.json_name.clone(),
                    message: message.clone(),
                });
            }
        }
    }
    for field in &decl.fields {
        for rule in &field.rules {
            if let ValidationRule::EnumMembership { enum_name, allowed, message } = rule {
                out.push(Instruction::CheckEnum {
                    field: field.name.clone(),
                    enum_name: enum_name.clone(),
                    allowed: allowed.clone(),
                    message: message.clone(),
                });
            }
        }
    }
    for field in &decl.fields {
        for rule in &field.rules {
            if let ValidationRule::NestedValidate { type_name, message } = rule {
                out.push(Instruction::ValidateNested {
                    field: field.name.clone(),
                    type_name: type_name.clone(),
                    message: message.clone(),
                });
            }
        }
    }

    out
}

fn synthesize_unmarshal(decl: &TypeDecl) -> Vec<Instruction> {
    let mut out = Vec::new();

    if let Some(policy) = branch_policy(decl) {
        out.push(Instruction::TryBranches {
            policy,
            branches: decl
                .fields
                .iter()
                .map(|f| BranchTrial {
                    field: f.name.clone(),
                    type_ref: f.type_ref.clone(),
                })
                .collect(),
        });
        out.push(Instruction::InvokeValidate);
        return out;
    }

    out.push(Instruction::DecodeAlias {
        alias: plain_alias(&decl.name),
    });

    for field in decl.fields.iter().filter(|f| f.embedded) {
        out.push(Instruction::DecodeEmbedded {
            field: field.name.clone(),
            type_ref: field.type_ref.clone(),
        });
    }

    for field in &decl.fields {
        if let Some(default) = &field.default {
            out.push(Instruction::ApplyDefault {
                field: field.name.clone(),
                json_name: field.json_name.clone(),
                value: default.raw.clone(),
                display: default.display.clone(),
            });
        }
    }

    out.push(Instruction::InvokeValidate);
    out
}

fn synthesize_marshal(decl: &TypeDecl) -> Vec<Instruction> {
    let mut out = vec![Instruction::InvokeValidate];

    if branch_policy(decl).is_some() {
        out.push(Instruction::EncodePopulatedBranch {
            fields: branch_fields(decl),
        });
        return out;
    }

    out.push(Instruction::EncodeAlias {
        alias: plain_alias(&decl.name),
    });
    for field in decl.fields.iter().filter(|f| f.embedded) {
        out.push(Instruction::MergeEmbedded {
            field: field.name.clone(),
        });
    }
    out
}
