//! Projection rule set
//!
//! Every serialized node kind has a fixed, ordered list of fields. The rule
//! set decides which of them reach the artifact: a kind with a whitelist
//! emits exactly the whitelisted fields (in the kind's own order), any other
//! kind emits everything not on the global blacklist.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Kind of an output object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Attribute,
    Class,
    Enum,
    EnumItem,
    Field,
    Function,
    Parameter,
    Typedef,
    Macro,
    Namespace,
    PrimitiveType,
    PointerType,
    ArrayType,
    FunctionType,
    QualifiedType,
    UnexposedType,
    Statement,
    Expression,
    Snapshot,
}

impl NodeKind {
    pub const ALL: [NodeKind; 19] = [
        NodeKind::Attribute,
        NodeKind::Class,
        NodeKind::Enum,
        NodeKind::EnumItem,
        NodeKind::Field,
        NodeKind::Function,
        NodeKind::Parameter,
        NodeKind::Typedef,
        NodeKind::Macro,
        NodeKind::Namespace,
        NodeKind::PrimitiveType,
        NodeKind::PointerType,
        NodeKind::ArrayType,
        NodeKind::FunctionType,
        NodeKind::QualifiedType,
        NodeKind::UnexposedType,
        NodeKind::Statement,
        NodeKind::Expression,
        NodeKind::Snapshot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Attribute => "attribute",
            NodeKind::Class => "class",
            NodeKind::Enum => "enum",
            NodeKind::EnumItem => "enum_item",
            NodeKind::Field => "field",
            NodeKind::Function => "function",
            NodeKind::Parameter => "parameter",
            NodeKind::Typedef => "typedef",
            NodeKind::Macro => "macro",
            NodeKind::Namespace => "namespace",
            NodeKind::PrimitiveType => "primitive_type",
            NodeKind::PointerType => "pointer_type",
            NodeKind::ArrayType => "array_type",
            NodeKind::FunctionType => "function_type",
            NodeKind::QualifiedType => "qualified_type",
            NodeKind::UnexposedType => "unexposed_type",
            NodeKind::Statement => "statement",
            NodeKind::Expression => "expression",
            NodeKind::Snapshot => "snapshot",
        }
    }

    /// All fields of this kind, in emission order
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            NodeKind::Attribute => &["name", "kind", "arguments", "parent", "span"],
            NodeKind::Class => &[
                "name",
                "class_kind",
                "is_definition",
                "size_of",
                "align_of",
                "type_kind",
                "fields",
                "classes",
                "attributes",
                "parent",
                "span",
            ],
            NodeKind::Enum => &[
                "name",
                "is_definition",
                "size_of",
                "type_kind",
                "integer_type",
                "items",
                "attributes",
                "parent",
                "span",
            ],
            NodeKind::EnumItem => &["name", "value", "parent", "span"],
            NodeKind::Field => &[
                "name",
                "type",
                "bit_field_width",
                "storage_qualifier",
                "init_value",
                "attributes",
                "parent",
                "span",
            ],
            NodeKind::Function => &[
                "name",
                "flags",
                "linkage_kind",
                "calling_convention",
                "return_type",
                "parameters",
                "storage_qualifier",
                "attributes",
                "parent",
                "span",
            ],
            NodeKind::Parameter => &["name", "type", "parent", "span"],
            NodeKind::Typedef => &[
                "name",
                "size_of",
                "type_kind",
                "element_type",
                "attributes",
                "parent",
                "span",
            ],
            NodeKind::Macro => &["name", "parameters", "value", "parent", "span"],
            NodeKind::Namespace => &[
                "name",
                "classes",
                "enums",
                "fields",
                "functions",
                "typedefs",
                "namespaces",
                "parent",
                "span",
            ],
            NodeKind::PrimitiveType => &["kind", "size_of", "type_kind"],
            NodeKind::PointerType => &["size_of", "type_kind", "element_type"],
            NodeKind::ArrayType => &["size", "size_of", "type_kind", "element_type"],
            NodeKind::FunctionType => &["type_kind", "return_type", "parameters", "is_variadic"],
            NodeKind::QualifiedType => &["type_kind", "qualifiers", "size_of", "element_type"],
            NodeKind::UnexposedType => &["name", "type_kind", "size_of"],
            NodeKind::Statement => &[
                "kind",
                "name",
                "type",
                "is_static",
                "init",
                "condition",
                "then",
                "else",
                "increment",
                "value",
                "expr",
                "label",
                "body",
                "cases",
                "span",
            ],
            NodeKind::Expression => &[
                "kind",
                "op",
                "value",
                "name",
                "type",
                "callee",
                "base",
                "left",
                "right",
                "operand",
                "condition",
                "then",
                "else",
                "index",
                "arguments",
                "items",
                "is_arrow",
                "span",
            ],
            NodeKind::Snapshot => &[
                "attributes",
                "classes",
                "enums",
                "fields",
                "functions",
                "typedefs",
                "macros",
                "namespaces",
                "func_map",
            ],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which fields reach the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionRules {
    /// Dropped from every kind without a whitelist
    pub blacklist: BTreeSet<String>,
    /// Per kind, the only fields emitted
    pub whitelist: BTreeMap<NodeKind, Vec<String>>,
}

impl Default for ProjectionRules {
    fn default() -> Self {
        let whitelist: [(NodeKind, &[&str]); 11] = [
            (NodeKind::Enum, &["name", "size_of", "type_kind", "items", "span"]),
            (NodeKind::EnumItem, &["name", "value"]),
            (NodeKind::Class, &["name", "size_of", "fields", "class_kind", "span"]),
            (
                NodeKind::Field,
                &["name", "type", "bit_field_width", "storage_qualifier", "init_value"],
            ),
            (NodeKind::PrimitiveType, &["kind", "size_of", "type_kind"]),
            (NodeKind::Typedef, &["name", "size_of", "type_kind", "element_type"]),
            (NodeKind::PointerType, &["size_of", "type_kind", "element_type"]),
            (NodeKind::ArrayType, &["size", "size_of", "type_kind", "element_type"]),
            (NodeKind::FunctionType, &["type_kind", "return_type", "parameters"]),
            (NodeKind::Parameter, &["name", "type"]),
            (
                NodeKind::Function,
                &[
                    "name",
                    "flags",
                    "linkage_kind",
                    "parameters",
                    "return_type",
                    "storage_qualifier",
                ],
            ),
        ];

        ProjectionRules {
            blacklist: ["parent", "span", "comment", "visibility"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            whitelist: whitelist
                .iter()
                .map(|(kind, fields)| (*kind, fields.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }
}

impl ProjectionRules {
    /// Rules with no whitelist and an empty blacklist: every field of every kind
    pub fn everything() -> Self {
        ProjectionRules {
            blacklist: BTreeSet::new(),
            whitelist: BTreeMap::new(),
        }
    }

    /// Reject whitelist entries naming a field the kind does not have
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, fields) in &self.whitelist {
            if let Some(unknown) = fields.iter().find(|f| !kind.fields().iter().any(|k| *k == f.as_str())) {
                return Err(ConfigError::UnknownField {
                    kind: *kind,
                    field: unknown.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate and compute the emitted field list of every kind
    pub fn resolve(&self) -> Result<ResolvedRules, ConfigError> {
        self.validate()?;

        let fields = NodeKind::ALL
            .iter()
            .map(|kind| {
                let emitted: Vec<&'static str> = match self.whitelist.get(kind) {
                    Some(allowed) => kind
                        .fields()
                        .iter()
                        .copied()
                        .filter(|f| allowed.iter().any(|a| a == f))
                        .collect(),
                    None => kind
                        .fields()
                        .iter()
                        .copied()
                        .filter(|f| !self.blacklist.contains(*f))
                        .collect(),
                };
                (*kind, emitted)
            })
            .collect();

        Ok(ResolvedRules { fields })
    }
}

/// Emitted field list per kind, computed once per run
#[derive(Debug, Clone)]
pub struct ResolvedRules {
    fields: FxHashMap<NodeKind, Vec<&'static str>>,
}

impl ResolvedRules {
    pub fn fields(&self, kind: NodeKind) -> &[&'static str] {
        self.fields.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_rules_are_valid() {
        assert!(ProjectionRules::default().validate().is_ok());
    }

    #[test]
    fn test_whitelist_uses_natural_order() {
        let rules = ProjectionRules::default().resolve().unwrap();
        assert_eq!(
            rules.fields(NodeKind::Function),
            &[
                "name",
                "flags",
                "linkage_kind",
                "return_type",
                "parameters",
                "storage_qualifier"
            ]
        );
        assert_eq!(rules.fields(NodeKind::Class), &["name", "class_kind", "size_of", "fields", "span"]);
    }

    #[test]
    fn test_blacklist_applies_without_whitelist() {
        let rules = ProjectionRules::default().resolve().unwrap();
        assert_eq!(rules.fields(NodeKind::Macro), &["name", "parameters", "value"]);
        assert!(!rules.fields(NodeKind::Statement).contains(&"span"));
    }

    #[test]
    fn test_whitelist_overrides_blacklist() {
        let rules = ProjectionRules::default().resolve().unwrap();
        assert!(rules.fields(NodeKind::Enum).contains(&"span"));
    }

    #[test]
    fn test_unknown_whitelist_field_is_rejected() {
        let mut rules = ProjectionRules::default();
        rules
            .whitelist
            .insert(NodeKind::Enum, vec!["name".to_string(), "size".to_string()]);

        match rules.resolve() {
            Err(ConfigError::UnknownField { kind, field }) => {
                assert_eq!(kind, NodeKind::Enum);
                assert_eq!(field, "size");
            }
            other => panic!("Expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_rules_from_json() {
        let rules: ProjectionRules = serde_json::from_str(
            r#"{ "blacklist": ["span"], "whitelist": { "enum_item": ["value"] } }"#,
        )
        .unwrap();
        let resolved = rules.resolve().unwrap();
        assert_eq!(resolved.fields(NodeKind::EnumItem), &["value"]);
        assert_eq!(resolved.fields(NodeKind::Parameter), &["name", "type", "parent"]);
    }

    #[test]
    fn test_unknown_kind_in_json_is_rejected() {
        let result: Result<ProjectionRules, _> = serde_json::from_str(r#"{ "whitelist": { "struct": ["name"] } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_every_kind_has_fields() {
        for kind in NodeKind::ALL {
            assert!(!kind.fields().is_empty(), "{} has no fields", kind);
        }
    }
}
