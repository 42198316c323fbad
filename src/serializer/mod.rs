//! Selective, reference-preserving serializer
//!
//! Turns a [`Snapshot`] into the JSON artifact. Which fields appear is
//! decided by the [`ProjectionRules`]; declarations and types keep their
//! identity in the output.
//!
//! # Encoding
//!
//! Encoding is two passes over the projected graph:
//!
//! 1. Count how often every declaration and type is reached under the
//!    active rules. A node is entered only on its first visit, so cycles
//!    terminate.
//! 2. Emit. A node reached more than once gets a `"$id"` member on its first
//!    emission and becomes `{"$ref": "<id>"}` afterwards. The id is assigned
//!    before the node's fields are written, so a back edge to a node that is
//!    still being written is a `$ref` as well.
//!
//! Statements and expressions are owned by their function and always inline.

mod node;
pub mod rules;

use std::cell::{Cell, RefCell};
use std::io::Write;

use rustc_hash::FxHashMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::Serialize;

use crate::compilation::{Compilation, Span};
use crate::error::{ConfigError, DumpError};
use crate::snapshot::Snapshot;
use node::{Item, Node, Value};
pub use rules::{NodeKind, ProjectionRules, ResolvedRules};

/// Encodes snapshots under one validated rule set
#[derive(Debug, Clone)]
pub struct Serializer {
    rules: ResolvedRules,
    pretty: bool,
}

impl Serializer {
    /// Fails if a whitelist names a field its kind does not have
    pub fn new(rules: &ProjectionRules) -> Result<Self, ConfigError> {
        Ok(Serializer {
            rules: rules.resolve()?,
            pretty: false,
        })
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn write<W: Write>(&self, snapshot: &Snapshot<'_>, writer: W) -> Result<(), DumpError> {
        let encoder = Encoder::new(&self.rules, snapshot);
        let root = Emit {
            encoder: &encoder,
            item: Item::Snapshot,
        };
        if self.pretty {
            serde_json::to_writer_pretty(writer, &root)?;
        } else {
            serde_json::to_writer(writer, &root)?;
        }
        Ok(())
    }

    pub fn to_string(&self, snapshot: &Snapshot<'_>) -> Result<String, DumpError> {
        let mut out = Vec::new();
        self.write(snapshot, &mut out)?;
        // serde_json only writes UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn to_value(&self, snapshot: &Snapshot<'_>) -> Result<serde_json::Value, DumpError> {
        let encoder = Encoder::new(&self.rules, snapshot);
        let root = Emit {
            encoder: &encoder,
            item: Item::Snapshot,
        };
        Ok(serde_json::to_value(&root)?)
    }
}

struct Encoder<'s, 'c> {
    rules: &'s ResolvedRules,
    snapshot: &'s Snapshot<'c>,
    /// Pass 1: how often each node is reached
    references: FxHashMap<Node, u32>,
    /// Pass 2: ids of shared nodes already emitted
    emitted: RefCell<FxHashMap<Node, u64>>,
    next_id: Cell<u64>,
}

impl<'s, 'c> Encoder<'s, 'c> {
    fn new(rules: &'s ResolvedRules, snapshot: &'s Snapshot<'c>) -> Self {
        let mut encoder = Encoder {
            rules,
            snapshot,
            references: FxHashMap::default(),
            emitted: RefCell::new(FxHashMap::default()),
            next_id: Cell::new(0),
        };
        encoder.count(Item::Snapshot);
        encoder
    }

    fn compilation(&self) -> &'c Compilation {
        self.snapshot.compilation()
    }

    fn count(&mut self, item: Item<'s>) {
        if let Item::Node(node) = item {
            let seen = self.references.entry(node).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                return;
            }
        }

        let rules = self.rules;
        let snapshot = self.snapshot;
        for field in rules.fields(item.kind(snapshot.compilation())) {
            let value = item.field(snapshot, field);
            self.count_value(&value);
        }
    }

    fn count_value(&mut self, value: &Value<'s>) {
        match value {
            Value::Item(item) => self.count(*item),
            Value::Items(items) => {
                for item in items {
                    self.count(*item);
                }
            }
            Value::Map(entries) => {
                for (_, value) in entries {
                    self.count_value(value);
                }
            }
            _ => {}
        }
    }

    fn is_shared(&self, node: Node) -> bool {
        self.references.get(&node).is_some_and(|n| *n > 1)
    }
}

/// Pass 2 view of one object
struct Emit<'e, 's, 'c> {
    encoder: &'e Encoder<'s, 'c>,
    item: Item<'s>,
}

impl Serialize for Emit<'_, '_, '_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoder = self.encoder;
        let mut shared = None;

        if let Item::Node(node) = self.item {
            let existing = encoder.emitted.borrow().get(&node).copied();
            if let Some(id) = existing {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", &id.to_string())?;
                return map.end();
            }
            if encoder.is_shared(node) {
                let id = encoder.next_id.get() + 1;
                encoder.next_id.set(id);
                encoder.emitted.borrow_mut().insert(node, id);
                shared = Some(id);
            }
        }

        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = shared {
            map.serialize_entry("$id", &id.to_string())?;
        }
        let kind = self.item.kind(encoder.compilation());
        for field in encoder.rules.fields(kind) {
            let value = self.item.field(encoder.snapshot, field);
            if matches!(value, Value::Absent) {
                continue;
            }
            map.serialize_entry(
                field,
                &EmitValue {
                    encoder,
                    value: &value,
                },
            )?;
        }
        map.end()
    }
}

struct EmitValue<'v, 'e, 's, 'c> {
    encoder: &'e Encoder<'s, 'c>,
    value: &'v Value<'s>,
}

#[derive(Serialize)]
struct Position {
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct SpanOut {
    file: String,
    start: Position,
    end: Position,
}

impl SpanOut {
    fn new(compilation: &Compilation, span: &Span) -> Self {
        SpanOut {
            file: compilation.file_name(span.start.file),
            start: Position {
                line: span.start.line,
                column: span.start.column,
            },
            end: Position {
                line: span.end.line,
                column: span.end.column,
            },
        }
    }
}

impl Serialize for EmitValue<'_, '_, '_, '_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoder = self.encoder;
        match self.value {
            Value::Absent | Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Unsigned(n) => serializer.serialize_u64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Names(names) => serializer.collect_seq(names),
            Value::Span(span) => SpanOut::new(encoder.compilation(), span).serialize(serializer),
            Value::Item(item) => Emit { encoder, item: *item }.serialize(serializer),
            Value::Items(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Emit { encoder, item: *item })?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, &EmitValue { encoder, value })?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::ParserOptions;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value as Json};

    fn dump(source: &str, rules: &ProjectionRules) -> Json {
        let c = parse_source(source, &ParserOptions::default());
        assert!(!c.has_errors(), "{:?}", c.diagnostics.messages());
        let snapshot = Snapshot::new(&c);
        Serializer::new(rules).unwrap().to_value(&snapshot).unwrap()
    }

    /// Follow `$ref` to the object that carries the matching `$id`
    fn find_id<'a>(doc: &'a Json, id: &str) -> Option<&'a Json> {
        match doc {
            Json::Object(map) => {
                if map.get("$id").and_then(Json::as_str) == Some(id) {
                    return Some(doc);
                }
                map.values().find_map(|v| find_id(v, id))
            }
            Json::Array(items) => items.iter().find_map(|v| find_id(v, id)),
            _ => None,
        }
    }

    #[test]
    fn test_enum_uses_whitelist() {
        let doc = dump("enum Color { RED, GREEN = 5 };", &ProjectionRules::default());
        let color = &doc["enums"][0];

        let keys: Vec<&str> = color.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "size_of", "type_kind", "items", "span"]);
        assert_eq!(color["name"], "Color");
        assert_eq!(color["size_of"], 4);
        assert_eq!(color["items"], json!([{ "name": "RED", "value": 0 }, { "name": "GREEN", "value": 5 }]));
        assert_eq!(color["span"]["file"], "input.c");
        assert_eq!(color["span"]["start"]["line"], 1);
    }

    #[test]
    fn test_shared_types_are_referenced() {
        let doc = dump("int a;\nint b;", &ProjectionRules::default());
        let fields = doc["fields"].as_array().unwrap();

        assert_eq!(fields[0]["type"]["$id"], "1");
        assert_eq!(fields[0]["type"]["kind"], "int");
        assert_eq!(fields[1]["type"], json!({ "$ref": "1" }));
    }

    #[test]
    fn test_single_use_nodes_have_no_id() {
        let doc = dump("struct S { char c; };", &ProjectionRules::default());
        let class = &doc["classes"][0];

        assert!(class.get("$id").is_none());
        assert!(class["fields"][0]["type"].get("$id").is_none());
        assert_eq!(class["fields"][0]["type"]["kind"], "char");
    }

    #[test]
    fn test_named_type_is_its_declaration() {
        let doc = dump("typedef unsigned int uint;\nuint counter;", &ProjectionRules::default());

        // fields come before typedefs in the document
        let ty = &doc["fields"][0]["type"];
        assert_eq!(ty["$id"], "1");
        assert_eq!(ty["name"], "uint");
        assert_eq!(ty["element_type"]["kind"], "unsigned int");
        assert_eq!(doc["typedefs"][0], json!({ "$ref": "1" }));
    }

    #[test]
    fn test_blacklisted_fields_never_appear() {
        let doc = dump(
            "struct Node { int v; struct Node *next; };\nint f(int x) { return x; }",
            &ProjectionRules::default(),
        );
        let text = doc.to_string();
        assert!(!text.contains("\"parent\""));
        assert!(!doc["functions"][0]["parameters"][0]
            .as_object()
            .unwrap()
            .contains_key("span"));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut rules = ProjectionRules::everything();
        rules.blacklist.insert("span".to_string());
        let doc = dump("struct Node { int v; struct Node *next; };", &rules);

        let node = &doc["classes"][0];
        let id = node["$id"].as_str().unwrap().to_string();
        assert_eq!(node["fields"][0]["parent"], json!({ "$ref": id.as_str() }));
        let pointee = &node["fields"][1]["type"]["element_type"];
        assert_eq!(pointee, &json!({ "$ref": id.as_str() }));
    }

    #[test]
    fn test_every_ref_has_a_target() {
        let mut rules = ProjectionRules::everything();
        rules.blacklist.insert("span".to_string());
        let doc = dump(
            "typedef struct P { int x, y; } P;\nP origin;\nP *at(int i);\nint dist(P a, P b) { return a.x - b.x; }",
            &rules,
        );

        fn refs(doc: &Json, out: &mut Vec<String>) {
            match doc {
                Json::Object(map) => {
                    if let Some(r) = map.get("$ref").and_then(Json::as_str) {
                        out.push(r.to_string());
                    }
                    map.values().for_each(|v| refs(v, out));
                }
                Json::Array(items) => items.iter().for_each(|v| refs(v, out)),
                _ => {}
            }
        }
        let mut found = Vec::new();
        refs(&doc, &mut found);
        assert!(!found.is_empty());
        for id in found {
            assert!(find_id(&doc, &id).is_some(), "dangling $ref {}", id);
        }
    }

    #[test]
    fn test_function_body_index() {
        let doc = dump("int f(int a) { if (a) return 1; return 0; }", &ProjectionRules::default());

        let body = doc["func_map"]["f"].as_array().unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["kind"], "if");
        assert_eq!(body[0]["condition"]["kind"], "identifier");
        assert_eq!(body[0]["then"]["value"]["value"], 1);
        assert_eq!(body[0]["else"], Json::Null);
        assert_eq!(body[1]["kind"], "return");
    }

    #[test]
    fn test_function_fields() {
        let doc = dump("static inline int twice(int v) { return v * 2; }", &ProjectionRules::default());
        let f = &doc["functions"][0];

        assert_eq!(f["name"], "twice");
        assert_eq!(f["flags"], json!(["inline", "definition"]));
        assert_eq!(f["linkage_kind"], "internal");
        assert_eq!(f["storage_qualifier"], "static");
        assert_eq!(f["parameters"][0]["name"], "v");
    }

    #[test]
    fn test_snapshot_fields_can_be_trimmed() {
        let mut rules = ProjectionRules::default();
        rules
            .whitelist
            .insert(NodeKind::Snapshot, vec!["functions".to_string()]);
        let doc = dump("int g(void);", &rules);

        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["functions"]);
    }

    #[test]
    fn test_invalid_rules_rejected_before_encoding() {
        let mut rules = ProjectionRules::default();
        rules
            .whitelist
            .insert(NodeKind::Field, vec!["offset".to_string()]);
        assert!(matches!(
            Serializer::new(&rules),
            Err(ConfigError::UnknownField { kind: NodeKind::Field, .. })
        ));
    }

    #[test]
    fn test_pretty_and_compact_agree() {
        let c = parse_source("struct A { int x; };", &ParserOptions::default());
        let snapshot = Snapshot::new(&c);
        let serializer = Serializer::new(&ProjectionRules::default()).unwrap();

        let compact = serializer.to_string(&snapshot).unwrap();
        let pretty = serializer.clone().pretty(true).to_string(&snapshot).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
        let a: Json = serde_json::from_str(&compact).unwrap();
        let b: Json = serde_json::from_str(&pretty).unwrap();
        assert_eq!(a, b);
    }
}
