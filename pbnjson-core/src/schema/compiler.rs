//! Schema compiler (§4.6): walks a value-graph schema document into a graph
//! of validator nodes, one per recognized keyword combination. Unrecognized
//! keywords are accepted silently (forward-compatible).

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, SchemaErrorCode};
use crate::value::Value;

/// Index into a [`SchemaGraph`]'s node table. Refs through cycles go through
/// this indirection rather than a direct child pointer (§9.1, "cycles
/// through `$ref`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl JsonType {
    fn from_name(name: &str) -> Option<JsonType> {
        Some(match name {
            "null" => JsonType::Null,
            "boolean" => JsonType::Boolean,
            "object" => JsonType::Object,
            "array" => JsonType::Array,
            "number" => JsonType::Number,
            "integer" => JsonType::Integer,
            "string" => JsonType::String,
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub enum Items {
    Single(NodeId),
    Tuple(Vec<NodeId>),
}

#[derive(Debug)]
pub enum AdditionalItems {
    Allowed,
    Disallowed,
    Schema(NodeId),
}

#[derive(Debug)]
pub enum AdditionalProperties {
    Allowed,
    Disallowed,
    Schema(NodeId),
}

/// A single compiled schema keyword set. Every feature is an independent,
/// orthogonal field applied in a fixed order by the validator (§9.1,
/// "multiple inheritance of validator features").
#[derive(Debug, Default)]
pub struct SchemaNode {
    pub types: Option<Vec<JsonType>>,
    pub enum_values: Option<Vec<Value>>,
    pub required: Option<Vec<String>>,
    pub multiple_of: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Regex>,
    pub items: Option<Items>,
    pub additional_items: Option<AdditionalItems>,
    pub properties: IndexMap<String, NodeId>,
    pub pattern_properties: Vec<(Regex, NodeId)>,
    pub additional_properties: Option<AdditionalProperties>,
    pub all_of: Option<Vec<NodeId>>,
    pub any_of: Option<Vec<NodeId>>,
    pub one_of: Option<Vec<NodeId>>,
    pub not: Option<NodeId>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub default: Option<Value>,
    /// Set on a bare `{"$ref": "..."}` node; resolved either during the
    /// same-document linking pass in [`compile`] or later by
    /// `crate::schema::resolver::resolve`.
    pub ref_uri: Option<String>,
    pub ref_target: Option<NodeId>,
}

/// The owner of every node reachable from a compiled schema's root, plus the
/// URI → node map used both for `$ref` resolution and as the output of
/// compilation (every JSON-pointer-addressable sub-schema, per §4.6).
#[derive(Debug, Default)]
pub struct SchemaGraph {
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) by_uri: IndexMap<String, NodeId>,
}

impl SchemaGraph {
    fn push(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Follows `ref_target` links to the schema actually governing `id`,
    /// stopping at the first non-ref node (or the last resolvable link, for
    /// a still-dangling external ref).
    pub fn resolve_ref_chain(&self, mut id: NodeId) -> NodeId {
        let mut seen = std::collections::HashSet::new();
        while self.node(id).ref_uri.is_some() {
            if !seen.insert(id.0) {
                break; // cyclic $ref with no terminal schema; bail out
            }
            match self.node(id).ref_target {
                Some(target) => id = target,
                None => break,
            }
        }
        id
    }

    /// Every `$ref` node anywhere in the graph with no resolved target yet.
    pub fn unresolved_ref_uris(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.ref_uri.is_some() && n.ref_target.is_none())
            .filter_map(|n| n.ref_uri.clone())
            .collect()
    }
}

/// A compiled, reference-counted schema handle (§5: "`copy` on a schema is a
/// refcount bump").
#[derive(Clone)]
pub struct CompiledSchema {
    pub(crate) graph: Arc<RwLock<SchemaGraph>>,
    pub(crate) root: NodeId,
    pub(crate) base_uri: String,
}

impl CompiledSchema {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn graph(&self) -> &Arc<RwLock<SchemaGraph>> {
        &self.graph
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }
}

/// Compiles `document` (a parsed schema value graph) against `base_uri`.
pub fn compile(document: &Value, base_uri: &str) -> Result<CompiledSchema, Error> {
    let mut graph = SchemaGraph::default();
    let root = compile_document_into(&mut graph, document, base_uri)?;
    Ok(CompiledSchema {
        graph: Arc::new(RwLock::new(graph)),
        root,
        base_uri: base_uri.to_string(),
    })
}

/// Compiles `document` as a fresh root into an already-populated `graph`
/// (used by the resolver to absorb a resolved sub-document), re-running the
/// local-ref linking pass over the whole graph afterward so any dangling
/// `$ref` the new nodes satisfy gets connected.
pub(crate) fn compile_document_into(
    graph: &mut SchemaGraph,
    document: &Value,
    base_uri: &str,
) -> Result<NodeId, Error> {
    let root = compile_node(document, base_uri, "", graph)?;
    link_local_refs(graph);
    Ok(root)
}

fn pointer_uri(base_uri: &str, pointer: &str) -> String {
    format!("{base_uri}#{pointer}")
}

fn pointer_child(pointer: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{pointer}/{escaped}")
}

fn schema_err(code: SchemaErrorCode, message: impl Into<String>) -> Error {
    Error::Schema {
        code,
        message: message.into(),
    }
}

fn field(doc: &Value, key: &str) -> Option<Value> {
    let v = doc.get(key);
    if v.is_invalid() {
        None
    } else {
        Some(v)
    }
}

fn compile_node(doc: &Value, base_uri: &str, pointer: &str, graph: &mut SchemaGraph) -> Result<NodeId, Error> {
    if !doc.is_object() {
        return Err(schema_err(SchemaErrorCode::Syntax, "schema node must be an object"));
    }

    if let Some(reference) = field(doc, "$ref") {
        let uri = reference
            .as_str()
            .ok_or_else(|| schema_err(SchemaErrorCode::Syntax, "$ref must be a string"))?;
        let node = SchemaNode {
            ref_uri: Some(normalize_ref(base_uri, uri)),
            ..SchemaNode::default()
        };
        let id = graph.push(node);
        graph.by_uri.insert(pointer_uri(base_uri, pointer), id);
        return Ok(id);
    }

    let mut node = SchemaNode::default();

    if let Some(t) = field(doc, "type") {
        node.types = Some(compile_type(&t)?);
    }
    if let Some(e) = field(doc, "enum") {
        node.enum_values = Some(compile_enum(&e)?);
    }
    if let Some(r) = field(doc, "required") {
        node.required = Some(compile_required(&r)?);
    }
    if let Some(m) = field(doc, "multipleOf") {
        let (v, flags) = m.as_f64();
        if !flags.is_ok() || v <= 0.0 {
            return Err(schema_err(SchemaErrorCode::MultipleOf, "multipleOf must be a strictly positive number"));
        }
        node.multiple_of = Some(v);
    }

    compile_bounds(doc, &mut node)?;
    compile_lengths(doc, &mut node)?;

    if let Some(p) = field(doc, "pattern") {
        let pattern = p
            .as_str()
            .ok_or_else(|| schema_err(SchemaErrorCode::Pattern, "pattern must be a string"))?;
        node.pattern =
            Some(Regex::new(pattern).map_err(|e| schema_err(SchemaErrorCode::Pattern, e.to_string()))?);
    }

    compile_items(doc, base_uri, pointer, graph, &mut node)?;
    compile_properties(doc, base_uri, pointer, graph, &mut node)?;
    compile_combinators(doc, base_uri, pointer, graph, &mut node)?;

    if let Some(mp) = field(doc, "minProperties") {
        node.min_properties = Some(non_negative_integer(&mp, SchemaErrorCode::BoundValue)?);
    }
    if let Some(mp) = field(doc, "maxProperties") {
        node.max_properties = Some(non_negative_integer(&mp, SchemaErrorCode::BoundValue)?);
    }
    if let Some(mi) = field(doc, "minItems") {
        node.min_items = Some(non_negative_integer(&mi, SchemaErrorCode::BoundValue)?);
    }
    if let Some(mi) = field(doc, "maxItems") {
        node.max_items = Some(non_negative_integer(&mi, SchemaErrorCode::BoundValue)?);
    }
    if let Some(u) = field(doc, "uniqueItems") {
        let (b, flags) = u.as_bool();
        if !flags.is_ok() {
            return Err(schema_err(SchemaErrorCode::BoundFormat, "uniqueItems must be a boolean"));
        }
        node.unique_items = b;
    }
    if let Some(d) = field(doc, "default") {
        node.default = Some(d);
    }

    // `definitions` are not attached to the runtime node; they exist purely
    // so their sub-schemas get registered into `by_uri` for $ref lookups.
    if let Some(defs) = field(doc, "definitions") {
        if !defs.is_object() {
            return Err(schema_err(SchemaErrorCode::Definitions, "definitions must be an object"));
        }
        for (key, sub) in defs.entries() {
            let child_pointer = pointer_child(&pointer_child(pointer, "definitions"), &key);
            compile_node(&sub, base_uri, &child_pointer, graph)?;
        }
    }

    let id = graph.push(node);
    graph.by_uri.insert(pointer_uri(base_uri, pointer), id);
    Ok(id)
}

fn compile_type(t: &Value) -> Result<Vec<JsonType>, Error> {
    if let Some(name) = t.as_str() {
        return Ok(vec![JsonType::from_name(name)
            .ok_or_else(|| schema_err(SchemaErrorCode::TypeValue, format!("unknown type '{name}'")))?]);
    }
    if t.is_array() {
        let items = t.items();
        if items.is_empty() {
            return Err(schema_err(SchemaErrorCode::TypeFormat, "type array must be non-empty"));
        }
        let mut names = Vec::with_capacity(items.len());
        let mut seen = std::collections::HashSet::new();
        for item in &items {
            let name = item
                .as_str()
                .ok_or_else(|| schema_err(SchemaErrorCode::TypeFormat, "type array entries must be strings"))?;
            let kind = JsonType::from_name(name)
                .ok_or_else(|| schema_err(SchemaErrorCode::TypeValue, format!("unknown type '{name}'")))?;
            if !seen.insert(name.to_string()) {
                return Err(schema_err(SchemaErrorCode::TypeFormat, "type array must not repeat a type name"));
            }
            names.push(kind);
        }
        return Ok(names);
    }
    Err(schema_err(SchemaErrorCode::TypeFormat, "type must be a string or array of strings"))
}

fn compile_enum(e: &Value) -> Result<Vec<Value>, Error> {
    if !e.is_array() || e.size() == 0 {
        return Err(schema_err(SchemaErrorCode::Enum, "enum must be a non-empty array"));
    }
    let items = e.items();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if items[i].equal(&items[j]) {
                return Err(schema_err(SchemaErrorCode::Enum, "enum must not contain duplicate values"));
            }
        }
    }
    Ok(items)
}

fn compile_required(r: &Value) -> Result<Vec<String>, Error> {
    if !r.is_array() || r.size() == 0 {
        return Err(schema_err(SchemaErrorCode::Required, "required must be a non-empty array"));
    }
    let mut names = Vec::with_capacity(r.size());
    let mut seen = std::collections::HashSet::new();
    for item in r.items() {
        let name = item
            .as_str()
            .ok_or_else(|| schema_err(SchemaErrorCode::Required, "required entries must be strings"))?
            .to_string();
        if !seen.insert(name.clone()) {
            return Err(schema_err(SchemaErrorCode::Required, "required must not repeat a key name"));
        }
        names.push(name);
    }
    Ok(names)
}

fn compile_bounds(doc: &Value, node: &mut SchemaNode) -> Result<(), Error> {
    if let Some(m) = field(doc, "minimum") {
        let (v, flags) = m.as_f64();
        if !flags.is_ok() {
            return Err(schema_err(SchemaErrorCode::BoundFormat, "minimum must be a number"));
        }
        node.minimum = Some(v);
    }
    if let Some(m) = field(doc, "maximum") {
        let (v, flags) = m.as_f64();
        if !flags.is_ok() {
            return Err(schema_err(SchemaErrorCode::BoundFormat, "maximum must be a number"));
        }
        node.maximum = Some(v);
    }
    if let Some(e) = field(doc, "exclusiveMinimum") {
        let (b, flags) = e.as_bool();
        if !flags.is_ok() {
            return Err(schema_err(SchemaErrorCode::BoundFormat, "exclusiveMinimum must be a boolean"));
        }
        if node.minimum.is_none() {
            return Err(schema_err(SchemaErrorCode::BoundValue, "exclusiveMinimum without minimum"));
        }
        node.exclusive_minimum = b;
    }
    if let Some(e) = field(doc, "exclusiveMaximum") {
        let (b, flags) = e.as_bool();
        if !flags.is_ok() {
            return Err(schema_err(SchemaErrorCode::BoundFormat, "exclusiveMaximum must be a boolean"));
        }
        if node.maximum.is_none() {
            return Err(schema_err(SchemaErrorCode::BoundValue, "exclusiveMaximum without maximum"));
        }
        node.exclusive_maximum = b;
    }
    Ok(())
}

fn non_negative_integer(v: &Value, err_code: SchemaErrorCode) -> Result<u64, Error> {
    let (i, flags) = v.as_i64();
    if !flags.is_ok() || i < 0 {
        return Err(schema_err(err_code, "expected a non-negative integer"));
    }
    Ok(i as u64)
}

fn compile_lengths(doc: &Value, node: &mut SchemaNode) -> Result<(), Error> {
    if let Some(m) = field(doc, "minLength") {
        node.min_length = Some(non_negative_integer(&m, SchemaErrorCode::LengthFormat)?);
    }
    if let Some(m) = field(doc, "maxLength") {
        node.max_length = Some(non_negative_integer(&m, SchemaErrorCode::LengthFormat)?);
    }
    Ok(())
}

fn compile_items(
    doc: &Value,
    base_uri: &str,
    pointer: &str,
    graph: &mut SchemaGraph,
    node: &mut SchemaNode,
) -> Result<(), Error> {
    if let Some(items) = field(doc, "items") {
        if items.is_array() {
            let mut ids = Vec::with_capacity(items.size());
            for (i, sub) in items.items().iter().enumerate() {
                let child_pointer = pointer_child(&pointer_child(pointer, "items"), &i.to_string());
                ids.push(compile_node(sub, base_uri, &child_pointer, graph)?);
            }
            node.items = Some(Items::Tuple(ids));
        } else if items.is_object() {
            let child_pointer = pointer_child(pointer, "items");
            node.items = Some(Items::Single(compile_node(&items, base_uri, &child_pointer, graph)?));
        } else {
            return Err(schema_err(SchemaErrorCode::Items, "items must be a schema or array of schemas"));
        }
    }

    if let Some(ai) = field(doc, "additionalItems") {
        let (b, flags) = ai.as_bool();
        if flags.is_ok() {
            node.additional_items = Some(if b {
                AdditionalItems::Allowed
            } else {
                AdditionalItems::Disallowed
            });
        } else if ai.is_object() {
            let child_pointer = pointer_child(pointer, "additionalItems");
            node.additional_items = Some(AdditionalItems::Schema(compile_node(
                &ai, base_uri, &child_pointer, graph,
            )?));
        } else {
            return Err(schema_err(
                SchemaErrorCode::AdditionalItems,
                "additionalItems must be a boolean or schema",
            ));
        }
    }
    Ok(())
}

fn compile_properties(
    doc: &Value,
    base_uri: &str,
    pointer: &str,
    graph: &mut SchemaGraph,
    node: &mut SchemaNode,
) -> Result<(), Error> {
    if let Some(props) = field(doc, "properties") {
        if !props.is_object() {
            return Err(schema_err(SchemaErrorCode::Properties, "properties must be an object"));
        }
        for (key, sub) in props.entries() {
            let child_pointer = pointer_child(&pointer_child(pointer, "properties"), &key);
            let id = compile_node(&sub, base_uri, &child_pointer, graph)?;
            node.properties.insert(key.to_string(), id);
        }
    }

    if let Some(pp) = field(doc, "patternProperties") {
        if !pp.is_object() {
            return Err(schema_err(SchemaErrorCode::PatternProperties, "patternProperties must be an object"));
        }
        for (key, sub) in pp.entries() {
            let regex = Regex::new(&key)
                .map_err(|e| schema_err(SchemaErrorCode::PatternProperties, e.to_string()))?;
            let child_pointer = pointer_child(&pointer_child(pointer, "patternProperties"), &key);
            let id = compile_node(&sub, base_uri, &child_pointer, graph)?;
            node.pattern_properties.push((regex, id));
        }
    }

    if let Some(ap) = field(doc, "additionalProperties") {
        let (b, flags) = ap.as_bool();
        if flags.is_ok() {
            node.additional_properties = Some(if b {
                AdditionalProperties::Allowed
            } else {
                AdditionalProperties::Disallowed
            });
        } else if ap.is_object() {
            let child_pointer = pointer_child(pointer, "additionalProperties");
            node.additional_properties = Some(AdditionalProperties::Schema(compile_node(
                &ap, base_uri, &child_pointer, graph,
            )?));
        } else {
            return Err(schema_err(
                SchemaErrorCode::AdditionalProperties,
                "additionalProperties must be a boolean or schema",
            ));
        }
    }
    Ok(())
}

fn compile_combinator_array(
    doc: &Value,
    keyword: &str,
    base_uri: &str,
    pointer: &str,
    graph: &mut SchemaGraph,
) -> Result<Option<Vec<NodeId>>, Error> {
    let Some(arr) = field(doc, keyword) else {
        return Ok(None);
    };
    if !arr.is_array() || arr.size() == 0 {
        return Err(schema_err(SchemaErrorCode::Combinator, format!("{keyword} must be a non-empty array")));
    }
    let mut ids = Vec::with_capacity(arr.size());
    for (i, sub) in arr.items().iter().enumerate() {
        let child_pointer = pointer_child(&pointer_child(pointer, keyword), &i.to_string());
        ids.push(compile_node(sub, base_uri, &child_pointer, graph)?);
    }
    Ok(Some(ids))
}

fn compile_combinators(
    doc: &Value,
    base_uri: &str,
    pointer: &str,
    graph: &mut SchemaGraph,
    node: &mut SchemaNode,
) -> Result<(), Error> {
    node.all_of = compile_combinator_array(doc, "allOf", base_uri, pointer, graph)?;
    node.any_of = compile_combinator_array(doc, "anyOf", base_uri, pointer, graph)?;
    node.one_of = compile_combinator_array(doc, "oneOf", base_uri, pointer, graph)?;

    if let Some(not) = field(doc, "not") {
        if !not.is_object() {
            return Err(schema_err(SchemaErrorCode::Combinator, "not must be a schema"));
        }
        let child_pointer = pointer_child(pointer, "not");
        node.not = Some(compile_node(&not, base_uri, &child_pointer, graph)?);
    }
    Ok(())
}

fn normalize_ref(base_uri: &str, reference: &str) -> String {
    if let Some(fragment) = reference.strip_prefix('#') {
        format!("{base_uri}#{fragment}")
    } else {
        reference.to_string()
    }
}

fn link_local_refs(graph: &mut SchemaGraph) {
    let targets: Vec<(usize, Option<NodeId>)> = graph
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| n.ref_uri.as_ref().map(|uri| (i, graph.by_uri.get(uri).copied())))
        .collect();
    for (i, target) in targets {
        if let Some(target) = target {
            graph.nodes[i].ref_target = Some(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_flat_type_and_bounds() {
        let schema = Value::empty_object();
        schema.put(std::sync::Arc::from("type"), Value::string_copied("number"));
        schema.put(std::sync::Arc::from("minimum"), Value::from_i64(1));
        schema.put(std::sync::Arc::from("maximum"), Value::from_i64(10));

        let compiled = compile(&schema, "relative:").unwrap();
        let graph = compiled.graph.read().unwrap();
        let root = graph.node(compiled.root);
        assert_eq!(root.types, Some(vec![JsonType::Number]));
        assert_eq!(root.minimum, Some(1.0));
        assert_eq!(root.maximum, Some(10.0));
    }

    #[test]
    fn rejects_unknown_type_name() {
        let schema = Value::empty_object();
        schema.put(std::sync::Arc::from("type"), Value::string_copied("weird"));
        let err = compile(&schema, "relative:").unwrap_err();
        assert!(matches!(err, Error::Schema { code: SchemaErrorCode::TypeValue, .. }));
    }

    #[test]
    fn links_ref_to_sibling_definition() {
        let schema = Value::empty_object();
        let defs = Value::empty_object();
        let a = Value::empty_object();
        a.put(std::sync::Arc::from("type"), Value::string_copied("string"));
        defs.put(std::sync::Arc::from("A"), a);
        schema.put(std::sync::Arc::from("definitions"), defs);
        let one_of = Value::array(vec![{
            let r = Value::empty_object();
            r.put(std::sync::Arc::from("$ref"), Value::string_copied("#/definitions/A"));
            r
        }]);
        schema.put(std::sync::Arc::from("oneOf"), one_of);

        let compiled = compile(&schema, "relative:").unwrap();
        let graph = compiled.graph.read().unwrap();
        let root = graph.node(compiled.root);
        let branch = root.one_of.as_ref().unwrap()[0];
        let resolved = graph.resolve_ref_chain(branch);
        assert_eq!(graph.node(resolved).types, Some(vec![JsonType::String]));
    }
}
