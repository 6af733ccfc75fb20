//! Typed loader: builds schema records from a parsed document
//!
//! Every record value is cached by the node it was built from, so a node
//! reached through several aliases yields the very same value.

use std::collections::HashMap;

use crate::document::{Document, Node, NodeId, NodeKind, Scalar};
use crate::error::{ErrorCode, IdlError, Result};
use crate::schema::{Args, FieldType, Primitive, RecordId, RecordShape, Schema, Value};

/// Loader over one document
pub struct Loader<'a> {
    schema: &'a Schema,
    doc: &'a Document,
    cache: HashMap<(NodeId, RecordId), Value>,
}

impl<'a> Loader<'a> {
    pub fn new(schema: &'a Schema, doc: &'a Document) -> Self {
        Self {
            schema,
            doc,
            cache: HashMap::new(),
        }
    }

    /// Load the root node. The root must carry a registered tag.
    pub fn load(&mut self) -> Result<Value> {
        let root = self
            .doc
            .root()
            .ok_or_else(|| IdlError::new(ErrorCode::E03001, "Document has no root node."))?;
        let node = self.doc.node(root);

        let tag = node.tag.as_deref().ok_or_else(|| {
            IdlError::new(ErrorCode::E03005, "Root node has no tag.").with_location(node.location)
        })?;
        let record = self.tagged(tag, node)?;

        self.construct(root, &FieldType::Record(record))
    }

    /// Load any node as the given type.
    pub fn load_as(&mut self, id: NodeId, ty: &FieldType) -> Result<Value> {
        self.construct(id, ty)
    }

    fn construct(&mut self, id: NodeId, ty: &FieldType) -> Result<Value> {
        let schema = self.schema;
        let location = self.doc.node(id).location;

        self.dispatch(id, ty)
            .map_err(|e| e.add_context(location, schema.type_name(ty)))
    }

    fn dispatch(&mut self, id: NodeId, ty: &FieldType) -> Result<Value> {
        let doc = self.doc;
        let node = doc.node(id);

        match ty {
            FieldType::Primitive(primitive) => {
                check_core_tag(node, core_tag(*primitive))?;
                scalar_value(node, expect_scalar(node)?, *primitive)
            }
            FieldType::Sequence(item) => self.sequence(node, item),
            FieldType::Optional(inner) => {
                if is_null(node) {
                    Ok(Value::None)
                } else {
                    self.dispatch(id, inner)
                }
            }
            FieldType::Record(record) => self.record(id, *record),
            FieldType::Union(alternatives) => self.union(id, alternatives),
            FieldType::Mapping(..) | FieldType::Set(_) => Err(IdlError::new(
                ErrorCode::E04001,
                format!("{} is not supported.", self.schema.type_name(ty)),
            )),
        }
    }

    fn sequence(&mut self, node: &Node, item: &FieldType) -> Result<Value> {
        check_core_tag(node, "!!seq")?;

        match &node.kind {
            NodeKind::Sequence(items) => items
                .iter()
                .map(|id| self.construct(*id, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Seq),
            other => Err(IdlError::new(
                ErrorCode::E03001,
                format!("Must be a sequence node, found a {}.", other.name()),
            )
            .with_location(node.location)),
        }
    }

    fn record(&mut self, id: NodeId, record: RecordId) -> Result<Value> {
        if let Some(value) = self.cache.get(&(id, record)) {
            return Ok(value.clone());
        }

        let schema = self.schema;
        let doc = self.doc;
        let node = doc.node(id);
        let shape = schema.record(record);

        if let Some(tag) = node.tag.as_deref() {
            let tagged = self.tagged(tag, node)?;
            if tagged != record {
                return Err(mismatch(schema.record(tagged).name, shape.name));
            }
        }

        let values = match &node.kind {
            NodeKind::Mapping(entries) => self.fields_from_mapping(shape, entries)?,
            NodeKind::Scalar(scalar) if scalar.value.is_empty() => {
                complete(shape, vec![None; shape.fields.len()])?
            }
            NodeKind::Scalar(_) => self.fields_from_scalar(id, shape)?,
            NodeKind::Sequence(_) => {
                return Err(IdlError::new(
                    ErrorCode::E03001,
                    format!("Unexpected node type sequence for {}.", shape.name),
                )
                .with_location(node.location));
            }
        };

        let value = (shape.build)(Args::new(shape.name, values))?;
        self.cache.insert((id, record), value.clone());
        Ok(value)
    }

    fn fields_from_mapping(
        &mut self,
        shape: &RecordShape,
        entries: &[(NodeId, NodeId)],
    ) -> Result<Vec<(&'static str, Value)>> {
        let doc = self.doc;
        let mut provided = vec![None; shape.fields.len()];

        for (key, value) in entries {
            let key_node = doc.node(*key);
            let name = expect_scalar(key_node)?.value.as_str();

            let idx = shape
                .fields
                .iter()
                .position(|field| field.name == name)
                .ok_or_else(|| {
                    IdlError::new(ErrorCode::E03002, format!("Unexpected key {}.", name))
                        .with_location(key_node.location)
                })?;

            if provided[idx].is_some() {
                return Err(IdlError::new(
                    ErrorCode::E03002,
                    format!("Duplicate key {}.", name),
                )
                .with_location(key_node.location));
            }

            provided[idx] = Some(self.construct(*value, &shape.fields[idx].ty)?);
        }

        complete(shape, provided)
    }

    /// A non-empty scalar fills the first field, the others take defaults.
    fn fields_from_scalar(
        &mut self,
        id: NodeId,
        shape: &RecordShape,
    ) -> Result<Vec<(&'static str, Value)>> {
        let first = shape.fields.first().ok_or_else(|| {
            IdlError::new(
                ErrorCode::E03001,
                format!("{} does not have fields.", shape.name),
            )
        })?;

        let mut provided = vec![None; shape.fields.len()];
        provided[0] = Some(self.shorthand(id, &first.ty)?);

        complete(shape, provided)
    }

    /// Value of a record's first field, read from the record's own node.
    fn shorthand(&mut self, id: NodeId, ty: &FieldType) -> Result<Value> {
        let doc = self.doc;
        let node = doc.node(id);

        match ty {
            FieldType::Primitive(primitive) => scalar_value(node, expect_scalar(node)?, *primitive),
            FieldType::Optional(inner) => {
                if is_null(node) {
                    Ok(Value::None)
                } else {
                    self.shorthand(id, inner)
                }
            }
            // The tag names the outer record, so only untagged nodes can be
            // read again as another type.
            _ if node.tag.is_none() => self.dispatch(id, ty),
            _ => Err(IdlError::new(
                ErrorCode::E03001,
                format!(
                    "Cannot read {} from a tagged scalar.",
                    self.schema.type_name(ty)
                ),
            )
            .with_location(node.location)),
        }
    }

    fn union(&mut self, id: NodeId, alternatives: &[FieldType]) -> Result<Value> {
        let schema = self.schema;
        let doc = self.doc;
        let node = doc.node(id);

        if let Some(alt) = alternatives
            .iter()
            .find(|alt| !matches!(alt, FieldType::Primitive(_) | FieldType::Record(_)))
        {
            return Err(IdlError::new(
                ErrorCode::E04001,
                format!("{} is not supported as a union member.", schema.type_name(alt)),
            ));
        }

        let value = match (node.tag.as_deref(), &node.kind) {
            (Some(tag), _) if !tag.starts_with("!!") => {
                let record = self.tagged(tag, node)?;
                self.construct(id, &FieldType::Record(record))?
            }
            (tag, NodeKind::Scalar(scalar)) => resolve_scalar(node, tag, scalar)?,
            (_, other) => return Err(mismatch(other.name(), &schema.names(alternatives))),
        };

        if alternatives.iter().any(|alt| schema.accepts(alt, &value)) {
            Ok(value)
        } else {
            Err(mismatch(value.type_name(), &schema.names(alternatives)))
        }
    }

    fn tagged(&self, tag: &str, node: &Node) -> Result<RecordId> {
        self.schema.tagged(tag).ok_or_else(|| {
            IdlError::new(ErrorCode::E03005, format!("Unknown tag {}.", tag))
                .with_location(node.location)
        })
    }
}

fn mismatch(found: &str, expected: &str) -> IdlError {
    IdlError::new(
        ErrorCode::E03004,
        format!(
            "Unexpected type {}. Types [{}] were expected.",
            found, expected
        ),
    )
}

/// Fill unset fields with their defaults, in declaration order.
fn complete(
    shape: &RecordShape,
    provided: Vec<Option<Value>>,
) -> Result<Vec<(&'static str, Value)>> {
    shape
        .fields
        .iter()
        .zip(provided)
        .map(|(field, value)| {
            value
                .or_else(|| field.default.clone())
                .map(|value| (field.name, value))
                .ok_or_else(|| {
                    IdlError::new(
                        ErrorCode::E03003,
                        format!("Missing field {} of {}.", field.name, shape.name),
                    )
                })
        })
        .collect()
}

fn expect_scalar(node: &Node) -> Result<&Scalar> {
    node.as_scalar().ok_or_else(|| {
        IdlError::new(
            ErrorCode::E03001,
            format!("Expected a scalar node, found a {}.", node.kind.name()),
        )
        .with_location(node.location)
    })
}

fn core_tag(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Str => "!!str",
        Primitive::Int => "!!int",
        Primitive::Bool => "!!bool",
    }
}

fn check_core_tag(node: &Node, allowed: &str) -> Result<()> {
    match node.tag.as_deref() {
        None => Ok(()),
        Some(tag) if tag == allowed => Ok(()),
        Some(tag) => Err(IdlError::new(
            ErrorCode::E03005,
            format!("Tag {} is not allowed here, expected {}.", tag, allowed),
        )
        .with_location(node.location)),
    }
}

fn scalar_value(node: &Node, scalar: &Scalar, primitive: Primitive) -> Result<Value> {
    let invalid = || {
        IdlError::new(
            ErrorCode::E03006,
            format!("Invalid {} literal '{}'.", primitive.name(), scalar.value),
        )
        .with_location(node.location)
    };

    match primitive {
        Primitive::Str => Ok(Value::Str(scalar.value.clone())),
        Primitive::Int => parse_int(&scalar.value).map(Value::Int).ok_or_else(invalid),
        Primitive::Bool => parse_bool(&scalar.value).map(Value::Bool).ok_or_else(invalid),
    }
}

/// Value of a scalar with no record tag: core tags first, then implicit
/// resolution of plain scalars.
fn resolve_scalar(node: &Node, tag: Option<&str>, scalar: &Scalar) -> Result<Value> {
    match tag {
        Some("!!str") => return scalar_value(node, scalar, Primitive::Str),
        Some("!!int") => return scalar_value(node, scalar, Primitive::Int),
        Some("!!bool") => return scalar_value(node, scalar, Primitive::Bool),
        Some("!!null") => return Ok(Value::None),
        Some(other) => {
            return Err(
                IdlError::new(ErrorCode::E03005, format!("Unknown tag {}.", other))
                    .with_location(node.location),
            )
        }
        None => {}
    }

    if !scalar.is_plain() {
        return Ok(Value::Str(scalar.value.clone()));
    }

    let text = scalar.value.as_str();
    if is_null_literal(text) {
        return Ok(Value::None);
    }
    if is_yaml_case(text) {
        if let Some(value) = parse_bool(text) {
            return Ok(Value::Bool(value));
        }
    }
    if let Some(value) = parse_int(text) {
        return Ok(Value::Int(value));
    }

    Ok(Value::Str(scalar.value.clone()))
}

fn is_null(node: &Node) -> bool {
    match (node.tag.as_deref(), node.as_scalar()) {
        (Some("!!null"), _) => true,
        (None, Some(scalar)) => scalar.is_plain() && is_null_literal(&scalar.value),
        _ => false,
    }
}

fn is_null_literal(text: &str) -> bool {
    matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

/// `word`, `Word` or `WORD`
fn is_yaml_case(text: &str) -> bool {
    let lower = text.to_lowercase();
    if text == lower || text == text.to_uppercase() {
        return true;
    }

    let mut chars = lower.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect::<String>() == text)
        .unwrap_or(false)
}

/// YAML 1.1 booleans
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "yes" | "true" | "on" => Some(true),
        "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// YAML 1.1 integers: decimal, `0x`, `0o`, `0b` and leading-zero octal,
/// with an optional sign and `_` separators. Covers the whole `i64` and
/// `u64` ranges.
pub fn parse_int(text: &str) -> Option<i128> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str())),
    };

    let (radix, body) = if let Some(rest) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = digits.strip_prefix("0o") {
        (8, rest)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i128::from_str_radix(body, radix).ok()?;
    if negative {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}
