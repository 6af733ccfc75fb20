//! Record declarations and field type descriptors
//!
//! A [`Schema`] is built from record declarations in two passes: every
//! record name is registered first, then field types are resolved, so a
//! declaration may refer to a record declared after it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::AstNode;
use crate::error::{ErrorCode, IdlError, Result};

/// Collection spellings a field type may be written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Vec,
    BoxedSlice,
    VecDeque,
    BTreeSet,
    HashSet,
}

/// Map spellings a field type may be written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    BTreeMap,
    HashMap,
}

/// Field type as declared
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Str,
    Int,
    Bool,
    /// Reference to a record by name
    Named(&'static str),
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Collection(Collection, Box<TypeExpr>),
    Map(MapKind, Box<TypeExpr>, Box<TypeExpr>),
}

impl TypeExpr {
    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    pub fn vec(inner: TypeExpr) -> Self {
        TypeExpr::Collection(Collection::Vec, Box::new(inner))
    }

    pub fn union<I: IntoIterator<Item = &'static str>>(names: I) -> Self {
        TypeExpr::Union(names.into_iter().map(TypeExpr::Named).collect())
    }
}

/// Record handle inside a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Primitive field types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Str,
    Int,
    Bool,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Str => "str",
            Primitive::Int => "int",
            Primitive::Bool => "bool",
        }
    }
}

/// Resolved field type descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Primitive(Primitive),
    Sequence(Box<FieldType>),
    Optional(Box<FieldType>),
    Record(RecordId),
    Union(Vec<FieldType>),
    /// Recognized but not loadable
    Mapping(Box<FieldType>, Box<FieldType>),
    /// Recognized but not loadable
    Set(Box<FieldType>),
}

/// Builds a record value from its field values.
pub type BuildFn = fn(Args) -> Result<Value>;

/// Field declaration
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: &'static str,
    pub ty: TypeExpr,
    pub default: Option<Value>,
}

/// Record declaration: ordered fields plus a build function
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub name: &'static str,
    pub fields: Vec<FieldDecl>,
    pub build: BuildFn,
}

impl RecordDecl {
    pub fn new(name: &'static str, build: BuildFn) -> Self {
        Self {
            name,
            fields: Vec::new(),
            build,
        }
    }

    /// Declaration whose values are plain [`Record`]s.
    pub fn plain(name: &'static str) -> Self {
        Self::new(name, Record::build)
    }

    pub fn field(mut self, name: &'static str, ty: TypeExpr) -> Self {
        self.fields.push(FieldDecl {
            name,
            ty,
            default: None,
        });
        self
    }

    pub fn field_with_default(mut self, name: &'static str, ty: TypeExpr, default: Value) -> Self {
        self.fields.push(FieldDecl {
            name,
            ty,
            default: Some(default),
        });
        self
    }
}

/// Resolved field
#[derive(Debug, Clone)]
pub struct FieldShape {
    pub name: &'static str,
    pub ty: FieldType,
    pub default: Option<Value>,
}

/// Resolved record
#[derive(Debug, Clone)]
pub struct RecordShape {
    pub name: &'static str,
    pub fields: Vec<FieldShape>,
    pub build: BuildFn,
}

impl RecordShape {
    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Field name to resolved type, in declaration order
    pub fn type_hints(&self) -> Vec<(&'static str, &FieldType)> {
        self.fields.iter().map(|field| (field.name, &field.ty)).collect()
    }
}

/// Collects record declarations and tags, then resolves them.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    decls: Vec<RecordDecl>,
    tags: Vec<(&'static str, &'static str)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, decl: RecordDecl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Bind a document tag to a record by name.
    pub fn tag(mut self, tag: &'static str, record: &'static str) -> Self {
        self.tags.push((tag, record));
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut by_name = HashMap::new();
        for (idx, decl) in self.decls.iter().enumerate() {
            if by_name.insert(decl.name, RecordId(idx)).is_some() {
                return Err(IdlError::new(
                    ErrorCode::E04003,
                    format!("Record {} is declared twice.", decl.name),
                ));
            }
        }

        let mut records = Vec::with_capacity(self.decls.len());
        for decl in self.decls {
            let mut fields = Vec::with_capacity(decl.fields.len());
            for field in decl.fields {
                let ty = resolve(&by_name, &field.ty).map_err(|e| IdlError {
                    message: format!("{}.{}: {}", decl.name, field.name, e.message),
                    ..e
                })?;
                fields.push(FieldShape {
                    name: field.name,
                    ty,
                    default: field.default,
                });
            }
            records.push(RecordShape {
                name: decl.name,
                fields,
                build: decl.build,
            });
        }

        let mut tags = HashMap::new();
        for (tag, record) in self.tags {
            let id = lookup(&by_name, record)?;
            if tags.insert(tag, id).is_some() {
                return Err(IdlError::new(
                    ErrorCode::E04003,
                    format!("Tag {} is bound twice.", tag),
                ));
            }
        }

        Ok(Schema {
            records,
            by_name,
            tags,
        })
    }
}

fn lookup(by_name: &HashMap<&'static str, RecordId>, name: &str) -> Result<RecordId> {
    by_name.get(name).copied().ok_or_else(|| {
        IdlError::new(
            ErrorCode::E04002,
            format!("Reference to undeclared record {}.", name),
        )
    })
}

/// Normalize a declared type into a descriptor.
fn resolve(by_name: &HashMap<&'static str, RecordId>, expr: &TypeExpr) -> Result<FieldType> {
    Ok(match expr {
        TypeExpr::Str => FieldType::Primitive(Primitive::Str),
        TypeExpr::Int => FieldType::Primitive(Primitive::Int),
        TypeExpr::Bool => FieldType::Primitive(Primitive::Bool),
        TypeExpr::Named(name) => FieldType::Record(lookup(by_name, name)?),
        TypeExpr::Optional(inner) => FieldType::Optional(Box::new(resolve(by_name, inner)?)),
        TypeExpr::Union(alternatives) => FieldType::Union(
            alternatives
                .iter()
                .map(|alt| resolve(by_name, alt))
                .collect::<Result<_>>()?,
        ),
        TypeExpr::Collection(kind, inner) => {
            let inner = Box::new(resolve(by_name, inner)?);
            match kind {
                Collection::Vec | Collection::BoxedSlice | Collection::VecDeque => {
                    FieldType::Sequence(inner)
                }
                Collection::BTreeSet | Collection::HashSet => FieldType::Set(inner),
            }
        }
        TypeExpr::Map(_, key, value) => FieldType::Mapping(
            Box::new(resolve(by_name, key)?),
            Box::new(resolve(by_name, value)?),
        ),
    })
}

/// Resolved record table
#[derive(Debug)]
pub struct Schema {
    records: Vec<RecordShape>,
    by_name: HashMap<&'static str, RecordId>,
    tags: HashMap<&'static str, RecordId>,
}

impl Schema {
    pub fn record(&self, id: RecordId) -> &RecordShape {
        &self.records[id.0]
    }

    pub fn record_id(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    pub fn tagged(&self, tag: &str) -> Option<RecordId> {
        self.tags.get(tag).copied()
    }

    /// Human-readable spelling of a descriptor
    pub fn type_name(&self, ty: &FieldType) -> String {
        match ty {
            FieldType::Primitive(primitive) => primitive.name().to_string(),
            FieldType::Sequence(inner) => format!("Sequence[{}]", self.type_name(inner)),
            FieldType::Optional(inner) => format!("Optional[{}]", self.type_name(inner)),
            FieldType::Record(id) => self.record(*id).name.to_string(),
            FieldType::Union(alternatives) => format!("Union[{}]", self.names(alternatives)),
            FieldType::Mapping(key, value) => {
                format!("Mapping[{}, {}]", self.type_name(key), self.type_name(value))
            }
            FieldType::Set(inner) => format!("Set[{}]", self.type_name(inner)),
        }
    }

    /// Comma-separated spellings
    pub fn names(&self, types: &[FieldType]) -> String {
        types
            .iter()
            .map(|ty| self.type_name(ty))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// True if `value` is an instance of `ty`, looking at the outermost type only.
    pub fn accepts(&self, ty: &FieldType, value: &Value) -> bool {
        match (ty, value) {
            (FieldType::Primitive(Primitive::Str), Value::Str(_)) => true,
            (FieldType::Primitive(Primitive::Int), Value::Int(_)) => true,
            (FieldType::Primitive(Primitive::Bool), Value::Bool(_)) => true,
            (FieldType::Record(id), value) => self.record(*id).name == value.type_name(),
            _ => false,
        }
    }
}

/// Loaded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i128),
    Str(String),
    Seq(Vec<Value>),
    Record(Rc<Record>),
    Ast(AstNode),
}

impl Value {
    /// Runtime type name, as used in mismatch messages
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Seq(_) => "sequence",
            Value::Record(record) => record.name,
            Value::Ast(node) => node.type_name(),
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{:?}", value),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Generic record value: ordered field values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: &'static str,
    pub fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Build function for declarations without a dedicated node type
    pub fn build(args: Args) -> Result<Value> {
        Ok(Value::Record(Rc::new(Record {
            name: args.record,
            fields: args.values,
        })))
    }
}

/// Field values handed to a build function, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub record: &'static str,
    values: Vec<(&'static str, Value)>,
}

impl Args {
    pub fn new(record: &'static str, values: Vec<(&'static str, Value)>) -> Self {
        Self { record, values }
    }

    /// Take a field value out by name and convert it.
    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let slot = self
            .values
            .iter_mut()
            .find(|(field, _)| *field == name)
            .ok_or_else(|| {
                IdlError::new(
                    ErrorCode::E03003,
                    format!("{} has no field {}.", self.record, name),
                )
            })?;

        T::from_value(std::mem::replace(&mut slot.1, Value::None))
    }
}

/// Conversion out of a loaded [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Error for a value of the wrong runtime type
pub fn unexpected_value(expected: &str, found: &Value) -> IdlError {
    IdlError::new(
        ErrorCode::E03001,
        format!("Expected {}, found {}.", expected, found.type_name()),
    )
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(value) => Ok(value),
            other => Err(unexpected_value("str", &other)),
        }
    }
}

impl FromValue for i128 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(value) => Ok(value),
            other => Err(unexpected_value("int", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        let value = i128::from_value(value)?;
        i64::try_from(value).map_err(|_| {
            IdlError::new(
                ErrorCode::E03006,
                format!("Integer {} is out of range.", value),
            )
        })
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(value) => Ok(value),
            other => Err(unexpected_value("bool", &other)),
        }
    }
}

impl FromValue for Rc<Record> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(record) => Ok(record),
            other => Err(unexpected_value("a record", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected_value("a sequence", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial() -> RecordDecl {
        RecordDecl::plain("Trivial").field("name", TypeExpr::Str)
    }

    #[test]
    fn test_forward_reference() {
        let schema = SchemaBuilder::new()
            .record(RecordDecl::plain("Outer").field("inner", TypeExpr::Named("Inner")))
            .record(RecordDecl::plain("Inner").field("value", TypeExpr::Int))
            .build()
            .unwrap();

        let outer = schema.record(schema.record_id("Outer").unwrap());
        let inner = schema.record_id("Inner").unwrap();
        assert_eq!(outer.field("inner").unwrap().ty, FieldType::Record(inner));
    }

    #[test]
    fn test_normalization() {
        let schema = SchemaBuilder::new()
            .record(trivial())
            .record(
                RecordDecl::plain("Shapes")
                    .field("a", TypeExpr::vec(TypeExpr::Str))
                    .field(
                        "b",
                        TypeExpr::Collection(Collection::BoxedSlice, Box::new(TypeExpr::Int)),
                    )
                    .field(
                        "c",
                        TypeExpr::Collection(Collection::VecDeque, Box::new(TypeExpr::Bool)),
                    )
                    .field(
                        "d",
                        TypeExpr::Collection(Collection::HashSet, Box::new(TypeExpr::Str)),
                    )
                    .field(
                        "e",
                        TypeExpr::Map(MapKind::BTreeMap, Box::new(TypeExpr::Str), Box::new(TypeExpr::Int)),
                    )
                    .field("f", TypeExpr::optional(TypeExpr::Named("Trivial")))
                    .field("g", TypeExpr::union(["Trivial"])),
            )
            .build()
            .unwrap();

        let shapes = schema.record(schema.record_id("Shapes").unwrap());
        let names: Vec<String> = shapes
            .type_hints()
            .into_iter()
            .map(|(_, ty)| schema.type_name(ty))
            .collect();
        assert_eq!(
            names,
            vec![
                "Sequence[str]",
                "Sequence[int]",
                "Sequence[bool]",
                "Set[str]",
                "Mapping[str, int]",
                "Optional[Trivial]",
                "Union[Trivial]",
            ]
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let err = SchemaBuilder::new()
            .record(RecordDecl::plain("Broken").field("x", TypeExpr::Named("Nowhere")))
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::E04002);
        assert!(err.message.contains("Broken.x"), "{}", err.message);
    }

    #[test]
    fn test_duplicates() {
        let err = SchemaBuilder::new()
            .record(trivial())
            .record(trivial())
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::E04003);

        let err = SchemaBuilder::new()
            .record(trivial())
            .tag("!t", "Trivial")
            .tag("!t", "Trivial")
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::E04003);

        let err = SchemaBuilder::new().tag("!t", "Trivial").build().unwrap_err();
        assert_eq!(err.code, ErrorCode::E04002);
    }

    #[test]
    fn test_args() {
        let mut args = Args::new(
            "Trivial",
            vec![
                ("name", Value::str("x")),
                ("count", Value::Int(3)),
                ("items", Value::Seq(vec![Value::Bool(true)])),
                ("maybe", Value::None),
            ],
        );

        assert_eq!(args.take::<String>("name").unwrap(), "x");
        assert_eq!(args.take::<i64>("count").unwrap(), 3);
        assert_eq!(args.take::<Vec<bool>>("items").unwrap(), vec![true]);
        assert_eq!(args.take::<Option<String>>("maybe").unwrap(), None);
        assert_eq!(args.take::<String>("missing").unwrap_err().code, ErrorCode::E03003);

        let mut args = Args::new("Trivial", vec![("name", Value::Int(1))]);
        let err = args.take::<String>("name").unwrap_err();
        assert_eq!(err.message, "Expected str, found int.");
    }

    #[test]
    fn test_accepts() {
        let schema = SchemaBuilder::new().record(trivial()).build().unwrap();
        let trivial = FieldType::Record(schema.record_id("Trivial").unwrap());
        let record = Value::Record(Rc::new(Record {
            name: "Trivial",
            fields: vec![("name", Value::str("a"))],
        }));

        assert!(schema.accepts(&trivial, &record));
        assert!(!schema.accepts(&trivial, &Value::str("a")));
        assert!(schema.accepts(&FieldType::Primitive(Primitive::Str), &Value::str("a")));
        assert!(!schema.accepts(&FieldType::Primitive(Primitive::Int), &Value::Bool(true)));
    }
}
