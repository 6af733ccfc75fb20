//! Record table for the ioctl interface AST
//!
//! Binds document tags to AST node types and declares how each node's fields
//! are read. The table is fixed; build it once with [`ast_schema`] and share
//! it between loads.

use std::rc::Rc;

use crate::ast::{
    AstNode, BitmaskValue, CompoundKind, Constant, EnumValue, Field, FieldMeta, IoctlCommand,
    IoctlIface, Namespace, PointerTarget, ScopeItem, Type, TypeArray, TypeBitmask, TypeBuiltin,
    TypeCompound, TypeEnum, TypeFwdDcl, TypeOffsetPointer, TypePointer64,
};
use crate::description::Description;
use crate::error::{ErrorCode, IdlError, Result};
use crate::schema::{
    unexpected_value, Args, BuildFn, Collection, FromValue, RecordDecl, Schema, SchemaBuilder,
    TypeExpr, Value,
};
use crate::types::Number;

/// Document tag to record name
pub const TAGS: [(&str, &str); 12] = [
    ("!builtin", "TypeBuiltin"),
    ("!enum", "TypeEnum"),
    ("!bitmask", "TypeBitmask"),
    ("!constant", "Constant"),
    ("!array", "TypeArray"),
    ("!forward-declaration", "TypeFwdDcl"),
    ("!pointer64", "TypePointer64"),
    ("!offset-pointer", "TypeOffsetPointer"),
    ("!struct", "TypeStruct"),
    ("!union", "TypeUnion"),
    ("!ioctl-command", "IoctlCommand"),
    ("!ioctl-iface", "IoctlIface"),
];

/// Records a field, a command argument or a pointer may refer to
const TYPES: [&str; 8] = [
    "TypeArray",
    "TypeBitmask",
    "TypeBuiltin",
    "TypeStruct",
    "TypeUnion",
    "TypeEnum",
    "TypeOffsetPointer",
    "TypePointer64",
];

/// Records an interface or a compound may define
const SCOPE_ITEMS: [&str; 5] = ["Constant", "TypeEnum", "TypeBitmask", "TypeStruct", "TypeUnion"];

fn any_type() -> TypeExpr {
    TypeExpr::union(TYPES)
}

fn pointer_target() -> TypeExpr {
    TypeExpr::union(std::iter::once("TypeFwdDcl").chain(TYPES))
}

fn tuple_of(record: &'static str) -> TypeExpr {
    TypeExpr::Collection(Collection::BoxedSlice, Box::new(TypeExpr::Named(record)))
}

fn empty() -> Value {
    Value::Seq(Vec::new())
}

/// Declaration with the `name` and `description` fields every named node has
fn named(name: &'static str, build: BuildFn) -> RecordDecl {
    RecordDecl::new(name, build)
        .field("name", TypeExpr::Str)
        .field("description", TypeExpr::Named("Description"))
}

fn compound(name: &'static str, build: BuildFn) -> RecordDecl {
    named(name, build)
        .field_with_default(
            "items",
            TypeExpr::Collection(Collection::BoxedSlice, Box::new(TypeExpr::union(SCOPE_ITEMS))),
            empty(),
        )
        .field_with_default("fields", tuple_of("Field"), empty())
}

/// Build the AST record table.
pub fn ast_schema() -> Result<Schema> {
    let builder = SchemaBuilder::new()
        .record(
            RecordDecl::new("Description", build_description)
                .field_with_default("text", TypeExpr::Str, Value::str("")),
        )
        .record(RecordDecl::new("Number", build_number).field("number", TypeExpr::Int))
        .record(RecordDecl::new("TypeBuiltin", build_builtin).field("name", TypeExpr::Str))
        .record(
            named("EnumValue", build_enum_value)
                .field_with_default("value", TypeExpr::optional(TypeExpr::Str), Value::None)
                .field_with_default("alias", TypeExpr::Bool, Value::Bool(false)),
        )
        .record(
            named("TypeEnum", build_enum)
                .field("underlying_type", TypeExpr::Named("TypeBuiltin"))
                .field("values", tuple_of("EnumValue")),
        )
        .record(named("BitmaskValue", build_bitmask_value).field("bit_number", TypeExpr::Int))
        .record(
            named("TypeBitmask", build_bitmask)
                .field("underlying_type", TypeExpr::Named("TypeBuiltin"))
                .field("values", tuple_of("BitmaskValue")),
        )
        .record(
            named("Constant", build_constant)
                .field("type", TypeExpr::Named("TypeBuiltin"))
                .field("value", TypeExpr::Str),
        )
        .record(
            RecordDecl::new("TypeArray", build_array)
                .field("element_type", TypeExpr::Named("TypeBuiltin"))
                .field("array_size", TypeExpr::Str),
        )
        .record(
            RecordDecl::new("FieldMeta", build_field_meta).field_with_default(
                "padding",
                TypeExpr::Bool,
                Value::Bool(false),
            ),
        )
        .record(
            named("Field", build_field)
                .field("type", any_type())
                .field_with_default(
                    "meta",
                    TypeExpr::optional(TypeExpr::Named("FieldMeta")),
                    Value::None,
                ),
        )
        .record(compound("TypeStruct", build_struct))
        .record(compound("TypeUnion", build_union))
        .record(named("TypeFwdDcl", build_fwd_dcl).field("keyword", TypeExpr::Str))
        .record(
            RecordDecl::new("TypePointer64", build_pointer64)
                .field("value_type", pointer_target())
                .field_with_default("const", TypeExpr::Bool, Value::Bool(false)),
        )
        .record(
            RecordDecl::new("TypeOffsetPointer", build_offset_pointer)
                .field("value_type", pointer_target())
                .field("representation_type", TypeExpr::Named("TypeBuiltin"))
                .field_with_default("const", TypeExpr::Bool, Value::Bool(false)),
        )
        .record(
            named("Namespace", build_namespace)
                .field("forward_declarations", tuple_of("TypeFwdDcl")),
        )
        .record(
            named("IoctlCommand", build_ioctl_command)
                .field("number", TypeExpr::Named("Number"))
                .field("command_type", TypeExpr::Str)
                .field("arg_type", any_type()),
        )
        .record(
            named("IoctlIface", build_ioctl_iface)
                .field("number", TypeExpr::Named("Number"))
                .field("items", TypeExpr::vec(TypeExpr::union(SCOPE_ITEMS)))
                .field("commands", tuple_of("IoctlCommand"))
                .field_with_default("namespaces", tuple_of("Namespace"), empty())
                .field_with_default("code", TypeExpr::Str, Value::str("")),
        );

    TAGS.iter()
        .fold(builder, |builder, &(tag, record)| builder.tag(tag, record))
        .build()
}

// ========== Build functions ==========

fn build_description(mut args: Args) -> Result<Value> {
    let text = args.take::<String>("text")?;
    Ok(Value::Ast(AstNode::Description(Description::new(text))))
}

fn build_number(mut args: Args) -> Result<Value> {
    let number = args.take::<i128>("number")?;
    let number = u64::try_from(number).map_err(|_| {
        IdlError::new(
            ErrorCode::E03006,
            format!("Number {} does not fit an unsigned 64-bit integer.", number),
        )
    })?;
    Ok(Value::Ast(AstNode::Number(Number(number))))
}

fn build_builtin(mut args: Args) -> Result<Value> {
    let node = TypeBuiltin::new(&args.take::<String>("name")?)?;
    Ok(Value::Ast(AstNode::Builtin(node)))
}

fn build_enum_value(mut args: Args) -> Result<Value> {
    let node = EnumValue::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("value")?,
        args.take("alias")?,
    )?;
    Ok(Value::Ast(AstNode::EnumValue(node)))
}

fn build_enum(mut args: Args) -> Result<Value> {
    let node = TypeEnum::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("underlying_type")?,
        args.take("values")?,
    )?;
    Ok(Value::Ast(AstNode::Enum(node)))
}

fn build_bitmask_value(mut args: Args) -> Result<Value> {
    let name = args.take::<String>("name")?;
    let description = args.take("description")?;
    let bit_number = args.take::<i128>("bit_number")?;
    let bit_number = u32::try_from(bit_number).map_err(|_| {
        IdlError::new(
            ErrorCode::E03006,
            format!("Bit number {} is out of range.", bit_number),
        )
    })?;

    let node = BitmaskValue::new(name, description, bit_number)?;
    Ok(Value::Ast(AstNode::BitmaskValue(node)))
}

fn build_bitmask(mut args: Args) -> Result<Value> {
    let node = TypeBitmask::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("underlying_type")?,
        args.take("values")?,
    )?;
    Ok(Value::Ast(AstNode::Bitmask(node)))
}

fn build_constant(mut args: Args) -> Result<Value> {
    let node = Constant::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("type")?,
        args.take::<String>("value")?,
    )?;
    Ok(Value::Ast(AstNode::Constant(node)))
}

fn build_array(mut args: Args) -> Result<Value> {
    let node = TypeArray::new(
        args.take("element_type")?,
        args.take::<String>("array_size")?,
    );
    Ok(Value::Ast(AstNode::Array(node)))
}

fn build_field_meta(mut args: Args) -> Result<Value> {
    Ok(Value::Ast(AstNode::FieldMeta(FieldMeta::new(
        args.take("padding")?,
    ))))
}

fn build_field(mut args: Args) -> Result<Value> {
    let node = Field::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("type")?,
        args.take("meta")?,
    )?;
    Ok(Value::Ast(AstNode::Field(node)))
}

fn build_compound(kind: CompoundKind, mut args: Args) -> Result<Value> {
    let node = TypeCompound::new(
        kind,
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("items")?,
        args.take("fields")?,
    )?;
    Ok(Value::Ast(AstNode::Compound(node)))
}

fn build_struct(args: Args) -> Result<Value> {
    build_compound(CompoundKind::Struct, args)
}

fn build_union(args: Args) -> Result<Value> {
    build_compound(CompoundKind::Union, args)
}

fn build_fwd_dcl(mut args: Args) -> Result<Value> {
    let node = TypeFwdDcl::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take::<String>("keyword")?,
    )?;
    Ok(Value::Ast(AstNode::ForwardDeclaration(node)))
}

fn build_pointer64(mut args: Args) -> Result<Value> {
    let node = TypePointer64::new(args.take("value_type")?, args.take("const")?);
    Ok(Value::Ast(AstNode::Pointer64(node)))
}

fn build_offset_pointer(mut args: Args) -> Result<Value> {
    let node = TypeOffsetPointer::new(
        args.take("value_type")?,
        args.take("representation_type")?,
        args.take("const")?,
    );
    Ok(Value::Ast(AstNode::OffsetPointer(node)))
}

fn build_namespace(mut args: Args) -> Result<Value> {
    let node = Namespace::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("forward_declarations")?,
    )?;
    Ok(Value::Ast(AstNode::Namespace(node)))
}

fn build_ioctl_command(mut args: Args) -> Result<Value> {
    let node = IoctlCommand::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("number")?,
        args.take::<String>("command_type")?,
        args.take("arg_type")?,
    )?;
    Ok(Value::Ast(AstNode::IoctlCommand(node)))
}

fn build_ioctl_iface(mut args: Args) -> Result<Value> {
    let node = IoctlIface::new(
        args.take::<String>("name")?,
        args.take("description")?,
        args.take("number")?,
        args.take("items")?,
        args.take("commands")?,
        args.take("namespaces")?,
        args.take::<String>("code")?,
    )?;
    Ok(Value::Ast(AstNode::IoctlIface(node)))
}

// ========== Value conversions ==========

macro_rules! from_ast_node {
    ($($variant:ident => $ty:ty as $name:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Ast(AstNode::$variant(node)) => Ok(node),
                        other => Err(unexpected_value($name, &other)),
                    }
                }
            }
        )*
    };
}

from_ast_node!(
    Description => Description as "Description",
    Number => Number as "Number",
    Builtin => Rc<TypeBuiltin> as "TypeBuiltin",
    EnumValue => Rc<EnumValue> as "EnumValue",
    Enum => Rc<TypeEnum> as "TypeEnum",
    BitmaskValue => Rc<BitmaskValue> as "BitmaskValue",
    Bitmask => Rc<TypeBitmask> as "TypeBitmask",
    Constant => Rc<Constant> as "Constant",
    Array => Rc<TypeArray> as "TypeArray",
    FieldMeta => Rc<FieldMeta> as "FieldMeta",
    Field => Rc<Field> as "Field",
    Compound => Rc<TypeCompound> as "TypeStruct or TypeUnion",
    ForwardDeclaration => Rc<TypeFwdDcl> as "TypeFwdDcl",
    Pointer64 => Rc<TypePointer64> as "TypePointer64",
    OffsetPointer => Rc<TypeOffsetPointer> as "TypeOffsetPointer",
    Namespace => Rc<Namespace> as "Namespace",
    IoctlCommand => Rc<IoctlCommand> as "IoctlCommand",
    IoctlIface => Rc<IoctlIface> as "IoctlIface",
);

impl FromValue for AstNode {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ast(node) => Ok(node),
            other => Err(unexpected_value("an AST node", &other)),
        }
    }
}

impl FromValue for Type {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ast(AstNode::Array(node)) => Ok(Type::Array(node)),
            Value::Ast(AstNode::Bitmask(node)) => Ok(Type::Bitmask(node)),
            Value::Ast(AstNode::Builtin(node)) => Ok(Type::Builtin(node)),
            Value::Ast(AstNode::Compound(node)) => Ok(Type::Compound(node)),
            Value::Ast(AstNode::Enum(node)) => Ok(Type::Enum(node)),
            Value::Ast(AstNode::OffsetPointer(node)) => Ok(Type::OffsetPointer(node)),
            Value::Ast(AstNode::Pointer64(node)) => Ok(Type::Pointer64(node)),
            other => Err(unexpected_value("a type", &other)),
        }
    }
}

impl FromValue for ScopeItem {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ast(AstNode::Constant(node)) => Ok(ScopeItem::Constant(node)),
            Value::Ast(AstNode::Enum(node)) => Ok(ScopeItem::Enum(node)),
            Value::Ast(AstNode::Bitmask(node)) => Ok(ScopeItem::Bitmask(node)),
            Value::Ast(AstNode::Compound(node)) => Ok(ScopeItem::Compound(node)),
            other => Err(unexpected_value("a scope item", &other)),
        }
    }
}

impl FromValue for PointerTarget {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ast(AstNode::ForwardDeclaration(node)) => {
                Ok(PointerTarget::ForwardDeclaration(node))
            }
            other => Type::from_value(other).map(PointerTarget::Type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{HasName, Introspect, Named};
    use crate::error::ErrorCode;
    use crate::loader::Loader;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn load(text: &str) -> Result<AstNode> {
        let schema = ast_schema()?;
        let doc = parse(text)?;
        let value = Loader::new(&schema, &doc).load()?;
        AstNode::from_value(value)
    }

    fn desc(text: &str) -> Description {
        Description::new(text)
    }

    fn builtin(name: &str) -> Rc<TypeBuiltin> {
        TypeBuiltin::new(name).unwrap()
    }

    fn make_field() -> Rc<Field> {
        Field::new(
            "test_field",
            desc("Test field."),
            Type::Builtin(builtin("uint32_t")),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_schema_builds() {
        let schema = ast_schema().unwrap();
        for (tag, record) in TAGS {
            let id = schema.tagged(tag).unwrap();
            assert_eq!(schema.record(id).name, record);
        }
        assert!(schema.record_id("Description").is_some());
        assert!(schema.tagged("!description").is_none());
    }

    #[test]
    fn test_builtin() {
        assert_eq!(
            load("!builtin uint32_t").unwrap(),
            AstNode::Builtin(builtin("uint32_t"))
        );
    }

    #[test]
    fn test_enum() {
        let got = load(
            "
            !enum
            name: test_enum
            description: Test enum.
            underlying_type: !builtin uint32_t
            values:
              - name: value0
                description: Test value 0.
              - name: value1
                description: Test value 1.
            ",
        )
        .unwrap();

        let expected = TypeEnum::new(
            "test_enum",
            desc("Test enum."),
            builtin("uint32_t"),
            vec![
                EnumValue::new("value0", desc("Test value 0."), None, false).unwrap(),
                EnumValue::new("value1", desc("Test value 1."), None, false).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(got, AstNode::Enum(expected));
    }

    #[test]
    fn test_enum_parent_is_loaded_instance() {
        let got = load(
            r#"!enum {name: "widget", description: "A widget.",
                underlying_type: !builtin uint32_t,
                values: [{name: "v0", description: "zero", value: "0"}]}"#,
        )
        .unwrap();

        let node = match got {
            AstNode::Enum(node) => node,
            other => panic!("unexpected node {:?}", other),
        };
        assert_eq!(node.name(), "widget");
        assert_eq!(node.values().len(), 1);

        let value = &node.values()[0];
        assert_eq!(value.name(), "v0");
        assert_eq!(value.value(), Some("0"));
        let parent = value.parent().unwrap();
        assert!(std::ptr::addr_eq(Rc::as_ptr(&parent), Rc::as_ptr(&node)));
    }

    #[test]
    fn test_bitmask() {
        let got = load(
            "!bitmask {name: flags, description: Flags., underlying_type: !builtin uint8_t,
                values: [{name: a, description: A., bit_number: 0}, {name: b, description: '', bit_number: 7}]}",
        )
        .unwrap();

        let expected = TypeBitmask::new(
            "flags",
            desc("Flags."),
            builtin("uint8_t"),
            vec![
                BitmaskValue::new("a", desc("A."), 0).unwrap(),
                BitmaskValue::new("b", desc(""), 7).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(got, AstNode::Bitmask(expected));

        let err = load(
            "!bitmask {name: flags, description: x, underlying_type: !builtin uint8_t,
                values: [{name: a, description: x, bit_number: -1}]}",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::E03006);
    }

    #[test]
    fn test_constant() {
        let got = load(
            "!constant
            name: test_constant
            description: Test constant.
            type: !builtin uint32_t
            value: 42
            ",
        )
        .unwrap();
        let expected =
            Constant::new("test_constant", desc("Test constant."), builtin("uint32_t"), "42")
                .unwrap();
        assert_eq!(got, AstNode::Constant(expected));
    }

    #[test]
    fn test_array() {
        let got = load("!array {element_type: !builtin uint32_t, array_size: 42}").unwrap();
        assert_eq!(got, AstNode::Array(TypeArray::new(builtin("uint32_t"), "42")));
    }

    #[test]
    fn test_pointers() {
        let got = load("!pointer64 {value_type: !builtin uint32_t, const: yes}").unwrap();
        let expected =
            TypePointer64::new(PointerTarget::Type(Type::Builtin(builtin("uint32_t"))), true);
        assert_eq!(got, AstNode::Pointer64(expected));

        let got = load(
            "
            !offset-pointer
            value_type: !builtin uint64_t
            representation_type: !builtin uint32_t
            const: yes
            ",
        )
        .unwrap();
        let expected = TypeOffsetPointer::new(
            PointerTarget::Type(Type::Builtin(builtin("uint64_t"))),
            builtin("uint32_t"),
            true,
        );
        assert_eq!(got, AstNode::OffsetPointer(expected));

        let got = load(
            "!pointer64 {value_type: !forward-declaration {name: opaque, description: x, keyword: struct}}",
        )
        .unwrap();
        match got {
            AstNode::Pointer64(node) => {
                assert!(node.value_type().is_forward_declaration());
                assert_eq!(node.value_type().name(), Some("opaque"));
                assert!(!node.is_const());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_forward_declaration() {
        let got = load(
            "
            !forward-declaration
            name: test_type
            description: Test description.
            keyword: struct
            ",
        )
        .unwrap();
        let expected = TypeFwdDcl::new("test_type", desc("Test description."), "struct").unwrap();
        assert_eq!(got, AstNode::ForwardDeclaration(expected));
    }

    #[test]
    fn test_compounds() {
        for (tag, kind) in [("!struct", CompoundKind::Struct), ("!union", CompoundKind::Union)] {
            let got = load(&format!(
                "
                {}
                name: test_compound
                description: Test compound.
                fields:
                  - name: test_field
                    description: Test field.
                    type: !builtin uint32_t
                ",
                tag
            ))
            .unwrap();

            let expected = TypeCompound::new(
                kind,
                "test_compound",
                desc("Test compound."),
                vec![],
                vec![make_field()],
            )
            .unwrap();
            assert_eq!(got, AstNode::Compound(expected));
        }
    }

    #[test]
    fn test_struct_without_fields() {
        let err = load("!struct {name: empty, description: x}").unwrap_err();
        assert_eq!(err.code, ErrorCode::E02007);
        assert_eq!(err.frames.last().unwrap().type_name, "TypeStruct");

        let err = load("!struct {name: empty, description: x, items: [], fields: []}").unwrap_err();
        assert_eq!(err.code, ErrorCode::E02007);
    }

    #[test]
    fn test_field_type_mismatch() {
        let err = load(
            "!struct {name: s, description: x,
                fields: [{name: f, description: x,
                          type: !forward-declaration {name: t, description: x, keyword: struct}}]}",
        )
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::E03004);
        assert!(err.message.contains("TypeFwdDcl"), "{}", err.message);
        assert!(err.message.contains("TypeArray, TypeBitmask, TypeBuiltin"), "{}", err.message);
        let outer: Vec<&str> = err.frames.iter().map(|f| f.type_name.as_str()).collect();
        assert_eq!(&outer[1..], &["Field", "Sequence[Field]", "TypeStruct"]);
    }

    #[test]
    fn test_ioctl_command() {
        let got = load(
            "
            !ioctl-command
            name: test_command
            description: Test description.
            number: 42
            command_type: _IOW
            arg_type: !builtin uint32_t
            ",
        )
        .unwrap();
        let expected = IoctlCommand::new(
            "test_command",
            desc("Test description."),
            Number(42),
            "_IOW",
            Type::Builtin(builtin("uint32_t")),
        )
        .unwrap();
        assert_eq!(got, AstNode::IoctlCommand(expected));
    }

    #[test]
    fn test_ioctl_iface() {
        let got = load(
            "
            !ioctl-iface
            name: test_iface
            description: Test iface.
            number: 42
            items: []
            commands: []
            ",
        )
        .unwrap();
        let expected = IoctlIface::new(
            "test_iface",
            desc("Test iface."),
            Number(42),
            vec![],
            vec![],
            vec![],
            "",
        )
        .unwrap();
        assert_eq!(got, AstNode::IoctlIface(expected));
    }

    #[test]
    fn test_shared_type_is_one_node() {
        let got = load(
            "!ioctl-iface {name: dev, description: Device., number: 0x2a,
                items: [
                    &hdr !struct {name: header, description: x,
                        fields: [{name: size, description: x, type: !builtin uint32_t}]},
                    !struct {name: request, description: x,
                        fields: [{name: hdr, description: x, type: *hdr}]},
                ],
                commands: [{name: get, description: x, number: 1, command_type: _IOR, arg_type: *hdr}]}",
        )
        .unwrap();

        let iface = match got {
            AstNode::IoctlIface(iface) => iface,
            other => panic!("unexpected node {:?}", other),
        };
        assert_eq!(iface.number(), Number(42));

        let header = match &iface.items()[0] {
            ScopeItem::Compound(node) => node.clone(),
            other => panic!("unexpected item {:?}", other),
        };
        let request = match &iface.items()[1] {
            ScopeItem::Compound(node) => node.clone(),
            other => panic!("unexpected item {:?}", other),
        };

        match (request.fields()[0].ty(), iface.commands()[0].arg_type()) {
            (Type::Compound(a), Type::Compound(b)) => {
                assert!(Rc::ptr_eq(a, &header));
                assert!(Rc::ptr_eq(b, &header));
            }
            other => panic!("unexpected types {:?}", other),
        }
        assert_eq!(header.full_name_cxx(), "header");
        assert_eq!(request.fields()[0].full_name_c(), "request_hdr");
    }

    #[test]
    fn test_description_shorthand_and_default() {
        let got = load("!forward-declaration {name: t, description: , keyword: union}").unwrap();
        match got {
            AstNode::ForwardDeclaration(node) => {
                assert!(node.description().is_empty());
                assert_eq!(node.keyword(), "union");
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_aliased_value_takes_last_parent() {
        let got = load(
            "!ioctl-iface
            name: dev
            description: x
            number: 1
            items:
              - !enum
                name: first
                description: x
                underlying_type: !builtin uint32_t
                values: [&v {name: v0, description: x}]
              - !enum
                name: second
                description: x
                underlying_type: !builtin uint32_t
                values: [*v]
            commands: []
            ",
        )
        .unwrap();

        let iface = match got {
            AstNode::IoctlIface(iface) => iface,
            other => panic!("unexpected node {:?}", other),
        };
        let values: Vec<String> = iface
            .items()
            .iter()
            .map(|item| match item {
                ScopeItem::Enum(node) => node.values()[0].full_name_c(),
                other => panic!("unexpected item {:?}", other),
            })
            .collect();
        assert_eq!(values, vec!["second_v0".to_string(), "second_v0".to_string()]);
    }

    #[test]
    fn test_number_range() {
        let iface = |number: &str| {
            load(&format!(
                "!ioctl-iface {{name: dev, description: x, number: {}, items: [], commands: []}}",
                number
            ))
        };

        match iface("0xFFFFFFFFFFFFFFFF").unwrap() {
            AstNode::IoctlIface(node) => assert_eq!(node.number(), Number(u64::MAX)),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(iface("-1").unwrap_err().code, ErrorCode::E03006);
        assert_eq!(iface("0x10000000000000000").unwrap_err().code, ErrorCode::E03006);
    }

    #[test]
    fn test_malformed_name() {
        let err = load("!forward-declaration {name: no spaces, description: x, keyword: struct}")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::E02001);
        assert_eq!(err.frames.len(), 1);
    }
}
