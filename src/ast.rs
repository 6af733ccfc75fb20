//! ioctl interface AST definitions
//!
//! Nodes are immutable once built. Containers are returned as `Rc` and stamp a
//! weak back-reference into their direct children while being constructed;
//! the back-reference is only used to compose qualified names.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::description::Description;
use crate::error::{ErrorCode, IdlError, Result};
use crate::types::{BuiltinType, Number};
use crate::validate;

pub use crate::validate::HasName;

/// AST node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstKind {
    Builtin,
    EnumValue,
    Enum,
    BitmaskValue,
    Bitmask,
    Constant,
    Array,
    FieldMeta,
    Field,
    Struct,
    Union,
    ForwardDeclaration,
    Pointer64,
    OffsetPointer,
    Namespace,
    IoctlCommand,
    IoctlIface,
}

impl AstKind {
    /// Name of the loader record that builds this kind of node
    pub fn record_name(&self) -> &'static str {
        match self {
            AstKind::Builtin => "TypeBuiltin",
            AstKind::EnumValue => "EnumValue",
            AstKind::Enum => "TypeEnum",
            AstKind::BitmaskValue => "BitmaskValue",
            AstKind::Bitmask => "TypeBitmask",
            AstKind::Constant => "Constant",
            AstKind::Array => "TypeArray",
            AstKind::FieldMeta => "FieldMeta",
            AstKind::Field => "Field",
            AstKind::Struct => "TypeStruct",
            AstKind::Union => "TypeUnion",
            AstKind::ForwardDeclaration => "TypeFwdDcl",
            AstKind::Pointer64 => "TypePointer64",
            AstKind::OffsetPointer => "TypeOffsetPointer",
            AstKind::Namespace => "Namespace",
            AstKind::IoctlCommand => "IoctlCommand",
            AstKind::IoctlIface => "IoctlIface",
        }
    }
}

/// Node type queries
pub trait Introspect {
    fn kind(&self) -> AstKind;

    fn is_constant(&self) -> bool {
        self.kind() == AstKind::Constant
    }

    fn is_builtin(&self) -> bool {
        self.kind() == AstKind::Builtin
    }

    /// Arrays and pointers: types with no name of their own
    fn is_anonymous(&self) -> bool {
        matches!(
            self.kind(),
            AstKind::Array | AstKind::Pointer64 | AstKind::OffsetPointer
        )
    }

    fn is_array(&self) -> bool {
        self.kind() == AstKind::Array
    }

    fn is_pointer64(&self) -> bool {
        self.kind() == AstKind::Pointer64
    }

    fn is_offset_pointer(&self) -> bool {
        self.kind() == AstKind::OffsetPointer
    }

    fn is_enum(&self) -> bool {
        self.kind() == AstKind::Enum
    }

    fn is_bitmask(&self) -> bool {
        self.kind() == AstKind::Bitmask
    }

    fn is_enum_or_bitmask(&self) -> bool {
        self.is_enum() || self.is_bitmask()
    }

    fn is_struct(&self) -> bool {
        self.kind() == AstKind::Struct
    }

    fn is_union(&self) -> bool {
        self.kind() == AstKind::Union
    }

    fn is_compound(&self) -> bool {
        self.is_struct() || self.is_union()
    }

    fn is_forward_declaration(&self) -> bool {
        self.kind() == AstKind::ForwardDeclaration
    }
}

/// Name, description and parent link of a named node.
pub struct Entity {
    name: String,
    description: Description,
    parent: RefCell<Option<Weak<dyn Named>>>,
}

impl Entity {
    pub fn new(name: impl Into<String>, description: Description) -> Result<Self> {
        let name = name.into();
        validate::identifier(&name)?;
        validate::not_known_builtin_type(&name)?;

        Ok(Self {
            name,
            description,
            parent: RefCell::new(None),
        })
    }

    /// The last container to claim a node becomes its parent.
    fn adopt(&self, parent: &Weak<dyn Named>) {
        self.parent.replace(Some(parent.clone()));
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.description == other.description
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("description", &self.description.text)
            .finish()
    }
}

/// A node with a name, a description and possibly a parent.
pub trait Named: HasName {
    fn entity(&self) -> &Entity;

    fn description(&self) -> &Description {
        &self.entity().description
    }

    /// Enclosing container. `None` for the root and for unowned nodes.
    fn parent(&self) -> Option<Rc<dyn Named>> {
        self.entity()
            .parent
            .borrow()
            .as_ref()
            .and_then(|parent| parent.upgrade())
    }

    /// Names from one level below the root down to this node, joined.
    fn qualified_name(&self, separator: &str) -> String {
        let mut names = vec![self.name().to_string()];
        let mut parent = self.parent();

        while let Some(node) = parent {
            let grandparent = node.parent();
            if grandparent.is_none() {
                break;
            }
            names.push(node.name().to_string());
            parent = grandparent;
        }

        names.reverse();
        names.join(separator)
    }

    /// Qualified name for C++ sources
    fn full_name_cxx(&self) -> String {
        self.qualified_name("::")
    }

    /// Qualified name for C sources
    fn full_name_c(&self) -> String {
        self.qualified_name("_")
    }
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasName for $ty {
                fn name(&self) -> &str {
                    &self.entity.name
                }
            }

            impl Named for $ty {
                fn entity(&self) -> &Entity {
                    &self.entity
                }
            }
        )*
    };
}

macro_rules! impl_kind {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Introspect for $ty {
                fn kind(&self) -> AstKind {
                    $kind
                }
            }
        )*
    };
}

/// Uniqueness and self-shadowing rules for a container's direct children.
fn check_scope<T: HasName>(owner: &str, children: &[T]) -> Result<()> {
    validate::uniq_names(children)?;
    validate::name_not_in(owner, children)
}

fn require_non_empty<T>(children: &[T], message: String) -> Result<()> {
    if children.is_empty() {
        return Err(IdlError::new(ErrorCode::E02007, message));
    }
    Ok(())
}

fn adopt_all<T: Named>(parent: &Weak<dyn Named>, children: &[Rc<T>]) {
    for child in children {
        child.entity().adopt(parent);
    }
}

/// Builtin type node
#[derive(Debug, PartialEq)]
pub struct TypeBuiltin {
    builtin: BuiltinType,
}

impl TypeBuiltin {
    pub fn new(name: &str) -> Result<Rc<Self>> {
        let builtin = validate::known_builtin_type(name)?;
        Ok(Rc::new(Self { builtin }))
    }

    pub fn builtin(&self) -> BuiltinType {
        self.builtin
    }

    pub fn full_name_cxx(&self) -> &'static str {
        self.builtin.as_str()
    }

    pub fn full_name_c(&self) -> &'static str {
        self.builtin.as_str()
    }

    /// Wider type to cast to before printing, if the type streams as a char
    pub fn print_as(&self) -> Option<&'static str> {
        self.builtin.print_as().map(|ty| ty.as_str())
    }
}

impl HasName for TypeBuiltin {
    fn name(&self) -> &str {
        self.builtin.as_str()
    }
}

/// Enum value node
#[derive(Debug, PartialEq)]
pub struct EnumValue {
    entity: Entity,
    value: Option<String>,
    alias: bool,
}

impl EnumValue {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        value: Option<String>,
        alias: bool,
    ) -> Result<Rc<Self>> {
        Ok(Rc::new(Self {
            entity: Entity::new(name, description)?,
            value,
            alias,
        }))
    }

    /// Explicit value text, if any
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// True if this value aliases another value of the same enum
    pub fn is_alias(&self) -> bool {
        self.alias
    }
}

/// Enum type node
#[derive(Debug, PartialEq)]
pub struct TypeEnum {
    entity: Entity,
    underlying_type: Rc<TypeBuiltin>,
    values: Vec<Rc<EnumValue>>,
}

impl TypeEnum {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        underlying_type: Rc<TypeBuiltin>,
        values: Vec<Rc<EnumValue>>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        require_non_empty(
            &values,
            format!("Enum {} should contain at least one value.", entity.name),
        )?;
        check_scope(&entity.name, &values)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Named> = this.clone();
            adopt_all(&parent, &values);
            Self {
                entity,
                underlying_type,
                values,
            }
        }))
    }

    pub fn keyword(&self) -> &'static str {
        "enum"
    }

    pub fn underlying_type(&self) -> &Rc<TypeBuiltin> {
        &self.underlying_type
    }

    pub fn values(&self) -> &[Rc<EnumValue>] {
        &self.values
    }
}

/// Bitmask value node
#[derive(Debug, PartialEq)]
pub struct BitmaskValue {
    entity: Entity,
    bit_number: u32,
}

impl BitmaskValue {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        bit_number: u32,
    ) -> Result<Rc<Self>> {
        Ok(Rc::new(Self {
            entity: Entity::new(name, description)?,
            bit_number,
        }))
    }

    pub fn bit_number(&self) -> u32 {
        self.bit_number
    }
}

/// Bitmask type node
#[derive(Debug, PartialEq)]
pub struct TypeBitmask {
    entity: Entity,
    underlying_type: Rc<TypeBuiltin>,
    values: Vec<Rc<BitmaskValue>>,
}

impl TypeBitmask {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        underlying_type: Rc<TypeBuiltin>,
        values: Vec<Rc<BitmaskValue>>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        require_non_empty(
            &values,
            format!("Bitmask {} should contain at least one value.", entity.name),
        )?;
        check_scope(&entity.name, &values)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Named> = this.clone();
            adopt_all(&parent, &values);
            Self {
                entity,
                underlying_type,
                values,
            }
        }))
    }

    pub fn keyword(&self) -> &'static str {
        "enum"
    }

    pub fn underlying_type(&self) -> &Rc<TypeBuiltin> {
        &self.underlying_type
    }

    pub fn values(&self) -> &[Rc<BitmaskValue>] {
        &self.values
    }
}

/// Constant node
#[derive(Debug, PartialEq)]
pub struct Constant {
    entity: Entity,
    ty: Rc<TypeBuiltin>,
    value: String,
}

impl Constant {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        ty: Rc<TypeBuiltin>,
        value: impl Into<String>,
    ) -> Result<Rc<Self>> {
        Ok(Rc::new(Self {
            entity: Entity::new(name, description)?,
            ty,
            value: value.into(),
        }))
    }

    pub fn ty(&self) -> &Rc<TypeBuiltin> {
        &self.ty
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Array type node
#[derive(Debug, PartialEq)]
pub struct TypeArray {
    element_type: Rc<TypeBuiltin>,
    array_size: String,
}

impl TypeArray {
    pub fn new(element_type: Rc<TypeBuiltin>, array_size: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            element_type,
            array_size: array_size.into(),
        })
    }

    pub fn element_type(&self) -> &Rc<TypeBuiltin> {
        &self.element_type
    }

    /// Size expression, emitted as is
    pub fn array_size(&self) -> &str {
        &self.array_size
    }
}

/// Forward type declaration node
#[derive(Debug, PartialEq)]
pub struct TypeFwdDcl {
    entity: Entity,
    keyword: String,
}

impl TypeFwdDcl {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        keyword: impl Into<String>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        let keyword = keyword.into();
        validate::known_keyword(&keyword)?;

        Ok(Rc::new(Self { entity, keyword }))
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

/// Pointer value type: a forward declaration or a full type
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    ForwardDeclaration(Rc<TypeFwdDcl>),
    Type(Type),
}

impl PointerTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            PointerTarget::ForwardDeclaration(fwd) => Some(fwd.name()),
            PointerTarget::Type(ty) => ty.name(),
        }
    }
}

/// 64-bit pointer type node
#[derive(Debug, PartialEq)]
pub struct TypePointer64 {
    value_type: PointerTarget,
    is_const: bool,
}

impl TypePointer64 {
    pub fn new(value_type: PointerTarget, is_const: bool) -> Rc<Self> {
        Rc::new(Self {
            value_type,
            is_const,
        })
    }

    pub fn value_type(&self) -> &PointerTarget {
        &self.value_type
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }
}

/// Offset pointer type node: an offset stored in `representation_type`
#[derive(Debug, PartialEq)]
pub struct TypeOffsetPointer {
    value_type: PointerTarget,
    representation_type: Rc<TypeBuiltin>,
    is_const: bool,
}

impl TypeOffsetPointer {
    pub fn new(
        value_type: PointerTarget,
        representation_type: Rc<TypeBuiltin>,
        is_const: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            value_type,
            representation_type,
            is_const,
        })
    }

    pub fn value_type(&self) -> &PointerTarget {
        &self.value_type
    }

    pub fn representation_type(&self) -> &Rc<TypeBuiltin> {
        &self.representation_type
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }
}

/// Any type a field, a command argument or a pointer can refer to
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Array(Rc<TypeArray>),
    Bitmask(Rc<TypeBitmask>),
    Builtin(Rc<TypeBuiltin>),
    Compound(Rc<TypeCompound>),
    Enum(Rc<TypeEnum>),
    OffsetPointer(Rc<TypeOffsetPointer>),
    Pointer64(Rc<TypePointer64>),
}

impl Type {
    /// Type name. `None` for anonymous types.
    pub fn name(&self) -> Option<&str> {
        match self {
            Type::Bitmask(ty) => Some(ty.name()),
            Type::Builtin(ty) => Some(ty.name()),
            Type::Compound(ty) => Some(ty.name()),
            Type::Enum(ty) => Some(ty.name()),
            Type::Array(_) | Type::OffsetPointer(_) | Type::Pointer64(_) => None,
        }
    }

    pub fn full_name_cxx(&self) -> Option<String> {
        match self {
            Type::Bitmask(ty) => Some(ty.full_name_cxx()),
            Type::Builtin(ty) => Some(ty.full_name_cxx().to_string()),
            Type::Compound(ty) => Some(ty.full_name_cxx()),
            Type::Enum(ty) => Some(ty.full_name_cxx()),
            Type::Array(_) | Type::OffsetPointer(_) | Type::Pointer64(_) => None,
        }
    }

    pub fn full_name_c(&self) -> Option<String> {
        match self {
            Type::Bitmask(ty) => Some(ty.full_name_c()),
            Type::Builtin(ty) => Some(ty.full_name_c().to_string()),
            Type::Compound(ty) => Some(ty.full_name_c()),
            Type::Enum(ty) => Some(ty.full_name_c()),
            Type::Array(_) | Type::OffsetPointer(_) | Type::Pointer64(_) => None,
        }
    }
}

/// Field metadata
#[derive(Debug, Default, PartialEq)]
pub struct FieldMeta {
    padding: bool,
}

impl FieldMeta {
    pub fn new(padding: bool) -> Rc<Self> {
        Rc::new(Self { padding })
    }

    pub fn is_padding(&self) -> bool {
        self.padding
    }
}

/// Compound type field node
#[derive(Debug, PartialEq)]
pub struct Field {
    entity: Entity,
    ty: Type,
    meta: Option<Rc<FieldMeta>>,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        ty: Type,
        meta: Option<Rc<FieldMeta>>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;

        if ty.name() == Some(entity.name.as_str()) {
            return Err(IdlError::new(
                ErrorCode::E02006,
                format!("Field name {} is the same as its type name.", entity.name),
            ));
        }

        Ok(Rc::new(Self { entity, ty, meta }))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn meta(&self) -> Option<&Rc<FieldMeta>> {
        self.meta.as_ref()
    }

    pub fn is_padding(&self) -> bool {
        self.meta.as_ref().is_some_and(|meta| meta.is_padding())
    }
}

/// Struct or union
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    Struct,
    Union,
}

impl CompoundKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CompoundKind::Struct => "struct",
            CompoundKind::Union => "union",
        }
    }
}

/// Struct or union type node
#[derive(Debug, PartialEq)]
pub struct TypeCompound {
    entity: Entity,
    kind: CompoundKind,
    items: Vec<ScopeItem>,
    fields: Vec<Rc<Field>>,
}

impl TypeCompound {
    pub fn new(
        kind: CompoundKind,
        name: impl Into<String>,
        description: Description,
        items: Vec<ScopeItem>,
        fields: Vec<Rc<Field>>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        require_non_empty(
            &fields,
            format!("{} must have at least one field.", entity.name),
        )?;
        check_scope(&entity.name, &items)?;
        check_scope(&entity.name, &fields)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Named> = this.clone();
            for item in &items {
                item.as_named().entity().adopt(&parent);
            }
            adopt_all(&parent, &fields);
            Self {
                entity,
                kind,
                items,
                fields,
            }
        }))
    }

    pub fn new_struct(
        name: impl Into<String>,
        description: Description,
        items: Vec<ScopeItem>,
        fields: Vec<Rc<Field>>,
    ) -> Result<Rc<Self>> {
        Self::new(CompoundKind::Struct, name, description, items, fields)
    }

    pub fn new_union(
        name: impl Into<String>,
        description: Description,
        items: Vec<ScopeItem>,
        fields: Vec<Rc<Field>>,
    ) -> Result<Rc<Self>> {
        Self::new(CompoundKind::Union, name, description, items, fields)
    }

    pub fn compound_kind(&self) -> CompoundKind {
        self.kind
    }

    pub fn keyword(&self) -> &'static str {
        self.kind.keyword()
    }

    /// Inner enums, bitmasks, constants and compounds
    pub fn items(&self) -> &[ScopeItem] {
        &self.items
    }

    pub fn fields(&self) -> &[Rc<Field>] {
        &self.fields
    }

    /// True if any field is of a union type
    pub fn has_union_field(&self) -> bool {
        self.fields.iter().any(|field| field.ty().is_union())
    }
}

/// Item defined in an interface or compound scope
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeItem {
    Constant(Rc<Constant>),
    Enum(Rc<TypeEnum>),
    Bitmask(Rc<TypeBitmask>),
    Compound(Rc<TypeCompound>),
}

impl ScopeItem {
    pub fn as_named(&self) -> &dyn Named {
        match self {
            ScopeItem::Constant(node) => node.as_ref(),
            ScopeItem::Enum(node) => node.as_ref(),
            ScopeItem::Bitmask(node) => node.as_ref(),
            ScopeItem::Compound(node) => node.as_ref(),
        }
    }

    pub fn to_named(&self) -> Rc<dyn Named> {
        match self {
            ScopeItem::Constant(node) => node.clone(),
            ScopeItem::Enum(node) => node.clone(),
            ScopeItem::Bitmask(node) => node.clone(),
            ScopeItem::Compound(node) => node.clone(),
        }
    }
}

impl HasName for ScopeItem {
    fn name(&self) -> &str {
        self.as_named().name()
    }
}

/// External namespace: a collection of forward declarations
#[derive(Debug, PartialEq)]
pub struct Namespace {
    entity: Entity,
    forward_declarations: Vec<Rc<TypeFwdDcl>>,
}

impl Namespace {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        forward_declarations: Vec<Rc<TypeFwdDcl>>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        check_scope(&entity.name, &forward_declarations)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Named> = this.clone();
            adopt_all(&parent, &forward_declarations);
            Self {
                entity,
                forward_declarations,
            }
        }))
    }

    pub fn forward_declarations(&self) -> &[Rc<TypeFwdDcl>] {
        &self.forward_declarations
    }
}

/// ioctl command node
#[derive(Debug, PartialEq)]
pub struct IoctlCommand {
    entity: Entity,
    number: Number,
    command_type: String,
    arg_type: Type,
}

impl IoctlCommand {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        number: Number,
        command_type: impl Into<String>,
        arg_type: Type,
    ) -> Result<Rc<Self>> {
        Ok(Rc::new(Self {
            entity: Entity::new(name, description)?,
            number,
            command_type: command_type.into(),
            arg_type,
        }))
    }

    pub fn number(&self) -> Number {
        self.number
    }

    /// Direction macro, e.g. `_IOW`
    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    pub fn arg_type(&self) -> &Type {
        &self.arg_type
    }
}

/// ioctl interface node, the AST root
#[derive(Debug, PartialEq)]
pub struct IoctlIface {
    entity: Entity,
    number: Number,
    items: Vec<ScopeItem>,
    commands: Vec<Rc<IoctlCommand>>,
    namespaces: Vec<Rc<Namespace>>,
    code: String,
}

impl IoctlIface {
    pub fn new(
        name: impl Into<String>,
        description: Description,
        number: Number,
        items: Vec<ScopeItem>,
        commands: Vec<Rc<IoctlCommand>>,
        namespaces: Vec<Rc<Namespace>>,
        code: impl Into<String>,
    ) -> Result<Rc<Self>> {
        let entity = Entity::new(name, description)?;
        check_scope(&entity.name, &items)?;
        check_scope(&entity.name, &commands)?;
        check_scope(&entity.name, &namespaces)?;

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let parent: Weak<dyn Named> = this.clone();
            for item in &items {
                item.as_named().entity().adopt(&parent);
            }
            adopt_all(&parent, &commands);
            adopt_all(&parent, &namespaces);
            Self {
                entity,
                number,
                items,
                commands,
                namespaces,
                code: code.into(),
            }
        }))
    }

    pub fn number(&self) -> Number {
        self.number
    }

    pub fn items(&self) -> &[ScopeItem] {
        &self.items
    }

    pub fn commands(&self) -> &[Rc<IoctlCommand>] {
        &self.commands
    }

    pub fn namespaces(&self) -> &[Rc<Namespace>] {
        &self.namespaces
    }

    /// Verbatim code blob copied into the generated sources
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Every named node below the root, depth first.
    pub fn named_entities(&self) -> Vec<Rc<dyn Named>> {
        let mut result = Vec::new();

        for item in &self.items {
            collect_scope_item(item, &mut result);
        }
        for command in &self.commands {
            result.push(command.clone() as Rc<dyn Named>);
        }
        for namespace in &self.namespaces {
            result.push(namespace.clone() as Rc<dyn Named>);
            for fwd in namespace.forward_declarations() {
                result.push(fwd.clone() as Rc<dyn Named>);
            }
        }

        result
    }
}

fn collect_scope_item(item: &ScopeItem, out: &mut Vec<Rc<dyn Named>>) {
    out.push(item.to_named());

    match item {
        ScopeItem::Constant(_) => {}
        ScopeItem::Enum(node) => {
            out.extend(node.values().iter().map(|v| v.clone() as Rc<dyn Named>));
        }
        ScopeItem::Bitmask(node) => {
            out.extend(node.values().iter().map(|v| v.clone() as Rc<dyn Named>));
        }
        ScopeItem::Compound(node) => {
            for inner in node.items() {
                collect_scope_item(inner, out);
            }
            out.extend(node.fields().iter().map(|f| f.clone() as Rc<dyn Named>));
        }
    }
}

impl_named!(
    EnumValue,
    TypeEnum,
    BitmaskValue,
    TypeBitmask,
    Constant,
    TypeFwdDcl,
    Field,
    TypeCompound,
    Namespace,
    IoctlCommand,
    IoctlIface,
);

impl_kind!(
    TypeBuiltin => AstKind::Builtin,
    EnumValue => AstKind::EnumValue,
    TypeEnum => AstKind::Enum,
    BitmaskValue => AstKind::BitmaskValue,
    TypeBitmask => AstKind::Bitmask,
    Constant => AstKind::Constant,
    TypeArray => AstKind::Array,
    FieldMeta => AstKind::FieldMeta,
    Field => AstKind::Field,
    TypeFwdDcl => AstKind::ForwardDeclaration,
    TypePointer64 => AstKind::Pointer64,
    TypeOffsetPointer => AstKind::OffsetPointer,
    Namespace => AstKind::Namespace,
    IoctlCommand => AstKind::IoctlCommand,
    IoctlIface => AstKind::IoctlIface,
);

impl Introspect for TypeCompound {
    fn kind(&self) -> AstKind {
        match self.kind {
            CompoundKind::Struct => AstKind::Struct,
            CompoundKind::Union => AstKind::Union,
        }
    }
}

impl Introspect for Type {
    fn kind(&self) -> AstKind {
        match self {
            Type::Array(node) => node.kind(),
            Type::Bitmask(node) => node.kind(),
            Type::Builtin(node) => node.kind(),
            Type::Compound(node) => node.kind(),
            Type::Enum(node) => node.kind(),
            Type::OffsetPointer(node) => node.kind(),
            Type::Pointer64(node) => node.kind(),
        }
    }
}

impl Introspect for ScopeItem {
    fn kind(&self) -> AstKind {
        match self {
            ScopeItem::Constant(node) => node.kind(),
            ScopeItem::Enum(node) => node.kind(),
            ScopeItem::Bitmask(node) => node.kind(),
            ScopeItem::Compound(node) => node.kind(),
        }
    }
}

impl Introspect for PointerTarget {
    fn kind(&self) -> AstKind {
        match self {
            PointerTarget::ForwardDeclaration(node) => node.kind(),
            PointerTarget::Type(ty) => ty.kind(),
        }
    }
}

/// Any value a loader record can produce for this AST
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Description(Description),
    Number(Number),
    Builtin(Rc<TypeBuiltin>),
    EnumValue(Rc<EnumValue>),
    Enum(Rc<TypeEnum>),
    BitmaskValue(Rc<BitmaskValue>),
    Bitmask(Rc<TypeBitmask>),
    Constant(Rc<Constant>),
    Array(Rc<TypeArray>),
    FieldMeta(Rc<FieldMeta>),
    Field(Rc<Field>),
    Compound(Rc<TypeCompound>),
    ForwardDeclaration(Rc<TypeFwdDcl>),
    Pointer64(Rc<TypePointer64>),
    OffsetPointer(Rc<TypeOffsetPointer>),
    Namespace(Rc<Namespace>),
    IoctlCommand(Rc<IoctlCommand>),
    IoctlIface(Rc<IoctlIface>),
}

impl AstNode {
    /// Record name of the node's runtime type
    pub fn type_name(&self) -> &'static str {
        let kind = match self {
            AstNode::Description(_) => return "Description",
            AstNode::Number(_) => return "Number",
            AstNode::Builtin(node) => node.kind(),
            AstNode::EnumValue(node) => node.kind(),
            AstNode::Enum(node) => node.kind(),
            AstNode::BitmaskValue(node) => node.kind(),
            AstNode::Bitmask(node) => node.kind(),
            AstNode::Constant(node) => node.kind(),
            AstNode::Array(node) => node.kind(),
            AstNode::FieldMeta(node) => node.kind(),
            AstNode::Field(node) => node.kind(),
            AstNode::Compound(node) => node.kind(),
            AstNode::ForwardDeclaration(node) => node.kind(),
            AstNode::Pointer64(node) => node.kind(),
            AstNode::OffsetPointer(node) => node.kind(),
            AstNode::Namespace(node) => node.kind(),
            AstNode::IoctlCommand(node) => node.kind(),
            AstNode::IoctlIface(node) => node.kind(),
        };
        kind.record_name()
    }
}
