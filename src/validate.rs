//! Naming rules shared by all AST constructors

use std::collections::HashMap;
use std::rc::Rc;

use unicode_xid::UnicodeXID;

use crate::error::{ErrorCode, IdlError, Result};
use crate::types::BuiltinType;

/// Anything that carries a name.
pub trait HasName {
    fn name(&self) -> &str;
}

impl<T: HasName + ?Sized> HasName for Rc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

fn is_ident_start(ch: char) -> bool {
    UnicodeXID::is_xid_start(ch) || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    UnicodeXID::is_xid_continue(ch) || ch == '_'
}

/// Check that `name` is a valid identifier.
pub fn identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => is_ident_start(first) && chars.all(is_ident_continue),
        None => false,
    };

    if !valid {
        return Err(IdlError::new(
            ErrorCode::E02001,
            format!("'{}' is not a valid identifier.", name),
        ));
    }
    Ok(())
}

/// Check that `name` is one of the builtin integer types.
pub fn known_builtin_type(name: &str) -> Result<BuiltinType> {
    BuiltinType::from_str(name).ok_or_else(|| {
        IdlError::new(
            ErrorCode::E02002,
            format!("'{}' is not a valid built-in type.", name),
        )
    })
}

/// Check that `name` does not collide with a builtin integer type.
pub fn not_known_builtin_type(name: &str) -> Result<()> {
    if BuiltinType::from_str(name).is_some() {
        return Err(IdlError::new(
            ErrorCode::E02003,
            format!("'{}' is reserved for a built-in type.", name),
        ));
    }
    Ok(())
}

/// Check that `keyword` is `struct`, `union` or `enum`.
pub fn known_keyword(keyword: &str) -> Result<()> {
    match keyword {
        "struct" | "union" | "enum" => Ok(()),
        _ => Err(IdlError::new(
            ErrorCode::E02004,
            format!("Keyword '{}' is not known.", keyword),
        )),
    }
}

/// Check that all names in a collection are unique.
pub fn uniq_names<'a, T, I>(items: I) -> Result<()>
where
    T: HasName + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut name2idx: HashMap<&str, usize> = HashMap::new();

    for (idx, item) in items.into_iter().enumerate() {
        let name = item.name();
        if let Some(prev_idx) = name2idx.insert(name, idx) {
            return Err(IdlError::new(
                ErrorCode::E02005,
                format!(
                    "Two entries with the same name '{}': {} and {}.",
                    name, prev_idx, idx
                ),
            ));
        }
    }
    Ok(())
}

/// Check that no item of a collection is called `name`.
pub fn name_not_in<'a, T, I>(name: &str, items: I) -> Result<()>
where
    T: HasName + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if items.into_iter().any(|item| item.name() == name) {
        return Err(IdlError::new(
            ErrorCode::E02006,
            format!(
                "Inner types and fields must differ from the type name '{}'.",
                name
            ),
        ));
    }
    Ok(())
}
