//! # ioctl-idlc
//!
//! Interface definition front end for Linux ioctl APIs
//!
//! An ioctl interface is described as a tagged YAML document, in block or
//! flow style:
//! builtin types, enums, bitmasks, constants, structs and unions, and the
//! commands that pass them. This crate reads such a document into a typed,
//! validated AST in which every named node knows its enclosing scope.
//!
//! ## Example
//!
//! ```rust
//! use ioctl_idlc::{load_str, HasName};
//!
//! let text = r#"
//!     !ioctl-iface {
//!         name: demo, description: Demo device., number: 0x42,
//!         items: [
//!             &req !struct {
//!                 name: request, description: Request block.,
//!                 fields: [{name: size, description: Size in bytes., type: !builtin uint32_t}],
//!             },
//!         ],
//!         commands: [
//!             {name: submit, description: Submit a request., number: 1,
//!              command_type: _IOW, arg_type: *req},
//!         ],
//!     }
//! "#;
//!
//! let iface = load_str(text).unwrap();
//! assert_eq!(iface.name(), "demo");
//! assert_eq!(iface.commands()[0].arg_type().name(), Some("request"));
//! ```

pub mod ast;
pub mod description;
pub mod document;
pub mod error;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validate;

pub use ast::{
    AstKind, AstNode, HasName, Introspect, IoctlCommand, IoctlIface, Named, ScopeItem, Type,
};
pub use description::Description;
pub use document::{Document, NodeId};
pub use error::{ErrorCode, ErrorKind, IdlError, Result, SourceLocation};
pub use schema::{FromValue, Schema, Value};
pub use types::{BuiltinType, Number};

use std::rc::Rc;

use loader::Loader;

/// Load an ioctl interface from its text form
///
/// # Parameters
///
/// * `text` - Interface document, rooted at an `!ioctl-iface` node
///
/// # Returns
///
/// The interface AST root
pub fn load_str(text: &str) -> Result<Rc<IoctlIface>> {
    let doc = parser::parse(text)?;
    load_document(&doc)
}

/// Load an ioctl interface from an already parsed document
pub fn load_document(doc: &Document) -> Result<Rc<IoctlIface>> {
    let schema = registry::ast_schema()?;
    load_iface(&schema, doc)
}

/// Load an ioctl interface with a prepared schema.
///
/// Reuse one schema from [`registry::ast_schema`] across many documents.
pub fn load_iface(schema: &Schema, doc: &Document) -> Result<Rc<IoctlIface>> {
    let value = Loader::new(schema, doc).load()?;
    Rc::<IoctlIface>::from_value(value)
}

/// Load the root of `doc` with a prepared schema, whatever node it holds.
pub fn load_node(schema: &Schema, doc: &Document) -> Result<AstNode> {
    let value = Loader::new(schema, doc).load()?;
    AstNode::from_value(value)
}
