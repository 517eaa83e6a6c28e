//! Metadata model of the module being woven.
//!
//! This is a read-mostly view of a compiled unit: types, their members, custom attributes and
//! signatures, plus the mutable method bodies. It is produced by an external loader (or by
//! [`crate::builders`]) and handed back, rewritten, to an external writer.
//!
//! # Key Components
//!
//! - [`module::Module`] - The arena owning every type, method and field
//! - [`typedef::TypeDef`] - Types with their properties and events
//! - [`method::Method`] / [`method::MethodBody`] - Methods and their instruction streams
//! - [`customattributes::CustomAttribute`] - Decoded custom attribute data
//! - [`signatures::TypeSignature`] - Decoded type signatures
//! - [`token::Token`] - Metadata tokens

pub mod customattributes;
pub mod method;
pub mod module;
pub mod signatures;
pub mod token;
pub mod typedef;

pub use module::{FieldId, MethodId, Module, TypeId};
