//! Fluent builders for module content.
//!
//! The builders create types and members directly in a [`crate::metadata::Module`]. They are
//! the way hosts, tests and benchmarks put together modules to weave without going through an
//! external loader, and they follow the same rules the weaver relies on: method tokens in
//! declaration order, accessors flagged with their [`crate::metadata::method::MethodSemantics`]
//! role, bodies assembled with [`crate::assembly::InstructionAssembler`].
//!
//! # Key Components
//!
//! - [`ClassBuilder`] - A type with fields, methods, properties and events
//! - [`MethodBuilder`] - A method signature, flags, attributes and body
//! - [`PropertyBuilder`] / [`EventBuilder`] - Accessor pairs

mod class;
mod method;
mod property;

pub use class::ClassBuilder;
pub use method::MethodBuilder;
pub use property::{EventBuilder, PropertyBuilder};
