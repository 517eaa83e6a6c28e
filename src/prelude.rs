//! # dotweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotweave library. Import this module to get quick access to the essential
//! types for building, planning and weaving modules.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotweave operations
pub use crate::Error;

/// The result type used throughout dotweave
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The weaver, its configuration and the statistics of a run
pub use crate::{WeaveSummary, Weaver, WeaverConfig};

/// Injection planning
pub use crate::weaver::{
    DeclarationLevel, InjectionEnumerator, InjectionPlan, InjectionPoint, TargetKind,
};

// ================================================================================================
// Annotation Surface
// ================================================================================================

/// Values of the annotation enums
pub use crate::weaver::{AccessModifiers, AdviceArgumentSource, InjectionPoints, InjectionTargets};

/// Decoded custom attributes
pub use crate::metadata::customattributes::{CustomAttribute, CustomAttributeArgument};

// ================================================================================================
// Metadata Model
// ================================================================================================

/// The module arena and its identifiers
pub use crate::metadata::{FieldId, MethodId, Module, TypeId};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Types and members
pub use crate::metadata::{
    method::{
        ExceptionHandler, ExceptionHandlerFlags, ExternalMethod, Method, MethodAccess,
        MethodBody, MethodModifiers, MethodRef, MethodSemantics, Param,
    },
    typedef::{Event, Field, FieldAttributes, Property, TypeAttributes, TypeDef},
};

/// Type signatures
pub use crate::metadata::signatures::TypeSignature;

// ================================================================================================
// Code Generation
// ================================================================================================

/// CIL instructions
pub use crate::assembly::{FlowType, InstrId, Instruction, OpCode, Operand};

/// Fluent instruction emission
pub use crate::assembly::InstructionAssembler;

/// Fluent builders for module content
pub use crate::builders::{ClassBuilder, EventBuilder, MethodBuilder, PropertyBuilder};
