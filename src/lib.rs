// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotweave
//!
//! A compile-time aspect weaver for .NET modules. Built in pure Rust, `dotweave` reads the
//! aspect annotations of a decoded module, works out which advice has to run where, and
//! rewrites the CIL bodies of the targeted methods so that the advice runs before them, after
//! them, or around them.
//!
//! ## Features
//!
//! - **Declarative aspects** - Aspects are referenced from classes, methods, properties and
//!   events through custom attributes; advices are marked on the aspect type
//! - **Three injection points** - Before (with an optional abort flag), after every return
//!   path, and around through a chain of wrapper methods that keeps the target's identity
//! - **Argument binding** - Advices receive the instance, the target name, the boxed
//!   arguments, an abort flag or the wrapped target itself, validated up front
//! - **Deterministic** - Planning is parallel, yet the resulting order of injections is total
//!   and independent of scheduling
//! - **All-or-nothing** - A failing weave leaves the caller's module untouched
//!
//! ## Quick Start
//!
//! ```rust
//! use dotweave::prelude::*;
//!
//! let config = WeaverConfig::default();
//! let mut module = Module::new("App.dll");
//!
//! ClassBuilder::new("Audit")
//!     .namespace("App")
//!     .method(
//!         MethodBuilder::new("OnEnter")
//!             .public()
//!             .static_method()
//!             .attribute(config.advice_annotation(InjectionPoints::BEFORE, InjectionTargets::METHOD))
//!             .parameter_with(
//!                 "name",
//!                 TypeSignature::String,
//!                 config.argument_annotation(AdviceArgumentSource::TargetName),
//!             )
//!             .implementation(|asm| {
//!                 asm.ret()?;
//!                 Ok(())
//!             }),
//!     )
//!     .build(&mut module)?;
//!
//! ClassBuilder::new("Service")
//!     .namespace("App")
//!     .attribute(config.aspect_annotation("App.Audit"))
//!     .method(
//!         MethodBuilder::new("Run")
//!             .public()
//!             .implementation(|asm| {
//!                 asm.ret()?;
//!                 Ok(())
//!             }),
//!     )
//!     .build(&mut module)?;
//!
//! let summary = Weaver::new(config).weave(&mut module)?;
//! assert_eq!(summary.before, 1);
//! # Ok::<(), dotweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The in-memory module graph: types, methods, fields, signatures, custom
//!   attributes and mutable method bodies
//! - [`assembly`] - CIL instructions and the [`assembly::InstructionAssembler`]
//! - [`builders`] - Fluent construction of types and members
//! - [`weaver`] - Declarations, discovery, ordering and the weave processes
//! - [`config`] - The [`WeaverConfig`] of a run
//!
//! Reading and writing PE files is out of scope: an external loader produces the
//! [`metadata::Module`] and an external writer serializes it after weaving.
//!
//! ## Standards Compliance
//!
//! Instruction semantics, method attributes and exception handling clauses follow the
//! **ECMA-335 specification** (6th edition).
//!
//! ### References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotweave::prelude::*;
///
/// let mut module = Module::new("App.dll");
/// let summary = Weaver::default().weave(&mut module)?;
/// assert_eq!(summary.plans, 0);
/// # Ok::<(), dotweave::Error>(())
/// ```
pub mod prelude;

/// CIL instructions and the instruction assembler.
///
/// Instructions refer to each other through body-unique [`assembly::InstrId`]s rather than
/// byte offsets, which keeps branches and exception regions intact while code is spliced in.
///
/// # Key Types
///
/// - [`assembly::Instruction`] - One instruction: id, opcode, operand
/// - [`assembly::OpCode`] - The CIL opcodes the weaver emits or has to understand
/// - [`assembly::InstructionAssembler`] - Fluent emission with labels and protected regions
pub mod assembly;

/// Fluent builders for types, methods, properties and events.
pub mod builders;

/// Configuration of a weaving run.
pub mod config;

/// The metadata graph of one module.
///
/// # Key Components
///
/// - [`metadata::Module`] - Arena of types, methods and fields
/// - [`metadata::method`] - Methods, parameters, method references and bodies
/// - [`metadata::typedef`] - Types, fields, properties and events
/// - [`metadata::signatures`] - Type signatures
/// - [`metadata::customattributes`] - Decoded custom attributes
/// - [`metadata::token`] - Metadata tokens
pub mod metadata;

/// Aspect discovery, injection planning and body rewriting.
///
/// The entry point is [`Weaver`]; [`Weaver::plan`] runs discovery alone.
pub mod weaver;

/// `dotweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotweave` Error type
///
/// Every variant is fatal for the run it occurs in; see [`Error`] for the categories.
pub use error::Error;

/// Configuration of a weaving run.
pub use config::WeaverConfig;

/// The weaver and the statistics of a run.
pub use weaver::{WeaveSummary, Weaver};
