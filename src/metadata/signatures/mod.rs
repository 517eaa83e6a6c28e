//! Type signatures of parameters, return values, locals and fields.
//!
//! The weaver works on already-decoded signatures; there is no blob encoding here. The
//! [`TypeSignature`] enum mirrors the ECMA-335 element types the weaver has to reason about
//! when it marshals values through `object` and `object[]`:
//!
//! - value types and generic parameters are boxed / unboxed ([`TypeSignature::needs_boxing`])
//! - managed references are dereferenced and written back ([`TypeSignature::is_by_reference`])
//! - everything else is cast with `castclass`, except `object` itself
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 23.2 - Blobs and Signatures

mod types;

pub use types::{TypeSignature, FUNC_2};
