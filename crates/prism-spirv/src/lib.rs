//! A safe, zero-copy parser and in-place patcher for SPIR-V modules.
//!
//! This crate is intended for inspecting **untrusted** shader IR (e.g. output
//! of an external frontend) without panicking or reading out of bounds.
//!
//! It provides:
//!
//! - A bounds-checked container parser ([`SpirvModule`]) that validates the
//!   header and the instruction stream up front.
//! - A single-pass reflection scan ([`ModuleInfo`]) collecting names, types,
//!   variables, entry points, and decorations. Decoration records carry the
//!   **word offset** of their literal operand so binding numbers can be
//!   rewritten in place later.
//! - An owned word buffer ([`SpirvPatcher`]) with bounds-checked writes for
//!   applying those rewrites.
//!
//! Higher-level classification of bindings (uniform buffer vs. storage image
//! vs. sampler, slot assignment, header generation) lives in `prism-shader`;
//! this crate only deals in raw SPIR-V structure.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod inspect;
mod module;
mod patch;

/// Raw SPIR-V enumerant values used by the reflection scan.
pub mod spv;

/// Helpers for building synthetic SPIR-V modules in tests.
///
/// This module is only available when compiling this crate's own tests, or
/// when the `test-utils` feature is enabled. It is **not** considered part of
/// the stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::error::SpirvError;
pub use crate::inspect::{
    DecorationRecord, EntryPointRecord, ModuleInfo, TypeRecord, VariableRecord,
};
pub use crate::module::{SpirvHeader, SpirvInstruction, SpirvModule, SPIRV_MAGIC};
pub use crate::patch::SpirvPatcher;
pub use crate::spv::{Dim, StorageClass};
