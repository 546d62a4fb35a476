//! Shader binding reflection, slot allocation, IR patching, and header
//! generation.
//!
//! This crate is the stage between an external shader frontend and a
//! platform runtime. It consumes compiled IR (binary SPIR-V via
//! [`prism-spirv`](prism_spirv), or an annotated text module), reflects the
//! module's resources, assigns stable binding slots under each platform's
//! binding model, patches the IR in place, and emits the serializable
//! [`ShaderHeader`] the runtime consults to bind resources.
//!
//! The pipeline per stage compile:
//!
//! 1. [`reflect`] / [`annotated`] - enumerate bindings and interface
//!    variables, resolve resource-table roles, derive locations.
//! 2. [`allocator`] - assign slots from bounded pools, UAVs first.
//! 3. [`patch`] - rewrite binding/set/location literals through the
//!    target's [`BindingModel`].
//! 4. [`header`] - assemble and serialize the header (plus the
//!    human-readable annotation block).
//!
//! Jobs are independent and share no mutable state; the only shared piece
//! is the optional [`ResultsCache`] keyed by content hashes.

pub mod allocator;
pub mod annotated;
pub mod binding_model;
pub mod cache;
pub mod compile;
pub mod env;
pub mod error;
pub mod header;
pub mod limits;
pub mod packed;
pub mod patch;
pub mod reflect;
pub mod slots;
pub mod stage;

pub use crate::allocator::BindingAllocator;
pub use crate::binding_model::{
    BindingModel, GlBindingModel, MetalBindingModel, TargetDescriptor, TargetPlatform,
    VulkanBindingModel,
};
pub use crate::cache::{compute_cache_key, CacheKey, CacheKeyInputs, ResultsCache};
pub use crate::compile::{
    compile_stage, CompileFailure, CompileInput, CompilePhase, CompiledShader,
};
pub use crate::env::{
    CompilerEnvironment, CompilerFlags, ResourceTableEntry, ResourceTableEntryKind,
    ResourceTableIndex,
};
pub use crate::error::{CompilerError, ShaderCompileError};
pub use crate::header::{ShaderHeader, UniformBufferInfo};
pub use crate::reflect::{
    BindingKind, InterfaceVariable, ModuleReflection, ResourceBinding, ResourceRole,
};
pub use crate::stage::ShaderStage;
