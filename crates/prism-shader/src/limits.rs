//! Centralized binding-slot limits.
//!
//! These bound the per-stage slot pools the allocator hands out. They are
//! deliberately the *narrowest* limits across the supported binding models so
//! a shader that compiles here binds correctly everywhere.

/// Buffer binding slots per stage (uniform buffers, storage buffers, and the
/// bounds-checking side table all draw from this pool).
pub const MAX_BUFFER_SLOTS: u32 = 32;

/// Texture binding slots per stage (sampled images, texel buffers, storage
/// images, input attachments).
pub const MAX_TEXTURE_SLOTS: u32 = 64;

/// Sampler-state slots per stage. Exceeding this is a hard compile failure,
/// not a truncation.
pub const MAX_SAMPLER_SLOTS: u32 = 16;

/// UAV slots per stage, matching D3D11's `u0..u7` register range that the
/// UAV-first numbering scheme replicates.
pub const MAX_UAV_SLOTS: u32 = 8;

/// Interface variable locations per stage (32-bit occupancy mask).
pub const MAX_INTERFACE_LOCATIONS: u32 = 32;
