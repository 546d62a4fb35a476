//! Platform binding models.
//!
//! Everything platform-specific about resource numbering funnels through the
//! [`BindingModel`] trait: slot pool widths, descriptor-set usage, combined
//! texture/sampler behavior, and the mapping from a (kind, slot) pair to the
//! binding number written into the IR. The patcher itself is
//! platform-agnostic and simply delegates.

use std::fmt;

use crate::limits::{MAX_BUFFER_SLOTS, MAX_SAMPLER_SLOTS, MAX_TEXTURE_SLOTS};
use crate::reflect::BindingKind;
use crate::slots::SlotSpace;
use crate::stage::ShaderStage;

/// The slot space a binding kind allocates from.
pub const fn slot_space(kind: BindingKind) -> SlotSpace {
    match kind {
        BindingKind::UniformBuffer
        | BindingKind::StorageBuffer
        | BindingKind::PackedGlobalArray => SlotSpace::Buffers,
        BindingKind::SampledTexture
        | BindingKind::StorageTexture
        | BindingKind::UniformTexelBuffer
        | BindingKind::StorageTexelBuffer
        | BindingKind::InputAttachment => SlotSpace::Textures,
        BindingKind::Sampler => SlotSpace::Samplers,
    }
}

/// A target's resource binding model.
pub trait BindingModel: fmt::Debug {
    /// Short platform name (used in diagnostics and cache keys).
    fn name(&self) -> &'static str;

    /// Slot pool width for `space` on this target.
    fn slot_width(&self, space: SlotSpace) -> u32;

    /// Whether bindings carry a descriptor-set number to rewrite.
    fn uses_descriptor_sets(&self) -> bool {
        false
    }

    /// The descriptor set a stage's resources live in, when sets are used.
    fn descriptor_set_for(&self, stage: ShaderStage) -> Option<u32> {
        let _ = stage;
        None
    }

    /// Whether texture+sampler pairs share one binding (the paired sampler
    /// state consumes no slot of its own).
    fn combined_samplers(&self) -> bool {
        false
    }

    /// Whether resources are grouped behind indirect argument buffers.
    fn argument_buffers(&self) -> bool {
        false
    }

    /// Maps an assigned slot to the binding number written into the IR.
    fn binding_number(&self, kind: BindingKind, slot: u32) -> u32;
}

/// Base binding number for buffer slots inside a Vulkan descriptor set.
pub const VULKAN_BINDING_BASE_BUFFER: u32 = 0;
/// Base binding number for texture slots inside a Vulkan descriptor set.
pub const VULKAN_BINDING_BASE_TEXTURE: u32 = VULKAN_BINDING_BASE_BUFFER + MAX_BUFFER_SLOTS;
/// Base binding number for sampler slots inside a Vulkan descriptor set.
pub const VULKAN_BINDING_BASE_SAMPLER: u32 = VULKAN_BINDING_BASE_TEXTURE + MAX_TEXTURE_SLOTS;

/// Vulkan: one descriptor set per stage, with the three slot spaces mapped
/// into disjoint binding ranges inside the set so kinds never collide:
///
/// - buffers: `[0, 32)`
/// - textures: `[32, 96)`
/// - samplers: `[96, 112)`
#[derive(Debug, Clone, Copy, Default)]
pub struct VulkanBindingModel;

impl BindingModel for VulkanBindingModel {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn slot_width(&self, space: SlotSpace) -> u32 {
        space.width()
    }

    fn uses_descriptor_sets(&self) -> bool {
        true
    }

    fn descriptor_set_for(&self, stage: ShaderStage) -> Option<u32> {
        Some(stage.as_descriptor_set_index())
    }

    fn binding_number(&self, kind: BindingKind, slot: u32) -> u32 {
        match slot_space(kind) {
            SlotSpace::Buffers => VULKAN_BINDING_BASE_BUFFER + slot,
            SlotSpace::Textures => VULKAN_BINDING_BASE_TEXTURE + slot,
            SlotSpace::Samplers => VULKAN_BINDING_BASE_SAMPLER + slot,
        }
    }
}

/// Metal: flat per-kind index spaces (`buffer(n)`, `texture(n)`,
/// `sampler(n)`), optionally grouped behind indirect argument buffers. With
/// argument buffers on, member index 0 of each buffer is reserved for the
/// implicit buffer-size side table, so every real resource lands at
/// `slot + 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetalBindingModel {
    /// Group resources behind indirect argument buffers.
    pub argument_buffers: bool,
}

impl BindingModel for MetalBindingModel {
    fn name(&self) -> &'static str {
        "metal"
    }

    fn slot_width(&self, space: SlotSpace) -> u32 {
        // Metal exposes 31 usable buffer entries per stage; the last index
        // is reserved by the runtime for vertex stream emulation.
        match space {
            SlotSpace::Buffers => MAX_BUFFER_SLOTS - 1,
            SlotSpace::Textures => MAX_TEXTURE_SLOTS,
            SlotSpace::Samplers => MAX_SAMPLER_SLOTS,
        }
    }

    fn combined_samplers(&self) -> bool {
        true
    }

    fn argument_buffers(&self) -> bool {
        self.argument_buffers
    }

    fn binding_number(&self, _kind: BindingKind, slot: u32) -> u32 {
        if self.argument_buffers {
            slot + 1
        } else {
            slot
        }
    }
}

/// OpenGL: combined texture units, flat uniform-block and image bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlBindingModel;

impl BindingModel for GlBindingModel {
    fn name(&self) -> &'static str {
        "glsl"
    }

    fn slot_width(&self, space: SlotSpace) -> u32 {
        match space {
            // GL guarantees fewer block bindings per stage than Vulkan.
            SlotSpace::Buffers => 16,
            SlotSpace::Textures => 32,
            SlotSpace::Samplers => MAX_SAMPLER_SLOTS,
        }
    }

    fn combined_samplers(&self) -> bool {
        true
    }

    fn binding_number(&self, _kind: BindingKind, slot: u32) -> u32 {
        slot
    }
}

/// The platform half of a compile target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    /// SPIR-V consumed by Vulkan.
    Vulkan,
    /// Metal shading language output.
    Metal {
        /// Tier-2 argument buffer grouping.
        argument_buffers: bool,
    },
    /// GLSL output.
    OpenGl,
}

impl TargetPlatform {
    /// Builds this platform's binding model.
    pub fn model(&self) -> Box<dyn BindingModel> {
        match self {
            TargetPlatform::Vulkan => Box::new(VulkanBindingModel),
            TargetPlatform::Metal { argument_buffers } => Box::new(MetalBindingModel {
                argument_buffers: *argument_buffers,
            }),
            TargetPlatform::OpenGl => Box::new(GlBindingModel),
        }
    }

    /// Stable format name (participates in cache keys).
    pub fn format_name(&self) -> &'static str {
        match self {
            TargetPlatform::Vulkan => "vulkan",
            TargetPlatform::Metal { .. } => "metal",
            TargetPlatform::OpenGl => "glsl",
        }
    }
}

/// One shader stage on one platform: the unit of compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    /// The stage being compiled.
    pub stage: ShaderStage,
    /// The platform binding model to produce.
    pub platform: TargetPlatform,
}
