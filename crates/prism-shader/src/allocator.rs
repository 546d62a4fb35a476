//! Binding slot allocation.
//!
//! Slots are assigned in the reflection's group order: UAVs first (so they
//! take the low slots, replicating D3D-style numbering), then SRV buffers
//! and textures, then uniform buffers, then samplers. UAV allocation
//! reserves its slot index in *both* the buffer and texture pools, a
//! conservative cross-space reservation that keeps UAV numbering compatible
//! with D3D11 slot semantics; texel-buffer UAVs rely on this double claim to
//! pair an auxiliary buffer with the texel view for atomic emulation.

use tracing::debug;

use crate::binding_model::{slot_space, BindingModel};
use crate::error::ShaderCompileError;
use crate::limits::MAX_UAV_SLOTS;
use crate::reflect::{BindingKind, ResourceBinding, ResourceRole};
use crate::slots::{SlotPool, SlotSpace};

/// Per-job slot pools plus the assignment pass over a reflection's bindings.
#[derive(Debug, Clone)]
pub struct BindingAllocator {
    buffers: SlotPool,
    textures: SlotPool,
    samplers: SlotPool,
}

impl BindingAllocator {
    /// Creates pools sized for `model`.
    pub fn new(model: &dyn BindingModel) -> Self {
        Self {
            buffers: SlotPool::with_width(
                SlotSpace::Buffers,
                model.slot_width(SlotSpace::Buffers),
            ),
            textures: SlotPool::with_width(
                SlotSpace::Textures,
                model.slot_width(SlotSpace::Textures),
            ),
            samplers: SlotPool::with_width(
                SlotSpace::Samplers,
                model.slot_width(SlotSpace::Samplers),
            ),
        }
    }

    /// Assigns a slot to every binding, in order.
    ///
    /// `bindings` must already be in group order (the reflector guarantees
    /// it); the sampler-limit check runs up front so the error reports the
    /// full requested count rather than the first slot that failed.
    pub fn allocate(
        &mut self,
        bindings: &mut [ResourceBinding],
        model: &dyn BindingModel,
    ) -> Result<(), ShaderCompileError> {
        self.check_sampler_budget(bindings, model)?;

        for index in 0..bindings.len() {
            let slot = if bindings[index].is_uav() {
                self.assign_uav(&bindings[index])?
            } else {
                match (bindings[index].kind, model.combined_samplers()) {
                    (BindingKind::Sampler, true) => {
                        match combined_alias_target(&bindings[index]) {
                            Some(texture) => self.alias_slot(bindings, index, texture),
                            None => self.assign(&bindings[index])?,
                        }
                    }
                    _ => self.assign(&bindings[index])?,
                }
            };
            debug!(
                name = %bindings[index].name,
                kind = %bindings[index].kind,
                slot,
                "assigned binding slot"
            );
            bindings[index].assigned_slot = Some(slot);
        }
        Ok(())
    }

    fn check_sampler_budget(
        &self,
        bindings: &[ResourceBinding],
        model: &dyn BindingModel,
    ) -> Result<(), ShaderCompileError> {
        let combined = model.combined_samplers();
        let requested = bindings
            .iter()
            .filter(|b| b.kind == BindingKind::Sampler)
            .filter(|b| !(combined && combined_alias_target(b).is_some()))
            .count() as u32;
        let limit = model.slot_width(SlotSpace::Samplers);
        if requested > limit {
            return Err(ShaderCompileError::SamplerLimitExceeded { requested, limit });
        }
        Ok(())
    }

    /// UAVs take the lowest index free in both the buffer and texture pools
    /// and claim it in both.
    fn assign_uav(&mut self, binding: &ResourceBinding) -> Result<u32, ShaderCompileError> {
        let both = self.buffers.free_mask() & self.textures.free_mask();
        let slot = if both == 0 {
            None
        } else {
            Some(both.trailing_zeros())
        };
        let slot = slot
            .filter(|&s| s < MAX_UAV_SLOTS)
            .ok_or_else(|| ShaderCompileError::SlotsExhausted {
                name: binding.name.clone(),
                kind: binding.kind,
                space: slot_space(binding.kind),
                limit: MAX_UAV_SLOTS,
            })?;
        let claimed_buffer = self.buffers.claim(slot);
        let claimed_texture = self.textures.claim(slot);
        debug_assert!(claimed_buffer && claimed_texture, "UAV slot {slot} double-claim failed");
        Ok(slot)
    }

    fn assign(&mut self, binding: &ResourceBinding) -> Result<u32, ShaderCompileError> {
        let space = slot_space(binding.kind);
        let pool = self.pool_mut(space);
        let limit = pool.width();
        pool.allocate()
            .ok_or_else(|| ShaderCompileError::SlotsExhausted {
                name: binding.name.clone(),
                kind: binding.kind,
                space,
                limit,
            })
    }

    /// Resolves a combined sampler state to its paired texture's slot.
    ///
    /// The pairing was recorded during reflection, and textures allocate
    /// before samplers, so a missing or unassigned texture here is a defect
    /// in the reflector, not a user error.
    fn alias_slot(&self, bindings: &[ResourceBinding], index: usize, texture: &str) -> u32 {
        let slot = bindings
            .iter()
            .find(|b| b.kind == BindingKind::SampledTexture && b.name == texture)
            .and_then(|b| b.assigned_slot);
        match slot {
            Some(slot) => slot,
            None => panic!(
                "combined sampler state `{}` has no matching texture binding `{texture}`",
                bindings[index].name
            ),
        }
    }

    fn pool_mut(&mut self, space: SlotSpace) -> &mut SlotPool {
        match space {
            SlotSpace::Buffers => &mut self.buffers,
            SlotSpace::Textures => &mut self.textures,
            SlotSpace::Samplers => &mut self.samplers,
        }
    }

    /// The side-table slot: the lowest buffer index still free after every
    /// named resource claimed its slot. Must be read only once allocation is
    /// complete.
    pub fn side_table_slot(&self) -> Option<u32> {
        self.buffers.lowest_free()
    }

    /// Free mask of the buffer pool (bit `n` set = slot `n` free).
    pub fn buffer_mask(&self) -> u64 {
        self.buffers.free_mask()
    }

    /// Free mask of the texture pool.
    pub fn texture_mask(&self) -> u64 {
        self.textures.free_mask()
    }

    /// Free mask of the sampler pool.
    pub fn sampler_mask(&self) -> u64 {
        self.samplers.free_mask()
    }
}

fn combined_alias_target(binding: &ResourceBinding) -> Option<&str> {
    match &binding.role {
        ResourceRole::CombinedSamplerAlias { texture } => Some(texture),
        _ => None,
    }
}
