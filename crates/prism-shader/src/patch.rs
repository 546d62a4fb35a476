//! Applies assigned slots back into the IR.
//!
//! The patcher is platform-agnostic: it walks the allocated binding list in
//! order and asks the [`BindingModel`] for every number it writes. Bindings
//! arrive UAV-first (the allocator depends on that order and the patcher
//! preserves it), so UAV slots are final before any SRV patch lands.

use tracing::debug;

use prism_spirv::SpirvPatcher;

use crate::binding_model::BindingModel;
use crate::error::ShaderCompileError;
use crate::reflect::{InterfaceVariable, PatchCoords, ResourceBinding};
use crate::stage::ShaderStage;

/// Rewrites binding and descriptor-set literals for every allocated binding.
pub fn patch_bindings(
    patcher: &mut SpirvPatcher,
    bindings: &[ResourceBinding],
    model: &dyn BindingModel,
    stage: ShaderStage,
) -> Result<(), ShaderCompileError> {
    debug_assert!(
        bindings.windows(2).all(|w| w[0].group_rank() <= w[1].group_rank()),
        "bindings must be patched in allocation group order"
    );

    for binding in bindings {
        let PatchCoords::Spirv {
            binding_word,
            set_word,
        } = binding.patch
        else {
            continue;
        };

        let slot = binding
            .assigned_slot
            .unwrap_or_else(|| panic!("binding `{}` patched before allocation", binding.name));
        let number = model.binding_number(binding.kind, slot);
        patcher.write_word(binding_word, number)?;

        if let Some(set_word) = set_word {
            // Targets without descriptor sets still normalize the literal so
            // the patched module never leaks frontend set numbers.
            let set = model.descriptor_set_for(stage).unwrap_or(0);
            patcher.write_word(set_word, set)?;
        }

        debug!(
            name = %binding.name,
            kind = %binding.kind,
            slot,
            number,
            "patched binding"
        );
    }

    Ok(())
}

/// Rewrites `Location` literals to the reflector-derived locations.
pub fn patch_locations(
    patcher: &mut SpirvPatcher,
    variables: &[InterfaceVariable],
) -> Result<(), ShaderCompileError> {
    for var in variables {
        if let Some(word) = var.location_word {
            patcher.write_word(word, var.location)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding_model::{
        MetalBindingModel, VulkanBindingModel, VULKAN_BINDING_BASE_TEXTURE,
    };
    use crate::reflect::{BindingKind, ResourceAccess, ResourceRole};
    use prism_spirv::spv::{decoration, StorageClass, IMAGE_SAMPLED};
    use prism_spirv::test_utils::ModuleBuilder;
    use prism_spirv::{ModuleInfo, SpirvModule};

    fn texture_module() -> (Vec<u8>, u32) {
        let mut b = ModuleBuilder::new();
        let f32_ty = b.type_float(32);
        let image = b.type_image(f32_ty, 1, IMAGE_SAMPLED);
        let ptr = b.type_pointer(StorageClass::UniformConstant.as_u32(), image);
        let var = b.variable(ptr, StorageClass::UniformConstant.as_u32());
        b.op_name(var, "Scene");
        b.op_decorate(var, decoration::DESCRIPTOR_SET, &[0]);
        b.op_decorate(var, decoration::BINDING, &[5]);
        (b.build(), var)
    }

    fn reflected_binding(bytes: &[u8], var: u32) -> ResourceBinding {
        let module = SpirvModule::parse(bytes).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();
        let binding = info.decoration(var, decoration::BINDING).unwrap();
        let set = info.decoration(var, decoration::DESCRIPTOR_SET).unwrap();
        ResourceBinding {
            name: "Scene".into(),
            kind: BindingKind::SampledTexture,
            access: ResourceAccess::ReadOnly,
            role: ResourceRole::Standalone,
            original_binding: binding.literal,
            assigned_slot: Some(3),
            count: 1,
            has_constant_data: false,
            patch: PatchCoords::Spirv {
                binding_word: binding.literal_word_offset.unwrap(),
                set_word: set.literal_word_offset,
            },
        }
    }

    #[test]
    fn vulkan_patch_writes_ranged_binding_and_stage_set() {
        let (bytes, var) = texture_module();
        let binding = reflected_binding(&bytes, var);

        let mut patcher = SpirvPatcher::from_bytes(&bytes).unwrap();
        patch_bindings(
            &mut patcher,
            std::slice::from_ref(&binding),
            &VulkanBindingModel,
            ShaderStage::Pixel,
        )
        .unwrap();

        let patched = patcher.into_bytes();
        let module = SpirvModule::parse(&patched).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();
        assert_eq!(
            info.decoration(var, decoration::BINDING).unwrap().literal,
            Some(VULKAN_BINDING_BASE_TEXTURE + 3)
        );
        assert_eq!(
            info.decoration(var, decoration::DESCRIPTOR_SET)
                .unwrap()
                .literal,
            Some(ShaderStage::Pixel.as_descriptor_set_index())
        );
    }

    #[test]
    fn metal_argument_buffers_shift_slots_past_the_size_table() {
        let (bytes, var) = texture_module();
        let binding = reflected_binding(&bytes, var);

        let mut patcher = SpirvPatcher::from_bytes(&bytes).unwrap();
        patch_bindings(
            &mut patcher,
            std::slice::from_ref(&binding),
            &MetalBindingModel {
                argument_buffers: true,
            },
            ShaderStage::Pixel,
        )
        .unwrap();

        let patched = patcher.into_bytes();
        let module = SpirvModule::parse(&patched).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();
        assert_eq!(
            info.decoration(var, decoration::BINDING).unwrap().literal,
            Some(4)
        );
        // No descriptor sets on Metal; the literal is normalized to zero.
        assert_eq!(
            info.decoration(var, decoration::DESCRIPTOR_SET)
                .unwrap()
                .literal,
            Some(0)
        );
    }
}
