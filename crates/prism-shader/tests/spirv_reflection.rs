//! Reflection over synthetic SPIR-V modules.

use prism_shader::env::{CompilerEnvironment, ResourceTableEntry, ResourceTableEntryKind};
use prism_shader::reflect::{reflect_spirv, BindingKind, ResourceRole};
use prism_shader::ShaderStage;
use prism_spirv::spv::{decoration, execution_model, StorageClass, IMAGE_SAMPLED, IMAGE_STORAGE};
use prism_spirv::test_utils::ModuleBuilder;
use prism_spirv::{ModuleInfo, SpirvModule};

const SC_UNIFORM_CONSTANT: u32 = 0;
const SC_INPUT: u32 = 1;
const SC_UNIFORM: u32 = 2;
const SC_OUTPUT: u32 = 3;

struct PixelModule {
    builder: ModuleBuilder,
    interface: Vec<u32>,
}

impl PixelModule {
    fn new() -> Self {
        Self {
            builder: ModuleBuilder::new(),
            interface: Vec::new(),
        }
    }

    fn uniform_buffer(&mut self, name: &str, members: u32, binding: u32) -> u32 {
        let b = &mut self.builder;
        let f32_ty = b.type_float(32);
        let vec4 = b.type_vector(f32_ty, 4);
        let member_types: Vec<u32> = (0..members).map(|_| vec4).collect();
        let block = b.type_struct(&member_types);
        b.op_decorate(block, decoration::BLOCK, &[]);
        let ptr = b.type_pointer(SC_UNIFORM, block);
        let var = b.variable(ptr, SC_UNIFORM);
        b.op_name(var, name);
        b.op_decorate(var, decoration::DESCRIPTOR_SET, &[0]);
        b.op_decorate(var, decoration::BINDING, &[binding]);
        var
    }

    fn texture(&mut self, name: &str, binding: u32, sampled: u32) -> u32 {
        let b = &mut self.builder;
        let f32_ty = b.type_float(32);
        let image = b.type_image(f32_ty, 1, sampled);
        let ptr = b.type_pointer(SC_UNIFORM_CONSTANT, image);
        let var = b.variable(ptr, SC_UNIFORM_CONSTANT);
        b.op_name(var, name);
        b.op_decorate(var, decoration::DESCRIPTOR_SET, &[0]);
        b.op_decorate(var, decoration::BINDING, &[binding]);
        var
    }

    fn sampler(&mut self, name: &str, binding: u32) -> u32 {
        let b = &mut self.builder;
        let sampler = b.type_sampler();
        let ptr = b.type_pointer(SC_UNIFORM_CONSTANT, sampler);
        let var = b.variable(ptr, SC_UNIFORM_CONSTANT);
        b.op_name(var, name);
        b.op_decorate(var, decoration::DESCRIPTOR_SET, &[0]);
        b.op_decorate(var, decoration::BINDING, &[binding]);
        var
    }

    fn input(&mut self, name: &str, location: u32) -> u32 {
        let b = &mut self.builder;
        let f32_ty = b.type_float(32);
        let vec4 = b.type_vector(f32_ty, 4);
        let ptr = b.type_pointer(SC_INPUT, vec4);
        let var = b.variable(ptr, SC_INPUT);
        b.op_name(var, name);
        b.op_decorate(var, decoration::LOCATION, &[location]);
        self.interface.push(var);
        var
    }

    fn output(&mut self, name: &str, location: u32) -> u32 {
        let b = &mut self.builder;
        let f32_ty = b.type_float(32);
        let vec4 = b.type_vector(f32_ty, 4);
        let ptr = b.type_pointer(SC_OUTPUT, vec4);
        let var = b.variable(ptr, SC_OUTPUT);
        b.op_name(var, name);
        b.op_decorate(var, decoration::LOCATION, &[location]);
        self.interface.push(var);
        var
    }

    fn build(mut self) -> Vec<u8> {
        let entry = self.builder.id();
        self.builder.op_entry_point(
            execution_model::FRAGMENT,
            entry,
            "main",
            &self.interface,
        );
        self.builder.build()
    }
}

#[test]
fn one_uniform_buffer_one_texture_one_sampler() {
    // Scenario: a uniform buffer with two members plus a texture/sampler
    // pair. The buffer reflects alone, the texture and sampler reflect as
    // globals, and the pairing is recorded as a combined-sampler alias.
    let mut m = PixelModule::new();
    m.uniform_buffer("MyUB", 2, 0);
    m.texture("SceneTexture", 1, IMAGE_SAMPLED);
    m.sampler("SceneTextureSampler", 2);
    m.output("out_SV_Target0", 0);
    let bytes = m.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let env = CompilerEnvironment::default();
    let mut table = env.index();
    let reflection = reflect_spirv(&info, ShaderStage::Pixel, &mut table).unwrap();

    assert_eq!(reflection.entry_point, "main");
    assert_eq!(reflection.bindings.len(), 3);

    let ub = reflection.binding("MyUB").unwrap();
    assert_eq!(ub.kind, BindingKind::UniformBuffer);
    assert!(ub.has_constant_data);
    assert_eq!(ub.original_binding, Some(0));

    let texture = reflection.binding("SceneTexture").unwrap();
    assert_eq!(texture.kind, BindingKind::SampledTexture);

    let sampler = reflection.binding("SceneTextureSampler").unwrap();
    assert_eq!(sampler.kind, BindingKind::Sampler);
    assert_eq!(
        sampler.role,
        ResourceRole::CombinedSamplerAlias {
            texture: "SceneTexture".into(),
        }
    );
}

#[test]
fn bindings_come_out_in_uav_first_group_order() {
    let mut m = PixelModule::new();
    // Declared SRV-first on purpose; reflection must regroup.
    m.texture("SceneColor", 0, IMAGE_SAMPLED);
    m.texture("RWOutput", 1, IMAGE_STORAGE);
    m.uniform_buffer("View", 1, 2);
    let bytes = m.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let env = CompilerEnvironment::default();
    let mut table = env.index();
    let reflection = reflect_spirv(&info, ShaderStage::Pixel, &mut table).unwrap();

    let names: Vec<&str> = reflection
        .bindings
        .iter()
        .map(|b| b.name.as_str())
        .collect();
    assert_eq!(names, ["RWOutput", "View", "SceneColor"]);
    assert!(reflection.bindings[0].is_uav());
}

#[test]
fn interface_locations_derive_from_semantics() {
    let mut m = PixelModule::new();
    m.input("in_ATTRIBUTE14", 0);
    m.input("in_ATTRIBUTE0", 1);
    m.output("out_SV_Target0", 0);
    let bytes = m.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let env = CompilerEnvironment::default();
    let mut table = env.index();
    let reflection = reflect_spirv(&info, ShaderStage::Pixel, &mut table).unwrap();

    // Locations come from the semantic digits, not the IR's Location
    // decorations (those get patched to match afterwards).
    assert_eq!(reflection.inputs.len(), 2);
    assert_eq!(reflection.inputs[0].semantic, "ATTRIBUTE14");
    assert_eq!(reflection.inputs[0].location, 14);
    assert_eq!(reflection.inputs[1].location, 0);
    assert_eq!(reflection.input_mask(), (1 << 14) | 1);

    assert_eq!(reflection.outputs[0].location, 0);
    assert_eq!(reflection.outputs[0].shape.type_tag(), "f4");
    assert_eq!(reflection.output_mask(), 1);
}

#[test]
fn resource_table_members_resolve_to_roles_and_mark_buffers() {
    let mut env = CompilerEnvironment::default();
    env.layout_hashes.insert("Material".into(), 77);
    env.resource_table.insert(
        "Material_BaseColor".into(),
        ResourceTableEntry {
            uniform_buffer: "Material".into(),
            kind: ResourceTableEntryKind::Texture,
            resource_index: 0,
        },
    );

    let mut m = PixelModule::new();
    m.texture("Material_BaseColor", 0, IMAGE_SAMPLED);
    let bytes = m.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let mut table = env.index();
    let reflection = reflect_spirv(&info, ShaderStage::Pixel, &mut table).unwrap();

    let binding = reflection.binding("Material_BaseColor").unwrap();
    assert_eq!(
        binding.role,
        ResourceRole::Member {
            uniform_buffer: "Material".into(),
            resource_index: 0,
        }
    );
    assert!(table.is_buffer_used(table.buffer_index("Material").unwrap()));
}

#[test]
fn missing_entry_point_is_a_stage_error() {
    let mut m = PixelModule::new();
    m.texture("Scene", 0, IMAGE_SAMPLED);
    let bytes = m.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let env = CompilerEnvironment::default();
    let mut table = env.index();
    let err = reflect_spirv(&info, ShaderStage::Vertex, &mut table).unwrap_err();
    assert!(matches!(
        err,
        prism_shader::ShaderCompileError::MissingEntryPoint {
            stage: ShaderStage::Vertex,
        }
    ));
}

#[test]
fn unnamed_resources_are_rejected() {
    let mut b = ModuleBuilder::new();
    let f32_ty = b.type_float(32);
    let image = b.type_image(f32_ty, 1, IMAGE_SAMPLED);
    let ptr = b.type_pointer(StorageClass::UniformConstant.as_u32(), image);
    let var = b.variable(ptr, StorageClass::UniformConstant.as_u32());
    b.op_decorate(var, decoration::BINDING, &[0]);
    let entry = b.id();
    b.op_entry_point(execution_model::FRAGMENT, entry, "main", &[]);
    let bytes = b.build();

    let module = SpirvModule::parse(&bytes).unwrap();
    let info = ModuleInfo::scan(&module).unwrap();
    let env = CompilerEnvironment::default();
    let mut table = env.index();
    let err = reflect_spirv(&info, ShaderStage::Pixel, &mut table).unwrap_err();
    assert!(matches!(
        err,
        prism_shader::ShaderCompileError::UnnamedResource { .. }
    ));
}
