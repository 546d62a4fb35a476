//! IR reflection: enumerating resource bindings and interface variables.
//!
//! The reflector walks a parsed SPIR-V module (the annotated-text path lives
//! in [`crate::annotated`]) and produces [`ModuleReflection`]: the ordered
//! resource binding list, the interface variable lists with derived
//! locations, and the patch coordinates the binding patcher needs later.
//!
//! Ordering matters everywhere here. Bindings are grouped UAVs-first (the
//! allocator depends on it), and within a group module declaration order is
//! preserved so repeated compiles of the same module enumerate identically.

use std::fmt;

use prism_spirv::spv::{self, decoration};
use prism_spirv::{ModuleInfo, TypeRecord, VariableRecord};

use crate::env::ResourceTableIndex;
use crate::error::ShaderCompileError;
use crate::limits::MAX_INTERFACE_LOCATIONS;
use crate::stage::ShaderStage;

/// The reflected kind of one resource binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingKind {
    /// A constant buffer bound natively.
    UniformBuffer,
    /// A standalone sampler state.
    Sampler,
    /// A sampled texture (SRV), possibly with an embedded sampler.
    SampledTexture,
    /// A writable storage image (UAV).
    StorageTexture,
    /// A read-only texel buffer (SRV).
    UniformTexelBuffer,
    /// A writable texel buffer (UAV).
    StorageTexelBuffer,
    /// A structured/byte-address buffer; access decides SRV vs UAV.
    StorageBuffer,
    /// A subpass input attachment.
    InputAttachment,
    /// An emulated constant-buffer bucket (flattened uniforms).
    PackedGlobalArray,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::UniformBuffer => "uniform buffer",
            BindingKind::Sampler => "sampler",
            BindingKind::SampledTexture => "sampled texture",
            BindingKind::StorageTexture => "storage texture",
            BindingKind::UniformTexelBuffer => "uniform texel buffer",
            BindingKind::StorageTexelBuffer => "storage texel buffer",
            BindingKind::StorageBuffer => "storage buffer",
            BindingKind::InputAttachment => "input attachment",
            BindingKind::PackedGlobalArray => "packed global array",
        };
        write!(f, "{name}")
    }
}

/// Whether a resource is read-only (SRV-like) or writable (UAV-like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceAccess {
    ReadOnly,
    ReadWrite,
}

/// How a resource relates to the rest of the module, resolved once during
/// reflection so later stages never re-derive it from names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRole {
    /// A free-standing global resource.
    Standalone,
    /// A member of a uniform buffer's resource table.
    Member {
        /// The owning uniform buffer.
        uniform_buffer: String,
        /// Index within the owner's resource table.
        resource_index: u32,
    },
    /// A sampler state paired with a texture (`Texture.SamplerState` in the
    /// source HLSL); on combined-sampler targets it aliases the texture's
    /// slot instead of consuming one.
    CombinedSamplerAlias {
        /// The paired texture's name.
        texture: String,
    },
}

/// Where in the IR a binding's numbers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchCoords {
    /// No in-IR coordinates (annotated-text path; the block is re-emitted).
    None,
    /// SPIR-V decoration literal word offsets.
    Spirv {
        /// Word offset of the `Binding` literal.
        binding_word: usize,
        /// Word offset of the `DescriptorSet` literal, when present.
        set_word: Option<usize>,
    },
}

/// One reflected resource binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBinding {
    /// Resource name (unique within a module).
    pub name: String,
    /// Reflected kind.
    pub kind: BindingKind,
    /// Read-only or writable.
    pub access: ResourceAccess,
    /// Relationship to tables/textures, resolved once.
    pub role: ResourceRole,
    /// Binding number as emitted by the frontend, pre-patch.
    pub original_binding: Option<u32>,
    /// Slot chosen by the allocator; `None` until allocation succeeds.
    pub assigned_slot: Option<u32>,
    /// Array element count (1 for non-arrays).
    pub count: u32,
    /// For uniform buffers: whether the block carries constant data (as
    /// opposed to holding only resource-table members).
    pub has_constant_data: bool,
    /// IR patch coordinates.
    pub patch: PatchCoords,
}

impl ResourceBinding {
    /// Returns `true` for UAV-like bindings, which allocate before all
    /// SRV-like bindings.
    pub fn is_uav(&self) -> bool {
        matches!(
            self.kind,
            BindingKind::StorageTexture | BindingKind::StorageTexelBuffer
        ) || (self.kind == BindingKind::StorageBuffer
            && self.access == ResourceAccess::ReadWrite)
    }

    /// Allocation group rank. Lower ranks allocate first; the ordering is
    /// UAVs, then SRV buffers/textures, then uniform buffers, then samplers,
    /// then input attachments.
    pub fn group_rank(&self) -> u32 {
        match (self.kind, self.access) {
            (BindingKind::StorageTexelBuffer, _) => 0,
            (BindingKind::StorageBuffer, ResourceAccess::ReadWrite) => 1,
            (BindingKind::StorageTexture, _) => 2,
            (BindingKind::UniformTexelBuffer, _) => 3,
            (BindingKind::StorageBuffer, ResourceAccess::ReadOnly) => 4,
            (BindingKind::UniformBuffer, _) => 5,
            (BindingKind::SampledTexture, _) => 6,
            (BindingKind::Sampler, _) => 7,
            (BindingKind::InputAttachment, _) => 8,
            (BindingKind::PackedGlobalArray, _) => 9,
        }
    }
}

/// Scalar base types of interface variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericBaseType {
    Bool,
    Int,
    Uint,
    Half,
    Float,
}

impl NumericBaseType {
    /// The single-character tag used in annotation blocks.
    pub const fn tag(self) -> char {
        match self {
            NumericBaseType::Bool => 'b',
            NumericBaseType::Int => 'i',
            NumericBaseType::Uint => 'u',
            NumericBaseType::Half => 'h',
            NumericBaseType::Float => 'f',
        }
    }

    /// Decodes a tag character.
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'b' => Some(NumericBaseType::Bool),
            'i' => Some(NumericBaseType::Int),
            'u' => Some(NumericBaseType::Uint),
            'h' => Some(NumericBaseType::Half),
            'f' => Some(NumericBaseType::Float),
            _ => None,
        }
    }
}

/// Vector/matrix shape of an interface variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumericShape {
    /// Scalar base type.
    pub base: NumericBaseType,
    /// Component count per column (1..=4).
    pub components: u8,
    /// Column count for matrices; `None` for scalars/vectors.
    pub columns: Option<u8>,
}

impl NumericShape {
    /// Renders the compact type tag (`f4`, `u1`, `f44`, ...). Matrices
    /// encode as two digits: columns then components.
    pub fn type_tag(&self) -> String {
        match self.columns {
            Some(columns) => format!("{}{}{}", self.base.tag(), columns, self.components),
            None => format!("{}{}", self.base.tag(), self.components),
        }
    }

    /// Parses a compact type tag.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let mut chars = tag.chars();
        let base = NumericBaseType::from_tag(chars.next()?)?;
        let digits: Vec<u8> = chars
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<_>>()?;
        match digits.as_slice() {
            [components] if (1..=4).contains(components) => Some(NumericShape {
                base,
                components: *components,
                columns: None,
            }),
            [columns, components]
                if (1..=4).contains(columns) && (1..=4).contains(components) =>
            {
                Some(NumericShape {
                    base,
                    components: *components,
                    columns: Some(*columns),
                })
            }
            _ => None,
        }
    }
}

/// One reflected stage input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceVariable {
    /// Variable name as declared in the IR (e.g. `in_ATTRIBUTE7`).
    pub name: String,
    /// HLSL semantic derived from the name (e.g. `ATTRIBUTE7`).
    pub semantic: String,
    /// Assigned location.
    pub location: u32,
    /// Numeric shape.
    pub shape: NumericShape,
    /// Word offset of the `Location` literal, when the IR carries one.
    pub location_word: Option<usize>,
}

/// The complete reflection of one shader stage's module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleReflection {
    /// The reflected stage.
    pub stage: ShaderStage,
    /// Entry point name.
    pub entry_point: String,
    /// Resource bindings in allocation group order.
    pub bindings: Vec<ResourceBinding>,
    /// Stage inputs with assigned locations.
    pub inputs: Vec<InterfaceVariable>,
    /// Stage outputs with assigned locations.
    pub outputs: Vec<InterfaceVariable>,
    /// Flattened globals (annotated-text path only).
    pub packed_globals: Vec<crate::packed::PackedGlobal>,
    /// Emulated-uniform copy ranges (annotated-text path only).
    pub packed_copies: Vec<crate::packed::CopyRange>,
}

impl ModuleReflection {
    /// Looks up a binding by name.
    pub fn binding(&self, name: &str) -> Option<&ResourceBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Bitmask of input locations in use.
    pub fn input_mask(&self) -> u32 {
        location_mask(&self.inputs)
    }

    /// Bitmask of output locations in use.
    pub fn output_mask(&self) -> u32 {
        location_mask(&self.outputs)
    }
}

fn location_mask(vars: &[InterfaceVariable]) -> u32 {
    vars.iter()
        .filter(|v| v.location < 32)
        .fold(0, |mask, v| mask | (1u32 << v.location))
}

/// Reflects a scanned SPIR-V module for `stage`.
///
/// `table` is consulted to resolve resource-table membership; buffers the
/// module references are marked used on it.
pub fn reflect_spirv(
    info: &ModuleInfo,
    stage: ShaderStage,
    table: &mut ResourceTableIndex<'_>,
) -> Result<ModuleReflection, ShaderCompileError> {
    let entry = info
        .entry_points
        .iter()
        .find(|e| ShaderStage::from_execution_model(e.execution_model) == Some(stage))
        .ok_or(ShaderCompileError::MissingEntryPoint { stage })?;

    let mut bindings = Vec::new();
    let mut raw_inputs = Vec::new();
    let mut raw_outputs = Vec::new();

    for var in &info.variables {
        match var.storage_class {
            spv::StorageClass::Input => {
                if let Some(v) = reflect_interface_variable(info, var)? {
                    raw_inputs.push(v);
                }
            }
            spv::StorageClass::Output => {
                if let Some(v) = reflect_interface_variable(info, var)? {
                    raw_outputs.push(v);
                }
            }
            spv::StorageClass::UniformConstant
            | spv::StorageClass::Uniform
            | spv::StorageClass::StorageBuffer => {
                if let Some(binding) = reflect_resource(info, var)? {
                    bindings.push(binding);
                }
            }
            _ => {}
        }
    }

    resolve_roles(&mut bindings, table);

    // Stable: module order is preserved within each group.
    bindings.sort_by_key(ResourceBinding::group_rank);

    let inputs = assign_locations(raw_inputs)?;
    let outputs = assign_locations(raw_outputs)?;

    Ok(ModuleReflection {
        stage,
        entry_point: entry.name.clone(),
        bindings,
        inputs,
        outputs,
        packed_globals: Vec::new(),
        packed_copies: Vec::new(),
    })
}

fn reflect_resource(
    info: &ModuleInfo,
    var: &VariableRecord,
) -> Result<Option<ResourceBinding>, ShaderCompileError> {
    let Some(pointee) = info.variable_pointee(var) else {
        return Ok(None);
    };

    let non_writable = info.has_decoration(var.result_id, decoration::NON_WRITABLE);
    let classified = match (var.storage_class, pointee) {
        (spv::StorageClass::UniformConstant, TypeRecord::Image { dim, sampled, .. }) => {
            match (dim, *sampled) {
                (spv::Dim::Buffer, spv::IMAGE_SAMPLED) => {
                    Some((BindingKind::UniformTexelBuffer, ResourceAccess::ReadOnly))
                }
                (spv::Dim::Buffer, spv::IMAGE_STORAGE) => {
                    Some((BindingKind::StorageTexelBuffer, ResourceAccess::ReadWrite))
                }
                (spv::Dim::SubpassData, _) => {
                    Some((BindingKind::InputAttachment, ResourceAccess::ReadOnly))
                }
                (_, spv::IMAGE_STORAGE) => {
                    Some((BindingKind::StorageTexture, ResourceAccess::ReadWrite))
                }
                (_, _) => Some((BindingKind::SampledTexture, ResourceAccess::ReadOnly)),
            }
        }
        (spv::StorageClass::UniformConstant, TypeRecord::SampledImage { .. }) => {
            Some((BindingKind::SampledTexture, ResourceAccess::ReadOnly))
        }
        (spv::StorageClass::UniformConstant, TypeRecord::Sampler) => {
            Some((BindingKind::Sampler, ResourceAccess::ReadOnly))
        }
        (spv::StorageClass::Uniform, TypeRecord::Struct { .. }) => {
            if struct_is_storage(info, var) {
                let access = if non_writable {
                    ResourceAccess::ReadOnly
                } else {
                    ResourceAccess::ReadWrite
                };
                Some((BindingKind::StorageBuffer, access))
            } else {
                Some((BindingKind::UniformBuffer, ResourceAccess::ReadOnly))
            }
        }
        (spv::StorageClass::StorageBuffer, TypeRecord::Struct { .. }) => {
            let access = if non_writable {
                ResourceAccess::ReadOnly
            } else {
                ResourceAccess::ReadWrite
            };
            Some((BindingKind::StorageBuffer, access))
        }
        _ => None,
    };

    let Some((kind, access)) = classified else {
        return Ok(None);
    };

    let name = info
        .name_of(var.result_id)
        .ok_or(ShaderCompileError::UnnamedResource { id: var.result_id })?
        .to_owned();

    let binding_record = info.decoration(var.result_id, decoration::BINDING);
    let set_record = info.decoration(var.result_id, decoration::DESCRIPTOR_SET);

    let patch = match binding_record.and_then(|r| r.literal_word_offset) {
        Some(binding_word) => PatchCoords::Spirv {
            binding_word,
            set_word: set_record.and_then(|r| r.literal_word_offset),
        },
        None => PatchCoords::None,
    };

    let has_constant_data = match pointee {
        TypeRecord::Struct { members } => !members.is_empty(),
        _ => false,
    };

    Ok(Some(ResourceBinding {
        name,
        kind,
        access,
        role: ResourceRole::Standalone,
        original_binding: binding_record.and_then(|r| r.literal),
        assigned_slot: None,
        count: 1,
        has_constant_data,
        patch,
    }))
}

/// A `Uniform`-class struct is a storage buffer when it carries the legacy
/// `BufferBlock` decoration (SPIR-V < 1.3 spelling) on its type.
fn struct_is_storage(info: &ModuleInfo, var: &VariableRecord) -> bool {
    let Some(TypeRecord::Pointer { pointee, .. }) = info.types.get(&var.type_id) else {
        return false;
    };
    info.has_decoration(*pointee, decoration::BUFFER_BLOCK)
}

fn reflect_interface_variable(
    info: &ModuleInfo,
    var: &VariableRecord,
) -> Result<Option<RawInterfaceVariable>, ShaderCompileError> {
    if info.has_decoration(var.result_id, decoration::BUILT_IN) {
        return Ok(None);
    }
    // Builtins can also be decorated on the members of a gl_PerVertex block;
    // such variables have struct pointees and no location semantics.
    let Some(pointee) = info.variable_pointee(var) else {
        return Ok(None);
    };
    let Some(shape) = numeric_shape(info, pointee) else {
        return Ok(None);
    };

    let Some(name) = info.name_of(var.result_id) else {
        // Unnamed interface variables are frontend-internal (e.g. glue
        // between stages); they carry no semantic and are not reflected.
        return Ok(None);
    };

    let location_word = info
        .decoration(var.result_id, decoration::LOCATION)
        .and_then(|r| r.literal_word_offset);

    Ok(Some(RawInterfaceVariable {
        name: name.to_owned(),
        shape,
        location_word,
    }))
}

struct RawInterfaceVariable {
    name: String,
    shape: NumericShape,
    location_word: Option<usize>,
}

fn numeric_shape(info: &ModuleInfo, ty: &TypeRecord) -> Option<NumericShape> {
    match ty {
        TypeRecord::Bool => Some(NumericShape {
            base: NumericBaseType::Bool,
            components: 1,
            columns: None,
        }),
        TypeRecord::Int { signed, .. } => Some(NumericShape {
            base: if *signed {
                NumericBaseType::Int
            } else {
                NumericBaseType::Uint
            },
            components: 1,
            columns: None,
        }),
        TypeRecord::Float { width } => Some(NumericShape {
            base: if *width == 16 {
                NumericBaseType::Half
            } else {
                NumericBaseType::Float
            },
            components: 1,
            columns: None,
        }),
        TypeRecord::Vector { component, count } => {
            let inner = numeric_shape(info, info.types.get(component)?)?;
            Some(NumericShape {
                base: inner.base,
                components: (*count).min(4) as u8,
                columns: None,
            })
        }
        TypeRecord::Matrix { column, columns } => {
            let inner = numeric_shape(info, info.types.get(column)?)?;
            Some(NumericShape {
                base: inner.base,
                components: inner.components,
                columns: Some((*columns).min(4) as u8),
            })
        }
        _ => None,
    }
}

/// Derives the HLSL semantic from an interface variable name by stripping
/// the conventional `in_`/`out_` prefixes.
pub fn semantic_of(name: &str) -> &str {
    name.strip_prefix("in_")
        .or_else(|| name.strip_prefix("out_"))
        .unwrap_or(name)
}

/// Splits a semantic into its stem and trailing decimal index
/// (`ATTRIBUTE14` → (`ATTRIBUTE`, Some(14))).
pub fn semantic_index(semantic: &str) -> (&str, Option<u32>) {
    let digits_at = semantic
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let (stem, digits) = semantic.split_at(digits_at);
    if digits.is_empty() {
        return (stem, None);
    }
    // Indices wider than a location mask are treated as unindexed rather
    // than wrapped.
    (stem, digits.parse::<u32>().ok())
}

/// Assigns locations to interface variables in declaration order.
///
/// A variable requests the location encoded by its semantic's trailing
/// digits (or its declaration index when there are none). Collisions advance
/// to the next free location, probing linearly over a 32-bit occupancy mask.
fn assign_locations(
    raw: Vec<RawInterfaceVariable>,
) -> Result<Vec<InterfaceVariable>, ShaderCompileError> {
    let mut occupied: u32 = 0;
    let mut out = Vec::with_capacity(raw.len());

    for (decl_index, var) in raw.into_iter().enumerate() {
        let semantic = semantic_of(&var.name).to_owned();
        let (_, index) = semantic_index(&semantic);
        let requested = index.unwrap_or(decl_index as u32);

        let mut location = requested.min(MAX_INTERFACE_LOCATIONS);
        while location < MAX_INTERFACE_LOCATIONS && occupied & (1 << location) != 0 {
            location += 1;
        }
        if location >= MAX_INTERFACE_LOCATIONS {
            // The requested slot and everything above it are taken; wrap to
            // the lowest free location before giving up.
            match (!occupied).trailing_zeros() {
                free if free < MAX_INTERFACE_LOCATIONS => location = free,
                _ => {
                    return Err(ShaderCompileError::LocationsExhausted {
                        name: var.name,
                        limit: MAX_INTERFACE_LOCATIONS,
                    })
                }
            }
        }

        occupied |= 1 << location;
        out.push(InterfaceVariable {
            name: var.name,
            semantic,
            location,
            shape: var.shape,
            location_word: var.location_word,
        });
    }

    Ok(out)
}

pub(crate) fn resolve_roles(bindings: &mut [ResourceBinding], table: &mut ResourceTableIndex<'_>) {
    // Pass 1: resource-table membership.
    for binding in bindings.iter_mut() {
        if let Some((uniform_buffer, resource_index)) = table.entry_of(&binding.name) {
            let uniform_buffer = uniform_buffer.to_owned();
            table.mark_buffer_used(&uniform_buffer);
            binding.role = ResourceRole::Member {
                uniform_buffer,
                resource_index,
            };
        } else if binding.kind == BindingKind::UniformBuffer {
            table.mark_buffer_used(&binding.name);
        }
    }

    // Pass 2: combined texture/sampler pairing. The frontend names a
    // `Texture.SamplerState` pair `<Texture>` and `<Texture>Sampler`; record
    // the association once so later stages never re-parse names.
    let textures: Vec<String> = bindings
        .iter()
        .filter(|b| b.kind == BindingKind::SampledTexture)
        .map(|b| b.name.clone())
        .collect();
    for binding in bindings.iter_mut() {
        if binding.kind != BindingKind::Sampler {
            continue;
        }
        if !matches!(binding.role, ResourceRole::Standalone) {
            continue;
        }
        if let Some(texture) = binding
            .name
            .strip_suffix("Sampler")
            .filter(|stem| !stem.is_empty())
        {
            if textures.iter().any(|t| t == texture) {
                binding.role = ResourceRole::CombinedSamplerAlias {
                    texture: texture.to_owned(),
                };
            }
        }
    }
}
