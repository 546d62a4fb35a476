//! Raw SPIR-V enumerant values.
//!
//! Only the subset needed for binding reflection is modeled as Rust enums;
//! everything else is carried as raw `u32`s, the same way signature chunks
//! carry raw `D3D_NAME` values upstream.

/// Opcodes recognized by the reflection scan.
pub mod op {
    /// `OpName`.
    pub const NAME: u16 = 5;
    /// `OpMemberName`.
    pub const MEMBER_NAME: u16 = 6;
    /// `OpEntryPoint`.
    pub const ENTRY_POINT: u16 = 15;
    /// `OpExecutionMode`.
    pub const EXECUTION_MODE: u16 = 16;
    /// `OpCapability`.
    pub const CAPABILITY: u16 = 17;
    /// `OpTypeVoid`.
    pub const TYPE_VOID: u16 = 19;
    /// `OpTypeBool`.
    pub const TYPE_BOOL: u16 = 20;
    /// `OpTypeInt`.
    pub const TYPE_INT: u16 = 21;
    /// `OpTypeFloat`.
    pub const TYPE_FLOAT: u16 = 22;
    /// `OpTypeVector`.
    pub const TYPE_VECTOR: u16 = 23;
    /// `OpTypeMatrix`.
    pub const TYPE_MATRIX: u16 = 24;
    /// `OpTypeImage`.
    pub const TYPE_IMAGE: u16 = 25;
    /// `OpTypeSampler`.
    pub const TYPE_SAMPLER: u16 = 26;
    /// `OpTypeSampledImage`.
    pub const TYPE_SAMPLED_IMAGE: u16 = 27;
    /// `OpTypeArray`.
    pub const TYPE_ARRAY: u16 = 28;
    /// `OpTypeRuntimeArray`.
    pub const TYPE_RUNTIME_ARRAY: u16 = 29;
    /// `OpTypeStruct`.
    pub const TYPE_STRUCT: u16 = 30;
    /// `OpTypePointer`.
    pub const TYPE_POINTER: u16 = 32;
    /// `OpVariable`.
    pub const VARIABLE: u16 = 59;
    /// `OpDecorate`.
    pub const DECORATE: u16 = 71;
    /// `OpMemberDecorate`.
    pub const MEMBER_DECORATE: u16 = 72;
}

/// Decoration enumerants recognized by the reflection scan.
pub mod decoration {
    /// `Block` - a uniform buffer (or, with `StorageBuffer` storage, an SSBO).
    pub const BLOCK: u32 = 2;
    /// `BuiltIn` - a builtin interface variable (position, vertex id, ...).
    pub const BUILT_IN: u32 = 11;
    /// `BufferBlock` - pre-1.3 storage buffer spelling.
    pub const BUFFER_BLOCK: u32 = 3;
    /// `NonWritable` - marks a read-only storage resource.
    pub const NON_WRITABLE: u32 = 24;
    /// `Location` - interface variable location.
    pub const LOCATION: u32 = 30;
    /// `Binding` - descriptor binding number.
    pub const BINDING: u32 = 33;
    /// `DescriptorSet` - descriptor set number.
    pub const DESCRIPTOR_SET: u32 = 34;
    /// `InputAttachmentIndex` - subpass input attachment index.
    pub const INPUT_ATTACHMENT_INDEX: u32 = 43;
}

/// Storage classes recognized by the reflection scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageClass {
    /// `UniformConstant` - opaque resources (images, samplers, texel buffers).
    UniformConstant,
    /// `Input` - stage input interface variables.
    Input,
    /// `Uniform` - uniform/storage buffer blocks.
    Uniform,
    /// `Output` - stage output interface variables.
    Output,
    /// `PushConstant` - push-constant blocks.
    PushConstant,
    /// `StorageBuffer` - SPIR-V 1.3+ storage buffers.
    StorageBuffer,
    /// Any storage class this pipeline does not reflect.
    Other(u32),
}

impl StorageClass {
    /// Decodes a raw SPIR-V storage class value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::UniformConstant,
            1 => Self::Input,
            2 => Self::Uniform,
            3 => Self::Output,
            9 => Self::PushConstant,
            12 => Self::StorageBuffer,
            other => Self::Other(other),
        }
    }

    /// Encodes this storage class back to its raw SPIR-V value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::UniformConstant => 0,
            Self::Input => 1,
            Self::Uniform => 2,
            Self::Output => 3,
            Self::PushConstant => 9,
            Self::StorageBuffer => 12,
            Self::Other(other) => other,
        }
    }
}

/// Image dimensionalities recognized by the reflection scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dim {
    /// `1D`.
    D1,
    /// `2D`.
    D2,
    /// `3D`.
    D3,
    /// `Cube`.
    Cube,
    /// `Rect`.
    Rect,
    /// `Buffer` - a texel buffer, not a texture.
    Buffer,
    /// `SubpassData` - an input attachment.
    SubpassData,
    /// Any dimensionality this pipeline does not reflect.
    Other(u32),
}

impl Dim {
    /// Decodes a raw SPIR-V `Dim` value.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::D1,
            1 => Self::D2,
            2 => Self::D3,
            3 => Self::Cube,
            4 => Self::Rect,
            5 => Self::Buffer,
            6 => Self::SubpassData,
            other => Self::Other(other),
        }
    }
}

/// Execution models (shader stages) as raw SPIR-V values.
pub mod execution_model {
    /// `Vertex`.
    pub const VERTEX: u32 = 0;
    /// `TessellationControl` (hull).
    pub const TESSELLATION_CONTROL: u32 = 1;
    /// `TessellationEvaluation` (domain).
    pub const TESSELLATION_EVALUATION: u32 = 2;
    /// `Geometry`.
    pub const GEOMETRY: u32 = 3;
    /// `Fragment` (pixel).
    pub const FRAGMENT: u32 = 4;
    /// `GLCompute`.
    pub const GL_COMPUTE: u32 = 5;
}

/// The `Sampled` operand of `OpTypeImage` indicating a sampled image.
pub const IMAGE_SAMPLED: u32 = 1;
/// The `Sampled` operand of `OpTypeImage` indicating a storage image.
pub const IMAGE_STORAGE: u32 = 2;
