//! The serializable shader header.
//!
//! The header is the runtime's contract: which resources exist, which slots
//! they were assigned, how emulated uniforms are copied, and which interface
//! locations are live. It is built once per compile job, after patching, and
//! is immutable afterward.
//!
//! Serialization is a hand-rolled little-endian byte stream. Every container
//! in the header is an ordered `Vec`, so identical inputs serialize to
//! identical bytes; map types never appear here.

use crate::env::{ResourceTableEntryKind, ResourceTableIndex};
use crate::error::ShaderCompileError;
use crate::packed::{CopyRange, PackedGlobal, PackedGlobalArray};
use crate::reflect::{
    BindingKind, InterfaceVariable, ModuleReflection, NumericShape, ResourceBinding,
};
use crate::stage::ShaderStage;

/// Magic bytes identifying a serialized header.
pub const HEADER_MAGIC: [u8; 4] = *b"PSH0";
/// Serialization format version.
pub const HEADER_VERSION: u16 = 1;

/// One entry in the index-addressable globals array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalResource {
    /// Resource name.
    pub name: String,
    /// Reflected kind.
    pub kind: BindingKind,
    /// Assigned slot within the kind's slot space.
    pub slot: u32,
    /// Array element count.
    pub count: u32,
    /// `true` for UAV-like resources the runtime must bind writable.
    pub writable: bool,
}

/// One member resource of a uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbResourceInfo {
    /// Member parameter name.
    pub name: String,
    /// Member kind from the resource table.
    pub kind: ResourceTableEntryKind,
    /// Index within the owner's resource table.
    pub resource_index: u32,
}

/// One reflected uniform buffer, real or resource-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBufferInfo {
    /// Buffer name.
    pub name: String,
    /// Declared layout hash from the environment (0 when undeclared).
    pub layout_hash: u32,
    /// `true` when the buffer holds no constant data, only member resources.
    pub only_has_resources: bool,
    /// Slot of the constant-data binding, when the buffer has constant data.
    pub constant_data_slot: Option<u32>,
    /// Member resources in source resource-table order.
    pub resources: Vec<UbResourceInfo>,
}

/// One uniform buffer whose constant data was flattened into packed arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBuffer {
    /// Source buffer name.
    pub name: String,
    /// Stable source buffer index (as referenced by copy ranges).
    pub buffer_index: u32,
}

/// One reflected input attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAttachmentInfo {
    /// Attachment name.
    pub name: String,
    /// Assigned texture-space slot.
    pub slot: u32,
}

/// The complete binding/reflection header for one compiled shader stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderHeader {
    /// The compiled stage.
    pub stage: ShaderStage,
    /// Checksum of the preprocessed source this stage was compiled from.
    pub source_hash: u64,
    /// Checksum of the patched IR this header accompanies.
    pub ir_checksum: u64,
    /// Stage inputs.
    pub inputs: Vec<InterfaceVariable>,
    /// Stage outputs.
    pub outputs: Vec<InterfaceVariable>,
    /// Bitmask of live input locations.
    pub input_mask: u32,
    /// Bitmask of live output locations.
    pub output_mask: u32,
    /// Index-addressable global resources, in allocation order.
    pub globals: Vec<GlobalResource>,
    /// Uniform buffers (native and resource-only).
    pub uniform_buffers: Vec<UniformBufferInfo>,
    /// Individual flattened globals.
    pub packed_globals: Vec<PackedGlobal>,
    /// Packed bucket sizes derived from globals and copy ranges.
    pub packed_arrays: Vec<PackedGlobalArray>,
    /// Source buffers feeding emulated-uniform copies.
    pub packed_buffers: Vec<PackedBuffer>,
    /// Emulated-uniform copy ranges.
    pub copy_ranges: Vec<CopyRange>,
    /// Input attachments.
    pub input_attachments: Vec<InputAttachmentInfo>,
    /// Slot of the implicit buffer-size side table, when one was reserved.
    pub side_table_slot: Option<u32>,
}

impl ShaderHeader {
    /// Assembles the header from a fully allocated reflection.
    ///
    /// `side_table_slot` comes from the allocator after patching;
    /// `source_hash` and `ir_checksum` from the compile driver.
    pub fn build(
        reflection: &ModuleReflection,
        table: &ResourceTableIndex<'_>,
        side_table_slot: Option<u32>,
        source_hash: u64,
        ir_checksum: u64,
    ) -> Result<Self, ShaderCompileError> {
        let mut globals = Vec::new();
        let mut uniform_buffers = Vec::new();
        let mut input_attachments = Vec::new();

        for binding in &reflection.bindings {
            let slot = assigned_slot(binding);
            match binding.kind {
                BindingKind::UniformBuffer => {
                    uniform_buffers.push(UniformBufferInfo {
                        name: binding.name.clone(),
                        layout_hash: table.layout_hash(&binding.name),
                        only_has_resources: !binding.has_constant_data,
                        constant_data_slot: binding.has_constant_data.then_some(slot),
                        resources: member_resources(table, &binding.name),
                    });
                }
                BindingKind::InputAttachment => {
                    input_attachments.push(InputAttachmentInfo {
                        name: binding.name.clone(),
                        slot,
                    });
                }
                BindingKind::PackedGlobalArray => {}
                _ => {
                    globals.push(GlobalResource {
                        name: binding.name.clone(),
                        kind: binding.kind,
                        slot,
                        count: binding.count,
                        writable: binding.access == crate::reflect::ResourceAccess::ReadWrite,
                    });
                }
            }
        }

        // Buffers referenced only through member resources still appear in
        // the header (the runtime binds their members), flagged as
        // resource-only. Ordered by the environment's stable buffer index.
        for buffer_index in 0..table.buffer_count() as u32 {
            let Some(name) = table.buffer_name(buffer_index) else {
                continue;
            };
            if !table.is_buffer_used(buffer_index) {
                continue;
            }
            if uniform_buffers.iter().any(|ub| ub.name == name) {
                continue;
            }
            let resources = member_resources(table, name);
            if resources.is_empty() {
                continue;
            }
            uniform_buffers.push(UniformBufferInfo {
                name: name.to_owned(),
                layout_hash: table.layout_hash(name),
                only_has_resources: true,
                constant_data_slot: None,
                resources,
            });
        }

        let packed_arrays =
            crate::packed::build_buckets(&reflection.packed_globals, &reflection.packed_copies);

        let mut packed_buffers = Vec::new();
        for copy in &reflection.packed_copies {
            if packed_buffers
                .iter()
                .any(|pb: &PackedBuffer| pb.buffer_index == copy.source_buffer)
            {
                continue;
            }
            let name = table
                .buffer_name(copy.source_buffer)
                .unwrap_or("")
                .to_owned();
            packed_buffers.push(PackedBuffer {
                name,
                buffer_index: copy.source_buffer,
            });
        }
        packed_buffers.sort_by_key(|pb| pb.buffer_index);

        Ok(ShaderHeader {
            stage: reflection.stage,
            source_hash,
            ir_checksum,
            inputs: reflection.inputs.clone(),
            outputs: reflection.outputs.clone(),
            input_mask: reflection.input_mask(),
            output_mask: reflection.output_mask(),
            globals,
            uniform_buffers,
            packed_globals: reflection.packed_globals.clone(),
            packed_arrays,
            packed_buffers,
            copy_ranges: reflection.packed_copies.clone(),
            input_attachments,
            side_table_slot,
        })
    }

    /// Serializes the header to its binary form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.bytes(&HEADER_MAGIC);
        w.u16(HEADER_VERSION);
        w.u8(stage_code(self.stage));
        w.u8(0); // reserved
        w.u64(self.source_hash);
        w.u64(self.ir_checksum);
        w.u32(self.input_mask);
        w.u32(self.output_mask);
        w.u32(self.side_table_slot.unwrap_or(u32::MAX));

        w.u16(self.inputs.len() as u16);
        for var in &self.inputs {
            w.interface_variable(var);
        }
        w.u16(self.outputs.len() as u16);
        for var in &self.outputs {
            w.interface_variable(var);
        }

        w.u16(self.globals.len() as u16);
        for global in &self.globals {
            w.str(&global.name);
            w.u8(kind_code(global.kind));
            w.u8(u8::from(global.writable));
            w.u32(global.slot);
            w.u16(global.count as u16);
        }

        w.u16(self.uniform_buffers.len() as u16);
        for ub in &self.uniform_buffers {
            w.str(&ub.name);
            w.u32(ub.layout_hash);
            w.u8(u8::from(ub.only_has_resources));
            w.u32(ub.constant_data_slot.unwrap_or(u32::MAX));
            w.u16(ub.resources.len() as u16);
            for member in &ub.resources {
                w.str(&member.name);
                w.u8(member_kind_code(member.kind));
                w.u16(member.resource_index as u16);
            }
        }

        w.u16(self.packed_globals.len() as u16);
        for global in &self.packed_globals {
            w.str(&global.name);
            w.u8(global.bucket.tag() as u8);
            w.u32(global.offset);
            w.u32(global.count);
        }

        w.u16(self.packed_arrays.len() as u16);
        for bucket in &self.packed_arrays {
            w.u8(bucket.type_tag.tag() as u8);
            w.u32(bucket.size_bytes);
        }

        w.u16(self.packed_buffers.len() as u16);
        for pb in &self.packed_buffers {
            w.str(&pb.name);
            w.u32(pb.buffer_index);
        }

        w.u16(self.copy_ranges.len() as u16);
        for copy in &self.copy_ranges {
            w.u16(copy.source_buffer as u16);
            w.u32(copy.source_offset);
            w.u8(copy.dest_bucket.tag() as u8);
            w.u32(copy.dest_offset);
            w.u32(copy.count);
        }

        w.u16(self.input_attachments.len() as u16);
        for attachment in &self.input_attachments {
            w.str(&attachment.name);
            w.u32(attachment.slot);
        }

        w.finish()
    }

    /// Emits the human-readable annotation block mirroring this header.
    ///
    /// One `// @Category:` line per non-empty category; see the parser in
    /// [`crate::annotated`] for the grammar.
    pub fn annotate(&self) -> String {
        let mut out = String::new();

        emit_io_line(&mut out, "Inputs", &self.inputs);
        emit_io_line(&mut out, "Outputs", &self.outputs);

        let blocks: Vec<String> = self
            .uniform_buffers
            .iter()
            .filter_map(|ub| {
                ub.constant_data_slot
                    .map(|slot| format!("{}({})", ub.name, slot))
            })
            .collect();
        emit_line(&mut out, "UniformBlocks", &blocks);

        let srvs: Vec<String> = self
            .globals
            .iter()
            .filter(|g| !g.writable)
            .map(|g| format!("{}({}:{})", g.name, g.slot, g.count))
            .collect();
        emit_line(&mut out, "Samplers", &srvs);

        let uavs: Vec<String> = self
            .globals
            .iter()
            .filter(|g| g.writable)
            .map(|g| format!("{}({}:{})", g.name, g.slot, g.count))
            .collect();
        emit_line(&mut out, "UAVs", &uavs);

        let packed: Vec<String> = self
            .packed_globals
            .iter()
            .map(|g| format!("{}({}:{},{})", g.name, g.bucket, g.offset, g.count))
            .collect();
        emit_line(&mut out, "PackedGlobals", &packed);

        let copies: Vec<String> = self
            .copy_ranges
            .iter()
            .map(|c| {
                format!(
                    "{}:{}-{}:{}:{}",
                    c.source_buffer, c.source_offset, c.dest_bucket, c.dest_offset, c.count
                )
            })
            .collect();
        emit_line(&mut out, "PackedUBCopies", &copies);

        let attachments: Vec<String> = self
            .input_attachments
            .iter()
            .map(|a| format!("{}({})", a.name, a.slot))
            .collect();
        emit_line(&mut out, "InputAttachments", &attachments);

        if let Some(slot) = self.side_table_slot {
            emit_line(
                &mut out,
                "SideTable",
                &[format!("BufferSizes({slot})")],
            );
        }

        out
    }
}

fn assigned_slot(binding: &ResourceBinding) -> u32 {
    binding
        .assigned_slot
        .unwrap_or_else(|| panic!("binding `{}` reached header build unallocated", binding.name))
}

fn member_resources(table: &ResourceTableIndex<'_>, buffer: &str) -> Vec<UbResourceInfo> {
    table
        .members_of(buffer)
        .map(|(name, entry)| UbResourceInfo {
            name: name.to_owned(),
            kind: entry.kind,
            resource_index: entry.resource_index,
        })
        .collect()
}

fn emit_io_line(out: &mut String, category: &str, vars: &[InterfaceVariable]) {
    let entries: Vec<String> = vars
        .iter()
        .map(|v| format!("{};{}:{}", v.shape.type_tag(), v.location, v.name))
        .collect();
    emit_line(out, category, &entries);
}

fn emit_line(out: &mut String, category: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    out.push_str("// @");
    out.push_str(category);
    out.push_str(": ");
    out.push_str(&entries.join(","));
    out.push('\n');
}

const fn stage_code(stage: ShaderStage) -> u8 {
    match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Pixel => 1,
        ShaderStage::Hull => 2,
        ShaderStage::Domain => 3,
        ShaderStage::Geometry => 4,
        ShaderStage::Compute => 5,
    }
}

const fn kind_code(kind: BindingKind) -> u8 {
    match kind {
        BindingKind::UniformBuffer => 0,
        BindingKind::Sampler => 1,
        BindingKind::SampledTexture => 2,
        BindingKind::StorageTexture => 3,
        BindingKind::UniformTexelBuffer => 4,
        BindingKind::StorageTexelBuffer => 5,
        BindingKind::StorageBuffer => 6,
        BindingKind::InputAttachment => 7,
        BindingKind::PackedGlobalArray => 8,
    }
}

const fn member_kind_code(kind: ResourceTableEntryKind) -> u8 {
    match kind {
        ResourceTableEntryKind::Texture => 0,
        ResourceTableEntryKind::Sampler => 1,
        ResourceTableEntryKind::Buffer => 2,
        ResourceTableEntryKind::Uav => 3,
    }
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.out.extend_from_slice(v);
    }
    fn str(&mut self, v: &str) {
        self.u16(v.len() as u16);
        self.out.extend_from_slice(v.as_bytes());
    }
    fn interface_variable(&mut self, var: &InterfaceVariable) {
        self.str(&var.name);
        self.u16(var.location as u16);
        self.shape(&var.shape);
    }
    fn shape(&mut self, shape: &NumericShape) {
        self.u8(shape.base.tag() as u8);
        self.u8(shape.components);
        self.u8(shape.columns.unwrap_or(0));
    }
    fn finish(self) -> Vec<u8> {
        self.out
    }
}

/// Convenience: does a serialized blob carry the header magic?
pub fn is_serialized_header(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == HEADER_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::NumericBaseType;
    use pretty_assertions::assert_eq;

    fn sample_header() -> ShaderHeader {
        ShaderHeader {
            stage: ShaderStage::Pixel,
            source_hash: 0x1122_3344_5566_7788,
            ir_checksum: 0x99AA_BBCC_DDEE_FF00,
            inputs: vec![InterfaceVariable {
                name: "in_ATTRIBUTE7".into(),
                semantic: "ATTRIBUTE7".into(),
                location: 7,
                shape: NumericShape {
                    base: NumericBaseType::Float,
                    components: 4,
                    columns: None,
                },
                location_word: None,
            }],
            outputs: Vec::new(),
            input_mask: 1 << 7,
            output_mask: 0,
            globals: vec![
                GlobalResource {
                    name: "Scene".into(),
                    kind: BindingKind::SampledTexture,
                    slot: 0,
                    count: 1,
                    writable: false,
                },
                GlobalResource {
                    name: "RWOut".into(),
                    kind: BindingKind::StorageTexture,
                    slot: 0,
                    count: 1,
                    writable: true,
                },
            ],
            uniform_buffers: vec![UniformBufferInfo {
                name: "View".into(),
                layout_hash: 0xDEAD_BEEF,
                only_has_resources: false,
                constant_data_slot: Some(1),
                resources: Vec::new(),
            }],
            packed_globals: Vec::new(),
            packed_arrays: Vec::new(),
            packed_buffers: Vec::new(),
            copy_ranges: Vec::new(),
            input_attachments: Vec::new(),
            side_table_slot: Some(2),
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        let header = sample_header();
        assert_eq!(header.serialize(), header.serialize());
        assert_eq!(header.serialize(), sample_header().serialize());
    }

    #[test]
    fn serialized_blob_carries_magic_and_version() {
        let bytes = sample_header().serialize();
        assert!(is_serialized_header(&bytes));
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), HEADER_VERSION);
    }

    #[test]
    fn annotation_block_lists_non_empty_categories_once() {
        let text = sample_header().annotate();
        assert!(text.contains("// @Inputs: f4;7:in_ATTRIBUTE7\n"), "{text}");
        assert!(text.contains("// @UniformBlocks: View(1)\n"), "{text}");
        assert!(text.contains("// @Samplers: Scene(0:1)\n"), "{text}");
        assert!(text.contains("// @UAVs: RWOut(0:1)\n"), "{text}");
        assert!(text.contains("// @SideTable: BufferSizes(2)\n"), "{text}");
        assert!(!text.contains("@PackedGlobals"), "{text}");
        assert!(!text.contains("@InputAttachments"), "{text}");
    }
}
