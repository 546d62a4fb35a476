//! Builders for synthetic SPIR-V modules used in tests.

use crate::spv::op;

/// Builds a minimal, structurally valid SPIR-V module word by word.
///
/// The builder emits instructions in the order its methods are called;
/// callers are responsible for respecting SPIR-V section ordering where a
/// test depends on it (names and decorations before types, types before
/// variables). The id bound is computed automatically.
///
/// The resulting blob has a valid header (version 1.3, zero generator) and a
/// self-consistent instruction stream, which is all the parser validates.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    words: Vec<u32>,
    next_id: u32,
}

impl ModuleBuilder {
    /// Creates an empty module builder.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocates a fresh result id.
    pub fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Appends a raw instruction.
    pub fn op(&mut self, opcode: u16, operands: &[u32]) {
        let word_count = 1 + operands.len();
        let word_count = u32::try_from(word_count).expect("instruction too long");
        assert!(word_count <= 0xFFFF, "instruction too long");
        self.words.push((word_count << 16) | u32::from(opcode));
        self.words.extend_from_slice(operands);
    }

    /// Appends `OpName %target "name"`.
    pub fn op_name(&mut self, target: u32, name: &str) {
        let mut operands = vec![target];
        push_string(&mut operands, name);
        self.op(op::NAME, &operands);
    }

    /// Appends `OpEntryPoint`.
    pub fn op_entry_point(
        &mut self,
        execution_model: u32,
        entry: u32,
        name: &str,
        interface: &[u32],
    ) {
        let mut operands = vec![execution_model, entry];
        push_string(&mut operands, name);
        operands.extend_from_slice(interface);
        self.op(op::ENTRY_POINT, &operands);
    }

    /// Appends `OpDecorate %target decoration literals...`.
    pub fn op_decorate(&mut self, target: u32, decoration: u32, literals: &[u32]) {
        let mut operands = vec![target, decoration];
        operands.extend_from_slice(literals);
        self.op(op::DECORATE, &operands);
    }

    /// Appends `OpTypeVoid` and returns its id.
    pub fn type_void(&mut self) -> u32 {
        let id = self.id();
        self.op(op::TYPE_VOID, &[id]);
        id
    }

    /// Appends `OpTypeBool` and returns its id.
    pub fn type_bool(&mut self) -> u32 {
        let id = self.id();
        self.op(op::TYPE_BOOL, &[id]);
        id
    }

    /// Appends `OpTypeFloat` and returns its id.
    pub fn type_float(&mut self, width: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_FLOAT, &[id, width]);
        id
    }

    /// Appends `OpTypeInt` and returns its id.
    pub fn type_int(&mut self, width: u32, signed: bool) -> u32 {
        let id = self.id();
        self.op(op::TYPE_INT, &[id, width, u32::from(signed)]);
        id
    }

    /// Appends `OpTypeVector` and returns its id.
    pub fn type_vector(&mut self, component: u32, count: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_VECTOR, &[id, component, count]);
        id
    }

    /// Appends `OpTypeMatrix` and returns its id.
    pub fn type_matrix(&mut self, column: u32, columns: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_MATRIX, &[id, column, columns]);
        id
    }

    /// Appends `OpTypeImage` with the given sampled type, dimensionality and
    /// `Sampled` operand (`1` = sampled, `2` = storage), and returns its id.
    pub fn type_image(&mut self, sampled_type: u32, dim: u32, sampled: u32) -> u32 {
        let id = self.id();
        // depth = 0, arrayed = 0, ms = 0, format = Unknown (0).
        self.op(op::TYPE_IMAGE, &[id, sampled_type, dim, 0, 0, 0, sampled, 0]);
        id
    }

    /// Appends `OpTypeSampler` and returns its id.
    pub fn type_sampler(&mut self) -> u32 {
        let id = self.id();
        self.op(op::TYPE_SAMPLER, &[id]);
        id
    }

    /// Appends `OpTypeSampledImage` and returns its id.
    pub fn type_sampled_image(&mut self, image: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_SAMPLED_IMAGE, &[id, image]);
        id
    }

    /// Appends `OpTypeStruct` and returns its id.
    pub fn type_struct(&mut self, members: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![id];
        operands.extend_from_slice(members);
        self.op(op::TYPE_STRUCT, &operands);
        id
    }

    /// Appends `OpTypeRuntimeArray` and returns its id.
    pub fn type_runtime_array(&mut self, element: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_RUNTIME_ARRAY, &[id, element]);
        id
    }

    /// Appends `OpTypePointer` and returns its id.
    pub fn type_pointer(&mut self, storage_class: u32, pointee: u32) -> u32 {
        let id = self.id();
        self.op(op::TYPE_POINTER, &[id, storage_class, pointee]);
        id
    }

    /// Appends `OpVariable` of the given pointer type and returns its id.
    pub fn variable(&mut self, pointer_type: u32, storage_class: u32) -> u32 {
        let id = self.id();
        self.op(op::VARIABLE, &[pointer_type, id, storage_class]);
        id
    }

    /// Finalizes the module: emits the header (with the computed id bound)
    /// followed by the instruction stream, as little-endian bytes.
    pub fn build(self) -> Vec<u8> {
        let mut words = Vec::with_capacity(5 + self.words.len());
        words.push(crate::module::SPIRV_MAGIC);
        words.push(0x0001_0300); // version 1.3
        words.push(0); // generator
        words.push(self.next_id); // id bound
        words.push(0); // schema
        words.extend_from_slice(&self.words);

        let mut bytes = Vec::with_capacity(words.len() * 4);
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

fn push_string(operands: &mut Vec<u32>, text: &str) {
    let bytes = text.as_bytes();
    for chunk_start in (0..=bytes.len()).step_by(4) {
        let mut word = [0u8; 4];
        let end = (chunk_start + 4).min(bytes.len());
        word[..end - chunk_start].copy_from_slice(&bytes[chunk_start..end]);
        operands.push(u32::from_le_bytes(word));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpirvModule;

    #[test]
    fn build_roundtrips_through_parser() {
        let mut b = ModuleBuilder::new();
        let f32_ty = b.type_float(32);
        let vec4 = b.type_vector(f32_ty, 4);
        let ptr = b.type_pointer(1, vec4);
        let var = b.variable(ptr, 1);
        let bytes = b.build();

        let module = SpirvModule::parse(&bytes).expect("built module should parse");
        assert_eq!(module.header().id_bound, var + 1);
        assert_eq!(module.instructions().count(), 4);
    }

    #[test]
    fn string_padding_is_nul_terminated() {
        // A 4-byte name needs a second word holding the terminating NUL.
        let mut operands = Vec::new();
        push_string(&mut operands, "main");
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[1], 0);
    }
}
