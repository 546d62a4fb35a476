use std::collections::BTreeMap;

use crate::error::SpirvError;
use crate::module::{SpirvInstruction, SpirvModule};
use crate::spv::{self, op, StorageClass};

/// One `OpDecorate` record.
///
/// `literal_word_offset` is the module word offset of the decoration's first
/// literal operand; for `Binding`, `DescriptorSet`, `Location` and
/// `InputAttachmentIndex` this is the exact word a patcher overwrites to
/// renumber the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationRecord {
    /// Decorated id.
    pub target: u32,
    /// Raw decoration enumerant.
    pub decoration: u32,
    /// First literal operand, if the decoration carries one.
    pub literal: Option<u32>,
    /// Module word offset of `literal`, when present.
    pub literal_word_offset: Option<usize>,
}

/// One module-scope `OpVariable` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRecord {
    /// The variable's result id.
    pub result_id: u32,
    /// The variable's pointer type id.
    pub type_id: u32,
    /// The variable's storage class.
    pub storage_class: StorageClass,
}

/// One `OpEntryPoint` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointRecord {
    /// Raw execution model enumerant.
    pub execution_model: u32,
    /// Id of the entry point function.
    pub entry_id: u32,
    /// Entry point name.
    pub name: String,
    /// Interface variable ids listed by the entry point.
    pub interface: Vec<u32>,
}

/// The subset of the SPIR-V type graph needed for binding classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRecord {
    /// `OpTypeVoid`.
    Void,
    /// `OpTypeBool`.
    Bool,
    /// `OpTypeInt`.
    Int {
        /// Bit width.
        width: u32,
        /// Signedness.
        signed: bool,
    },
    /// `OpTypeFloat`.
    Float {
        /// Bit width.
        width: u32,
    },
    /// `OpTypeVector`.
    Vector {
        /// Component type id.
        component: u32,
        /// Component count.
        count: u32,
    },
    /// `OpTypeMatrix`.
    Matrix {
        /// Column type id.
        column: u32,
        /// Column count.
        columns: u32,
    },
    /// `OpTypeImage`.
    Image {
        /// Sampled type id.
        sampled_type: u32,
        /// Dimensionality.
        dim: spv::Dim,
        /// Raw `Sampled` operand (`1` = sampled, `2` = storage).
        sampled: u32,
    },
    /// `OpTypeSampler`.
    Sampler,
    /// `OpTypeSampledImage`.
    SampledImage {
        /// Underlying image type id.
        image: u32,
    },
    /// `OpTypeArray` (length carried as an id; not resolved here).
    Array {
        /// Element type id.
        element: u32,
    },
    /// `OpTypeRuntimeArray`.
    RuntimeArray {
        /// Element type id.
        element: u32,
    },
    /// `OpTypeStruct`.
    Struct {
        /// Member type ids.
        members: Vec<u32>,
    },
    /// `OpTypePointer`.
    Pointer {
        /// Storage class of the pointer.
        storage_class: StorageClass,
        /// Pointee type id.
        pointee: u32,
    },
}

/// Reflection data collected in a single pass over a module.
///
/// Collections are keyed by id in `BTreeMap`s so that downstream iteration
/// is deterministic; `variables` preserves module declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// `OpName` strings by target id.
    pub names: BTreeMap<u32, String>,
    /// All `OpDecorate` records, in module order.
    pub decorations: Vec<DecorationRecord>,
    /// Module-scope variables, in module order.
    pub variables: Vec<VariableRecord>,
    /// Type declarations by result id.
    pub types: BTreeMap<u32, TypeRecord>,
    /// Entry points, in module order.
    pub entry_points: Vec<EntryPointRecord>,
}

impl ModuleInfo {
    /// Scans `module` and collects reflection data.
    pub fn scan(module: &SpirvModule<'_>) -> Result<Self, SpirvError> {
        let mut info = ModuleInfo::default();
        let bound = module.header().id_bound;

        for inst in module.instructions() {
            match inst.opcode {
                op::NAME => {
                    let target = module.required_operand(inst, 0)?;
                    check_id(target, inst, bound)?;
                    let (name, _) = module.string_operand(inst, 1)?;
                    info.names.insert(target, name);
                }
                op::ENTRY_POINT => {
                    let execution_model = module.required_operand(inst, 0)?;
                    let entry_id = module.required_operand(inst, 1)?;
                    check_id(entry_id, inst, bound)?;
                    let (name, next) = module.string_operand(inst, 2)?;
                    let mut interface = Vec::new();
                    for index in next..inst.operand_count() {
                        // Operand presence was just checked by the range.
                        let id = module.required_operand(inst, index)?;
                        check_id(id, inst, bound)?;
                        interface.push(id);
                    }
                    info.entry_points.push(EntryPointRecord {
                        execution_model,
                        entry_id,
                        name,
                        interface,
                    });
                }
                op::DECORATE => {
                    let target = module.required_operand(inst, 0)?;
                    check_id(target, inst, bound)?;
                    let decoration = module.required_operand(inst, 1)?;
                    let literal = module.operand(inst, 2);
                    let literal_word_offset = literal.is_some().then(|| inst.operand_offset(2));
                    info.decorations.push(DecorationRecord {
                        target,
                        decoration,
                        literal,
                        literal_word_offset,
                    });
                }
                op::VARIABLE => {
                    let type_id = module.required_operand(inst, 0)?;
                    let result_id = module.required_operand(inst, 1)?;
                    check_id(result_id, inst, bound)?;
                    let storage_class =
                        StorageClass::from_u32(module.required_operand(inst, 2)?);
                    // Function-local variables (storage class 7) never carry
                    // bindings; skip them so `variables` only holds
                    // module-scope interface state.
                    if storage_class.as_u32() != 7 {
                        info.variables.push(VariableRecord {
                            result_id,
                            type_id,
                            storage_class,
                        });
                    }
                }
                op::TYPE_VOID => {
                    info.insert_type(module, inst, 0, TypeRecord::Void)?;
                }
                op::TYPE_BOOL => {
                    info.insert_type(module, inst, 0, TypeRecord::Bool)?;
                }
                op::TYPE_INT => {
                    let ty = TypeRecord::Int {
                        width: module.required_operand(inst, 1)?,
                        signed: module.required_operand(inst, 2)? != 0,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_FLOAT => {
                    let ty = TypeRecord::Float {
                        width: module.required_operand(inst, 1)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_VECTOR => {
                    let ty = TypeRecord::Vector {
                        component: module.required_operand(inst, 1)?,
                        count: module.required_operand(inst, 2)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_MATRIX => {
                    let ty = TypeRecord::Matrix {
                        column: module.required_operand(inst, 1)?,
                        columns: module.required_operand(inst, 2)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_IMAGE => {
                    let ty = TypeRecord::Image {
                        sampled_type: module.required_operand(inst, 1)?,
                        dim: spv::Dim::from_u32(module.required_operand(inst, 2)?),
                        sampled: module.required_operand(inst, 6)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_SAMPLER => {
                    info.insert_type(module, inst, 0, TypeRecord::Sampler)?;
                }
                op::TYPE_SAMPLED_IMAGE => {
                    let ty = TypeRecord::SampledImage {
                        image: module.required_operand(inst, 1)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_ARRAY => {
                    let ty = TypeRecord::Array {
                        element: module.required_operand(inst, 1)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_RUNTIME_ARRAY => {
                    let ty = TypeRecord::RuntimeArray {
                        element: module.required_operand(inst, 1)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                op::TYPE_STRUCT => {
                    let members = (1..inst.operand_count())
                        .map(|i| module.required_operand(inst, i))
                        .collect::<Result<Vec<_>, _>>()?;
                    info.insert_type(module, inst, 0, TypeRecord::Struct { members })?;
                }
                op::TYPE_POINTER => {
                    let ty = TypeRecord::Pointer {
                        storage_class: StorageClass::from_u32(
                            module.required_operand(inst, 1)?,
                        ),
                        pointee: module.required_operand(inst, 2)?,
                    };
                    info.insert_type(module, inst, 0, ty)?;
                }
                _ => {}
            }
        }

        Ok(info)
    }

    fn insert_type(
        &mut self,
        module: &SpirvModule<'_>,
        inst: SpirvInstruction,
        result_operand: usize,
        ty: TypeRecord,
    ) -> Result<(), SpirvError> {
        let id = module.required_operand(inst, result_operand)?;
        check_id(id, inst, module.header().id_bound)?;
        self.types.insert(id, ty);
        Ok(())
    }

    /// Returns the `OpName` string for `id`, if any.
    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Returns the first decoration record of the given kind on `target`.
    pub fn decoration(&self, target: u32, decoration: u32) -> Option<&DecorationRecord> {
        self.decorations
            .iter()
            .find(|d| d.target == target && d.decoration == decoration)
    }

    /// Returns `true` if `target` carries the given decoration.
    pub fn has_decoration(&self, target: u32, decoration: u32) -> bool {
        self.decoration(target, decoration).is_some()
    }

    /// Resolves a variable's pointee type: follows the variable's pointer
    /// type and unwraps arrays (resource arrays reflect as their element).
    pub fn variable_pointee(&self, var: &VariableRecord) -> Option<&TypeRecord> {
        let mut ty = self.types.get(&var.type_id)?;
        if let TypeRecord::Pointer { pointee, .. } = ty {
            ty = self.types.get(pointee)?;
        }
        // Bounded unwrap depth; a hostile module can make the type graph
        // cyclic through forward id references.
        for _ in 0..16 {
            match ty {
                TypeRecord::Array { element } | TypeRecord::RuntimeArray { element } => {
                    ty = self.types.get(element)?;
                }
                other => return Some(other),
            }
        }
        None
    }
}

fn check_id(id: u32, inst: SpirvInstruction, bound: u32) -> Result<(), SpirvError> {
    if id == 0 || id >= bound {
        return Err(SpirvError::IdAboveBound {
            id,
            word_offset: inst.word_offset,
            bound,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spv::{decoration, execution_model};
    use crate::test_utils::ModuleBuilder;

    #[test]
    fn scan_collects_names_decorations_and_variables() {
        let mut b = ModuleBuilder::new();
        let f32_ty = b.type_float(32);
        let image = b.type_image(f32_ty, 1, spv::IMAGE_SAMPLED);
        let ptr = b.type_pointer(StorageClass::UniformConstant.as_u32(), image);
        let var = b.variable(ptr, StorageClass::UniformConstant.as_u32());
        b.op_name(var, "SceneTexture");
        b.op_decorate(var, decoration::DESCRIPTOR_SET, &[0]);
        b.op_decorate(var, decoration::BINDING, &[7]);
        let bytes = b.build();

        let module = SpirvModule::parse(&bytes).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();

        assert_eq!(info.name_of(var), Some("SceneTexture"));
        assert_eq!(info.variables.len(), 1);
        assert_eq!(
            info.variables[0].storage_class,
            StorageClass::UniformConstant
        );

        let binding = info.decoration(var, decoration::BINDING).unwrap();
        assert_eq!(binding.literal, Some(7));
        // The recorded word offset must point exactly at the literal.
        let offset = binding.literal_word_offset.unwrap();
        assert_eq!(module.word(offset), 7);

        match info.variable_pointee(&info.variables[0]).unwrap() {
            TypeRecord::Image { dim, sampled, .. } => {
                assert_eq!(*dim, spv::Dim::D2);
                assert_eq!(*sampled, spv::IMAGE_SAMPLED);
            }
            other => panic!("unexpected pointee {other:?}"),
        }
    }

    #[test]
    fn scan_collects_entry_points() {
        let mut b = ModuleBuilder::new();
        let main = b.id();
        let in_var = b.id();
        b.op_entry_point(execution_model::VERTEX, main, "main", &[in_var]);
        let bytes = b.build();

        let module = SpirvModule::parse(&bytes).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();
        assert_eq!(info.entry_points.len(), 1);
        assert_eq!(info.entry_points[0].name, "main");
        assert_eq!(info.entry_points[0].interface, vec![in_var]);
    }

    #[test]
    fn scan_rejects_ids_above_bound() {
        let mut b = ModuleBuilder::new();
        b.op_decorate(9999, decoration::BINDING, &[0]);
        let bytes = b.build();

        let module = SpirvModule::parse(&bytes).unwrap();
        assert!(matches!(
            ModuleInfo::scan(&module).unwrap_err(),
            SpirvError::IdAboveBound { id: 9999, .. }
        ));
    }

    #[test]
    fn variable_pointee_unwraps_arrays() {
        let mut b = ModuleBuilder::new();
        let f32_ty = b.type_float(32);
        let image = b.type_image(f32_ty, 1, spv::IMAGE_SAMPLED);
        let arr = b.type_runtime_array(image);
        let ptr = b.type_pointer(StorageClass::UniformConstant.as_u32(), arr);
        let _var = b.variable(ptr, StorageClass::UniformConstant.as_u32());
        let bytes = b.build();

        let module = SpirvModule::parse(&bytes).unwrap();
        let info = ModuleInfo::scan(&module).unwrap();
        assert!(matches!(
            info.variable_pointee(&info.variables[0]),
            Some(TypeRecord::Image { .. })
        ));
    }
}
