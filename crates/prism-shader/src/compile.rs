//! The per-stage compile driver.
//!
//! One [`compile_stage`] call is one unit of work: a single entry point on a
//! single target platform, operating entirely on job-private state. The job
//! moves through a fixed phase sequence - `Reflecting → Allocating →
//! Patching → HeaderBuilding → Serialized` - and any failure drops it into
//! `Failed` with the accumulated error records; no partial header escapes.

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use prism_spirv::{ModuleInfo, SpirvModule, SpirvPatcher};

use crate::allocator::BindingAllocator;
use crate::annotated::{is_annotated, parse_annotated};
use crate::binding_model::TargetDescriptor;
use crate::env::{CompilerEnvironment, CompilerFlags};
use crate::error::{CompilerError, ShaderCompileError};
use crate::header::ShaderHeader;
use crate::patch::{patch_bindings, patch_locations};
use crate::reflect::reflect_spirv;
use crate::stage::ShaderStage;

/// SPIR-V magic as leading little-endian bytes.
const SPIRV_MAGIC_BYTES: [u8; 4] = prism_spirv::SPIRV_MAGIC.to_le_bytes();

/// The phases a compile job moves through.
///
/// Transitions are strictly forward; [`CompilePhase::Serialized`] and
/// [`CompilePhase::Failed`] are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilePhase {
    Reflecting,
    Allocating,
    Patching,
    HeaderBuilding,
    Serialized,
    Failed,
}

/// Inputs to one stage compile.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    /// Compiled IR: SPIR-V words or an annotated text module.
    pub ir: &'a [u8],
    /// Preprocessed source, when available; feeds the header's source hash.
    pub source: Option<&'a str>,
    /// Virtual file path used in error records.
    pub file_path: &'a str,
    /// The compilation environment.
    pub environment: &'a CompilerEnvironment,
    /// Stage and platform to compile for.
    pub target: TargetDescriptor,
}

/// A successfully compiled stage: the patched IR plus its header.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    /// The compiled stage.
    pub stage: ShaderStage,
    /// Patched IR, same container format as the input.
    pub ir: Vec<u8>,
    /// The assembled header.
    pub header: ShaderHeader,
    /// The header's binary serialization.
    pub header_bytes: Vec<u8>,
    /// Debug annotation block, when [`CompilerFlags::ANNOTATE`] was set.
    pub annotations: Option<String>,
}

/// A failed stage compile: the phase it failed in and every error recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    /// The phase the job was in when it failed.
    pub phase: CompilePhase,
    /// Structured error records for this stage.
    pub errors: Vec<CompilerError>,
}

/// Tracks the job's phase and enforces legal transitions.
#[derive(Debug)]
struct JobState {
    phase: CompilePhase,
}

impl JobState {
    fn new() -> Self {
        Self {
            phase: CompilePhase::Reflecting,
        }
    }

    fn advance(&mut self, next: CompilePhase) {
        let legal = matches!(
            (self.phase, next),
            (CompilePhase::Reflecting, CompilePhase::Allocating)
                | (CompilePhase::Allocating, CompilePhase::Patching)
                | (CompilePhase::Patching, CompilePhase::HeaderBuilding)
                | (CompilePhase::HeaderBuilding, CompilePhase::Serialized)
        );
        assert!(legal, "illegal phase transition {:?} -> {next:?}", self.phase);
        self.phase = next;
    }

    fn fail(
        &mut self,
        file_path: &str,
        err: ShaderCompileError,
    ) -> CompileFailure {
        let failed_in = self.phase;
        self.phase = CompilePhase::Failed;
        CompileFailure {
            phase: failed_in,
            errors: vec![CompilerError::from_error(file_path, &err)],
        }
    }
}

/// Compiles one shader stage: reflect, allocate, patch, build the header,
/// serialize.
pub fn compile_stage(input: &CompileInput<'_>) -> Result<CompiledShader, CompileFailure> {
    let mut state = JobState::new();
    let stage = input.target.stage;
    let model = input.target.platform.model();
    let mut table = input.environment.index();

    let source_hash = input.source.map(|s| xxh3_64(s.as_bytes())).unwrap_or(0);
    let ir_checksum = xxh3_64(input.ir);

    // Reflecting.
    enum ParsedIr<'a> {
        Spirv(SpirvModule<'a>),
        Annotated { source: String },
    }

    let (parsed, mut reflection) = if input.ir.starts_with(&SPIRV_MAGIC_BYTES) {
        let module = match SpirvModule::parse(input.ir) {
            Ok(module) => module,
            Err(err) => return Err(state.fail(input.file_path, err.into())),
        };
        let info = match ModuleInfo::scan(&module) {
            Ok(info) => info,
            Err(err) => return Err(state.fail(input.file_path, err.into())),
        };
        let reflection = match reflect_spirv(&info, stage, &mut table) {
            Ok(reflection) => reflection,
            Err(err) => return Err(state.fail(input.file_path, err)),
        };
        (ParsedIr::Spirv(module), reflection)
    } else if is_annotated(input.ir) {
        let text = match std::str::from_utf8(input.ir) {
            Ok(text) => text,
            Err(_) => return Err(state.fail(input.file_path, ShaderCompileError::UnknownIrFormat)),
        };
        match parse_annotated(text, stage, &mut table) {
            Ok(module) => (
                ParsedIr::Annotated {
                    source: module.source,
                },
                module.reflection,
            ),
            Err(err) => return Err(state.fail(input.file_path, err)),
        }
    } else {
        return Err(state.fail(input.file_path, ShaderCompileError::UnknownIrFormat));
    };

    // Allocating.
    state.advance(CompilePhase::Allocating);
    let mut allocator = BindingAllocator::new(model.as_ref());
    if let Err(err) = allocator.allocate(&mut reflection.bindings, model.as_ref()) {
        return Err(state.fail(input.file_path, err));
    }

    // Patching. The side-table slot is read only after every named resource
    // has claimed its slot.
    state.advance(CompilePhase::Patching);
    let patched_spirv = match &parsed {
        ParsedIr::Spirv(module) => {
            let mut patcher = SpirvPatcher::new(module);
            if let Err(err) = patch_bindings(
                &mut patcher,
                &reflection.bindings,
                model.as_ref(),
                stage,
            ) {
                return Err(state.fail(input.file_path, err));
            }
            if let Err(err) = patch_locations(&mut patcher, &reflection.inputs)
                .and_then(|()| patch_locations(&mut patcher, &reflection.outputs))
            {
                return Err(state.fail(input.file_path, err));
            }
            Some(patcher.into_bytes())
        }
        ParsedIr::Annotated { .. } => None,
    };
    let side_table_slot = allocator.side_table_slot();

    // HeaderBuilding.
    state.advance(CompilePhase::HeaderBuilding);
    let header = match ShaderHeader::build(
        &reflection,
        &table,
        side_table_slot,
        source_hash,
        ir_checksum,
    ) {
        Ok(header) => header,
        Err(err) => return Err(state.fail(input.file_path, err)),
    };

    // Serialized. For annotated modules the patched IR is the re-emitted
    // annotation block followed by the untouched source body.
    state.advance(CompilePhase::Serialized);
    let ir = match (patched_spirv, &parsed) {
        (Some(bytes), _) => bytes,
        (None, ParsedIr::Annotated { source }) => {
            let mut out = header.annotate();
            out.push_str(source);
            out.into_bytes()
        }
        (None, ParsedIr::Spirv(_)) => unreachable!("SPIR-V path always produces patched words"),
    };
    let header_bytes = header.serialize();
    let annotations = input
        .environment
        .flags
        .contains(CompilerFlags::ANNOTATE)
        .then(|| header.annotate());

    debug!(
        %stage,
        platform = model.name(),
        bindings = reflection.bindings.len(),
        ir_bytes = ir.len(),
        "compiled shader stage"
    );

    Ok(CompiledShader {
        stage,
        ir,
        header,
        header_bytes,
        annotations,
    })
}
