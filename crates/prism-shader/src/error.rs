use std::fmt;

use thiserror::Error;

use crate::reflect::BindingKind;
use crate::slots::SlotSpace;

/// Errors that abort a single shader stage's compile.
///
/// These are *user-facing* conditions (malformed IR, resource limits);
/// invariant violations inside the pipeline itself assert instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShaderCompileError {
    /// The IR blob is neither SPIR-V nor an annotated text module.
    #[error("unrecognized IR container format (expected SPIR-V or an annotated text module)")]
    UnknownIrFormat,

    /// The SPIR-V blob failed to parse or scan.
    #[error("malformed SPIR-V module: {0}")]
    Spirv(#[from] prism_spirv::SpirvError),

    /// The annotated text module failed to parse.
    #[error("malformed annotation header at line {line}: {message}")]
    MalformedAnnotation {
        /// 1-based line number within the module text.
        line: u32,
        /// What went wrong.
        message: String,
    },

    /// The module declares no entry point for the requested stage.
    #[error("module has no entry point for the {stage} stage")]
    MissingEntryPoint {
        /// The requested stage.
        stage: crate::stage::ShaderStage,
    },

    /// A bound resource carries no debug name, so it cannot be matched to
    /// the resource tables or serialized into the header.
    #[error("resource id {id} has no debug name; reflection requires named resources")]
    UnnamedResource {
        /// The nameless result id.
        id: u32,
    },

    /// More sampler states are accessed than the hard platform limit.
    #[error("shader accesses {requested} sampler states, exceeding the maximum of {limit}")]
    SamplerLimitExceeded {
        /// Number of distinct sampler states the shader accesses.
        requested: u32,
        /// The hard limit.
        limit: u32,
    },

    /// A slot pool ran dry while assigning a resource.
    #[error(
        "exceeded available {space} binding slots for this target while \
         assigning {kind} resource `{name}` ({limit} slots)"
    )]
    SlotsExhausted {
        /// Name of the resource that could not be placed.
        name: String,
        /// Reflected kind of that resource.
        kind: BindingKind,
        /// The slot space that ran dry.
        space: SlotSpace,
        /// Width of that slot space.
        limit: u32,
    },

    /// Interface variables could not all be given distinct locations.
    #[error(
        "interface variable `{name}` could not be assigned a location \
         (all {limit} locations are in use)"
    )]
    LocationsExhausted {
        /// The variable that could not be placed.
        name: String,
        /// Total number of locations.
        limit: u32,
    },

    /// The environment's resource table is missing an entry the module
    /// references. This indicates an inconsistent upstream table, which is a
    /// hard compile error rather than a recoverable condition.
    #[error(
        "resource table has no entry for uniform buffer `{uniform_buffer}` \
         resource index {resource_index}"
    )]
    MissingResourceTableEntry {
        /// The owning uniform buffer name.
        uniform_buffer: String,
        /// The member resource index that failed to resolve.
        resource_index: u32,
    },
}

/// One structured compiler-error record, attached to a shader stage's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerError {
    /// Virtual file path of the shader source (or module label).
    pub file_path: String,
    /// 1-based line number, or 0 when the error has no line association.
    pub line_number: u32,
    /// Human-readable message.
    pub message: String,
}

impl CompilerError {
    /// Builds a record with no line association.
    pub fn new(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            line_number: 0,
            message: message.into(),
        }
    }

    /// Builds a record from a compile error, picking up the line number for
    /// annotation parse errors.
    pub fn from_error(file_path: impl Into<String>, err: &ShaderCompileError) -> Self {
        let line_number = match err {
            ShaderCompileError::MalformedAnnotation { line, .. } => *line,
            _ => 0,
        };
        Self {
            file_path: file_path.into(),
            line_number,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line_number > 0 {
            write!(f, "{}({}): {}", self.file_path, self.line_number, self.message)
        } else {
            write!(f, "{}: {}", self.file_path, self.message)
        }
    }
}
