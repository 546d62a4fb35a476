use thiserror::Error;

/// Errors produced while parsing, scanning, or patching a SPIR-V module.
///
/// All of these are *input* errors: they indicate a malformed or unsupported
/// blob, never a bug in the caller. Parsing is strict about bounds, so any
/// offset that would leave the module surfaces here instead of panicking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpirvError {
    /// The blob length is not a whole number of 32-bit words.
    #[error("SPIR-V blob length {len} is not a multiple of 4 bytes")]
    UnalignedLength {
        /// Blob length in bytes.
        len: usize,
    },

    /// The blob is too short to contain the five-word SPIR-V header.
    #[error("SPIR-V module is truncated: need at least {needed} words, got {got}")]
    Truncated {
        /// Minimum word count required.
        needed: usize,
        /// Word count actually present.
        got: usize,
    },

    /// The magic number is not the SPIR-V magic in either byte order.
    #[error("bad SPIR-V magic 0x{magic:08x}")]
    BadMagic {
        /// The first word of the blob.
        magic: u32,
    },

    /// The magic number is the SPIR-V magic with swapped endianness.
    ///
    /// Byte-swapped modules are legal SPIR-V but not produced by any frontend
    /// this pipeline consumes, so they are rejected rather than converted.
    #[error("byte-swapped SPIR-V modules are not supported (magic 0x{magic:08x})")]
    ByteSwapped {
        /// The first word of the blob.
        magic: u32,
    },

    /// The module header declares an id bound above the supported maximum.
    #[error("SPIR-V id bound {bound} exceeds the maximum {max}")]
    IdBoundTooLarge {
        /// Declared id bound.
        bound: u32,
        /// Supported maximum.
        max: u32,
    },

    /// The module contains more words than the supported maximum.
    #[error("SPIR-V module word count {words} exceeds the maximum {max}")]
    ModuleTooLarge {
        /// Word count of the blob.
        words: usize,
        /// Supported maximum.
        max: usize,
    },

    /// An instruction declared a word count of zero, which can never be valid
    /// and would stall stream iteration.
    #[error("instruction at word {word_offset} has zero word count")]
    ZeroWordCount {
        /// Word offset of the offending instruction.
        word_offset: usize,
    },

    /// An instruction's declared word count runs past the end of the module.
    #[error("instruction at word {word_offset} (opcode {opcode}) runs past the end of the module")]
    InstructionOutOfBounds {
        /// Word offset of the offending instruction.
        word_offset: usize,
        /// Opcode of the offending instruction.
        opcode: u16,
    },

    /// An instruction is shorter than its opcode's mandatory operands.
    #[error("instruction at word {word_offset} (opcode {opcode}) is missing operand {operand}")]
    MissingOperand {
        /// Word offset of the offending instruction.
        word_offset: usize,
        /// Opcode of the offending instruction.
        opcode: u16,
        /// Zero-based operand index that was expected.
        operand: usize,
    },

    /// A string literal operand was not NUL-terminated within its instruction.
    #[error("unterminated string literal in instruction at word {word_offset}")]
    UnterminatedString {
        /// Word offset of the offending instruction.
        word_offset: usize,
    },

    /// A string literal operand was not valid UTF-8.
    #[error("string literal in instruction at word {word_offset} is not valid UTF-8")]
    InvalidString {
        /// Word offset of the offending instruction.
        word_offset: usize,
    },

    /// A result id is not below the module's declared id bound.
    #[error("id {id} in instruction at word {word_offset} is not below the declared id bound {bound}")]
    IdAboveBound {
        /// The out-of-range id.
        id: u32,
        /// Word offset of the instruction that produced it.
        word_offset: usize,
        /// The module's declared id bound.
        bound: u32,
    },

    /// A patch write targeted a word outside the module.
    #[error("patch offset {word_offset} is outside the module ({words} words)")]
    PatchOutOfBounds {
        /// Requested word offset.
        word_offset: usize,
        /// Total module word count.
        words: usize,
    },

    /// A patch write targeted the five-word module header.
    #[error("patch offset {word_offset} points into the SPIR-V header")]
    PatchIntoHeader {
        /// Requested word offset.
        word_offset: usize,
    },
}
