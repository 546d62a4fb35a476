use core::fmt::Write as _;

use crate::error::SpirvError;

/// The SPIR-V magic number in host order.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The SPIR-V magic number as it appears in a byte-swapped module.
const SPIRV_MAGIC_SWAPPED: u32 = 0x0302_2307;

/// Word count of the fixed SPIR-V module header
/// (magic, version, generator, bound, schema).
pub(crate) const SPIRV_HEADER_WORDS: usize = 5;

// Hard caps on module size and declared id bound to avoid unbounded work on
// hostile input. Real-world shader modules are a few thousand words with id
// bounds in the low thousands; these values are intentionally generous.
const MAX_MODULE_WORDS: usize = 4 * 1024 * 1024; // 16 MiB of words
const MAX_ID_BOUND: u32 = 1 << 22;

/// The fixed header of a SPIR-V module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpirvHeader {
    /// SPIR-V version, major in the high byte pair (e.g. `(1, 3)`).
    pub version: (u8, u8),
    /// Generator magic as emitted by the producing frontend.
    pub generator: u32,
    /// Declared id bound; all ids in the module are below this value.
    pub id_bound: u32,
}

/// One instruction in a parsed module's stream.
///
/// This is a *position*, not a copy: operand values are read back through
/// [`SpirvModule::operand`] and friends so the module stays zero-copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpirvInstruction {
    /// The instruction's opcode.
    pub opcode: u16,
    /// Word offset of the instruction's first word within the module.
    pub word_offset: usize,
    /// Total word count of the instruction, including the opcode word.
    pub word_count: u16,
}

impl SpirvInstruction {
    /// Word offset of operand `index` (zero-based, first word after the
    /// opcode word) within the module.
    pub fn operand_offset(&self, index: usize) -> usize {
        self.word_offset + 1 + index
    }

    /// Number of operand words in this instruction.
    pub fn operand_count(&self) -> usize {
        usize::from(self.word_count).saturating_sub(1)
    }
}

/// A parsed SPIR-V module.
///
/// Parsing is strict: the header is validated, and the whole instruction
/// stream is walked once up front so that iteration never runs out of
/// bounds. The input is treated as **untrusted** and parsing never panics on
/// malformed data.
#[derive(Debug, Clone)]
pub struct SpirvModule<'a> {
    bytes: &'a [u8],
    header: SpirvHeader,
    word_count: usize,
}

impl<'a> SpirvModule<'a> {
    /// Parses a SPIR-V module from `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<SpirvModule<'a>, SpirvError> {
        if bytes.len() % 4 != 0 {
            return Err(SpirvError::UnalignedLength { len: bytes.len() });
        }
        let word_count = bytes.len() / 4;
        if word_count < SPIRV_HEADER_WORDS {
            return Err(SpirvError::Truncated {
                needed: SPIRV_HEADER_WORDS,
                got: word_count,
            });
        }
        if word_count > MAX_MODULE_WORDS {
            return Err(SpirvError::ModuleTooLarge {
                words: word_count,
                max: MAX_MODULE_WORDS,
            });
        }

        let magic = read_word(bytes, 0);
        if magic != SPIRV_MAGIC {
            if magic == SPIRV_MAGIC_SWAPPED {
                return Err(SpirvError::ByteSwapped { magic });
            }
            return Err(SpirvError::BadMagic { magic });
        }

        let version_word = read_word(bytes, 1);
        let generator = read_word(bytes, 2);
        let id_bound = read_word(bytes, 3);
        if id_bound > MAX_ID_BOUND {
            return Err(SpirvError::IdBoundTooLarge {
                bound: id_bound,
                max: MAX_ID_BOUND,
            });
        }

        let module = SpirvModule {
            bytes,
            header: SpirvHeader {
                version: ((version_word >> 16) as u8, (version_word >> 8) as u8),
                generator,
                id_bound,
            },
            word_count,
        };

        // Walk the stream once so later iteration is infallible.
        let mut offset = SPIRV_HEADER_WORDS;
        while offset < word_count {
            let first = module.word(offset);
            let wc = (first >> 16) as usize;
            let opcode = first as u16;
            if wc == 0 {
                return Err(SpirvError::ZeroWordCount { word_offset: offset });
            }
            if offset + wc > word_count {
                return Err(SpirvError::InstructionOutOfBounds {
                    word_offset: offset,
                    opcode,
                });
            }
            offset += wc;
        }

        Ok(module)
    }

    /// Returns the parsed module header.
    pub fn header(&self) -> &SpirvHeader {
        &self.header
    }

    /// Returns the raw module bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Total word count of the module, including the header.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Reads the word at `offset`. Panics if `offset` is out of bounds; all
    /// offsets produced by this module's own iteration are in bounds.
    pub fn word(&self, offset: usize) -> u32 {
        read_word(self.bytes, offset)
    }

    /// Iterates over all instructions in stream order.
    pub fn instructions(&self) -> impl Iterator<Item = SpirvInstruction> + '_ {
        InstructionIter {
            module: self,
            offset: SPIRV_HEADER_WORDS,
        }
    }

    /// Reads operand `index` (zero-based) of `inst`, if present.
    pub fn operand(&self, inst: SpirvInstruction, index: usize) -> Option<u32> {
        if index >= inst.operand_count() {
            return None;
        }
        Some(self.word(inst.operand_offset(index)))
    }

    /// Reads operand `index` of `inst`, failing with [`SpirvError::MissingOperand`]
    /// if the instruction is too short.
    pub fn required_operand(
        &self,
        inst: SpirvInstruction,
        index: usize,
    ) -> Result<u32, SpirvError> {
        self.operand(inst, index).ok_or(SpirvError::MissingOperand {
            word_offset: inst.word_offset,
            opcode: inst.opcode,
            operand: index,
        })
    }

    /// Decodes a NUL-terminated string literal starting at operand
    /// `first_index` of `inst`.
    ///
    /// Returns the string and the operand index of the first word *after*
    /// the literal (SPIR-V packs four bytes per word, NUL padding included).
    pub fn string_operand(
        &self,
        inst: SpirvInstruction,
        first_index: usize,
    ) -> Result<(String, usize), SpirvError> {
        let mut bytes = Vec::new();
        let mut index = first_index;
        loop {
            let word = self
                .operand(inst, index)
                .ok_or(SpirvError::UnterminatedString {
                    word_offset: inst.word_offset,
                })?;
            index += 1;
            for b in word.to_le_bytes() {
                if b == 0 {
                    let text = String::from_utf8(bytes).map_err(|_| SpirvError::InvalidString {
                        word_offset: inst.word_offset,
                    })?;
                    return Ok((text, index));
                }
                bytes.push(b);
            }
        }
    }

    /// Returns a human-readable summary of the module and its instruction
    /// stream, for diagnostics.
    pub fn debug_summary(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            &mut out,
            "SPIR-V {}.{} generator=0x{:08x} bound={} words={}",
            self.header.version.0,
            self.header.version.1,
            self.header.generator,
            self.header.id_bound,
            self.word_count,
        );
        for (idx, inst) in self.instructions().enumerate() {
            let _ = write!(
                &mut out,
                "\n  [{idx:04}] @{} op={} wc={}",
                inst.word_offset, inst.opcode, inst.word_count
            );
        }
        out
    }
}

struct InstructionIter<'m, 'a> {
    module: &'m SpirvModule<'a>,
    offset: usize,
}

impl Iterator for InstructionIter<'_, '_> {
    type Item = SpirvInstruction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.module.word_count {
            return None;
        }
        let first = self.module.word(self.offset);
        let word_count = (first >> 16) as u16;
        let inst = SpirvInstruction {
            opcode: first as u16,
            word_offset: self.offset,
            word_count,
        };
        // Validated at parse time; word_count >= 1 and in bounds.
        self.offset += usize::from(word_count);
        Some(inst)
    }
}

fn read_word(bytes: &[u8], word_offset: usize) -> u32 {
    let base = word_offset * 4;
    u32::from_le_bytes([
        bytes[base],
        bytes[base + 1],
        bytes[base + 2],
        bytes[base + 3],
    ])
}
