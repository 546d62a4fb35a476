use crate::error::SpirvError;
use crate::module::{SpirvModule, SPIRV_HEADER_WORDS};

/// An owned, mutable copy of a SPIR-V module's words.
///
/// Word offsets come from [`crate::DecorationRecord::literal_word_offset`];
/// writes are bounds-checked and may not touch the five-word header, so a
/// bad offset surfaces as an error instead of corrupting the module.
#[derive(Debug, Clone)]
pub struct SpirvPatcher {
    words: Vec<u32>,
}

impl SpirvPatcher {
    /// Copies `module`'s words into an owned buffer for patching.
    pub fn new(module: &SpirvModule<'_>) -> Self {
        let words = (0..module.word_count()).map(|i| module.word(i)).collect();
        Self { words }
    }

    /// Parses and copies a module from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SpirvError> {
        Ok(Self::new(&SpirvModule::parse(bytes)?))
    }

    /// Total word count of the module.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Reads the word at `word_offset`, if in bounds.
    pub fn word(&self, word_offset: usize) -> Option<u32> {
        self.words.get(word_offset).copied()
    }

    /// Overwrites the word at `word_offset`.
    pub fn write_word(&mut self, word_offset: usize, value: u32) -> Result<(), SpirvError> {
        if word_offset < SPIRV_HEADER_WORDS {
            return Err(SpirvError::PatchIntoHeader { word_offset });
        }
        let words = self.words.len();
        match self.words.get_mut(word_offset) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SpirvError::PatchOutOfBounds { word_offset, words }),
        }
    }

    /// Serializes the patched module back to little-endian bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * 4);
        for word in self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}
