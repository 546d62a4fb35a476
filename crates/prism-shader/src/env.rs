//! The compilation environment: resource tables, layout hashes, and flags.
//!
//! The environment is produced by the surrounding build system; this module
//! indexes it for the reflection pass. Maps are `BTreeMap`s because their
//! iteration order reaches serialized output and must be deterministic.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::error::ShaderCompileError;

bitflags! {
    /// Compiler flags that alter code generation or binding layout.
    ///
    /// Flags participate in the results-cache key; two compiles that differ
    /// in any flag never share an artifact.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompilerFlags: u32 {
        /// Keep debug info and names in the output.
        const DEBUG = 1 << 0;
        /// Disable fast-math contractions.
        const NO_FAST_MATH = 1 << 1;
        /// Flatten uniform buffers into packed global arrays.
        const FLATTEN_UNIFORM_BUFFERS = 1 << 2;
        /// Group Metal resources behind indirect argument buffers.
        const ARGUMENT_BUFFERS = 1 << 3;
        /// Emit the human-readable annotation block alongside the header.
        const ANNOTATE = 1 << 4;
    }
}

/// The type of a resource-table member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceTableEntryKind {
    /// A texture (SRV).
    Texture,
    /// A sampler state.
    Sampler,
    /// A typed or structured buffer (SRV).
    Buffer,
    /// A writable resource (UAV).
    Uav,
}

/// One resource-table member: a named resource living logically inside a
/// uniform buffer, bound separately on every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTableEntry {
    /// The owning uniform buffer's name.
    pub uniform_buffer: String,
    /// The member's kind.
    pub kind: ResourceTableEntryKind,
    /// The member's index within the owning buffer's resource table.
    pub resource_index: u32,
}

/// The full compilation environment handed to a compile job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerEnvironment {
    /// Parameter name → resource-table entry.
    pub resource_table: BTreeMap<String, ResourceTableEntry>,
    /// Uniform buffer name → declared layout hash.
    pub layout_hashes: BTreeMap<String, u32>,
    /// Compiler flags for this job.
    pub flags: CompilerFlags,
}

impl CompilerEnvironment {
    /// Builds the lookup index over this environment.
    pub fn index(&self) -> ResourceTableIndex<'_> {
        ResourceTableIndex::new(self)
    }
}

/// A resolved member lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTableRef<'a> {
    /// The member's parameter name.
    pub name: &'a str,
    /// The member's kind.
    pub kind: ResourceTableEntryKind,
}

/// Index over the environment's resource tables.
///
/// Uniform buffers are numbered by the sorted order of all buffer names that
/// appear in the environment (resource-table owners and layout-hash keys),
/// which makes buffer indices stable across runs.
#[derive(Debug, Clone)]
pub struct ResourceTableIndex<'a> {
    env: &'a CompilerEnvironment,
    buffer_names: Vec<&'a str>,
    used_buffers: u32,
}

impl<'a> ResourceTableIndex<'a> {
    fn new(env: &'a CompilerEnvironment) -> Self {
        let mut buffer_names: Vec<&str> = env
            .layout_hashes
            .keys()
            .map(String::as_str)
            .chain(env.resource_table.values().map(|e| e.uniform_buffer.as_str()))
            .collect();
        buffer_names.sort_unstable();
        buffer_names.dedup();

        Self {
            env,
            buffer_names,
            used_buffers: 0,
        }
    }

    /// Number of distinct uniform buffers known to the environment.
    pub fn buffer_count(&self) -> usize {
        self.buffer_names.len()
    }

    /// The stable index of `uniform_buffer`, if known.
    pub fn buffer_index(&self, uniform_buffer: &str) -> Option<u32> {
        self.buffer_names
            .binary_search(&uniform_buffer)
            .ok()
            .map(|i| i as u32)
    }

    /// The buffer name at `buffer_index` in the stable ordering.
    pub fn buffer_name(&self, buffer_index: u32) -> Option<&'a str> {
        self.buffer_names.get(buffer_index as usize).copied()
    }

    /// The declared layout hash for `uniform_buffer` (0 when not declared).
    pub fn layout_hash(&self, uniform_buffer: &str) -> u32 {
        self.env
            .layout_hashes
            .get(uniform_buffer)
            .copied()
            .unwrap_or(0)
    }

    /// Resolves a parameter name to its owning buffer and resource index.
    pub fn entry_of(&self, name: &str) -> Option<(&'a str, u32)> {
        self.env
            .resource_table
            .get(name)
            .map(|entry| (entry.uniform_buffer.as_str(), entry.resource_index))
    }

    /// Resolves member `resource_index` of `uniform_buffer`.
    ///
    /// Failure means the upstream table is internally inconsistent, which is
    /// a hard compile error for this stage.
    pub fn lookup(
        &self,
        uniform_buffer: &str,
        resource_index: u32,
    ) -> Result<ResourceTableRef<'a>, ShaderCompileError> {
        self.env
            .resource_table
            .iter()
            .find(|(_, entry)| {
                entry.uniform_buffer == uniform_buffer && entry.resource_index == resource_index
            })
            .map(|(name, entry)| ResourceTableRef {
                name,
                kind: entry.kind,
            })
            .ok_or_else(|| ShaderCompileError::MissingResourceTableEntry {
                uniform_buffer: uniform_buffer.to_owned(),
                resource_index,
            })
    }

    /// All members of `uniform_buffer`, ordered by resource index (the source
    /// table order, which copy-info generation depends on).
    pub fn members_of(
        &self,
        uniform_buffer: &str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceTableEntry)> + '_ {
        // BTreeMap iteration is name-ordered; re-sort by resource index.
        let mut members: Vec<_> = self
            .env
            .resource_table
            .iter()
            .filter(move |(_, entry)| entry.uniform_buffer == uniform_buffer)
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        members.sort_by_key(|(_, entry)| entry.resource_index);
        members.into_iter()
    }

    /// Marks `uniform_buffer` as referenced by the module being compiled.
    pub fn mark_buffer_used(&mut self, uniform_buffer: &str) {
        if let Some(index) = self.buffer_index(uniform_buffer) {
            if index < 32 {
                self.used_buffers |= 1 << index;
            }
        }
    }

    /// Returns `true` if the buffer at `buffer_index` has been marked used.
    pub fn is_buffer_used(&self, buffer_index: u32) -> bool {
        buffer_index < 32 && self.used_buffers & (1 << buffer_index) != 0
    }

    /// The raw used-buffer bitmask.
    pub fn used_buffer_mask(&self) -> u32 {
        self.used_buffers
    }
}
