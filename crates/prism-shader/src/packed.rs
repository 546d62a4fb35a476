//! Packed ("emulated") uniform buffers.
//!
//! When uniform buffers are flattened instead of bound natively, scalar
//! constants collapse into one shared array per base type. The runtime
//! replays [`CopyRange`]s each draw to move dirty constants from the source
//! buffers into those arrays; bucket sizes are derived from the ranges.

use std::fmt;

use crate::reflect::NumericBaseType;

/// The base-type tag of a packed bucket (`h`, `f`, `i`, `u`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackedTypeTag {
    Half,
    Float,
    Int,
    Uint,
}

impl PackedTypeTag {
    /// The tag character used in annotation blocks.
    pub const fn tag(self) -> char {
        match self {
            PackedTypeTag::Half => 'h',
            PackedTypeTag::Float => 'f',
            PackedTypeTag::Int => 'i',
            PackedTypeTag::Uint => 'u',
        }
    }

    /// Decodes a tag character.
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'h' => Some(PackedTypeTag::Half),
            'f' => Some(PackedTypeTag::Float),
            'i' => Some(PackedTypeTag::Int),
            'u' => Some(PackedTypeTag::Uint),
            _ => None,
        }
    }

    /// The corresponding interface base type.
    pub const fn base_type(self) -> NumericBaseType {
        match self {
            PackedTypeTag::Half => NumericBaseType::Half,
            PackedTypeTag::Float => NumericBaseType::Float,
            PackedTypeTag::Int => NumericBaseType::Int,
            PackedTypeTag::Uint => NumericBaseType::Uint,
        }
    }
}

impl fmt::Display for PackedTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One copy from a source uniform buffer into a packed bucket.
///
/// Offsets and counts are in 32-bit float units, matching the flattened
/// array element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRange {
    /// Stable index of the source uniform buffer.
    pub source_buffer: u32,
    /// Offset into the source buffer, in floats.
    pub source_offset: u32,
    /// Destination bucket.
    pub dest_bucket: PackedTypeTag,
    /// Offset into the destination bucket, in floats.
    pub dest_offset: u32,
    /// Number of floats copied.
    pub count: u32,
}

impl CopyRange {
    /// One-past-the-end destination offset, in floats.
    pub fn dest_end(&self) -> u32 {
        self.dest_offset + self.count
    }
}

/// One named global packed into a bucket (annotated-text modules declare
/// these individually).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedGlobal {
    /// The global's name.
    pub name: String,
    /// The bucket it lives in.
    pub bucket: PackedTypeTag,
    /// Offset into the bucket, in floats.
    pub offset: u32,
    /// Size in floats.
    pub count: u32,
}

/// One emulated constant-buffer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedGlobalArray {
    /// The bucket's base-type tag.
    pub type_tag: PackedTypeTag,
    /// Bucket size in bytes; always a multiple of 16 and large enough for
    /// every global and copy range that targets the bucket.
    pub size_bytes: u32,
}

/// Computes the bucket list for a set of globals and copy ranges.
///
/// Buckets appear in tag order (`h`, `f`, `i`, `u`, filtered to those that
/// occur), each sized to the smallest multiple of 16 bytes covering its
/// highest-addressed float.
pub fn build_buckets(globals: &[PackedGlobal], copies: &[CopyRange]) -> Vec<PackedGlobalArray> {
    let tags = [
        PackedTypeTag::Half,
        PackedTypeTag::Float,
        PackedTypeTag::Int,
        PackedTypeTag::Uint,
    ];

    let mut out = Vec::new();
    for tag in tags {
        let global_end = globals
            .iter()
            .filter(|g| g.bucket == tag)
            .map(|g| g.offset + g.count)
            .max();
        let copy_end = copies
            .iter()
            .filter(|c| c.dest_bucket == tag)
            .map(CopyRange::dest_end)
            .max();
        let end_floats = match global_end.into_iter().chain(copy_end).max() {
            Some(end) => end,
            None => continue,
        };
        out.push(PackedGlobalArray {
            type_tag: tag,
            size_bytes: align16(end_floats * 4),
        });
    }
    out
}

fn align16(bytes: u32) -> u32 {
    bytes.div_ceil(16) * 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_sizes_are_16_byte_aligned_and_cover_all_ranges() {
        let globals = vec![PackedGlobal {
            name: "Exposure".into(),
            bucket: PackedTypeTag::Float,
            offset: 0,
            count: 1,
        }];
        let copies = vec![
            CopyRange {
                source_buffer: 0,
                source_offset: 0,
                dest_bucket: PackedTypeTag::Float,
                dest_offset: 4,
                count: 3,
            },
            CopyRange {
                source_buffer: 1,
                source_offset: 8,
                dest_bucket: PackedTypeTag::Int,
                dest_offset: 0,
                count: 2,
            },
        ];

        let buckets = build_buckets(&globals, &copies);
        assert_eq!(buckets.len(), 2);

        let float_bucket = buckets.iter().find(|b| b.type_tag == PackedTypeTag::Float);
        // Highest float address is (4 + 3) * 4 = 28 bytes -> aligned to 32.
        assert_eq!(float_bucket.unwrap().size_bytes, 32);

        let int_bucket = buckets.iter().find(|b| b.type_tag == PackedTypeTag::Int);
        // (0 + 2) * 4 = 8 bytes -> aligned to 16.
        assert_eq!(int_bucket.unwrap().size_bytes, 16);

        for bucket in &buckets {
            assert_eq!(bucket.size_bytes % 16, 0);
            for copy in copies.iter().filter(|c| c.dest_bucket == bucket.type_tag) {
                assert!(bucket.size_bytes >= copy.dest_end() * 4);
            }
        }
    }

    #[test]
    fn empty_buckets_are_omitted() {
        assert!(build_buckets(&[], &[]).is_empty());
    }

    #[test]
    fn exact_multiples_do_not_round_up() {
        let copies = [CopyRange {
            source_buffer: 0,
            source_offset: 0,
            dest_bucket: PackedTypeTag::Float,
            dest_offset: 0,
            count: 4,
        }];
        let buckets = build_buckets(&[], &copies);
        assert_eq!(buckets[0].size_bytes, 16);
    }
}
