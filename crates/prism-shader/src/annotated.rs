//! The annotated-text IR path.
//!
//! Cross-compilers that emit textual source (HLSLcc-style) describe their
//! bindings in a leading comment block, one category per line:
//!
//! ```text
//! // @Inputs: f4;0:in_ATTRIBUTE0,f2;7:in_ATTRIBUTE7
//! // @UniformBlocks: View(0)
//! // @Samplers: Scene(0:1)
//! // @UAVs: RWOutput(0:1)
//! // @PackedGlobals: Exposure(f:0,4)
//! // @PackedUBCopies: 0:0-f:0:16
//! // @InputAttachments: GBufferA(0)
//! ```
//!
//! This module parses that block into the same [`ModuleReflection`] the
//! SPIR-V reflector produces, and the header builder emits the identical
//! grammar back out, so a patched module round-trips through the parser.
//!
//! Entries under `@Samplers` reflect as sampled textures (combined texture
//! units) and entries under `@UAVs` as writable storage buffers; the textual
//! frontend does not distinguish finer kinds.

use crate::env::ResourceTableIndex;
use crate::error::ShaderCompileError;
use crate::packed::{CopyRange, PackedGlobal, PackedTypeTag};
use crate::reflect::{
    resolve_roles, semantic_of, BindingKind, InterfaceVariable, ModuleReflection, NumericShape,
    PatchCoords, ResourceAccess, ResourceBinding, ResourceRole,
};
use crate::stage::ShaderStage;

/// A parsed annotated-text module: its reflection plus the source body that
/// follows the annotation block.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedModule {
    /// Reflection recovered from the annotation block.
    pub reflection: ModuleReflection,
    /// Everything after the annotation block, unmodified.
    pub source: String,
}

/// Returns `true` when `text` begins with an annotation block.
pub fn is_annotated(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    text.trim_start().starts_with("// @")
}

/// Parses an annotated module for `stage`.
pub fn parse_annotated(
    text: &str,
    stage: ShaderStage,
    table: &mut ResourceTableIndex<'_>,
) -> Result<AnnotatedModule, ShaderCompileError> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut bindings: Vec<ResourceBinding> = Vec::new();
    let mut packed_globals = Vec::new();
    let mut packed_copies = Vec::new();

    let mut source_start = 0usize;
    for (index, line) in text.lines().enumerate() {
        let line_no = (index + 1) as u32;
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("// @") else {
            break;
        };
        source_start += line.len() + 1;

        let (category, entries) = rest.split_once(':').ok_or_else(|| malformed(
            line_no,
            "annotation line is missing the `:` separator",
        ))?;
        let entries = entries.trim();
        if entries.is_empty() {
            return Err(malformed(line_no, "annotation category has no entries"));
        }

        match category {
            "Inputs" => parse_io_entries(entries, line_no, &mut inputs)?,
            "Outputs" => parse_io_entries(entries, line_no, &mut outputs)?,
            "UniformBlocks" => {
                for entry in entries.split(',') {
                    let (name, args) = split_paren(entry, line_no)?;
                    let slot = parse_u32(args, line_no)?;
                    bindings.push(resource(
                        name,
                        BindingKind::UniformBuffer,
                        ResourceAccess::ReadOnly,
                        slot,
                        1,
                    ));
                }
            }
            "Samplers" => {
                for entry in entries.split(',') {
                    let (name, args) = split_paren(entry, line_no)?;
                    let (slot, count) = parse_slot_count(args, line_no)?;
                    bindings.push(resource(
                        name,
                        BindingKind::SampledTexture,
                        ResourceAccess::ReadOnly,
                        slot,
                        count,
                    ));
                }
            }
            "UAVs" => {
                for entry in entries.split(',') {
                    let (name, args) = split_paren(entry, line_no)?;
                    let (slot, count) = parse_slot_count(args, line_no)?;
                    bindings.push(resource(
                        name,
                        BindingKind::StorageBuffer,
                        ResourceAccess::ReadWrite,
                        slot,
                        count,
                    ));
                }
            }
            "InputAttachments" => {
                for entry in entries.split(',') {
                    let (name, args) = split_paren(entry, line_no)?;
                    let slot = parse_u32(args, line_no)?;
                    bindings.push(resource(
                        name,
                        BindingKind::InputAttachment,
                        ResourceAccess::ReadOnly,
                        slot,
                        1,
                    ));
                }
            }
            "PackedGlobals" => {
                for entry in entries.split(',') {
                    let (name, args) = split_paren(entry, line_no)?;
                    packed_globals.push(parse_packed_global(name, args, line_no)?);
                }
            }
            "PackedUBCopies" => {
                for entry in entries.split(',') {
                    packed_copies.push(parse_copy_range(entry.trim(), line_no)?);
                }
            }
            // Emitted for runtimes; carries no reflection state of its own.
            "SideTable" => {}
            other => {
                return Err(malformed(
                    line_no,
                    format!("unknown annotation category `{other}`"),
                ));
            }
        }
    }

    resolve_roles(&mut bindings, table);
    bindings.sort_by_key(ResourceBinding::group_rank);

    Ok(AnnotatedModule {
        reflection: ModuleReflection {
            stage,
            entry_point: "main".to_owned(),
            bindings,
            inputs,
            outputs,
            packed_globals,
            packed_copies,
        },
        source: text[source_start.min(text.len())..].to_owned(),
    })
}

fn resource(
    name: &str,
    kind: BindingKind,
    access: ResourceAccess,
    slot: u32,
    count: u32,
) -> ResourceBinding {
    ResourceBinding {
        name: name.to_owned(),
        kind,
        access,
        role: ResourceRole::Standalone,
        original_binding: Some(slot),
        assigned_slot: None,
        count,
        has_constant_data: kind == BindingKind::UniformBuffer,
        patch: PatchCoords::None,
    }
}

fn parse_io_entries(
    entries: &str,
    line_no: u32,
    out: &mut Vec<InterfaceVariable>,
) -> Result<(), ShaderCompileError> {
    for entry in entries.split(',') {
        let entry = entry.trim();
        let (tag, rest) = entry
            .split_once(';')
            .ok_or_else(|| malformed(line_no, format!("I/O entry `{entry}` is missing `;`")))?;
        let (location, name) = rest
            .split_once(':')
            .ok_or_else(|| malformed(line_no, format!("I/O entry `{entry}` is missing `:`")))?;
        let shape = NumericShape::parse_tag(tag)
            .ok_or_else(|| malformed(line_no, format!("bad type tag `{tag}`")))?;
        let location = parse_u32(location, line_no)?;
        out.push(InterfaceVariable {
            name: name.to_owned(),
            semantic: semantic_of(name).to_owned(),
            location,
            shape,
            location_word: None,
        });
    }
    Ok(())
}

fn parse_packed_global(
    name: &str,
    args: &str,
    line_no: u32,
) -> Result<PackedGlobal, ShaderCompileError> {
    // `Name(f:offset,count)`
    let (tag, rest) = args
        .split_once(':')
        .ok_or_else(|| malformed(line_no, format!("packed global `{name}` is missing `:`")))?;
    let (offset, count) = rest
        .split_once(',')
        .ok_or_else(|| malformed(line_no, format!("packed global `{name}` is missing `,`")))?;
    let bucket = tag
        .chars()
        .next()
        .filter(|_| tag.len() == 1)
        .and_then(PackedTypeTag::from_tag)
        .ok_or_else(|| malformed(line_no, format!("bad packed type tag `{tag}`")))?;
    Ok(PackedGlobal {
        name: name.to_owned(),
        bucket,
        offset: parse_u32(offset, line_no)?,
        count: parse_u32(count, line_no)?,
    })
}

fn parse_copy_range(entry: &str, line_no: u32) -> Result<CopyRange, ShaderCompileError> {
    // `<srcUB>:<srcOffset>-<tag>:<dstOffset>:<count>`
    let (src, dst) = entry
        .split_once('-')
        .ok_or_else(|| malformed(line_no, format!("copy range `{entry}` is missing `-`")))?;
    let (src_buffer, src_offset) = src
        .split_once(':')
        .ok_or_else(|| malformed(line_no, format!("copy range `{entry}` has a bad source")))?;
    let mut dst_parts = dst.splitn(3, ':');
    let tag = dst_parts
        .next()
        .filter(|t| t.len() == 1)
        .and_then(|t| t.chars().next())
        .and_then(PackedTypeTag::from_tag)
        .ok_or_else(|| malformed(line_no, format!("copy range `{entry}` has a bad type tag")))?;
    let dest_offset = dst_parts
        .next()
        .ok_or_else(|| malformed(line_no, format!("copy range `{entry}` is missing an offset")))?;
    let count = dst_parts
        .next()
        .ok_or_else(|| malformed(line_no, format!("copy range `{entry}` is missing a count")))?;
    Ok(CopyRange {
        source_buffer: parse_u32(src_buffer, line_no)?,
        source_offset: parse_u32(src_offset, line_no)?,
        dest_bucket: tag,
        dest_offset: parse_u32(dest_offset, line_no)?,
        count: parse_u32(count, line_no)?,
    })
}

fn parse_slot_count(args: &str, line_no: u32) -> Result<(u32, u32), ShaderCompileError> {
    match args.split_once(':') {
        Some((slot, count)) => Ok((parse_u32(slot, line_no)?, parse_u32(count, line_no)?)),
        None => Ok((parse_u32(args, line_no)?, 1)),
    }
}

fn split_paren<'a>(entry: &'a str, line_no: u32) -> Result<(&'a str, &'a str), ShaderCompileError> {
    let entry = entry.trim();
    let open = entry
        .find('(')
        .ok_or_else(|| malformed(line_no, format!("entry `{entry}` is missing `(`")))?;
    let close = entry
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| malformed(line_no, format!("entry `{entry}` is missing `)`")))?;
    let name = &entry[..open];
    if name.is_empty() {
        return Err(malformed(line_no, format!("entry `{entry}` has no name")));
    }
    Ok((name, &entry[open + 1..close]))
}

fn parse_u32(text: &str, line_no: u32) -> Result<u32, ShaderCompileError> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| malformed(line_no, format!("`{text}` is not an unsigned integer")))
}

fn malformed(line: u32, message: impl Into<String>) -> ShaderCompileError {
    ShaderCompileError::MalformedAnnotation {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::CompilerEnvironment;
    use crate::reflect::NumericBaseType;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> AnnotatedModule {
        let env = CompilerEnvironment::default();
        let mut table = env.index();
        parse_annotated(text, ShaderStage::Pixel, &mut table).unwrap()
    }

    #[test]
    fn parses_inputs_with_locations_and_type_tags() {
        let module = parse("// @Inputs: f4;7:in_ATTRIBUTE7,u1;0:in_SV_VertexID\nvoid main() {}\n");
        assert_eq!(module.reflection.inputs.len(), 2);

        let attr = &module.reflection.inputs[0];
        assert_eq!(attr.name, "in_ATTRIBUTE7");
        assert_eq!(attr.semantic, "ATTRIBUTE7");
        assert_eq!(attr.location, 7);
        assert_eq!(attr.shape.base, NumericBaseType::Float);
        assert_eq!(attr.shape.components, 4);
        assert_eq!(module.source, "void main() {}\n");
    }

    #[test]
    fn parses_resources_into_group_order() {
        let module = parse(
            "// @UniformBlocks: View(0)\n\
             // @Samplers: Scene(0:1)\n\
             // @UAVs: RWOut(0:1)\n\
             body\n",
        );
        let names: Vec<&str> = module
            .reflection
            .bindings
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        // UAV first, then uniform buffer, then the sampled texture.
        assert_eq!(names, ["RWOut", "View", "Scene"]);
        assert!(module.reflection.bindings[0].is_uav());
    }

    #[test]
    fn parses_packed_globals_and_copies() {
        let module = parse(
            "// @PackedGlobals: Exposure(f:0,4),Steps(i:0,1)\n\
             // @PackedUBCopies: 0:0-f:4:12,1:8-i:4:2\n\
             src\n",
        );
        assert_eq!(module.reflection.packed_globals.len(), 2);
        assert_eq!(module.reflection.packed_copies.len(), 2);
        let copy = module.reflection.packed_copies[0];
        assert_eq!(copy.source_buffer, 0);
        assert_eq!(copy.dest_bucket, PackedTypeTag::Float);
        assert_eq!(copy.dest_offset, 4);
        assert_eq!(copy.count, 12);
    }

    #[test]
    fn reports_line_numbers_for_malformed_entries() {
        let env = CompilerEnvironment::default();
        let mut table = env.index();
        let err = parse_annotated(
            "// @Inputs: f4;0:in_A\n// @Bogus: x(1)\n",
            ShaderStage::Pixel,
            &mut table,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ShaderCompileError::MalformedAnnotation {
                line: 2,
                message: "unknown annotation category `Bogus`".into(),
            }
        );
    }

    #[test]
    fn detects_annotated_modules_by_leading_block() {
        assert!(is_annotated(b"// @Inputs: f4;0:in_A\n"));
        assert!(!is_annotated(b"#version 450\n"));
        assert!(!is_annotated(&[0x03, 0x02, 0x23, 0x07]));
    }
}
