//! Side-channel files produced by capture analysis and consumed by replay.
//!
//! Two files ride alongside a capture: a raw little-endian dump of
//! pointer arrays referenced by acceleration-structure builds, and a text dump
//! of indirect dispatch-rays parameters. Restoration copies both verbatim into
//! the subcapture output directory so a later replay of the subcapture can
//! consume them unchanged.

use std::fs;
use std::path::Path;

use recap_protocol::CommandKey;
use tracing::debug;

use crate::error::RestoreError;

pub const POINTER_ARRAY_DUMP_FILE: &str = "pointer_array_dump.bin";
pub const INDIRECT_DISPATCH_DUMP_FILE: &str = "indirect_dispatch_rays.txt";

/// One pointer-array record: the build call it belongs to and the raw GPU
/// addresses it referenced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerArrayEntry {
    pub build_key: CommandKey,
    pub addresses: Vec<u64>,
}

/// Decode a pointer-array dump.
///
/// Layout per entry: `build_key: u64`, `count: u32`, `count x u64` addresses,
/// all little-endian, no padding. Length fields are validated against the
/// remaining input before any allocation.
pub fn decode_pointer_array_dump(bytes: &[u8]) -> Result<Vec<PointerArrayEntry>, RestoreError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let Some(header) = bytes.get(offset..offset + 12) else {
            return Err(RestoreError::TruncatedPointerDump { offset });
        };
        let build_key = u64::from_le_bytes(header[0..8].try_into().unwrap());
        let count = u32::from_le_bytes(header[8..12].try_into().unwrap());
        offset += 12;

        let remaining = bytes.len() - offset;
        let payload_len = (count as usize).checked_mul(8).ok_or(
            RestoreError::PointerDumpCountOutOfBounds {
                build_key,
                count,
                remaining,
            },
        )?;
        if payload_len > remaining {
            return Err(RestoreError::PointerDumpCountOutOfBounds {
                build_key,
                count,
                remaining,
            });
        }

        let mut addresses = Vec::with_capacity(count as usize);
        for chunk in bytes[offset..offset + payload_len].chunks_exact(8) {
            addresses.push(u64::from_le_bytes(chunk.try_into().unwrap()));
        }
        offset += payload_len;

        entries.push(PointerArrayEntry {
            build_key: CommandKey(build_key),
            addresses,
        });
    }
    Ok(entries)
}

/// Encode pointer-array records in the on-disk layout.
pub fn encode_pointer_array_dump(entries: &[PointerArrayEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(&entry.build_key.0.to_le_bytes());
        out.extend_from_slice(&(entry.addresses.len() as u32).to_le_bytes());
        for address in &entry.addresses {
            out.extend_from_slice(&address.to_le_bytes());
        }
    }
    out
}

/// Copy the side files present in `capture_dir` into `output_dir`, creating it
/// if needed. Returns how many files were copied; a missing side file is not
/// an error (captures without raytracing produce neither).
pub fn copy_side_files(capture_dir: &Path, output_dir: &Path) -> Result<usize, RestoreError> {
    fs::create_dir_all(output_dir)?;
    let mut copied = 0;
    for name in [POINTER_ARRAY_DUMP_FILE, INDIRECT_DISPATCH_DUMP_FILE] {
        let src = capture_dir.join(name);
        if !src.is_file() {
            continue;
        }
        let dst = output_dir.join(name);
        fs::copy(&src, &dst).map_err(|source| RestoreError::SideFileCopy {
            path: src.clone(),
            source,
        })?;
        debug!(file = name, "copied side file into subcapture output");
        copied += 1;
    }
    Ok(copied)
}
