//! Resource content restoration.
//!
//! Re-uploads the observable byte contents of live GPU resources. The usage
//! tracker supplies dependency order; reserved buffers are hoisted to the
//! front of the pass because other resources may alias their backing memory,
//! and everything else keeps its relative usage order. Mappable resources are
//! written through a map, everything else through a synthetic upload buffer
//! and a GPU copy.
//!
//! Acceleration-structure build inputs are staged separately with a
//! content-hash deduplication check so shared input buffers are not restored
//! twice; builds the structure-usage analysis marks as unneeded have their
//! staged restore commands released. The staging maps are mutated from
//! content-dump callbacks that can run off the restore thread, so they sit
//! behind one mutex per restorer; the lock is held only for map mutation,
//! never across command emission.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use recap_protocol::{
    Command, CommandKey, CommandKeyAllocator, CommandSink, ObjectKey, RecordedCommand,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::registry::{AllocationKind, ObjectRegistry};

/// Capture-time byte contents of live resources at the resume point.
pub trait ContentSource {
    fn resource_bytes(&self, key: ObjectKey) -> Option<Vec<u8>>;
}

/// GPU-usage tracker collaborator: supplies dependency order for content
/// restoration and re-applies tracked transition state afterwards.
pub trait UsageTracker {
    fn ordered_resources(&self) -> Vec<ObjectKey>;
    fn restore_resource_states(&mut self, keys: &[ObjectKey]);
}

type ContentHash = [u8; 32];

#[derive(Clone, Debug)]
struct StagedBuildInput {
    buffer_key: ObjectKey,
    offset_bytes: u64,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct BuildBooks {
    /// Content hash per (build call, input offset); a repeat with the same
    /// hash is a duplicate, a different hash supersedes the staged bytes.
    input_hashes: HashMap<(CommandKey, u64), ContentHash>,
    staged: BTreeMap<CommandKey, Vec<StagedBuildInput>>,
}

#[derive(Debug, Default)]
pub struct ContentRestorer {
    registered: HashSet<ObjectKey>,
    books: Mutex<BuildBooks>,
}

impl ContentRestorer {
    /// Register a live resource for content restoration.
    pub fn register(&mut self, key: ObjectKey) {
        self.registered.insert(key);
    }

    pub fn is_registered(&self, key: ObjectKey) -> bool {
        self.registered.contains(&key)
    }

    /// Stage the bytes of one acceleration-structure build input.
    ///
    /// Returns false when the same (build, offset) pair already carries these
    /// exact bytes; the duplicate is suppressed. A changed hash replaces the
    /// staged bytes for that slot. Callable from content-dump callbacks off
    /// the restore thread.
    pub fn stage_build_input(
        &self,
        build_key: CommandKey,
        buffer_key: ObjectKey,
        offset_bytes: u64,
        bytes: Vec<u8>,
    ) -> bool {
        let hash: ContentHash = Sha256::digest(&bytes).into();
        let mut books = self.books.lock().expect("content bookkeeping lock poisoned");
        if books.input_hashes.get(&(build_key, offset_bytes)) == Some(&hash) {
            return false;
        }
        books.input_hashes.insert((build_key, offset_bytes), hash);
        let staged = books.staged.entry(build_key).or_default();
        if let Some(existing) = staged
            .iter_mut()
            .find(|input| input.buffer_key == buffer_key && input.offset_bytes == offset_bytes)
        {
            existing.bytes = bytes;
        } else {
            staged.push(StagedBuildInput {
                buffer_key,
                offset_bytes,
                bytes,
            });
        }
        true
    }

    /// Hand the staged inputs for one build over to the build-restoration
    /// pass, removing them from the staging map.
    pub(crate) fn take_build_inputs(
        &self,
        build_key: CommandKey,
    ) -> Vec<(ObjectKey, u64, Vec<u8>)> {
        let mut books = self.books.lock().expect("content bookkeeping lock poisoned");
        books
            .staged
            .remove(&build_key)
            .unwrap_or_default()
            .into_iter()
            .map(|input| (input.buffer_key, input.offset_bytes, input.bytes))
            .collect()
    }

    /// Release the staged restore commands of a build the structure-usage
    /// analysis decided is not needed at the resume point. Returns how many
    /// staged inputs were dropped.
    pub(crate) fn discard_build(&self, build_key: CommandKey) -> usize {
        let mut books = self.books.lock().expect("content bookkeeping lock poisoned");
        books.staged.remove(&build_key).map_or(0, |inputs| inputs.len())
    }

    /// Restore the contents of every registered resource, in tracker order
    /// with reserved buffers hoisted first. Returns the keys whose content was
    /// restored, for the tracker's transition-state pass.
    pub(crate) fn restore_contents(
        &self,
        registry: &ObjectRegistry,
        tracker: &dyn UsageTracker,
        source: &dyn ContentSource,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) -> Vec<ObjectKey> {
        let mut reserved_buffers = Vec::new();
        let mut rest = Vec::new();
        for key in tracker.ordered_resources() {
            if !self.registered.contains(&key) {
                continue;
            }
            let Some(state) = registry.get(key) else {
                continue;
            };
            if !state.restored || state.native_handle.is_none() {
                continue;
            }
            let is_reserved_buffer = state.allocation() == Some(AllocationKind::Reserved)
                && state.resource_desc().is_some_and(|d| d.dimension.is_buffer());
            if is_reserved_buffer {
                reserved_buffers.push(key);
            } else {
                rest.push(key);
            }
        }

        let mut restored = Vec::new();
        for key in reserved_buffers.into_iter().chain(rest) {
            if self.upload_resource(registry, source, key, keys, sink) {
                restored.push(key);
            }
        }
        restored
    }

    fn upload_resource(
        &self,
        registry: &ObjectRegistry,
        source: &dyn ContentSource,
        key: ObjectKey,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) -> bool {
        let Some(state) = registry.get(key) else {
            return false;
        };
        let (Some(info), Some(desc)) = (state.resource_info(), state.resource_desc()) else {
            warn!(key = key.0, "content restoration registered for a non-resource object");
            return false;
        };
        let Some(bytes) = source.resource_bytes(key) else {
            debug!(key = key.0, "no content dump for resource; skipping upload");
            return false;
        };
        if desc.dimension.is_buffer() {
            assert_eq!(
                bytes.len() as u64,
                desc.width,
                "content dump size disagrees with declared size of buffer object {}",
                key.0
            );
        }

        if info.mappable {
            emit(keys, sink, key, Command::MapResource {
                resource_key: key,
                subresource: 0,
            });
            emit(keys, sink, key, Command::WriteMappedResource {
                resource_key: key,
                offset_bytes: 0,
                bytes,
            });
        } else {
            self.upload_through_staging(key, 0, bytes, desc.dimension.is_buffer(), keys, sink);
        }
        true
    }

    /// Write bytes into an unmappable destination: synthesize a CPU-visible
    /// upload buffer, fill it through a map, and copy on the GPU at the
    /// destination offset.
    pub(crate) fn upload_through_staging(
        &self,
        dst_key: ObjectKey,
        dst_offset_bytes: u64,
        bytes: Vec<u8>,
        dst_is_buffer: bool,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) {
        let staging = ObjectKey(keys.next_key().0);
        let size_bytes = bytes.len() as u64;
        emit(keys, sink, staging, Command::CreateUploadBuffer {
            buffer_key: staging,
            size_bytes,
        });
        emit(keys, sink, staging, Command::MapResource {
            resource_key: staging,
            subresource: 0,
        });
        emit(keys, sink, staging, Command::WriteMappedResource {
            resource_key: staging,
            offset_bytes: 0,
            bytes,
        });
        if dst_is_buffer {
            emit(keys, sink, dst_key, Command::CopyBufferRegion {
                dst_key,
                dst_offset_bytes,
                src_key: staging,
                src_offset_bytes: 0,
                size_bytes,
            });
        } else {
            emit(keys, sink, dst_key, Command::CopyTextureRegion {
                dst_key,
                dst_subresource: 0,
                src_key: staging,
                src_offset_bytes: 0,
            });
        }
    }
}

pub(crate) fn emit(
    keys: &mut CommandKeyAllocator,
    sink: &mut dyn CommandSink,
    object_key: ObjectKey,
    command: Command,
) {
    sink.record(RecordedCommand {
        key: keys.next_key(),
        object_key,
        command,
    });
}
