//! Acceleration-structure restoration.
//!
//! Structures restored from serialized blobs go first: a deserialized
//! structure can be an input to one rebuilt from geometry. Build-based
//! restoration then replays the needed builds in capture-key order, uploading
//! each build's staged input-buffer contents immediately before the build so
//! the inputs are in place when the build executes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use recap_protocol::{Command, CommandKey, CommandKeyAllocator, CommandSink, ObjectKey};
use tracing::debug;

use crate::content::{emit, ContentRestorer};

/// A structure captured in serialized form.
#[derive(Clone, Debug)]
pub struct SerializedStructure {
    pub capture_key: CommandKey,
    pub dest_resource_key: ObjectKey,
    pub blob: Vec<u8>,
}

#[derive(Debug, Default)]
struct RtasBooks {
    serialized: BTreeMap<CommandKey, SerializedStructure>,
    builds: BTreeMap<CommandKey, Command>,
    needed: HashSet<CommandKey>,
}

/// Bookkeeping and replay of acceleration-structure restoration.
///
/// Mutated from content-dump callbacks that can run off the restore thread;
/// one mutex guards the maps, held only for map mutation.
#[derive(Debug, Default)]
pub struct RtasRestorer {
    books: Mutex<RtasBooks>,
}

impl RtasRestorer {
    pub fn record_serialized(&self, structure: SerializedStructure) {
        let mut books = self.books.lock().expect("rtas bookkeeping lock poisoned");
        books.serialized.insert(structure.capture_key, structure);
    }

    /// Record a captured build call for possible replay.
    ///
    /// `command` must be a [`Command::BuildRaytracingAccelerationStructure`].
    pub fn record_build(&self, capture_key: CommandKey, command: Command) {
        assert!(
            matches!(command, Command::BuildRaytracingAccelerationStructure { .. }),
            "rtas build record for command key {} is not a build call",
            capture_key.0
        );
        let mut books = self.books.lock().expect("rtas bookkeeping lock poisoned");
        books.builds.insert(capture_key, command);
    }

    /// Structure-usage analysis verdict for one build call.
    pub fn set_build_needed(&self, capture_key: CommandKey, needed: bool) {
        let mut books = self.books.lock().expect("rtas bookkeeping lock poisoned");
        if needed {
            books.needed.insert(capture_key);
        } else {
            books.needed.remove(&capture_key);
        }
    }

    /// Replay serialized-blob restoration, then needed builds in capture-key
    /// order. Unneeded builds have their staged input uploads released.
    pub(crate) fn restore(
        &self,
        content: &ContentRestorer,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) {
        // Drain under the lock, emit after: no downstream calls hold it.
        let (serialized, builds, needed) = {
            let mut books = self.books.lock().expect("rtas bookkeeping lock poisoned");
            let serialized: Vec<SerializedStructure> =
                std::mem::take(&mut books.serialized).into_values().collect();
            let builds: Vec<(CommandKey, Command)> =
                std::mem::take(&mut books.builds).into_iter().collect();
            let needed = std::mem::take(&mut books.needed);
            (serialized, builds, needed)
        };

        for structure in serialized {
            let staging = ObjectKey(keys.next_key().0);
            let size_bytes = structure.blob.len() as u64;
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
                bytes: structure.blob,
            });
            emit(
                keys,
                sink,
                structure.dest_resource_key,
                Command::CopyRaytracingAccelerationStructure {
                    dest_resource_key: structure.dest_resource_key,
                    src_resource_key: staging,
                    mode: recap_protocol::RtasCopyMode::Deserialize,
                },
            );
        }

        for (capture_key, command) in builds {
            if !needed.contains(&capture_key) {
                let released = content.discard_build(capture_key);
                debug!(
                    build_key = capture_key.0,
                    released, "build not needed at resume point; staged inputs released"
                );
                continue;
            }
            for (buffer_key, offset_bytes, bytes) in content.take_build_inputs(capture_key) {
                content.upload_through_staging(buffer_key, offset_bytes, bytes, true, keys, sink);
            }
            let dest = match &command {
                Command::BuildRaytracingAccelerationStructure {
                    dest_resource_key, ..
                } => *dest_resource_key,
                _ => ObjectKey::NONE,
            };
            emit(keys, sink, dest, command);
        }
    }
}
