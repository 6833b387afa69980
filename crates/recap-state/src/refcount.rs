//! Reference-count reconciliation.
//!
//! Creation re-issues leave every restored object with its initial reference
//! count; this pass emits the increments (or the single decrement, for pinned
//! destroyed objects) needed so the counts observed after restoration match
//! the counts observed at the resume point.

use recap_protocol::{Command, CommandKeyAllocator, CommandKind, CommandSink, ObjectKey, RecordedCommand};

use crate::registry::ObjectRegistry;

/// Creation kinds whose live reference count is misleading to query on the
/// replay device (the runtime hands out cached/aliased objects for these), so
/// the captured count is trusted directly.
///
/// This is an explicit allow-list; do not infer membership from object kind.
pub const REFCOUNT_UNRELIABLE_KINDS: &[CommandKind] = &[
    CommandKind::EnumAdapter,
    CommandKind::CreateRootSignature,
    CommandKind::CreatePipelineLibrary,
];

pub fn is_refcount_unreliable(kind: CommandKind) -> bool {
    REFCOUNT_UNRELIABLE_KINDS.contains(&kind)
}

/// Queries the true current reference count of a live replay object.
///
/// Returning `None` means the count cannot be queried; reconciliation then
/// assumes the single reference held since creation.
pub trait RefCountProbe {
    fn live_ref_count(&self, key: ObjectKey, native_handle: u64) -> Option<u32>;
}

/// Probe for replay targets without generic reference-count introspection.
pub struct NoRefCountProbe;

impl RefCountProbe for NoRefCountProbe {
    fn live_ref_count(&self, _key: ObjectKey, _native_handle: u64) -> Option<u32> {
        None
    }
}

pub(crate) fn reconcile(
    registry: &ObjectRegistry,
    probe: &dyn RefCountProbe,
    keys: &mut CommandKeyAllocator,
    sink: &mut dyn CommandSink,
) {
    for key in registry.keys_ordered() {
        let Some(state) = registry.get(key) else {
            continue;
        };
        if !state.restored || state.native_handle.is_none() {
            continue;
        }

        if state.destroyed {
            // Pinned-destroyed objects were re-created only so descendants
            // could be; one decrement drops them to zero on replay.
            if state.keep_destroyed {
                sink.record(RecordedCommand {
                    key: keys.next_key(),
                    object_key: key,
                    command: Command::Release { object_key: key },
                });
            }
            continue;
        }

        let captured = state.ref_count;
        let current = if is_refcount_unreliable(state.creation.kind()) {
            1
        } else {
            probe
                .live_ref_count(key, state.native_handle.unwrap_or_default())
                .unwrap_or(1)
        };
        for _ in current..captured {
            sink.record(RecordedCommand {
                key: keys.next_key(),
                object_key: key,
                command: Command::AddRef { object_key: key },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreliable_kind_list_is_exactly_the_known_set() {
        assert!(is_refcount_unreliable(CommandKind::EnumAdapter));
        assert!(is_refcount_unreliable(CommandKind::CreateRootSignature));
        assert!(is_refcount_unreliable(CommandKind::CreatePipelineLibrary));
        assert!(!is_refcount_unreliable(CommandKind::CreateCommittedResource));
        assert!(!is_refcount_unreliable(CommandKind::CreateDevice));
    }
}
