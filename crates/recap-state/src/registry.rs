//! Object registry: the reconstructed record of every tracked API object.
//!
//! Records live in a key-indexed arena; all ownership edges (parent, children,
//! linked lifetime) are key references into that arena, never pointers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use recap_protocol::{Command, CommandKey, ObjectKey, ResourceDesc, ResourceStates};

/// Allocation strategy of a GPU resource, derived from its creation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationKind {
    Committed,
    Placed,
    Reserved,
}

/// Extra tracked state for committed/placed/reserved resources.
#[derive(Clone, Debug, Default)]
pub struct ResourceInfo {
    /// State/layout observed at the resume point.
    pub tracked_state: ResourceStates,
    pub gpu_va: u64,
    pub mappable: bool,
    /// The capture restricted this resource's transition history; its tracked
    /// state must be re-applied verbatim.
    pub barrier_restricted: bool,
    /// Subresources left mapped at the resume point.
    pub mapped_subresources: Vec<u32>,
    /// Non-default residency priority, committed resources only.
    pub residency_priority: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct HeapInfo {
    pub owner_device: ObjectKey,
    pub residency_priority: Option<u32>,
    /// Raw bytes backing a heap opened from an external address.
    pub external_bytes: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorHeapInfo {
    /// GPU-visible base handle, present when the heap is shader-visible.
    pub gpu_descriptor_handle: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct StateObjectPropertiesInfo {
    /// Shader identifier blobs captured per export name, in query order.
    pub shader_identifiers: Vec<(String, Vec<u8>)>,
}

#[derive(Clone, Debug, Default)]
pub struct FenceInfo {
    /// Last value the capture observed the fence signaled to.
    pub completed_value: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SwapChainInfo {
    pub window_handle: u64,
    pub width: u32,
    pub height: u32,
    pub back_buffer_count: u32,
    pub current_back_buffer: u32,
}

#[derive(Clone, Debug, Default)]
pub struct CommandListInfo {
    /// Bound state recorded at the resume point.
    pub root_signature_key: ObjectKey,
    pub pipeline_key: ObjectKey,
    pub root_arguments: Vec<u8>,
}

/// Per-kind specialized state, selected once at registration.
#[derive(Clone, Debug, Default)]
pub enum TrackedState {
    #[default]
    None,
    Resource(ResourceInfo),
    Heap(HeapInfo),
    DescriptorHeap(DescriptorHeapInfo),
    StateObjectProperties(StateObjectPropertiesInfo),
    Fence(FenceInfo),
    SwapChain(SwapChainInfo),
    CommandList(CommandListInfo),
}

/// Reconstructed record for one tracked object.
#[derive(Clone, Debug)]
pub struct ObjectState {
    pub key: ObjectKey,
    pub parent: ObjectKey,
    pub children: Vec<ObjectKey>,
    /// The recorded call whose successful execution produced this object,
    /// retained by value so its arguments can be patched before re-issue.
    pub creation: Command,
    pub creation_key: CommandKey,
    /// Set once the creation call has been re-issued.
    pub native_handle: Option<u64>,
    /// Reference count observed at the resume point.
    pub ref_count: u32,
    pub restored: bool,
    pub destroyed: bool,
    /// Retain this record even though the capture destroyed the object; set
    /// when a still-needed descendant depends on it.
    pub keep_destroyed: bool,
    pub evicted: bool,
    pub debug_name: Option<String>,
    /// Object whose destruction cascades from this object's destruction.
    pub linked_lifetime: ObjectKey,
    pub tracked: TrackedState,
}

impl ObjectState {
    pub fn new(key: ObjectKey, parent: ObjectKey, creation_key: CommandKey, creation: Command) -> Self {
        let tracked = match &creation {
            Command::CreateCommittedResource { initial_state, .. }
            | Command::CreatePlacedResource { initial_state, .. }
            | Command::CreateReservedResource { initial_state, .. } => {
                TrackedState::Resource(ResourceInfo {
                    tracked_state: *initial_state,
                    ..ResourceInfo::default()
                })
            }
            Command::CreateHeap { .. } | Command::OpenExistingHeapFromAddress { .. } => {
                TrackedState::Heap(HeapInfo::default())
            }
            Command::CreateDescriptorHeap { .. } => {
                TrackedState::DescriptorHeap(DescriptorHeapInfo::default())
            }
            Command::CreateFence { initial_value, .. } => TrackedState::Fence(FenceInfo {
                completed_value: *initial_value,
            }),
            Command::CreateSwapChain {
                width,
                height,
                buffer_count,
                ..
            } => TrackedState::SwapChain(SwapChainInfo {
                width: *width,
                height: *height,
                back_buffer_count: *buffer_count,
                ..SwapChainInfo::default()
            }),
            Command::CreateCommandList { .. } => TrackedState::CommandList(CommandListInfo::default()),
            _ => TrackedState::None,
        };
        Self {
            key,
            parent,
            children: Vec::new(),
            creation,
            creation_key,
            native_handle: None,
            ref_count: 1,
            restored: false,
            destroyed: false,
            keep_destroyed: false,
            evicted: false,
            debug_name: None,
            linked_lifetime: ObjectKey::NONE,
            tracked: TrackedState::None,
        }
        .with_tracked(tracked)
    }

    fn with_tracked(mut self, tracked: TrackedState) -> Self {
        self.tracked = tracked;
        self
    }

    pub fn allocation(&self) -> Option<AllocationKind> {
        match &self.creation {
            Command::CreateCommittedResource { .. } => Some(AllocationKind::Committed),
            Command::CreatePlacedResource { .. } => Some(AllocationKind::Placed),
            Command::CreateReservedResource { .. } => Some(AllocationKind::Reserved),
            _ => None,
        }
    }

    pub fn resource_desc(&self) -> Option<&ResourceDesc> {
        match &self.creation {
            Command::CreateCommittedResource { desc, .. }
            | Command::CreatePlacedResource { desc, .. }
            | Command::CreateReservedResource { desc, .. } => Some(desc),
            _ => None,
        }
    }

    /// Backing heap for placed resources.
    pub fn backing_heap(&self) -> ObjectKey {
        match &self.creation {
            Command::CreatePlacedResource { heap_key, .. } => *heap_key,
            _ => ObjectKey::NONE,
        }
    }

    pub fn resource_info(&self) -> Option<&ResourceInfo> {
        match &self.tracked {
            TrackedState::Resource(info) => Some(info),
            _ => None,
        }
    }

    pub fn resource_info_mut(&mut self) -> Option<&mut ResourceInfo> {
        match &mut self.tracked {
            TrackedState::Resource(info) => Some(info),
            _ => None,
        }
    }

    pub fn heap_info(&self) -> Option<&HeapInfo> {
        match &self.tracked {
            TrackedState::Heap(info) => Some(info),
            _ => None,
        }
    }

    pub fn heap_info_mut(&mut self) -> Option<&mut HeapInfo> {
        match &mut self.tracked {
            TrackedState::Heap(info) => Some(info),
            _ => None,
        }
    }

    pub fn swap_chain_info(&self) -> Option<&SwapChainInfo> {
        match &self.tracked {
            TrackedState::SwapChain(info) => Some(info),
            _ => None,
        }
    }

    pub fn swap_chain_info_mut(&mut self) -> Option<&mut SwapChainInfo> {
        match &mut self.tracked {
            TrackedState::SwapChain(info) => Some(info),
            _ => None,
        }
    }
}

/// Key-indexed arena of [`ObjectState`] records.
///
/// Owned exclusively by the restore sequencer for the duration of a pass.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<ObjectKey, ObjectState>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a record by key.
    ///
    /// A duplicate registration keeps the first record and adopts the new
    /// native handle (captures can replay a creation call twice for the same
    /// object identity).
    pub fn store(&mut self, state: ObjectState) {
        let key = state.key;
        let parent = state.parent;
        match self.objects.entry(key) {
            Entry::Occupied(mut e) => {
                if state.native_handle.is_some() {
                    e.get_mut().native_handle = state.native_handle;
                }
            }
            Entry::Vacant(e) => {
                e.insert(state);
                if parent.is_some() {
                    self.add_child(parent, key);
                }
            }
        }
    }

    /// Record `child` as a dependent of `parent` (ordered, deduplicated).
    pub fn add_child(&mut self, parent: ObjectKey, child: ObjectKey) {
        if let Some(p) = self.objects.get_mut(&parent) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(&key)
    }

    pub fn get(&self, key: ObjectKey) -> Option<&ObjectState> {
        self.objects.get(&key)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut ObjectState> {
        self.objects.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Keys in ascending order, for deterministic synthesis.
    pub fn keys_ordered(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<ObjectKey> = self.objects.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Set the stored reference count; on zero, destroy the object, cascade
    /// the release to its children and linked-lifetime target, and evict the
    /// record unless it is pinned by `keep_destroyed`.
    pub fn release(&mut self, key: ObjectKey, new_ref_count: u32) {
        let Some(state) = self.objects.get_mut(&key) else {
            return;
        };
        state.ref_count = new_ref_count;
        if new_ref_count != 0 {
            return;
        }
        state.destroyed = true;
        let children = state.children.clone();
        let linked = state.linked_lifetime;
        let keep = state.keep_destroyed;

        for child in children {
            if self.objects.get(&child).is_some_and(|c| !c.destroyed) {
                self.release(child, 0);
            }
        }
        if linked.is_some() {
            // The owner held one reference on the linked object; when only the
            // self-reference remains, the linked object is released as well.
            if self
                .objects
                .get(&linked)
                .is_some_and(|l| !l.destroyed && l.ref_count == 1)
            {
                self.release(linked, 0);
            }
        }
        if !keep {
            self.objects.remove(&key);
        }
    }

    /// Pin an object so restoration re-creates it even though the capture
    /// destroyed it. Pinning propagates to the backing heap of a placed
    /// resource and to the parent chain: a pinned object can never be created
    /// if an ancestor it depends on was evicted.
    pub fn mark_keep_alive(&mut self, key: ObjectKey) {
        let Some(state) = self.objects.get_mut(&key) else {
            return;
        };
        if state.keep_destroyed {
            return;
        }
        state.keep_destroyed = true;
        let heap = state.backing_heap();
        let parent = state.parent;
        if heap.is_some() {
            self.mark_keep_alive(heap);
        }
        if parent.is_some() {
            self.mark_keep_alive(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_protocol::{HeapDesc, HeapFlags, HeapType};

    fn heap_state(key: u64, parent: u64) -> ObjectState {
        ObjectState::new(
            ObjectKey(key),
            ObjectKey(parent),
            CommandKey(key),
            Command::CreateHeap {
                desc: HeapDesc {
                    size_bytes: 1 << 16,
                    heap_type: HeapType::Default,
                    flags: HeapFlags::empty(),
                },
            },
        )
    }

    fn placed_state(key: u64, parent: u64, heap: u64) -> ObjectState {
        ObjectState::new(
            ObjectKey(key),
            ObjectKey(parent),
            CommandKey(key),
            Command::CreatePlacedResource {
                heap_key: ObjectKey(heap),
                heap_offset: 0,
                desc: ResourceDesc::buffer(64),
                initial_state: ResourceStates::COMMON,
            },
        )
    }

    fn device_state(key: u64) -> ObjectState {
        ObjectState::new(
            ObjectKey(key),
            ObjectKey::NONE,
            CommandKey(key),
            Command::CreateDevice {
                adapter_key: ObjectKey::NONE,
                min_feature_level: 0xb000,
            },
        )
    }

    #[test]
    fn duplicate_store_keeps_first_record_and_adopts_native_handle() {
        let mut reg = ObjectRegistry::new();
        let mut first = heap_state(10, 0);
        first.debug_name = Some("first".into());
        reg.store(first);

        let mut dup = heap_state(10, 0);
        dup.native_handle = Some(0xDEAD);
        reg.store(dup);

        let state = reg.get(ObjectKey(10)).unwrap();
        assert_eq!(state.debug_name.as_deref(), Some("first"));
        assert_eq!(state.native_handle, Some(0xDEAD));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn release_to_zero_cascades_to_children_and_linked_target_only() {
        let mut reg = ObjectRegistry::new();
        reg.store(device_state(1));
        reg.store(heap_state(10, 1));
        reg.store(placed_state(20, 1, 10));
        reg.add_child(ObjectKey(10), ObjectKey(20));

        // Linked-lifetime target with only its self-reference left.
        let mut linked = heap_state(30, 1);
        linked.ref_count = 1;
        reg.store(linked);
        reg.get_mut(ObjectKey(10)).unwrap().linked_lifetime = ObjectKey(30);

        // Unrelated object must not be touched.
        reg.store(heap_state(40, 1));

        reg.release(ObjectKey(10), 0);

        assert!(!reg.contains(ObjectKey(10)));
        assert!(!reg.contains(ObjectKey(20)));
        assert!(!reg.contains(ObjectKey(30)));
        assert!(reg.contains(ObjectKey(40)));
        assert!(reg.contains(ObjectKey(1)));
    }

    #[test]
    fn linked_target_with_outstanding_references_survives_release() {
        let mut reg = ObjectRegistry::new();
        reg.store(heap_state(10, 0));
        let mut linked = heap_state(30, 0);
        linked.ref_count = 3;
        reg.store(linked);
        reg.get_mut(ObjectKey(10)).unwrap().linked_lifetime = ObjectKey(30);

        reg.release(ObjectKey(10), 0);

        assert!(!reg.contains(ObjectKey(10)));
        let linked = reg.get(ObjectKey(30)).unwrap();
        assert!(!linked.destroyed);
        assert_eq!(linked.ref_count, 3);
    }

    #[test]
    fn keep_destroyed_pins_record_through_release() {
        let mut reg = ObjectRegistry::new();
        reg.store(heap_state(10, 0));
        reg.mark_keep_alive(ObjectKey(10));
        reg.release(ObjectKey(10), 0);

        let state = reg.get(ObjectKey(10)).unwrap();
        assert!(state.destroyed);
        assert!(state.keep_destroyed);
    }

    #[test]
    fn keep_alive_propagates_to_backing_heap_and_parent_chain() {
        let mut reg = ObjectRegistry::new();
        reg.store(device_state(1));
        reg.store(heap_state(10, 1));
        reg.store(placed_state(20, 1, 10));

        reg.mark_keep_alive(ObjectKey(20));

        assert!(reg.get(ObjectKey(20)).unwrap().keep_destroyed);
        assert!(reg.get(ObjectKey(10)).unwrap().keep_destroyed);
        assert!(reg.get(ObjectKey(1)).unwrap().keep_destroyed);
    }
}
