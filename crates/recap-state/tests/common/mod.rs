#![allow(dead_code)]

use std::collections::HashMap;

use recap_protocol::{
    Command, CommandKey, HeapDesc, HeapFlags, HeapType, ObjectKey, ResourceDesc,
    ResourceDimension, ResourceStates,
};
use recap_state::{ContentSource, ObjectState, RefCountProbe, UsageTracker};

pub fn device(key: u64) -> ObjectState {
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

pub fn heap(key: u64, parent: u64) -> ObjectState {
    ObjectState::new(
        ObjectKey(key),
        ObjectKey(parent),
        CommandKey(key),
        Command::CreateHeap {
            desc: HeapDesc {
                size_bytes: 1 << 20,
                heap_type: HeapType::Default,
                flags: HeapFlags::empty(),
            },
        },
    )
}

pub fn placed_buffer(key: u64, parent: u64, heap: u64, size_bytes: u64) -> ObjectState {
    ObjectState::new(
        ObjectKey(key),
        ObjectKey(parent),
        CommandKey(key),
        Command::CreatePlacedResource {
            heap_key: ObjectKey(heap),
            heap_offset: 0,
            desc: ResourceDesc::buffer(size_bytes),
            initial_state: ResourceStates::COMMON,
        },
    )
}

pub fn committed_buffer(key: u64, parent: u64, size_bytes: u64) -> ObjectState {
    ObjectState::new(
        ObjectKey(key),
        ObjectKey(parent),
        CommandKey(key),
        Command::CreateCommittedResource {
            heap_type: HeapType::Default,
            heap_flags: HeapFlags::empty(),
            desc: ResourceDesc::buffer(size_bytes),
            initial_state: ResourceStates::COMMON,
        },
    )
}

pub fn reserved_buffer(key: u64, parent: u64, size_bytes: u64) -> ObjectState {
    ObjectState::new(
        ObjectKey(key),
        ObjectKey(parent),
        CommandKey(key),
        Command::CreateReservedResource {
            desc: ResourceDesc::buffer(size_bytes),
            initial_state: ResourceStates::COMMON,
        },
    )
}

pub fn reserved_texture(key: u64, parent: u64, width: u32, height: u32) -> ObjectState {
    ObjectState::new(
        ObjectKey(key),
        ObjectKey(parent),
        CommandKey(key),
        Command::CreateReservedResource {
            desc: ResourceDesc {
                dimension: ResourceDimension::Texture2d,
                width: width as u64,
                height,
                depth_or_array_size: 1,
                mip_levels: 1,
                format: 28, // R8G8B8A8_UNORM
                sample_count: 1,
            },
            initial_state: ResourceStates::COMMON,
        },
    )
}

/// Usage tracker with a fixed dependency order; records the keys handed back
/// for transition-state restoration.
#[derive(Default)]
pub struct SequencedTracker {
    pub order: Vec<ObjectKey>,
    pub state_restored: Vec<ObjectKey>,
}

impl SequencedTracker {
    pub fn with_order(order: Vec<ObjectKey>) -> Self {
        Self {
            order,
            state_restored: Vec::new(),
        }
    }
}

impl UsageTracker for SequencedTracker {
    fn ordered_resources(&self) -> Vec<ObjectKey> {
        self.order.clone()
    }

    fn restore_resource_states(&mut self, keys: &[ObjectKey]) {
        self.state_restored.extend_from_slice(keys);
    }
}

/// Content dumps held in a map.
#[derive(Default)]
pub struct MapContentSource(pub HashMap<ObjectKey, Vec<u8>>);

impl MapContentSource {
    pub fn with(mut self, key: u64, bytes: Vec<u8>) -> Self {
        self.0.insert(ObjectKey(key), bytes);
        self
    }
}

impl ContentSource for MapContentSource {
    fn resource_bytes(&self, key: ObjectKey) -> Option<Vec<u8>> {
        self.0.get(&key).cloned()
    }
}

/// Probe reporting every live object holds exactly its creation reference.
pub struct UnitProbe;

impl RefCountProbe for UnitProbe {
    fn live_ref_count(&self, _key: ObjectKey, _native_handle: u64) -> Option<u32> {
        Some(1)
    }
}
