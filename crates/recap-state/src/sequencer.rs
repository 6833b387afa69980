//! Restore sequencer.
//!
//! Drives one subcapture restoration pass: walks the object registry restoring
//! eligible objects (each object restores its parent and hard dependencies
//! first), then global extension state, acceleration structures, resource
//! contents, residual per-object state, reference counts, and swap-chain
//! rotation, closing the restoration window with a marker and one synthetic
//! present. The pass is single-threaded and synchronous; emission order into
//! the sink is the restoration order.

use std::path::PathBuf;

use recap_protocol::{
    ApplicationInfo, Command, CommandKeyAllocator, CommandSink, ObjectKey, RecordedCommand,
    ResourceDesc, ResourceStates, RestoreMarker,
};
use tracing::{debug, trace, warn};

use crate::content::{ContentRestorer, ContentSource, UsageTracker};
use crate::error::RestoreError;
use crate::extensions::ExtensionState;
use crate::refcount::{self, RefCountProbe};
use crate::registry::{ObjectRegistry, ObjectState, ResourceInfo, TrackedState};
use crate::rtas::RtasRestorer;
use crate::sidecar;

/// External eligibility test: should this object be restored at the resume
/// point?
pub trait RestoreScope {
    fn should_restore(&self, state: &ObjectState) -> bool;
}

/// Scope that restores every registered object.
pub struct RestoreAll;

impl RestoreScope for RestoreAll {
    fn should_restore(&self, _state: &ObjectState) -> bool {
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct RestoreOptions {
    /// Directory holding the capture's side-channel files.
    pub capture_dir: Option<PathBuf>,
    /// Subcapture output directory the side files are copied into.
    pub output_dir: Option<PathBuf>,
}

/// Initial state/layout to patch into a resource creation call.
///
/// Mappable and barrier-restricted resources keep their tracked state, as does
/// anything recorded as an acceleration structure; everything else starts
/// `COMMON` for buffers and `COPY_DEST` for textures so the content pass can
/// reach it.
pub fn initial_resource_state(info: &ResourceInfo, desc: &ResourceDesc) -> ResourceStates {
    if info
        .tracked_state
        .contains(ResourceStates::RAYTRACING_ACCELERATION_STRUCTURE)
    {
        return info.tracked_state;
    }
    if info.mappable || info.barrier_restricted {
        return info.tracked_state;
    }
    if desc.dimension.is_buffer() {
        ResourceStates::COMMON
    } else {
        ResourceStates::COPY_DEST
    }
}

/// One-shot restorer for a subcapture session.
pub struct StateRestorer {
    registry: ObjectRegistry,
    keys: CommandKeyAllocator,
    options: RestoreOptions,
    device_key: ObjectKey,
    extensions: ExtensionState,
    content: ContentRestorer,
    rtas: RtasRestorer,
    restore_ran: bool,
}

impl StateRestorer {
    pub fn new(options: RestoreOptions) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            keys: CommandKeyAllocator::new(),
            options,
            device_key: ObjectKey::NONE,
            extensions: ExtensionState::default(),
            content: ContentRestorer::default(),
            rtas: RtasRestorer::default(),
            restore_ran: false,
        }
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn content(&self) -> &ContentRestorer {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentRestorer {
        &mut self.content
    }

    pub fn rtas(&self) -> &RtasRestorer {
        &self.rtas
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionState {
        &mut self.extensions
    }

    /// Ambient device for residency-priority calls.
    pub fn set_device_key(&mut self, key: ObjectKey) {
        self.device_key = key;
    }

    pub fn store_intc_feature(&mut self, feature: u32, value: u64) {
        self.extensions.store_feature(feature, value);
    }

    pub fn store_intc_application_info(&mut self, info: ApplicationInfo) {
        self.extensions.set_application_info(info);
    }

    /// Pin an object (and its backing heap and parent chain) so restoration
    /// re-creates it even though the capture destroyed it.
    pub fn keep_state(&mut self, key: ObjectKey) {
        self.registry.mark_keep_alive(key);
    }

    /// Restore everything live at the resume point. Must be called exactly
    /// once per subcapture session.
    pub fn restore_state<S: CommandSink>(
        &mut self,
        sink: &mut S,
        scope: &dyn RestoreScope,
        tracker: &mut dyn UsageTracker,
        source: &dyn ContentSource,
        probe: &dyn RefCountProbe,
    ) -> Result<(), RestoreError> {
        assert!(
            !self.restore_ran,
            "state restoration ran twice for one subcapture session"
        );
        self.restore_ran = true;

        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::RestoreBegin,
        });

        for key in self.registry.keys_ordered() {
            let eligible = self
                .registry
                .get(key)
                .is_some_and(|state| scope.should_restore(state));
            if eligible {
                self.restore_object(key, sink);
            }
        }

        // Counts must be settled while the objects' creation calls are the
        // only references the replay stream has taken.
        refcount::reconcile(&self.registry, probe, &mut self.keys, sink);

        self.extensions.replay_init(&mut self.keys, sink);
        self.extensions.replay_features(&mut self.keys, sink);
        self.extensions
            .flush_remaining_reservations(&mut self.keys, sink);

        self.restore_descriptor_handles(sink);
        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::RtasRestoreBegin,
        });
        self.rtas.restore(&self.content, &mut self.keys, sink);
        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::RtasRestoreEnd,
        });

        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::ResourcesRestoreBegin,
        });
        let restored_contents =
            self.content
                .restore_contents(&self.registry, tracker, source, &mut self.keys, sink);
        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::ResourcesRestoreEnd,
        });
        tracker.restore_resource_states(&restored_contents);

        self.restore_mapped_resources(sink);
        self.restore_residency(sink);
        self.restore_command_list_state(sink);
        self.restore_queue_handles(sink);

        self.restore_back_buffer_rotation(sink);

        self.emit(sink, ObjectKey::NONE, Command::Marker {
            marker: RestoreMarker::RestoreEnd,
        });
        self.emit(sink, ObjectKey::NONE, Command::Present {
            swapchain_key: ObjectKey::NONE,
            sync_interval: 0,
        });

        if let (Some(capture_dir), Some(output_dir)) =
            (self.options.capture_dir.clone(), self.options.output_dir.clone())
        {
            sidecar::copy_side_files(&capture_dir, &output_dir)?;
        }
        Ok(())
    }

    /// Restore one object: parent and hard dependencies first, then the
    /// (possibly patched) creation call, then kind-specific follow-up.
    /// Idempotent; a missing dependency abandons the object without emitting.
    pub fn restore_object(&mut self, key: ObjectKey, sink: &mut dyn CommandSink) {
        let (parent, already_restored, blocked) = match self.registry.get(key) {
            None => {
                trace!(key = key.0, "no registry entry; object not restored");
                return;
            }
            Some(state) => (
                state.parent,
                state.restored,
                state.destroyed && !state.keep_destroyed,
            ),
        };
        if already_restored || blocked {
            return;
        }
        if let Some(state) = self.registry.get_mut(key) {
            state.restored = true;
        }

        if parent.is_some() {
            self.restore_object(parent, sink);
            if !self.handle_ready(parent) {
                warn!(
                    key = key.0,
                    parent = parent.0,
                    "parent restoration failed; abandoning object"
                );
                return;
            }
        }

        let creation = match self.registry.get(key) {
            Some(state) => state.creation.clone(),
            None => return,
        };
        match creation {
            Command::CreateSwapChain { .. } => self.restore_swap_chain(key, creation, sink),
            Command::EnumAdapter { .. } => self.restore_adapter(key, creation, sink),
            Command::CreateDevice { .. } => self.restore_device(key, creation, sink),
            Command::QueryInterface { .. } => self.restore_interface(key, creation, sink),
            Command::CreateFence { .. } => self.restore_fence(key, creation, sink),
            Command::CreateCommandList { .. } => self.restore_command_list(key, creation, sink),
            Command::CreateHeap { .. } => self.restore_heap(key, creation, sink),
            Command::OpenExistingHeapFromAddress { .. } => {
                self.restore_heap_from_address(key, sink)
            }
            Command::CreateCommittedResource { .. }
            | Command::CreatePlacedResource { .. }
            | Command::CreateReservedResource { .. } => self.restore_resource(key, creation, sink),
            Command::CreateExtensionContext { .. } => {
                self.restore_extension_context(key, creation, sink)
            }
            Command::CreateStateObject { .. } => self.restore_state_object(key, creation, sink),
            other => self.emit_creation(sink, key, other),
        }

        let name = self.registry.get(key).and_then(|state| {
            state
                .native_handle
                .is_some()
                .then(|| state.debug_name.clone())
                .flatten()
        });
        if let Some(name) = name {
            self.emit(sink, key, Command::SetName {
                object_key: key,
                name,
            });
        }
    }

    fn handle_ready(&self, key: ObjectKey) -> bool {
        self.registry
            .get(key)
            .is_some_and(|state| state.native_handle.is_some())
    }

    fn emit(&mut self, sink: &mut dyn CommandSink, object_key: ObjectKey, command: Command) {
        sink.record(RecordedCommand {
            key: self.keys.next_key(),
            object_key,
            command,
        });
    }

    fn emit_creation(&mut self, sink: &mut dyn CommandSink, key: ObjectKey, command: Command) {
        self.emit(sink, key, command);
        if let Some(state) = self.registry.get_mut(key) {
            state.native_handle = Some(key.0);
        }
    }

    fn restore_swap_chain(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        let info = self
            .registry
            .get(key)
            .and_then(|state| state.swap_chain_info())
            .cloned()
            .unwrap_or_default();
        // The window must exist before the chain that presents into it.
        self.emit(sink, ObjectKey::NONE, Command::CreateWindow {
            window_handle: info.window_handle,
            width: info.width,
            height: info.height,
        });
        self.emit_creation(sink, key, creation);
    }

    fn restore_adapter(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        self.emit_creation(sink, key, creation);
        // Application info targets enumerated adapters; it replays once, after
        // the first adapter exists.
        if let Some(info) = self.extensions.application_info_for_replay() {
            self.emit(sink, ObjectKey::NONE, Command::SetApplicationInfo { info });
        }
    }

    fn restore_device(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        self.emit_creation(sink, key, creation);
        self.device_key = key;
    }

    fn restore_interface(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        self.emit_creation(sink, key, creation);
        let identifiers = match self.registry.get(key).map(|state| &state.tracked) {
            Some(TrackedState::StateObjectProperties(info)) => info
                .shader_identifiers
                .iter()
                .map(|(export, _)| export.clone())
                .collect(),
            _ => Vec::new(),
        };
        for export_name in identifiers {
            self.emit(sink, key, Command::GetShaderIdentifier {
                properties_key: key,
                export_name,
            });
        }
    }

    fn restore_fence(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        let Command::CreateFence { flags, .. } = creation else {
            return;
        };
        // A fence that already advanced must start at its last signaled value.
        let completed = match self.registry.get(key).map(|state| &state.tracked) {
            Some(TrackedState::Fence(info)) => info.completed_value,
            _ => 0,
        };
        self.emit_creation(sink, key, Command::CreateFence {
            initial_value: completed,
            flags,
        });
    }

    fn restore_command_list(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        let Command::CreateCommandList {
            allocator_key,
            initial_pipeline_key,
            ..
        } = creation
        else {
            return;
        };
        self.restore_object(allocator_key, sink);
        if !self.handle_ready(allocator_key) {
            warn!(
                key = key.0,
                allocator = allocator_key.0,
                "backing allocator unavailable; abandoning command list"
            );
            return;
        }
        if initial_pipeline_key.is_some() {
            self.restore_object(initial_pipeline_key, sink);
        }
        self.emit(sink, allocator_key, Command::ResetCommandAllocator { allocator_key });
        self.emit_creation(sink, key, creation);
        // Captured command lists are always closed at rest.
        self.emit(sink, key, Command::CloseCommandList { list_key: key });
    }

    fn restore_heap(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        self.emit_creation(sink, key, creation);
        let priority = self
            .registry
            .get(key)
            .and_then(|state| state.heap_info())
            .and_then(|info| info.residency_priority);
        if let Some(priority) = priority {
            // Residency priority is a device-scoped call.
            let device = self.device_key;
            self.emit(sink, device, Command::SetResidencyPriority {
                object_keys: vec![key],
                priority,
            });
        }
    }

    fn restore_heap_from_address(&mut self, key: ObjectKey, sink: &mut dyn CommandSink) {
        let bytes = self
            .registry
            .get(key)
            .and_then(|state| state.heap_info())
            .and_then(|info| info.external_bytes.clone())
            .unwrap_or_default();
        // Two-step sequence: a side command reconstructs the host allocation,
        // the open call is patched to reference it by allocation id.
        self.emit(sink, ObjectKey::NONE, Command::CreateHeapAllocation {
            allocation_id: key.0,
            bytes,
        });
        self.emit_creation(sink, key, Command::OpenExistingHeapFromAddress { address: key.0 });
    }

    fn restore_resource(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        if let Command::CreatePlacedResource { heap_key, .. } = &creation {
            let heap_key = *heap_key;
            self.restore_object(heap_key, sink);
            if !self.handle_ready(heap_key) {
                warn!(
                    key = key.0,
                    heap = heap_key.0,
                    "backing heap unavailable; abandoning placed resource"
                );
                return;
            }
        }

        let Some(state) = self.registry.get(key) else {
            return;
        };
        let ref_count = state.ref_count;
        let Some(info) = state.resource_info().cloned() else {
            return;
        };

        let patched = match creation {
            Command::CreateCommittedResource {
                heap_type,
                heap_flags,
                desc,
                ..
            } => Command::CreateCommittedResource {
                heap_type,
                heap_flags,
                desc,
                initial_state: initial_resource_state(&info, &desc),
            },
            Command::CreatePlacedResource {
                heap_key,
                heap_offset,
                desc,
                ..
            } => Command::CreatePlacedResource {
                heap_key,
                heap_offset,
                desc,
                initial_state: initial_resource_state(&info, &desc),
            },
            Command::CreateReservedResource { desc, .. } => Command::CreateReservedResource {
                desc,
                initial_state: initial_resource_state(&info, &desc),
            },
            _ => return,
        };
        let committed = matches!(patched, Command::CreateCommittedResource { .. });

        // Only resources still referenced at the resume point carry content.
        if ref_count > 0 {
            self.content.register(key);
        }
        self.emit_creation(sink, key, patched);

        if committed {
            if let Some(priority) = info.residency_priority {
                let device = self.device_key;
                self.emit(sink, device, Command::SetResidencyPriority {
                    object_keys: vec![key],
                    priority,
                });
            }
        }
        if info.gpu_va != 0 {
            self.emit(sink, key, Command::GetGpuVirtualAddress {
                resource_key: key,
                expected_address: info.gpu_va,
            });
        }
    }

    fn restore_extension_context(
        &mut self,
        key: ObjectKey,
        creation: Command,
        sink: &mut dyn CommandSink,
    ) {
        self.emit_creation(sink, key, creation);
        // Enabled features take effect on the freshly created context.
        self.extensions.replay_features(&mut self.keys, sink);
    }

    fn restore_state_object(&mut self, key: ObjectKey, creation: Command, sink: &mut dyn CommandSink) {
        let creation_key = self
            .registry
            .get(key)
            .map(|state| state.creation_key)
            .unwrap_or_default();
        // Shader-slot reservations recorded before this call must land first.
        self.extensions
            .flush_reservations_before(creation_key, &mut self.keys, sink);
        self.emit_creation(sink, key, creation);

        let children = self
            .registry
            .get(key)
            .map(|state| state.children.clone())
            .unwrap_or_default();
        for child in children {
            if !self.registry.contains(child) {
                panic!(
                    "state object {} lists dependent object {} with no registry entry",
                    key.0, child.0
                );
            }
            self.restore_object(child, sink);
        }
    }

    fn restore_descriptor_handles(&mut self, sink: &mut dyn CommandSink) {
        for key in self.registry.keys_ordered() {
            let handle = match self.registry.get(key) {
                Some(state) if state.restored && state.native_handle.is_some() => {
                    match &state.tracked {
                        TrackedState::DescriptorHeap(info) => info.gpu_descriptor_handle,
                        _ => None,
                    }
                }
                _ => None,
            };
            if let Some(handle) = handle {
                self.emit(sink, key, Command::GetGpuDescriptorHandle {
                    heap_key: key,
                    expected_handle: handle,
                });
            }
        }
    }

    fn restore_mapped_resources(&mut self, sink: &mut dyn CommandSink) {
        for key in self.registry.keys_ordered() {
            let mapped = match self.registry.get(key) {
                Some(state)
                    if state.restored && state.native_handle.is_some() && !state.destroyed =>
                {
                    state
                        .resource_info()
                        .map(|info| info.mapped_subresources.clone())
                        .unwrap_or_default()
                }
                _ => Vec::new(),
            };
            for subresource in mapped {
                self.emit(sink, key, Command::MapResource {
                    resource_key: key,
                    subresource,
                });
            }
        }
    }

    fn restore_residency(&mut self, sink: &mut dyn CommandSink) {
        let mut evicted = Vec::new();
        for key in self.registry.keys_ordered() {
            if self
                .registry
                .get(key)
                .is_some_and(|state| state.restored && !state.destroyed && state.evicted)
            {
                evicted.push(key);
            }
        }
        if !evicted.is_empty() {
            let device = self.device_key;
            self.emit(sink, device, Command::Evict {
                object_keys: evicted,
            });
        }
    }

    fn restore_command_list_state(&mut self, sink: &mut dyn CommandSink) {
        for key in self.registry.keys_ordered() {
            let info = match self.registry.get(key) {
                Some(state)
                    if state.restored && state.native_handle.is_some() && !state.destroyed =>
                {
                    match &state.tracked {
                        TrackedState::CommandList(info) => Some(info.clone()),
                        _ => None,
                    }
                }
                _ => None,
            };
            let Some(info) = info else {
                continue;
            };
            if info.root_signature_key.is_some() {
                self.emit(sink, key, Command::SetListRootSignature {
                    list_key: key,
                    root_signature_key: info.root_signature_key,
                });
            }
            if info.pipeline_key.is_some() {
                self.emit(sink, key, Command::SetListPipelineState {
                    list_key: key,
                    pipeline_key: info.pipeline_key,
                });
            }
            if !info.root_arguments.is_empty() {
                self.emit(sink, key, Command::SetListRootArguments {
                    list_key: key,
                    bytes: info.root_arguments,
                });
            }
        }
    }

    fn restore_queue_handles(&mut self, sink: &mut dyn CommandSink) {
        for key in self.registry.keys_ordered() {
            let handle = match self.registry.get(key) {
                Some(state)
                    if state.restored && !state.destroyed
                        && matches!(state.creation, Command::CreateCommandQueue { .. }) =>
                {
                    state.native_handle
                }
                _ => None,
            };
            if let Some(handle) = handle {
                self.emit(sink, key, Command::RestoreQueueHandle {
                    queue_key: key,
                    handle,
                });
            }
        }
    }

    fn restore_back_buffer_rotation(&mut self, sink: &mut dyn CommandSink) {
        for key in self.registry.keys_ordered() {
            let info = match self.registry.get(key) {
                Some(state) if state.restored && !state.destroyed => {
                    state.swap_chain_info().cloned()
                }
                _ => None,
            };
            let Some(info) = info else {
                continue;
            };
            if info.back_buffer_count == 0 {
                continue;
            }
            // One present always follows the restore-end marker; rotate the
            // remaining distance so replay lands on the captured index.
            let presents =
                (info.current_back_buffer + info.back_buffer_count - 1) % info.back_buffer_count;
            debug!(
                key = key.0,
                presents, "rotating swap chain to captured back-buffer index"
            );
            for _ in 0..presents {
                self.emit(sink, key, Command::Present {
                    swapchain_key: key,
                    sync_interval: 0,
                });
            }
        }
    }
}

impl Default for StateRestorer {
    fn default() -> Self {
        Self::new(RestoreOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HeapInfo, SwapChainInfo};
    use recap_protocol::CommandKey;

    #[test]
    fn back_buffer_rotation_counts_the_appended_present() {
        let mut restorer = StateRestorer::default();
        let mut chain = ObjectState::new(
            ObjectKey(5),
            ObjectKey::NONE,
            CommandKey(1),
            Command::CreateSwapChain {
                queue_key: ObjectKey::NONE,
                width: 640,
                height: 480,
                format: 0,
                buffer_count: 3,
            },
        );
        if let Some(info) = chain.swap_chain_info_mut() {
            info.current_back_buffer = 2;
        }
        restorer.registry_mut().store(chain);

        let mut sink: Vec<RecordedCommand> = Vec::new();
        restorer.restore_object(ObjectKey(5), &mut sink);
        restorer.restore_back_buffer_rotation(&mut sink);

        let presents = sink
            .iter()
            .filter(|c| matches!(c.command, Command::Present { .. }))
            .count();
        // Index 2 with 3 buffers: one rotation present here, the closing
        // present elsewhere makes two.
        assert_eq!(presents, 1);
    }

    #[test]
    fn heap_from_address_replays_allocation_side_command_first() {
        let mut restorer = StateRestorer::default();
        let mut heap = ObjectState::new(
            ObjectKey(7),
            ObjectKey::NONE,
            CommandKey(2),
            Command::OpenExistingHeapFromAddress { address: 0x7000_0000 },
        );
        if let Some(info) = heap.heap_info_mut() {
            *info = HeapInfo {
                external_bytes: Some(vec![0x42; 32]),
                ..HeapInfo::default()
            };
        }
        restorer.registry_mut().store(heap);

        let mut sink: Vec<RecordedCommand> = Vec::new();
        restorer.restore_object(ObjectKey(7), &mut sink);

        assert!(matches!(
            sink[0].command,
            Command::CreateHeapAllocation { allocation_id: 7, .. }
        ));
        assert_eq!(
            sink[1].command,
            Command::OpenExistingHeapFromAddress { address: 7 }
        );
    }

    #[test]
    fn swap_chain_restore_creates_window_first() {
        let mut restorer = StateRestorer::default();
        let mut chain = ObjectState::new(
            ObjectKey(5),
            ObjectKey::NONE,
            CommandKey(1),
            Command::CreateSwapChain {
                queue_key: ObjectKey::NONE,
                width: 800,
                height: 600,
                format: 0,
                buffer_count: 2,
            },
        );
        if let Some(info) = chain.swap_chain_info_mut() {
            *info = SwapChainInfo {
                window_handle: 0xAB,
                width: 800,
                height: 600,
                back_buffer_count: 2,
                current_back_buffer: 0,
            };
        }
        restorer.registry_mut().store(chain);

        let mut sink: Vec<RecordedCommand> = Vec::new();
        restorer.restore_object(ObjectKey(5), &mut sink);

        assert!(matches!(sink[0].command, Command::CreateWindow { window_handle: 0xAB, .. }));
        assert!(matches!(sink[1].command, Command::CreateSwapChain { .. }));
    }

    #[test]
    #[should_panic(expected = "no registry entry")]
    fn state_object_with_missing_child_is_a_fatal_invariant_violation() {
        let mut restorer = StateRestorer::default();
        let mut state_object = ObjectState::new(
            ObjectKey(9),
            ObjectKey::NONE,
            CommandKey(3),
            Command::CreateStateObject {
                object_type: 1,
                blob: vec![],
            },
        );
        state_object.children.push(ObjectKey(999));
        restorer.registry_mut().store(state_object);

        let mut sink: Vec<RecordedCommand> = Vec::new();
        restorer.restore_object(ObjectKey(9), &mut sink);
    }
}
