//! Subcapture state restoration.
//!
//! Replaying a capture from the middle requires first reconstructing every API
//! object that is live and observable at the resume point: none of them exist
//! on the replay device yet. This crate owns that reconstruction: the object
//! registry built during capture analysis, the dependency-ordered restore
//! sequencer that synthesizes creation calls, reference-count reconciliation,
//! and the per-resource-kind content restoration strategies (committed, placed
//! and reserved memory, acceleration structures, descriptor heaps, fences,
//! vendor-extension state).
//!
//! The synthesized stream is handed to a [`recap_protocol::CommandSink`] in
//! restoration order; the downstream dispatch pipeline, the wire format, and
//! the GPU-usage tracker are collaborators behind traits.

mod content;
mod error;
mod extensions;
mod refcount;
mod registry;
mod rtas;
mod sequencer;
pub mod sidecar;

pub use content::{ContentRestorer, ContentSource, UsageTracker};
pub use error::RestoreError;
pub use extensions::{ExtensionState, ShaderSlotReservation};
pub use refcount::{
    is_refcount_unreliable, NoRefCountProbe, RefCountProbe, REFCOUNT_UNRELIABLE_KINDS,
};
pub use registry::{
    AllocationKind, CommandListInfo, DescriptorHeapInfo, FenceInfo, HeapInfo, ObjectRegistry,
    ObjectState, ResourceInfo, StateObjectPropertiesInfo, SwapChainInfo, TrackedState,
};
pub use rtas::{RtasRestorer, SerializedStructure};
pub use sequencer::{
    initial_resource_state, RestoreAll, RestoreOptions, RestoreScope, StateRestorer,
};
