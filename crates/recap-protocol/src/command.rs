//! The closed set of calls the restoration engine can synthesize.
//!
//! Argument layouts are deliberately compact: each variant carries the fields
//! the engine patches or orders by, not the full API surface. Per-call argument
//! translation lives in the dispatch pipeline, outside this crate.

use crate::keys::ObjectKey;

bitflags::bitflags! {
    /// D3D12-style resource state mask.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResourceStates: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const DEPTH_WRITE = 1 << 4;
        const DEPTH_READ = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        const INDIRECT_ARGUMENT = 1 << 9;
        const COPY_DEST = 1 << 10;
        const COPY_SOURCE = 1 << 11;
        const RAYTRACING_ACCELERATION_STRUCTURE = 1 << 22;
    }
}

impl ResourceStates {
    /// The implicit D3D12 `COMMON` state (no bits set).
    pub const COMMON: ResourceStates = ResourceStates::empty();

    pub const GENERIC_READ: ResourceStates = ResourceStates::VERTEX_AND_CONSTANT_BUFFER
        .union(ResourceStates::INDEX_BUFFER)
        .union(ResourceStates::NON_PIXEL_SHADER_RESOURCE)
        .union(ResourceStates::PIXEL_SHADER_RESOURCE)
        .union(ResourceStates::INDIRECT_ARGUMENT)
        .union(ResourceStates::COPY_SOURCE);
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HeapFlags: u32 {
        const SHARED = 1 << 0;
        const DENY_BUFFERS = 1 << 2;
        const ALLOW_DISPLAY = 1 << 3;
        const DENY_RT_DS_TEXTURES = 1 << 6;
        const DENY_NON_RT_DS_TEXTURES = 1 << 7;
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeapType {
    Default = 1,
    Upload = 2,
    Readback = 3,
    Custom = 4,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Buffer = 1,
    Texture1d = 2,
    Texture2d = 3,
    Texture3d = 4,
}

impl ResourceDimension {
    pub fn is_buffer(self) -> bool {
        self == Self::Buffer
    }
}

/// Shape of a committed/placed/reserved resource.
///
/// `width` is the byte size for buffers and the texel width for textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    pub width: u64,
    pub height: u32,
    pub depth_or_array_size: u16,
    pub mip_levels: u16,
    pub format: u32,
    pub sample_count: u32,
}

impl ResourceDesc {
    pub fn buffer(size_bytes: u64) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            width: size_bytes,
            height: 1,
            depth_or_array_size: 1,
            mip_levels: 1,
            format: 0,
            sample_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapDesc {
    pub size_bytes: u64,
    pub heap_type: HeapType,
    pub flags: HeapFlags,
}

/// Restoration-window marker emitted into the replay stream.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestoreMarker {
    RestoreBegin = 1,
    RestoreEnd = 2,
    RtasRestoreBegin = 3,
    RtasRestoreEnd = 4,
    ResourcesRestoreBegin = 5,
    ResourcesRestoreEnd = 6,
}

/// One input buffer range consumed by an acceleration-structure build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtasBuildInput {
    pub buffer_key: ObjectKey,
    pub offset_bytes: u64,
    pub size_bytes: u64,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtasCopyMode {
    Clone = 0,
    Compact = 1,
    Serialize = 2,
    Deserialize = 3,
}

/// Vendor-extension application identity replayed after adapter enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
}

/// A recorded or synthesized call.
///
/// Creation commands are retained by value in the object registry so their
/// arguments can be patched before re-issue.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Marker {
        marker: RestoreMarker,
    },

    EnumAdapter {
        adapter_index: u32,
    },
    CreateDevice {
        adapter_key: ObjectKey,
        min_feature_level: u32,
    },
    CreateCommandQueue {
        device_key: ObjectKey,
        queue_type: u32,
        priority: i32,
    },
    CreateCommandAllocator {
        list_type: u32,
    },
    CreateCommandList {
        allocator_key: ObjectKey,
        list_type: u32,
        initial_pipeline_key: ObjectKey,
    },
    CreateFence {
        initial_value: u64,
        flags: u32,
    },
    QueryInterface {
        iid: u128,
    },

    CreateHeap {
        desc: HeapDesc,
    },
    /// Side command carrying the raw bytes backing an externally allocated
    /// heap. The dispatch pipeline resolves `allocation_id` to a live address
    /// at replay; the paired open call references it by the same id.
    CreateHeapAllocation {
        allocation_id: u64,
        bytes: Vec<u8>,
    },
    OpenExistingHeapFromAddress {
        address: u64,
    },
    CreateCommittedResource {
        heap_type: HeapType,
        heap_flags: HeapFlags,
        desc: ResourceDesc,
        initial_state: ResourceStates,
    },
    CreatePlacedResource {
        heap_key: ObjectKey,
        heap_offset: u64,
        desc: ResourceDesc,
        initial_state: ResourceStates,
    },
    CreateReservedResource {
        desc: ResourceDesc,
        initial_state: ResourceStates,
    },

    CreateDescriptorHeap {
        heap_type: u32,
        descriptor_count: u32,
        shader_visible: bool,
    },
    CreateRootSignature {
        blob: Vec<u8>,
    },
    CreatePipelineState {
        root_signature_key: ObjectKey,
        blob: Vec<u8>,
    },
    CreatePipelineLibrary {
        blob: Vec<u8>,
    },
    CreateStateObject {
        object_type: u32,
        blob: Vec<u8>,
    },

    AddRef {
        object_key: ObjectKey,
    },
    Release {
        object_key: ObjectKey,
    },
    SetName {
        object_key: ObjectKey,
        name: String,
    },
    SetResidencyPriority {
        object_keys: Vec<ObjectKey>,
        priority: u32,
    },
    MakeResident {
        object_keys: Vec<ObjectKey>,
    },
    Evict {
        object_keys: Vec<ObjectKey>,
    },

    MapResource {
        resource_key: ObjectKey,
        subresource: u32,
    },
    WriteMappedResource {
        resource_key: ObjectKey,
        offset_bytes: u64,
        bytes: Vec<u8>,
    },
    /// Synthetic CPU-visible staging buffer used to reach unmappable memory.
    CreateUploadBuffer {
        buffer_key: ObjectKey,
        size_bytes: u64,
    },
    CopyBufferRegion {
        dst_key: ObjectKey,
        dst_offset_bytes: u64,
        src_key: ObjectKey,
        src_offset_bytes: u64,
        size_bytes: u64,
    },
    CopyTextureRegion {
        dst_key: ObjectKey,
        dst_subresource: u32,
        src_key: ObjectKey,
        src_offset_bytes: u64,
    },
    ResourceBarrier {
        resource_key: ObjectKey,
        state_before: ResourceStates,
        state_after: ResourceStates,
    },
    /// Synthetic re-query so replay-side code that relies on a previously
    /// queried GPU virtual address observes the captured value.
    GetGpuVirtualAddress {
        resource_key: ObjectKey,
        expected_address: u64,
    },
    GetGpuDescriptorHandle {
        heap_key: ObjectKey,
        expected_handle: u64,
    },

    ResetCommandAllocator {
        allocator_key: ObjectKey,
    },
    CloseCommandList {
        list_key: ObjectKey,
    },
    SetListRootSignature {
        list_key: ObjectKey,
        root_signature_key: ObjectKey,
    },
    SetListPipelineState {
        list_key: ObjectKey,
        pipeline_key: ObjectKey,
    },
    SetListRootArguments {
        list_key: ObjectKey,
        bytes: Vec<u8>,
    },
    RestoreQueueHandle {
        queue_key: ObjectKey,
        handle: u64,
    },

    BuildRaytracingAccelerationStructure {
        dest_resource_key: ObjectKey,
        dest_offset_bytes: u64,
        inputs: Vec<RtasBuildInput>,
    },
    CopyRaytracingAccelerationStructure {
        dest_resource_key: ObjectKey,
        src_resource_key: ObjectKey,
        mode: RtasCopyMode,
    },
    GetShaderIdentifier {
        properties_key: ObjectKey,
        export_name: String,
    },

    CreateWindow {
        window_handle: u64,
        width: u32,
        height: u32,
    },
    CreateSwapChain {
        queue_key: ObjectKey,
        width: u32,
        height: u32,
        format: u32,
        buffer_count: u32,
    },
    Present {
        swapchain_key: ObjectKey,
        sync_interval: u32,
    },

    InitializeExtension {
        version: u32,
    },
    CreateExtensionContext {
        device_key: ObjectKey,
    },
    SetExtensionFeature {
        feature: u32,
        value: u64,
    },
    SetApplicationInfo {
        info: ApplicationInfo,
    },
    ReserveShaderSlots {
        first_slot: u32,
        slot_count: u32,
    },
}

/// Fieldless mirror of [`Command`], used for kind-keyed dispatch and the
/// packet opcode table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Marker,
    EnumAdapter,
    CreateDevice,
    CreateCommandQueue,
    CreateCommandAllocator,
    CreateCommandList,
    CreateFence,
    QueryInterface,
    CreateHeap,
    CreateHeapAllocation,
    OpenExistingHeapFromAddress,
    CreateCommittedResource,
    CreatePlacedResource,
    CreateReservedResource,
    CreateDescriptorHeap,
    CreateRootSignature,
    CreatePipelineState,
    CreatePipelineLibrary,
    CreateStateObject,
    AddRef,
    Release,
    SetName,
    SetResidencyPriority,
    MakeResident,
    Evict,
    MapResource,
    WriteMappedResource,
    CreateUploadBuffer,
    CopyBufferRegion,
    CopyTextureRegion,
    ResourceBarrier,
    GetGpuVirtualAddress,
    GetGpuDescriptorHandle,
    ResetCommandAllocator,
    CloseCommandList,
    SetListRootSignature,
    SetListPipelineState,
    SetListRootArguments,
    RestoreQueueHandle,
    BuildRaytracingAccelerationStructure,
    CopyRaytracingAccelerationStructure,
    GetShaderIdentifier,
    CreateWindow,
    CreateSwapChain,
    Present,
    InitializeExtension,
    CreateExtensionContext,
    SetExtensionFeature,
    SetApplicationInfo,
    ReserveShaderSlots,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Marker { .. } => CommandKind::Marker,
            Command::EnumAdapter { .. } => CommandKind::EnumAdapter,
            Command::CreateDevice { .. } => CommandKind::CreateDevice,
            Command::CreateCommandQueue { .. } => CommandKind::CreateCommandQueue,
            Command::CreateCommandAllocator { .. } => CommandKind::CreateCommandAllocator,
            Command::CreateCommandList { .. } => CommandKind::CreateCommandList,
            Command::CreateFence { .. } => CommandKind::CreateFence,
            Command::QueryInterface { .. } => CommandKind::QueryInterface,
            Command::CreateHeap { .. } => CommandKind::CreateHeap,
            Command::CreateHeapAllocation { .. } => CommandKind::CreateHeapAllocation,
            Command::OpenExistingHeapFromAddress { .. } => CommandKind::OpenExistingHeapFromAddress,
            Command::CreateCommittedResource { .. } => CommandKind::CreateCommittedResource,
            Command::CreatePlacedResource { .. } => CommandKind::CreatePlacedResource,
            Command::CreateReservedResource { .. } => CommandKind::CreateReservedResource,
            Command::CreateDescriptorHeap { .. } => CommandKind::CreateDescriptorHeap,
            Command::CreateRootSignature { .. } => CommandKind::CreateRootSignature,
            Command::CreatePipelineState { .. } => CommandKind::CreatePipelineState,
            Command::CreatePipelineLibrary { .. } => CommandKind::CreatePipelineLibrary,
            Command::CreateStateObject { .. } => CommandKind::CreateStateObject,
            Command::AddRef { .. } => CommandKind::AddRef,
            Command::Release { .. } => CommandKind::Release,
            Command::SetName { .. } => CommandKind::SetName,
            Command::SetResidencyPriority { .. } => CommandKind::SetResidencyPriority,
            Command::MakeResident { .. } => CommandKind::MakeResident,
            Command::Evict { .. } => CommandKind::Evict,
            Command::MapResource { .. } => CommandKind::MapResource,
            Command::WriteMappedResource { .. } => CommandKind::WriteMappedResource,
            Command::CreateUploadBuffer { .. } => CommandKind::CreateUploadBuffer,
            Command::CopyBufferRegion { .. } => CommandKind::CopyBufferRegion,
            Command::CopyTextureRegion { .. } => CommandKind::CopyTextureRegion,
            Command::ResourceBarrier { .. } => CommandKind::ResourceBarrier,
            Command::GetGpuVirtualAddress { .. } => CommandKind::GetGpuVirtualAddress,
            Command::GetGpuDescriptorHandle { .. } => CommandKind::GetGpuDescriptorHandle,
            Command::ResetCommandAllocator { .. } => CommandKind::ResetCommandAllocator,
            Command::CloseCommandList { .. } => CommandKind::CloseCommandList,
            Command::SetListRootSignature { .. } => CommandKind::SetListRootSignature,
            Command::SetListPipelineState { .. } => CommandKind::SetListPipelineState,
            Command::SetListRootArguments { .. } => CommandKind::SetListRootArguments,
            Command::RestoreQueueHandle { .. } => CommandKind::RestoreQueueHandle,
            Command::BuildRaytracingAccelerationStructure { .. } => {
                CommandKind::BuildRaytracingAccelerationStructure
            }
            Command::CopyRaytracingAccelerationStructure { .. } => {
                CommandKind::CopyRaytracingAccelerationStructure
            }
            Command::GetShaderIdentifier { .. } => CommandKind::GetShaderIdentifier,
            Command::CreateWindow { .. } => CommandKind::CreateWindow,
            Command::CreateSwapChain { .. } => CommandKind::CreateSwapChain,
            Command::Present { .. } => CommandKind::Present,
            Command::InitializeExtension { .. } => CommandKind::InitializeExtension,
            Command::CreateExtensionContext { .. } => CommandKind::CreateExtensionContext,
            Command::SetExtensionFeature { .. } => CommandKind::SetExtensionFeature,
            Command::SetApplicationInfo { .. } => CommandKind::SetApplicationInfo,
            Command::ReserveShaderSlots { .. } => CommandKind::ReserveShaderSlots,
        }
    }

    /// Whether a successful execution of this call produces a long-lived
    /// tracked object.
    pub fn creates_object(&self) -> bool {
        matches!(
            self.kind(),
            CommandKind::EnumAdapter
                | CommandKind::CreateDevice
                | CommandKind::CreateCommandQueue
                | CommandKind::CreateCommandAllocator
                | CommandKind::CreateCommandList
                | CommandKind::CreateFence
                | CommandKind::QueryInterface
                | CommandKind::CreateHeap
                | CommandKind::OpenExistingHeapFromAddress
                | CommandKind::CreateCommittedResource
                | CommandKind::CreatePlacedResource
                | CommandKind::CreateReservedResource
                | CommandKind::CreateDescriptorHeap
                | CommandKind::CreateRootSignature
                | CommandKind::CreatePipelineState
                | CommandKind::CreatePipelineLibrary
                | CommandKind::CreateStateObject
                | CommandKind::CreateSwapChain
                | CommandKind::CreateExtensionContext
        )
    }
}

impl CommandKind {
    pub const fn opcode(self) -> u32 {
        match self {
            CommandKind::Marker => 0x001,

            CommandKind::EnumAdapter => 0x100,
            CommandKind::CreateDevice => 0x101,
            CommandKind::CreateCommandQueue => 0x102,
            CommandKind::CreateCommandAllocator => 0x103,
            CommandKind::CreateCommandList => 0x104,
            CommandKind::CreateFence => 0x105,
            CommandKind::QueryInterface => 0x106,

            CommandKind::CreateHeap => 0x200,
            CommandKind::CreateHeapAllocation => 0x201,
            CommandKind::OpenExistingHeapFromAddress => 0x202,
            CommandKind::CreateCommittedResource => 0x203,
            CommandKind::CreatePlacedResource => 0x204,
            CommandKind::CreateReservedResource => 0x205,

            CommandKind::CreateDescriptorHeap => 0x300,
            CommandKind::CreateRootSignature => 0x301,
            CommandKind::CreatePipelineState => 0x302,
            CommandKind::CreatePipelineLibrary => 0x303,
            CommandKind::CreateStateObject => 0x304,

            CommandKind::AddRef => 0x400,
            CommandKind::Release => 0x401,
            CommandKind::SetName => 0x402,
            CommandKind::SetResidencyPriority => 0x403,
            CommandKind::MakeResident => 0x404,
            CommandKind::Evict => 0x405,

            CommandKind::MapResource => 0x500,
            CommandKind::WriteMappedResource => 0x501,
            CommandKind::CreateUploadBuffer => 0x502,
            CommandKind::CopyBufferRegion => 0x503,
            CommandKind::CopyTextureRegion => 0x504,
            CommandKind::ResourceBarrier => 0x505,
            CommandKind::GetGpuVirtualAddress => 0x506,
            CommandKind::GetGpuDescriptorHandle => 0x507,

            CommandKind::ResetCommandAllocator => 0x600,
            CommandKind::CloseCommandList => 0x601,
            CommandKind::SetListRootSignature => 0x602,
            CommandKind::SetListPipelineState => 0x603,
            CommandKind::SetListRootArguments => 0x604,
            CommandKind::RestoreQueueHandle => 0x605,

            CommandKind::BuildRaytracingAccelerationStructure => 0x700,
            CommandKind::CopyRaytracingAccelerationStructure => 0x701,
            CommandKind::GetShaderIdentifier => 0x702,

            CommandKind::CreateWindow => 0x800,
            CommandKind::CreateSwapChain => 0x801,
            CommandKind::Present => 0x802,

            CommandKind::InitializeExtension => 0x900,
            CommandKind::CreateExtensionContext => 0x901,
            CommandKind::SetExtensionFeature => 0x902,
            CommandKind::SetApplicationInfo => 0x903,
            CommandKind::ReserveShaderSlots => 0x904,
        }
    }
}
