//! Canonical packet encoding for synthesized command streams.
//!
//! Every packet is little-endian and 4-byte aligned: a fixed header (opcode,
//! `size_bytes`, command key, object key) followed by a per-kind payload.
//! The stream opens with a fixed-size header whose `size_bytes` is patched in
//! [`CommandStreamWriter::finish`].

use crate::command::{Command, RtasBuildInput};
use crate::keys::{CommandKey, ObjectKey};

pub const COMMAND_STREAM_MAGIC: u32 = u32::from_le_bytes(*b"RCMD");
pub const COMMAND_STREAM_VERSION: u32 = 1;

/// Stream header: magic, version, size_bytes, flags, reserved x2.
pub const STREAM_HEADER_SIZE: usize = 24;

/// Packet header: opcode, size_bytes, command key, object key.
pub const PACKET_HEADER_SIZE: usize = 24;

/// One synthesized call, tagged with its replay-stream identity.
///
/// `object_key` is [`ObjectKey::NONE`] for calls that do not target a tracked
/// object (markers, the closing present).
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCommand {
    pub key: CommandKey,
    pub object_key: ObjectKey,
    pub command: Command,
}

/// Appends synthesized commands to the outgoing replay stream in call order.
///
/// Emission order is the restoration order; implementations must not reorder.
pub trait CommandSink {
    fn record(&mut self, cmd: RecordedCommand);
}

/// Value-retaining sink for analysis and tests.
impl CommandSink for Vec<RecordedCommand> {
    fn record(&mut self, cmd: RecordedCommand) {
        self.push(cmd);
    }
}

fn align_up(v: usize, a: usize) -> usize {
    debug_assert!(a.is_power_of_two());
    (v + (a - 1)) & !(a - 1)
}

trait PutLe {
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_i32(&mut self, v: i32);
    fn put_u64(&mut self, v: u64);
    fn put_u128(&mut self, v: u128);
    fn put_key(&mut self, v: ObjectKey);
    fn put_bytes_u64(&mut self, bytes: &[u8]);
    fn put_str_u32(&mut self, s: &str);
    fn put_keys_u32(&mut self, keys: &[ObjectKey]);
}

impl PutLe for Vec<u8> {
    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.put_u32(v as u32);
    }

    fn put_u64(&mut self, v: u64) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u128(&mut self, v: u128) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_key(&mut self, v: ObjectKey) {
        self.put_u64(v.0);
    }

    fn put_bytes_u64(&mut self, bytes: &[u8]) {
        self.put_u64(bytes.len() as u64);
        self.extend_from_slice(bytes);
    }

    fn put_str_u32(&mut self, s: &str) {
        assert!(s.len() <= u32::MAX as usize, "string too large for u32 length");
        self.put_u32(s.len() as u32);
        self.extend_from_slice(s.as_bytes());
    }

    fn put_keys_u32(&mut self, keys: &[ObjectKey]) {
        assert!(keys.len() <= u32::MAX as usize, "key list too large for u32 count");
        self.put_u32(keys.len() as u32);
        for key in keys {
            self.put_key(*key);
        }
    }
}

fn put_build_inputs(out: &mut Vec<u8>, inputs: &[RtasBuildInput]) {
    out.put_u32(inputs.len() as u32);
    for input in inputs {
        out.put_key(input.buffer_key);
        out.put_u64(input.offset_bytes);
        out.put_u64(input.size_bytes);
    }
}

fn encode_payload(command: &Command, out: &mut Vec<u8>) {
    match command {
        Command::Marker { marker } => out.put_u32(*marker as u32),

        Command::EnumAdapter { adapter_index } => out.put_u32(*adapter_index),
        Command::CreateDevice {
            adapter_key,
            min_feature_level,
        } => {
            out.put_key(*adapter_key);
            out.put_u32(*min_feature_level);
        }
        Command::CreateCommandQueue {
            device_key,
            queue_type,
            priority,
        } => {
            out.put_key(*device_key);
            out.put_u32(*queue_type);
            out.put_i32(*priority);
        }
        Command::CreateCommandAllocator { list_type } => out.put_u32(*list_type),
        Command::CreateCommandList {
            allocator_key,
            list_type,
            initial_pipeline_key,
        } => {
            out.put_key(*allocator_key);
            out.put_u32(*list_type);
            out.put_key(*initial_pipeline_key);
        }
        Command::CreateFence {
            initial_value,
            flags,
        } => {
            out.put_u64(*initial_value);
            out.put_u32(*flags);
        }
        Command::QueryInterface { iid } => out.put_u128(*iid),

        Command::CreateHeap { desc } => {
            out.put_u64(desc.size_bytes);
            out.put_u32(desc.heap_type as u32);
            out.put_u32(desc.flags.bits());
        }
        Command::CreateHeapAllocation {
            allocation_id,
            bytes,
        } => {
            out.put_u64(*allocation_id);
            out.put_bytes_u64(bytes);
        }
        Command::OpenExistingHeapFromAddress { address } => out.put_u64(*address),
        Command::CreateCommittedResource {
            heap_type,
            heap_flags,
            desc,
            initial_state,
        } => {
            out.put_u32(*heap_type as u32);
            out.put_u32(heap_flags.bits());
            put_resource_desc(out, desc);
            out.put_u32(initial_state.bits());
        }
        Command::CreatePlacedResource {
            heap_key,
            heap_offset,
            desc,
            initial_state,
        } => {
            out.put_key(*heap_key);
            out.put_u64(*heap_offset);
            put_resource_desc(out, desc);
            out.put_u32(initial_state.bits());
        }
        Command::CreateReservedResource {
            desc,
            initial_state,
        } => {
            put_resource_desc(out, desc);
            out.put_u32(initial_state.bits());
        }

        Command::CreateDescriptorHeap {
            heap_type,
            descriptor_count,
            shader_visible,
        } => {
            out.put_u32(*heap_type);
            out.put_u32(*descriptor_count);
            out.put_u32(*shader_visible as u32);
        }
        Command::CreateRootSignature { blob } => out.put_bytes_u64(blob),
        Command::CreatePipelineState {
            root_signature_key,
            blob,
        } => {
            out.put_key(*root_signature_key);
            out.put_bytes_u64(blob);
        }
        Command::CreatePipelineLibrary { blob } => out.put_bytes_u64(blob),
        Command::CreateStateObject { object_type, blob } => {
            out.put_u32(*object_type);
            out.put_bytes_u64(blob);
        }

        Command::AddRef { object_key } | Command::Release { object_key } => {
            out.put_key(*object_key)
        }
        Command::SetName { object_key, name } => {
            out.put_key(*object_key);
            out.put_str_u32(name);
        }
        Command::SetResidencyPriority {
            object_keys,
            priority,
        } => {
            out.put_keys_u32(object_keys);
            out.put_u32(*priority);
        }
        Command::MakeResident { object_keys } | Command::Evict { object_keys } => {
            out.put_keys_u32(object_keys)
        }

        Command::MapResource {
            resource_key,
            subresource,
        } => {
            out.put_key(*resource_key);
            out.put_u32(*subresource);
        }
        Command::WriteMappedResource {
            resource_key,
            offset_bytes,
            bytes,
        } => {
            out.put_key(*resource_key);
            out.put_u64(*offset_bytes);
            out.put_bytes_u64(bytes);
        }
        Command::CreateUploadBuffer {
            buffer_key,
            size_bytes,
        } => {
            out.put_key(*buffer_key);
            out.put_u64(*size_bytes);
        }
        Command::CopyBufferRegion {
            dst_key,
            dst_offset_bytes,
            src_key,
            src_offset_bytes,
            size_bytes,
        } => {
            out.put_key(*dst_key);
            out.put_u64(*dst_offset_bytes);
            out.put_key(*src_key);
            out.put_u64(*src_offset_bytes);
            out.put_u64(*size_bytes);
        }
        Command::CopyTextureRegion {
            dst_key,
            dst_subresource,
            src_key,
            src_offset_bytes,
        } => {
            out.put_key(*dst_key);
            out.put_u32(*dst_subresource);
            out.put_key(*src_key);
            out.put_u64(*src_offset_bytes);
        }
        Command::ResourceBarrier {
            resource_key,
            state_before,
            state_after,
        } => {
            out.put_key(*resource_key);
            out.put_u32(state_before.bits());
            out.put_u32(state_after.bits());
        }
        Command::GetGpuVirtualAddress {
            resource_key,
            expected_address,
        } => {
            out.put_key(*resource_key);
            out.put_u64(*expected_address);
        }
        Command::GetGpuDescriptorHandle {
            heap_key,
            expected_handle,
        } => {
            out.put_key(*heap_key);
            out.put_u64(*expected_handle);
        }

        Command::ResetCommandAllocator { allocator_key } => out.put_key(*allocator_key),
        Command::CloseCommandList { list_key } => out.put_key(*list_key),
        Command::SetListRootSignature {
            list_key,
            root_signature_key,
        } => {
            out.put_key(*list_key);
            out.put_key(*root_signature_key);
        }
        Command::SetListPipelineState {
            list_key,
            pipeline_key,
        } => {
            out.put_key(*list_key);
            out.put_key(*pipeline_key);
        }
        Command::SetListRootArguments { list_key, bytes } => {
            out.put_key(*list_key);
            out.put_bytes_u64(bytes);
        }
        Command::RestoreQueueHandle { queue_key, handle } => {
            out.put_key(*queue_key);
            out.put_u64(*handle);
        }

        Command::BuildRaytracingAccelerationStructure {
            dest_resource_key,
            dest_offset_bytes,
            inputs,
        } => {
            out.put_key(*dest_resource_key);
            out.put_u64(*dest_offset_bytes);
            put_build_inputs(out, inputs);
        }
        Command::CopyRaytracingAccelerationStructure {
            dest_resource_key,
            src_resource_key,
            mode,
        } => {
            out.put_key(*dest_resource_key);
            out.put_key(*src_resource_key);
            out.put_u32(*mode as u32);
        }
        Command::GetShaderIdentifier {
            properties_key,
            export_name,
        } => {
            out.put_key(*properties_key);
            out.put_str_u32(export_name);
        }

        Command::CreateWindow {
            window_handle,
            width,
            height,
        } => {
            out.put_u64(*window_handle);
            out.put_u32(*width);
            out.put_u32(*height);
        }
        Command::CreateSwapChain {
            queue_key,
            width,
            height,
            format,
            buffer_count,
        } => {
            out.put_key(*queue_key);
            out.put_u32(*width);
            out.put_u32(*height);
            out.put_u32(*format);
            out.put_u32(*buffer_count);
        }
        Command::Present {
            swapchain_key,
            sync_interval,
        } => {
            out.put_key(*swapchain_key);
            out.put_u32(*sync_interval);
        }

        Command::InitializeExtension { version } => out.put_u32(*version),
        Command::CreateExtensionContext { device_key } => out.put_key(*device_key),
        Command::SetExtensionFeature { feature, value } => {
            out.put_u32(*feature);
            out.put_u64(*value);
        }
        Command::SetApplicationInfo { info } => {
            out.put_str_u32(&info.application_name);
            out.put_u32(info.application_version);
            out.put_str_u32(&info.engine_name);
            out.put_u32(info.engine_version);
        }
        Command::ReserveShaderSlots {
            first_slot,
            slot_count,
        } => {
            out.put_u32(*first_slot);
            out.put_u32(*slot_count);
        }
    }
}

fn put_resource_desc(out: &mut Vec<u8>, desc: &crate::command::ResourceDesc) {
    out.put_u32(desc.dimension as u32);
    out.put_u64(desc.width);
    out.put_u32(desc.height);
    out.put_u16(desc.depth_or_array_size);
    out.put_u16(desc.mip_levels);
    out.put_u32(desc.format);
    out.put_u32(desc.sample_count);
}

/// Builds a canonical command stream from recorded commands.
#[derive(Debug, Default, Clone)]
pub struct CommandStreamWriter {
    buf: Vec<u8>,
}

impl CommandStreamWriter {
    pub fn new() -> Self {
        let mut w = Self { buf: Vec::new() };
        w.reset();
        w
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.reserve(STREAM_HEADER_SIZE);
        self.buf.put_u32(COMMAND_STREAM_MAGIC);
        self.buf.put_u32(COMMAND_STREAM_VERSION);
        self.buf.put_u32(STREAM_HEADER_SIZE as u32);
        self.buf.put_u32(0); // flags
        self.buf.put_u32(0); // reserved
        self.buf.put_u32(0); // reserved
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= STREAM_HEADER_SIZE
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Patch the stream `size_bytes` and return the finished stream.
    pub fn finish(mut self) -> Vec<u8> {
        assert!(
            self.buf.len() <= u32::MAX as usize,
            "command stream too large for u32 size_bytes"
        );
        let len = self.buf.len() as u32;
        self.buf[8..12].copy_from_slice(&len.to_le_bytes());
        self.buf
    }

    pub fn append(&mut self, cmd: &RecordedCommand) {
        let mut payload = Vec::new();
        encode_payload(&cmd.command, &mut payload);

        let unpadded = PACKET_HEADER_SIZE + payload.len();
        let padded = align_up(unpadded, 4);
        assert!(
            padded <= u32::MAX as usize,
            "command packet too large for u32 size_bytes"
        );

        self.buf.put_u32(cmd.command.kind().opcode());
        self.buf.put_u32(padded as u32);
        self.buf.put_u64(cmd.key.0);
        self.buf.put_u64(cmd.object_key.0);
        self.buf.extend_from_slice(&payload);
        self.buf.resize(self.buf.len() + (padded - unpadded), 0);
    }
}

impl CommandSink for CommandStreamWriter {
    fn record(&mut self, cmd: RecordedCommand) {
        self.append(&cmd);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamHeader {
    pub magic: u32,
    pub version: u32,
    pub size_bytes: u32,
    pub flags: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub opcode: u32,
    pub size_bytes: u32,
    pub command_key: CommandKey,
    pub object_key: ObjectKey,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamDecodeError {
    #[error("buffer too small for stream header")]
    TruncatedStreamHeader,
    #[error("invalid command stream magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("unsupported command stream version {0}")]
    UnsupportedVersion(u32),
    #[error("buffer too small for packet header")]
    TruncatedPacketHeader,
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

pub fn decode_stream_header_le(bytes: &[u8]) -> Result<StreamHeader, StreamDecodeError> {
    if bytes.len() < STREAM_HEADER_SIZE {
        return Err(StreamDecodeError::TruncatedStreamHeader);
    }
    let header = StreamHeader {
        magic: read_u32_le(bytes, 0),
        version: read_u32_le(bytes, 4),
        size_bytes: read_u32_le(bytes, 8),
        flags: read_u32_le(bytes, 12),
    };
    if header.magic != COMMAND_STREAM_MAGIC {
        return Err(StreamDecodeError::BadMagic(header.magic));
    }
    if header.version != COMMAND_STREAM_VERSION {
        return Err(StreamDecodeError::UnsupportedVersion(header.version));
    }
    Ok(header)
}

pub fn decode_packet_header_le(bytes: &[u8]) -> Result<PacketHeader, StreamDecodeError> {
    if bytes.len() < PACKET_HEADER_SIZE {
        return Err(StreamDecodeError::TruncatedPacketHeader);
    }
    Ok(PacketHeader {
        opcode: read_u32_le(bytes, 0),
        size_bytes: read_u32_le(bytes, 4),
        command_key: CommandKey(read_u64_le(bytes, 8)),
        object_key: ObjectKey(read_u64_le(bytes, 16)),
    })
}
