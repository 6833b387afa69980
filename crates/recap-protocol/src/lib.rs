//! Synthetic command model for subcapture replay.
//!
//! A capture assigns every API call a monotonically increasing command key and,
//! for calls that create, mutate, or destroy a long-lived API object, an object
//! key. This crate holds the shared vocabulary for both sides of that boundary:
//! key types and the state-restore key allocator, the closed [`Command`] set the
//! restoration engine can synthesize, and the canonical little-endian packet
//! encoding used to hand commands to the replay dispatch pipeline.

mod command;
mod keys;
mod writer;

pub use command::{
    ApplicationInfo, Command, CommandKind, HeapDesc, HeapFlags, HeapType, ResourceDesc,
    ResourceDimension, ResourceStates, RestoreMarker, RtasBuildInput, RtasCopyMode,
};
pub use keys::{CommandKey, CommandKeyAllocator, ObjectKey, STATE_RESTORE_KEY_MASK};
pub use writer::{
    decode_packet_header_le, decode_stream_header_le, CommandSink, CommandStreamWriter,
    PacketHeader, RecordedCommand, StreamDecodeError, StreamHeader, COMMAND_STREAM_MAGIC,
    COMMAND_STREAM_VERSION, PACKET_HEADER_SIZE, STREAM_HEADER_SIZE,
};
