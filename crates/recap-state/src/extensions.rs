//! Vendor-extension global state.
//!
//! Extension state is process-global on the capture side (library
//! initialization counts, application identity, feature toggles, shader-slot
//! reservations) rather than per-object. It is owned by the restorer for the
//! duration of one subcapture session and replayed partly inline with object
//! restoration (application info after adapter enumeration, feature toggles
//! after context creation, slot reservations before the state objects that
//! consume them) and partly as a dedicated pass.

use recap_protocol::{
    ApplicationInfo, Command, CommandKey, CommandKeyAllocator, CommandSink, ObjectKey,
    RecordedCommand,
};

/// One captured shader-slot-space reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderSlotReservation {
    /// Capture-time key of the reservation call; reservations must land before
    /// any state object whose key follows them.
    pub capture_key: CommandKey,
    pub first_slot: u32,
    pub slot_count: u32,
}

#[derive(Debug, Default)]
pub struct ExtensionState {
    init_count: u32,
    version: u32,
    application_info: Option<ApplicationInfo>,
    application_info_replayed: bool,
    features: Vec<(u32, u64)>,
    features_replayed: bool,
    reservations: Vec<ShaderSlotReservation>,
    next_reservation: usize,
}

impl ExtensionState {
    /// Record one extension-library initialization observed during capture.
    pub fn note_initialized(&mut self, version: u32) {
        self.init_count += 1;
        self.version = version;
    }

    pub fn set_application_info(&mut self, info: ApplicationInfo) {
        self.application_info = Some(info);
    }

    /// Record a feature toggle; the latest value per feature wins.
    pub fn store_feature(&mut self, feature: u32, value: u64) {
        if let Some(entry) = self.features.iter_mut().find(|(f, _)| *f == feature) {
            entry.1 = value;
        } else {
            self.features.push((feature, value));
        }
    }

    pub fn store_reservation(&mut self, reservation: ShaderSlotReservation) {
        self.reservations.push(reservation);
        self.reservations.sort_by_key(|r| r.capture_key);
    }

    /// The captured application-info call, handed out once; it replays after
    /// the first adapter enumeration.
    pub fn application_info_for_replay(&mut self) -> Option<ApplicationInfo> {
        if self.application_info_replayed {
            return None;
        }
        self.application_info_replayed = true;
        self.application_info.clone()
    }

    /// Re-issue one initialization call per captured initialization.
    pub fn replay_init(&mut self, keys: &mut CommandKeyAllocator, sink: &mut dyn CommandSink) {
        for _ in 0..self.init_count {
            sink.record(RecordedCommand {
                key: keys.next_key(),
                object_key: ObjectKey::NONE,
                command: Command::InitializeExtension {
                    version: self.version,
                },
            });
        }
    }

    /// Replay stored feature toggles once.
    pub fn replay_features(&mut self, keys: &mut CommandKeyAllocator, sink: &mut dyn CommandSink) {
        if self.features_replayed {
            return;
        }
        self.features_replayed = true;
        for (feature, value) in &self.features {
            sink.record(RecordedCommand {
                key: keys.next_key(),
                object_key: ObjectKey::NONE,
                command: Command::SetExtensionFeature {
                    feature: *feature,
                    value: *value,
                },
            });
        }
    }

    /// Emit pending slot reservations whose capture key precedes `before`.
    pub fn flush_reservations_before(
        &mut self,
        before: CommandKey,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) {
        while self.next_reservation < self.reservations.len() {
            let reservation = self.reservations[self.next_reservation];
            if reservation.capture_key >= before {
                break;
            }
            self.next_reservation += 1;
            sink.record(RecordedCommand {
                key: keys.next_key(),
                object_key: ObjectKey::NONE,
                command: Command::ReserveShaderSlots {
                    first_slot: reservation.first_slot,
                    slot_count: reservation.slot_count,
                },
            });
        }
    }

    /// Emit any reservations not yet flushed by a state-object restoration.
    pub fn flush_remaining_reservations(
        &mut self,
        keys: &mut CommandKeyAllocator,
        sink: &mut dyn CommandSink,
    ) {
        self.flush_reservations_before(CommandKey(u64::MAX), keys, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_flush_in_capture_key_order_without_repeats() {
        let mut state = ExtensionState::default();
        let mut keys = CommandKeyAllocator::new();
        let mut sink: Vec<RecordedCommand> = Vec::new();

        state.store_reservation(ShaderSlotReservation {
            capture_key: CommandKey(30),
            first_slot: 8,
            slot_count: 2,
        });
        state.store_reservation(ShaderSlotReservation {
            capture_key: CommandKey(10),
            first_slot: 0,
            slot_count: 4,
        });

        state.flush_reservations_before(CommandKey(20), &mut keys, &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink[0].command,
            Command::ReserveShaderSlots {
                first_slot: 0,
                slot_count: 4
            }
        );

        state.flush_remaining_reservations(&mut keys, &mut sink);
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink[1].command,
            Command::ReserveShaderSlots {
                first_slot: 8,
                slot_count: 2
            }
        );

        // Everything is flushed; nothing repeats.
        state.flush_remaining_reservations(&mut keys, &mut sink);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn features_and_init_replay_once() {
        let mut state = ExtensionState::default();
        let mut keys = CommandKeyAllocator::new();
        let mut sink: Vec<RecordedCommand> = Vec::new();

        state.note_initialized(2);
        state.note_initialized(2);
        state.store_feature(1, 1);
        state.store_feature(1, 0); // latest value wins

        state.replay_init(&mut keys, &mut sink);
        state.replay_features(&mut keys, &mut sink);
        state.replay_features(&mut keys, &mut sink);

        let commands: Vec<_> = sink.iter().map(|c| c.command.clone()).collect();
        assert_eq!(
            commands,
            vec![
                Command::InitializeExtension { version: 2 },
                Command::InitializeExtension { version: 2 },
                Command::SetExtensionFeature {
                    feature: 1,
                    value: 0
                },
            ]
        );
    }
}
