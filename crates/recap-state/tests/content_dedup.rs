//! Hash deduplication of acceleration-structure build inputs: identical bytes
//! staged twice upload once, changed bytes upload fresh, and unneeded builds
//! leave no trace in the stream.

mod common;

use common::{committed_buffer, device, MapContentSource, SequencedTracker, UnitProbe};
use recap_protocol::{Command, CommandKey, ObjectKey, RecordedCommand, RtasBuildInput};
use recap_state::{RestoreAll, StateRestorer};

fn build_command(dest: u64, input_buffer: u64) -> Command {
    Command::BuildRaytracingAccelerationStructure {
        dest_resource_key: ObjectKey(dest),
        dest_offset_bytes: 0,
        inputs: vec![RtasBuildInput {
            buffer_key: ObjectKey(input_buffer),
            offset_bytes: 0,
            size_bytes: 64,
        }],
    }
}

fn run(restorer: &mut StateRestorer) -> Vec<RecordedCommand> {
    let mut sink: Vec<RecordedCommand> = Vec::new();
    let mut tracker = SequencedTracker::default();
    restorer
        .restore_state(
            &mut sink,
            &RestoreAll,
            &mut tracker,
            &MapContentSource::default(),
            &UnitProbe,
        )
        .unwrap();
    sink
}

fn uploads_into(sink: &[RecordedCommand], key: ObjectKey) -> usize {
    sink.iter()
        .filter(|c| matches!(c.command, Command::CopyBufferRegion { dst_key, .. } if dst_key == key))
        .count()
}

#[test]
fn duplicate_build_input_bytes_upload_once() {
    let mut restorer = StateRestorer::default();
    restorer.registry_mut().store(device(1));
    restorer.registry_mut().store(committed_buffer(20, 1, 64));
    restorer.registry_mut().store(committed_buffer(40, 1, 64));

    let build = CommandKey(100);
    restorer.rtas().record_build(build, build_command(40, 20));
    restorer.rtas().set_build_needed(build, true);

    // Two structures sharing the same input buffer dump the same bytes.
    assert!(restorer
        .content()
        .stage_build_input(build, ObjectKey(20), 0, vec![7; 64]));
    assert!(!restorer
        .content()
        .stage_build_input(build, ObjectKey(20), 0, vec![7; 64]));

    let sink = run(&mut restorer);
    assert_eq!(uploads_into(&sink, ObjectKey(20)), 1);
    assert_eq!(
        sink.iter()
            .filter(|c| matches!(c.command, Command::BuildRaytracingAccelerationStructure { .. }))
            .count(),
        1
    );
}

#[test]
fn changed_build_input_bytes_supersede_the_staged_upload() {
    let mut restorer = StateRestorer::default();
    restorer.registry_mut().store(device(1));
    restorer.registry_mut().store(committed_buffer(20, 1, 64));

    let build = CommandKey(100);
    restorer.rtas().record_build(build, build_command(40, 20));
    restorer.rtas().set_build_needed(build, true);

    assert!(restorer
        .content()
        .stage_build_input(build, ObjectKey(20), 0, vec![7; 64]));
    // The buffer mutated before the build actually consumed it.
    assert!(restorer
        .content()
        .stage_build_input(build, ObjectKey(20), 0, vec![8; 64]));

    let sink = run(&mut restorer);
    assert_eq!(uploads_into(&sink, ObjectKey(20)), 1);
    let uploaded = sink
        .iter()
        .find_map(|c| match &c.command {
            Command::WriteMappedResource { bytes, .. } if bytes.len() == 64 => Some(bytes.clone()),
            _ => None,
        })
        .expect("staged input bytes must be written");
    assert_eq!(uploaded, vec![8; 64]);
}

#[test]
fn unneeded_builds_emit_nothing() {
    let mut restorer = StateRestorer::default();
    restorer.registry_mut().store(device(1));
    restorer.registry_mut().store(committed_buffer(20, 1, 64));

    let build = CommandKey(100);
    restorer.rtas().record_build(build, build_command(40, 20));
    restorer
        .content()
        .stage_build_input(build, ObjectKey(20), 0, vec![7; 64]);
    // Structure-usage analysis: nothing at the resume point reads this build.
    restorer.rtas().set_build_needed(build, false);

    let sink = run(&mut restorer);
    assert_eq!(uploads_into(&sink, ObjectKey(20)), 0);
    assert!(!sink
        .iter()
        .any(|c| matches!(c.command, Command::BuildRaytracingAccelerationStructure { .. })));
}
