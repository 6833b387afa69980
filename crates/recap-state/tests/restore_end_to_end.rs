//! Full restoration pass over a small capture: device, heap, placed resource
//! with live content, resumed after those creations.

mod common;

use common::{device, heap, placed_buffer, MapContentSource, SequencedTracker, UnitProbe};
use recap_protocol::{Command, ObjectKey, RecordedCommand, ResourceStates, RestoreMarker};
use recap_state::{RestoreAll, StateRestorer};

fn position(sink: &[RecordedCommand], pred: impl Fn(&RecordedCommand) -> bool) -> usize {
    sink.iter()
        .position(pred)
        .expect("expected command missing from restoration stream")
}

#[test]
fn device_heap_placed_resource_restores_in_dependency_order() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut restorer = StateRestorer::default();
    restorer.registry_mut().store(device(1));
    restorer.registry_mut().store(heap(10, 1));
    let mut placed = placed_buffer(20, 1, 10, 64);
    placed.ref_count = 2;
    restorer.registry_mut().store(placed);

    let mut sink: Vec<RecordedCommand> = Vec::new();
    let mut tracker = SequencedTracker::with_order(vec![ObjectKey(20)]);
    let source = MapContentSource::default().with(20, vec![0x5A; 64]);
    restorer
        .restore_state(&mut sink, &RestoreAll, &mut tracker, &source, &UnitProbe)
        .unwrap();

    let create_device = position(&sink, |c| {
        matches!(c.command, Command::CreateDevice { .. }) && c.object_key == ObjectKey(1)
    });
    let create_heap = position(&sink, |c| {
        matches!(c.command, Command::CreateHeap { .. }) && c.object_key == ObjectKey(10)
    });
    let create_placed = position(&sink, |c| {
        matches!(
            c.command,
            Command::CreatePlacedResource { initial_state, .. }
                if initial_state == ResourceStates::COMMON
        ) && c.object_key == ObjectKey(20)
    });
    let addref = position(&sink, |c| {
        c.command
            == Command::AddRef {
                object_key: ObjectKey(20),
            }
    });
    let content_write = position(&sink, |c| {
        matches!(&c.command, Command::WriteMappedResource { bytes, .. } if bytes == &vec![0x5A; 64])
    });
    let content_copy = position(&sink, |c| {
        matches!(
            c.command,
            Command::CopyBufferRegion {
                dst_key: ObjectKey(20),
                dst_offset_bytes: 0,
                size_bytes: 64,
                ..
            }
        )
    });
    let end_marker = position(&sink, |c| {
        c.command
            == Command::Marker {
                marker: RestoreMarker::RestoreEnd,
            }
    });
    let closing_present = position(&sink, |c| matches!(c.command, Command::Present { .. }));

    assert!(create_device < create_heap);
    assert!(create_heap < create_placed);
    assert!(create_placed < addref);
    assert!(addref < content_write);
    assert!(content_write < content_copy);
    assert!(content_copy < end_marker);
    assert!(end_marker < closing_present);

    // Exactly one increment: captured count 2, one reference from creation.
    let increments = sink
        .iter()
        .filter(|c| {
            c.command
                == Command::AddRef {
                    object_key: ObjectKey(20),
                }
        })
        .count();
    assert_eq!(increments, 1);

    // Exactly one present closes the restoration window.
    let presents = sink
        .iter()
        .filter(|c| matches!(c.command, Command::Present { .. }))
        .count();
    assert_eq!(presents, 1);

    // The tracker is asked to re-apply transition state for the uploaded key.
    assert_eq!(tracker.state_restored, vec![ObjectKey(20)]);

    // Every synthesized key is monotonic and from the reserved space.
    for pair in sink.windows(2) {
        assert!(pair[0].key < pair[1].key);
        assert!(pair[1].key.is_state_restore());
    }
}

#[test]
fn restoration_is_idempotent_per_object() {
    let mut restorer = StateRestorer::default();
    restorer.registry_mut().store(device(1));
    restorer.registry_mut().store(heap(10, 1));

    let mut sink: Vec<RecordedCommand> = Vec::new();
    restorer.restore_object(ObjectKey(10), &mut sink);
    let after_first = sink.len();
    restorer.restore_object(ObjectKey(10), &mut sink);
    assert_eq!(sink.len(), after_first, "second restoration must be a no-op");
}

#[test]
fn destroyed_objects_are_not_recreated() {
    let mut restorer = StateRestorer::default();
    let mut gone = heap(10, 0);
    gone.destroyed = true;
    restorer.registry_mut().store(gone);

    let mut sink: Vec<RecordedCommand> = Vec::new();
    restorer.restore_object(ObjectKey(10), &mut sink);
    assert!(sink.is_empty());
}
