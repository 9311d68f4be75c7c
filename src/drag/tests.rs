//! Unit tests for the drag/pan-zoom interaction machine

use crate::drag::{DragEffect, DragEvent, DragMachine, DragState, LockedState, Point};
use crate::port::Capabilities;

fn locked_machine() -> DragMachine {
    let mut machine = DragMachine::new(Capabilities::standalone());
    machine.handle(DragEvent::LockKeyDown {
        from_text_input: false,
    });
    machine
}

#[test]
fn test_lock_and_release_toggle_selection() {
    let mut machine = DragMachine::new(Capabilities::standalone());
    assert_eq!(machine.state(), DragState::Released);

    let effect = machine.handle(DragEvent::LockKeyDown {
        from_text_input: false,
    });
    assert_eq!(effect, Some(DragEffect::SelectionDisabled(true)));
    assert_eq!(machine.state(), DragState::Locked(LockedState::Idle));

    let effect = machine.handle(DragEvent::LockKeyUp);
    assert_eq!(effect, Some(DragEffect::SelectionDisabled(false)));
    assert_eq!(machine.state(), DragState::Released);
}

#[test]
fn test_keydown_from_text_input_is_ignored() {
    let mut machine = DragMachine::new(Capabilities::standalone());
    let effect = machine.handle(DragEvent::LockKeyDown {
        from_text_input: true,
    });
    assert_eq!(effect, None);
    assert_eq!(machine.state(), DragState::Released);
}

#[test]
fn test_grab_drag_ungrab_cycle() {
    let mut machine = locked_machine();

    assert_eq!(machine.handle(DragEvent::Grab(Point::new(10.0, 10.0))), None);
    assert_eq!(
        machine.state(),
        DragState::Locked(LockedState::Grabbed {
            point: Point::new(10.0, 10.0)
        })
    );

    // Delta is previous point minus new point.
    let effect = machine.handle(DragEvent::Drag(Point::new(15.0, 12.0)));
    assert_eq!(effect, Some(DragEffect::Pan { dx: -5.0, dy: -2.0 }));
    assert_eq!(
        machine.state(),
        DragState::Locked(LockedState::Dragging {
            point: Point::new(15.0, 12.0)
        })
    );

    assert_eq!(machine.handle(DragEvent::Ungrab), None);
    assert_eq!(machine.state(), DragState::Locked(LockedState::Idle));
}

#[test]
fn test_continuous_drag_emits_per_move_deltas() {
    let mut machine = locked_machine();
    machine.handle(DragEvent::Grab(Point::new(0.0, 0.0)));
    machine.handle(DragEvent::Drag(Point::new(4.0, 3.0)));

    let effect = machine.handle(DragEvent::Drag(Point::new(6.0, 1.0)));
    assert_eq!(effect, Some(DragEffect::Pan { dx: -2.0, dy: 2.0 }));
}

#[test]
fn test_drag_without_grab_is_ignored() {
    let mut machine = locked_machine();
    assert_eq!(machine.handle(DragEvent::Drag(Point::new(5.0, 5.0))), None);
    assert_eq!(machine.state(), DragState::Locked(LockedState::Idle));
}

#[test]
fn test_pointer_events_ignored_while_released() {
    let mut machine = DragMachine::new(Capabilities::standalone());
    assert_eq!(machine.handle(DragEvent::Grab(Point::new(1.0, 1.0))), None);
    assert_eq!(machine.state(), DragState::Released);
}

#[test]
fn test_embedded_without_pan_permission_is_inert() {
    let mut machine = DragMachine::new(Capabilities::embedded(false));
    assert_eq!(machine.state(), DragState::EmbeddedLocked);

    for event in [
        DragEvent::LockKeyDown {
            from_text_input: false,
        },
        DragEvent::Grab(Point::new(1.0, 1.0)),
        DragEvent::Drag(Point::new(2.0, 2.0)),
        DragEvent::Ungrab,
        DragEvent::LockKeyUp,
    ] {
        assert_eq!(machine.handle(event), None);
        assert_eq!(machine.state(), DragState::EmbeddedLocked);
    }
}

#[test]
fn test_embedded_with_pan_permission_behaves_normally() {
    let mut machine = DragMachine::new(Capabilities::embedded(true));
    assert_eq!(machine.state(), DragState::Released);
}

#[test]
fn test_new_grab_resets_drag_origin() {
    let mut machine = locked_machine();
    machine.handle(DragEvent::Grab(Point::new(0.0, 0.0)));
    machine.handle(DragEvent::Drag(Point::new(10.0, 10.0)));
    machine.handle(DragEvent::Ungrab);

    machine.handle(DragEvent::Grab(Point::new(100.0, 100.0)));
    let effect = machine.handle(DragEvent::Drag(Point::new(101.0, 99.0)));
    assert_eq!(effect, Some(DragEffect::Pan { dx: -1.0, dy: 1.0 }));
}
