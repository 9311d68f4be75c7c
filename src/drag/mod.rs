//! Drag/Pan-Zoom Interaction Machine
//! Translates pointer and keyboard events into discrete pan deltas with
//! space-bar lock/release semantics, independent of rendering

use crate::port::Capabilities;

#[cfg(test)]
mod tests;

/// A canvas-space point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Low-level input events fed by the shell's DOM listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    /// Space-bar pressed. `from_text_input` is true when the event target
    /// is a text-input-like element; such presses must not steal focus.
    LockKeyDown { from_text_input: bool },
    /// Space-bar released
    LockKeyUp,
    /// Pointer pressed at a point
    Grab(Point),
    /// Pointer moved to a point while pressed
    Drag(Point),
    /// Pointer released
    Ungrab,
}

/// Externally observable side effects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEffect {
    /// Toggle the DOM text-selection style flag for the lock duration
    SelectionDisabled(bool),
    /// Cumulative pan delta since the previous drag point
    Pan { dx: f32, dy: f32 },
}

/// Sub-states while the space-bar lock is held
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockedState {
    /// Awaiting a pointer-down
    Idle,
    /// Pointer down, not yet moved
    Grabbed { point: Point },
    /// Continuous dragging; re-entered on every move
    Dragging { point: Point },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    /// Embedded without pan permission: every event is a no-op
    EmbeddedLocked,
    /// Awaiting the space-bar lock
    Released,
    Locked(LockedState),
}

/// Purely input-driven machine: no network, no persistence, no error states.
#[derive(Debug)]
pub struct DragMachine {
    state: DragState,
}

impl DragMachine {
    /// The embedded-restriction check happens once here, routing straight
    /// to the no-op state when panning is not permitted.
    pub fn new(caps: Capabilities) -> Self {
        let state = if caps.pan_enabled {
            DragState::Released
        } else {
            DragState::EmbeddedLocked
        };
        Self { state }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn handle(&mut self, event: DragEvent) -> Option<DragEffect> {
        let (next, effect) = match (self.state, event) {
            (DragState::EmbeddedLocked, _) => (self.state, None),

            (DragState::Released, DragEvent::LockKeyDown { from_text_input }) => {
                if from_text_input {
                    (self.state, None)
                } else {
                    (
                        DragState::Locked(LockedState::Idle),
                        Some(DragEffect::SelectionDisabled(true)),
                    )
                }
            }

            (DragState::Locked(_), DragEvent::LockKeyUp) => (
                DragState::Released,
                Some(DragEffect::SelectionDisabled(false)),
            ),

            (DragState::Locked(LockedState::Idle), DragEvent::Grab(point)) => {
                (DragState::Locked(LockedState::Grabbed { point }), None)
            }

            (
                DragState::Locked(
                    LockedState::Grabbed { point: prev } | LockedState::Dragging { point: prev },
                ),
                DragEvent::Drag(point),
            ) => (
                DragState::Locked(LockedState::Dragging { point }),
                Some(DragEffect::Pan {
                    dx: prev.x - point.x,
                    dy: prev.y - point.y,
                }),
            ),

            (
                DragState::Locked(LockedState::Grabbed { .. } | LockedState::Dragging { .. }),
                DragEvent::Ungrab,
            ) => (DragState::Locked(LockedState::Idle), None),

            _ => (self.state, None),
        };

        self.state = next;
        effect
    }
}
