//! Oxiviz - Client-side core for an FSM visualizer
//! State machines coordinating source lifecycle, canvas interaction, and
//! persistence behind a visual editor for hierarchical state machines

pub mod cache;
pub mod drag;
pub mod gateway;
pub mod notify;
pub mod port;
pub mod record;
pub mod runtime;
pub mod source;

pub use drag::{DragEffect, DragEvent, DragMachine, DragState, Point};
pub use record::*;
pub use runtime::SourceRuntime;
pub use source::{Command, SourceDeps, SourceEvent, SourceMachine, SourceState};
