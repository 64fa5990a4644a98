//! In-memory timetable grid engine: per-slot state machine, drag-and-drop
//! intent resolution, teacher-assignment flow, and submission fan-out into
//! personal timetables, all mediated through an external REST timetable
//! service.

pub mod assign;
pub mod config;
pub mod drag;
pub mod error;
pub mod grid;
pub mod model;
pub mod service;
pub mod submit;

pub use error::{TimetableError, TimetableResult};
pub use grid::GridStore;
