//! Drag-and-drop interaction layer: translates a palette drag onto a grid
//! cell into a slot-write intent. Pure resolution, no I/O — a drop that does
//! not land on a well-formed cell inside the fixed Day×Period domain is a
//! no-op before any network call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Day, Period, SlotKey};

static TARGET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)-([0-9]{1,2})$").expect("valid drop target pattern"));

/// The only draggable origin is a palette chip. Filled cells expose a clear
/// affordance, not a re-drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    Palette { subject_id: String },
}

/// A validated drop: this subject onto this cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIntent {
    pub key: SlotKey,
    pub subject_id: String,
}

/// Parse a `"<Day>-<period>"` drop-target identifier. Returns `None` for
/// anything outside the fixed domain.
pub fn parse_target(raw: &str) -> Option<SlotKey> {
    let caps = TARGET_RE.captures(raw.trim())?;
    let day = Day::parse(caps.get(1)?.as_str())?;
    let period = caps.get(2)?.as_str().parse::<u8>().ok()?;
    let period = Period::new(period).ok()?;
    Some(SlotKey::new(day, period))
}

/// Resolve a drag gesture against a raw drop-target identifier.
pub fn resolve_drop(source: &DragSource, raw_target: &str) -> Option<DropIntent> {
    let key = parse_target(raw_target)?;
    match source {
        DragSource::Palette { subject_id } => Some(DropIntent {
            key,
            subject_id: subject_id.clone(),
        }),
    }
}
