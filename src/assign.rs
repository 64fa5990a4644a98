//! Teacher-assignment sub-flow: runs between a palette drop and the slot
//! write it finalizes.
//!
//! Dropping a subject does not persist anything by itself. Eligible teachers
//! are fetched first; with no candidates the slot is written immediately in
//! the incomplete state, otherwise a [`PendingAssignment`] holds the modal
//! selection until the caller confirms (one write) or cancels (no write).

use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::drag::DropIntent;
use crate::error::{TimetableError, TimetableResult};
use crate::grid::GridStore;
use crate::model::{Actor, SlotKey, SlotState, SlotWrite, TeacherCandidate};

#[derive(Debug)]
pub enum DropOutcome {
    /// No eligible teacher exists for the subject. The slot was written with
    /// an empty teacher set; the caller should surface a non-blocking
    /// warning.
    SavedWithoutTeachers(SlotState),
    /// Candidates exist and nothing has been written yet. The caller drives
    /// the selection and then confirms or cancels.
    NeedsSelection(PendingAssignment),
}

/// The open modal: a drop awaiting teacher selection. Selection starts empty
/// on every invocation, including re-assignment of a complete slot.
#[derive(Debug)]
pub struct PendingAssignment {
    key: SlotKey,
    subject_id: String,
    candidates: Vec<TeacherCandidate>,
    selected: BTreeSet<String>,
}

impl PendingAssignment {
    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn candidates(&self) -> &[TeacherCandidate] {
        &self.candidates
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Checkbox semantics: flip the teacher in or out of the selection.
    /// Returns false (and changes nothing) for an id not in the candidate
    /// list.
    pub fn toggle(&mut self, teacher_id: &str) -> bool {
        if !self.candidates.iter().any(|c| c.id == teacher_id) {
            return false;
        }
        if !self.selected.remove(teacher_id) {
            self.selected.insert(teacher_id.to_string());
        }
        true
    }
}

/// Entry point for a resolved palette drop.
#[instrument(skip_all, fields(key = %intent.key))]
pub async fn begin_drop(
    store: &GridStore,
    intent: DropIntent,
    actor: &Actor,
) -> TimetableResult<DropOutcome> {
    let DropIntent { key, subject_id } = intent;
    if store.subject(&subject_id).await.is_none() {
        return Err(TimetableError::NotFound(format!(
            "subject {} is not in the palette",
            subject_id
        )));
    }

    let candidates = store
        .service()
        .teachers_for_subject(store.school_code(), &subject_id)
        .await?;

    if candidates.is_empty() {
        warn!(subject_id, "no eligible teacher for subject; saving incomplete");
        let state = store
            .write_slot(
                key,
                SlotWrite::Assign {
                    subject_id,
                    teacher_ids: vec![],
                },
                actor,
            )
            .await?;
        return Ok(DropOutcome::SavedWithoutTeachers(state));
    }

    info!(subject_id, candidates = candidates.len(), "awaiting teacher selection");
    Ok(DropOutcome::NeedsSelection(PendingAssignment {
        key,
        subject_id,
        candidates,
        selected: BTreeSet::new(),
    }))
}

/// Re-enter the flow for a slot that already holds a subject. The candidate
/// fetch and selection restart from scratch; previous teachers are not
/// pre-selected.
pub async fn begin_reassign(
    store: &GridStore,
    key: SlotKey,
    actor: &Actor,
) -> TimetableResult<DropOutcome> {
    match store.get_slot(key.day, key.period).await {
        SlotState::Empty => Err(TimetableError::Validation(format!(
            "no subject assigned at {}",
            key
        ))),
        SlotState::SubjectOnly { subject_id } | SlotState::Complete { subject_id, .. } => {
            begin_drop(store, DropIntent { key, subject_id }, actor).await
        }
    }
}

/// Finalize the modal: one write carrying the subject and whatever is
/// selected. An empty selection is allowed and yields the incomplete state.
#[instrument(skip_all, fields(key = %pending.key))]
pub async fn confirm(
    store: &GridStore,
    pending: PendingAssignment,
    actor: &Actor,
) -> TimetableResult<SlotState> {
    let PendingAssignment {
        key,
        subject_id,
        selected,
        ..
    } = pending;
    store
        .write_slot(
            key,
            SlotWrite::Assign {
                subject_id,
                teacher_ids: selected.into_iter().collect(),
            },
            actor,
        )
        .await
}

/// Abandon the drop. Consuming the pending state is the whole operation;
/// nothing was written, so there is nothing to undo.
pub fn cancel(pending: PendingAssignment) -> SlotKey {
    info!(key = %pending.key, "teacher assignment canceled");
    pending.key
}
