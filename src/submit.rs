//! Submission flow: an all-or-nothing completeness gate over the class
//! timetable, then a concurrent fan-out of one personal-timetable write per
//! `(slot, teacher)` pair.
//!
//! The fan-out acts on freshly fetched rows, never the local projection.
//! Individual writes are not rolled back on failure; the report carries a
//! per-item outcome so partial failure is actionable and retryable. The
//! class timetable itself, the source of truth, is never touched here.

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::error::{TimetableError, TimetableResult};
use crate::grid::GridStore;
use crate::model::{Actor, Scope, SlotKey, SlotRecord};

/// Counts behind the submission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completeness {
    /// Slots holding a subject.
    pub assigned: usize,
    /// Slots holding a subject and at least one teacher.
    pub complete: usize,
}

impl Completeness {
    pub fn missing(&self) -> usize {
        self.assigned - self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.assigned == self.complete
    }
}

pub fn completeness<'a, I>(slots: I) -> Completeness
where
    I: IntoIterator<Item = &'a SlotRecord>,
{
    let mut gate = Completeness {
        assigned: 0,
        complete: 0,
    };
    for slot in slots {
        if slot.subject_id.is_some() {
            gate.assigned += 1;
            if !slot.teacher_ids.is_empty() {
                gate.complete += 1;
            }
        }
    }
    gate
}

/// One propagation write and what became of it.
#[derive(Debug)]
pub struct PropagationOutcome {
    pub slot: SlotKey,
    pub subject_id: String,
    pub teacher_id: String,
    pub result: TimetableResult<()>,
}

#[derive(Debug)]
pub struct PropagationReport {
    pub outcomes: Vec<PropagationOutcome>,
}

impl PropagationReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PropagationOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Validate completeness of the whole grid and, if complete, fan the class
/// timetable out into each assigned teacher's personal timetable.
///
/// Refused while the store is toggled to a personal scope: the gate and the
/// fan-out are defined over the class timetable. Refused with
/// [`TimetableError::Incomplete`] when any subject slot lacks a teacher; no
/// propagation write is issued in that case.
#[instrument(skip_all)]
pub async fn submit_timetable(
    store: &GridStore,
    actor: &Actor,
) -> TimetableResult<PropagationReport> {
    let scope = store.scope().await;
    if scope.is_personal() {
        return Err(TimetableError::Validation(
            "submission applies to the class timetable scope".into(),
        ));
    }

    // act on server truth, not the local projection
    let slots = store
        .service()
        .list_slots(store.school_code(), &scope)
        .await?;

    let gate = completeness(&slots);
    if !gate.is_complete() {
        warn!(
            assigned = gate.assigned,
            missing = gate.missing(),
            "submission refused"
        );
        return Err(TimetableError::Incomplete {
            missing: gate.missing(),
        });
    }

    let pairs: Vec<(SlotKey, String, String)> = slots
        .iter()
        .filter_map(|slot| slot.subject_id.as_ref().map(|sid| (slot, sid)))
        .flat_map(|(slot, subject_id)| {
            slot.teacher_ids
                .iter()
                .map(move |teacher_id| (slot.key(), subject_id.clone(), teacher_id.clone()))
        })
        .collect();

    let outcomes = join_all(pairs.into_iter().map(|(key, subject_id, teacher_id)| {
        let scope = Scope::Teacher(teacher_id.clone());
        async move {
            let result = store
                .service()
                .upsert_slot(
                    store.school_code(),
                    &scope,
                    key,
                    &subject_id,
                    std::slice::from_ref(&teacher_id),
                    actor,
                )
                .await
                .map(|_| ());
            if let Err(err) = &result {
                warn!(%key, teacher_id, error = %err, "personal timetable write failed");
            }
            PropagationOutcome {
                slot: key,
                subject_id,
                teacher_id,
                result,
            }
        }
    }))
    .await;

    let report = PropagationReport { outcomes };
    info!(
        total = report.total(),
        failed = report.failed(),
        "timetable submitted"
    );
    Ok(report)
}
