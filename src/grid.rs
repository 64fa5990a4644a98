//! Grid state store: the authoritative in-memory projection of the selected
//! scope's `{subjects, slots}`, and the single mediator for every read and
//! write against the timetable service.
//!
//! Writes are serialized per cell: a second write to a cell with one in
//! flight is rejected locally. Writes to distinct cells proceed
//! concurrently. On a write failure the store discards its local projection
//! and refetches the scope, so the grid always reflects server truth rather
//! than a guessed rollback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{TimetableError, TimetableResult};
use crate::model::{
    Actor, ClassRef, Day, Period, Scope, SlotKey, SlotRecord, SlotState, SlotWrite, Subject,
};
use crate::service::TimetableService;
use crate::submit::{completeness, Completeness};

pub struct GridStore {
    service: Arc<dyn TimetableService>,
    school_code: String,
    class: ClassRef,
    state: Mutex<GridState>,
}

#[derive(Default)]
struct GridState {
    personal: bool,
    subjects: Vec<Subject>,
    slots: HashMap<SlotKey, SlotRecord>,
    in_flight: HashSet<SlotKey>,
}

impl GridStore {
    pub fn new(
        service: Arc<dyn TimetableService>,
        school_code: impl Into<String>,
        class: ClassRef,
    ) -> GridStore {
        GridStore {
            service,
            school_code: school_code.into(),
            class,
            state: Mutex::new(GridState::default()),
        }
    }

    pub fn service(&self) -> &dyn TimetableService {
        self.service.as_ref()
    }

    pub fn school_code(&self) -> &str {
        &self.school_code
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// The scope reads and writes currently address.
    pub async fn scope(&self) -> Scope {
        let st = self.state.lock().await;
        self.scope_for(st.personal)
    }

    fn scope_for(&self, personal: bool) -> Scope {
        match (&self.class.class_teacher_id, personal) {
            (Some(teacher_id), true) => Scope::Teacher(teacher_id.clone()),
            _ => Scope::Class(self.class.id.clone()),
        }
    }

    async fn fetch_scope(
        &self,
        scope: &Scope,
    ) -> TimetableResult<(Vec<Subject>, HashMap<SlotKey, SlotRecord>)> {
        let subjects = self
            .service
            .list_subjects(&self.school_code, &self.class.id)
            .await?;
        let rows = self.service.list_slots(&self.school_code, scope).await?;
        let mut slots = HashMap::with_capacity(rows.len());
        for row in rows {
            // last-wins on duplicate keys; the scope invariant makes
            // duplicates unreachable from this engine's own writes
            slots.insert(row.key(), row);
        }
        Ok((subjects, slots))
    }

    /// Fetch subjects and slots for the current scope and replace the local
    /// projection. Failure of either fetch leaves prior state untouched; no
    /// partial merge.
    #[instrument(skip_all)]
    pub async fn load_scope(&self) -> TimetableResult<()> {
        let scope = self.scope().await;
        let (subjects, slots) = self.fetch_scope(&scope).await?;
        info!(
            subjects = subjects.len(),
            slots = slots.len(),
            "loaded scope"
        );
        let mut st = self.state.lock().await;
        st.subjects = subjects;
        st.slots = slots;
        Ok(())
    }

    /// Toggle between the class timetable and the class teacher's personal
    /// timetable. The toggle commits only after the new scope loads.
    #[instrument(skip_all)]
    pub async fn set_personal_scope(&self, personal: bool) -> TimetableResult<()> {
        if personal && self.class.class_teacher_id.is_none() {
            return Err(TimetableError::MissingClassTeacher(self.class.id.clone()));
        }
        let scope = self.scope_for(personal);
        let (subjects, slots) = self.fetch_scope(&scope).await?;
        let mut st = self.state.lock().await;
        st.personal = personal;
        st.subjects = subjects;
        st.slots = slots;
        Ok(())
    }

    /// Pure lookup; `Empty` is the sentinel for an absent slot.
    pub async fn get_slot(&self, day: Day, period: Period) -> SlotState {
        let st = self.state.lock().await;
        st.slots
            .get(&SlotKey::new(day, period))
            .map(SlotRecord::state)
            .unwrap_or(SlotState::Empty)
    }

    pub async fn subjects(&self) -> Vec<Subject> {
        self.state.lock().await.subjects.clone()
    }

    pub async fn subject(&self, subject_id: &str) -> Option<Subject> {
        let st = self.state.lock().await;
        st.subjects.iter().find(|s| s.id == subject_id).cloned()
    }

    pub async fn slots(&self) -> Vec<SlotRecord> {
        let st = self.state.lock().await;
        let mut slots: Vec<SlotRecord> = st.slots.values().cloned().collect();
        slots.sort_by_key(SlotRecord::key);
        slots
    }

    /// The submission gate, computed over the local projection.
    pub async fn completeness(&self) -> Completeness {
        let st = self.state.lock().await;
        completeness(st.slots.values())
    }

    /// Create a subject in the palette. The name is trimmed and must be
    /// non-empty; nothing is sent otherwise. On service failure local state
    /// is untouched and the server message is surfaced verbatim.
    #[instrument(skip_all)]
    pub async fn add_subject(
        &self,
        name: &str,
        color: &str,
        actor: &Actor,
    ) -> TimetableResult<Subject> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TimetableError::Validation(
                "subject name must be non-empty".into(),
            ));
        }
        let subject = self
            .service
            .create_subject(&self.school_code, name, color, actor)
            .await?;
        info!(subject_id = %subject.id, name, "subject created");
        self.state.lock().await.subjects.push(subject.clone());
        Ok(subject)
    }

    /// The single mutation primitive. `Assign` upserts the slot; `Clear`
    /// deletes it (subject and teachers together). On success only the
    /// matching `(day, period)` entry changes; on failure the whole scope is
    /// refetched before the error is returned.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn write_slot(
        &self,
        key: SlotKey,
        write: SlotWrite,
        actor: &Actor,
    ) -> TimetableResult<SlotState> {
        let scope = {
            let mut st = self.state.lock().await;
            let scope = self.scope_for(st.personal);
            if matches!(write, SlotWrite::Clear) && scope.is_personal() {
                return Err(TimetableError::Validation(
                    "clear applies to the class timetable scope".into(),
                ));
            }
            if !st.in_flight.insert(key) {
                return Err(TimetableError::WriteInFlight(key));
            }
            scope
        };

        let res = match &write {
            SlotWrite::Assign {
                subject_id,
                teacher_ids,
            } => self
                .service
                .upsert_slot(
                    &self.school_code,
                    &scope,
                    key,
                    subject_id,
                    teacher_ids,
                    actor,
                )
                .await
                .map(Some),
            SlotWrite::Clear => self
                .service
                .delete_slot(&self.school_code, key, &self.class.id, actor)
                .await
                .map(|_| None),
        };

        match res {
            Ok(update) => {
                let mut st = self.state.lock().await;
                st.in_flight.remove(&key);
                match update {
                    Some(record) => {
                        let state = record.state();
                        st.slots.insert(key, record);
                        Ok(state)
                    }
                    None => {
                        st.slots.remove(&key);
                        Ok(SlotState::Empty)
                    }
                }
            }
            Err(err) => {
                self.state.lock().await.in_flight.remove(&key);
                warn!(error = %err, "slot write failed; reconciling from service");
                if let Err(reload_err) = self.load_scope().await {
                    warn!(error = %reload_err, "reconcile reload failed; keeping prior state");
                }
                Err(err)
            }
        }
    }
}
