use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use timegrid::error::{TimetableError, TimetableResult};
use timegrid::grid::GridStore;
use timegrid::model::{
    Actor, ClassRef, Day, Period, Scope, SlotKey, SlotRecord, Subject, TeacherCandidate,
};
use timegrid::service::TimetableService;
use timegrid::submit::{self, submit_timetable};
use tokio::sync::Mutex;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

#[derive(Debug, Clone)]
struct PersonalWrite {
    teacher_id: String,
    key: SlotKey,
    subject_id: String,
    teacher_ids: Vec<String>,
    updated_by: String,
}

/// Serves a fixed class timetable and records every personal-scope write;
/// scripted errors fail writes in arrival order.
#[derive(Clone, Default)]
struct FakeTimetable {
    class_slots: Arc<Mutex<Vec<SlotRecord>>>,
    personal_writes: Arc<Mutex<Vec<PersonalWrite>>>,
    upsert_errors: Arc<Mutex<VecDeque<TimetableError>>>,
    list_slot_calls: Arc<Mutex<usize>>,
}

impl FakeTimetable {
    async fn seed_class_slot(&self, day: Day, period: u8, subject_id: &str, teacher_ids: &[&str]) {
        self.class_slots.lock().await.push(SlotRecord {
            id: Uuid::new_v4().to_string(),
            day,
            period: Period::new(period).unwrap(),
            subject_id: Some(subject_id.into()),
            teacher_ids: teacher_ids.iter().map(|t| t.to_string()).collect(),
            updated_at: Some(Utc::now()),
        });
    }

    async fn fail_next_upsert(&self, err: TimetableError) {
        self.upsert_errors.lock().await.push_back(err);
    }

    async fn personal_writes(&self) -> Vec<PersonalWrite> {
        self.personal_writes.lock().await.clone()
    }

    async fn list_slot_calls(&self) -> usize {
        *self.list_slot_calls.lock().await
    }
}

#[async_trait]
impl TimetableService for FakeTimetable {
    async fn list_subjects(
        &self,
        _school_code: &str,
        _class_id: &str,
    ) -> TimetableResult<Vec<Subject>> {
        Ok(vec![])
    }

    async fn list_slots(
        &self,
        _school_code: &str,
        scope: &Scope,
    ) -> TimetableResult<Vec<SlotRecord>> {
        *self.list_slot_calls.lock().await += 1;
        match scope {
            Scope::Class(_) => Ok(self.class_slots.lock().await.clone()),
            Scope::Teacher(_) => Ok(vec![]),
        }
    }

    async fn create_subject(
        &self,
        _school_code: &str,
        name: &str,
        color: &str,
        _actor: &Actor,
    ) -> TimetableResult<Subject> {
        Ok(Subject {
            id: format!("sub-{}", Uuid::new_v4()),
            name: name.into(),
            color: color.into(),
        })
    }

    async fn upsert_slot(
        &self,
        _school_code: &str,
        scope: &Scope,
        key: SlotKey,
        subject_id: &str,
        teacher_ids: &[String],
        actor: &Actor,
    ) -> TimetableResult<SlotRecord> {
        let teacher_id = match scope {
            Scope::Teacher(id) => id.clone(),
            Scope::Class(_) => panic!("submission must only write personal scopes"),
        };
        if let Some(err) = self.upsert_errors.lock().await.pop_front() {
            return Err(err);
        }
        self.personal_writes.lock().await.push(PersonalWrite {
            teacher_id,
            key,
            subject_id: subject_id.into(),
            teacher_ids: teacher_ids.to_vec(),
            updated_by: actor.staff_id.clone(),
        });
        Ok(SlotRecord {
            id: Uuid::new_v4().to_string(),
            day: key.day,
            period: key.period,
            subject_id: Some(subject_id.into()),
            teacher_ids: teacher_ids.to_vec(),
            updated_at: Some(Utc::now()),
        })
    }

    async fn delete_slot(
        &self,
        _school_code: &str,
        _key: SlotKey,
        _class_id: &str,
        _actor: &Actor,
    ) -> TimetableResult<()> {
        Ok(())
    }

    async fn teachers_for_subject(
        &self,
        _school_code: &str,
        _subject_id: &str,
    ) -> TimetableResult<Vec<TeacherCandidate>> {
        Ok(vec![])
    }
}

async fn setup() -> (FakeTimetable, GridStore, Actor) {
    init_tracing();
    let fake = FakeTimetable::default();
    let class = ClassRef {
        id: "c-10a".into(),
        class: "10".into(),
        section: "A".into(),
        academic_year: "2025-2026".into(),
        class_teacher_id: Some("t9".into()),
    };
    let store = GridStore::new(Arc::new(fake.clone()), "SC-1", class);
    (fake, store, Actor::new("st-admin"))
}

#[tokio::test]
async fn incomplete_grid_is_refused_with_count_and_no_writes() {
    let (fake, store, actor) = setup().await;
    fake.seed_class_slot(Day::Monday, 1, "m1", &["t1"]).await;
    fake.seed_class_slot(Day::Monday, 2, "m2", &["t2"]).await;
    fake.seed_class_slot(Day::Monday, 3, "m3", &[]).await;

    let err = submit_timetable(&store, &actor).await.unwrap_err();
    assert_eq!(err.to_string(), "1 slot(s) missing teacher assignment");
    assert!(matches!(err, TimetableError::Incomplete { missing: 1 }));
    assert!(fake.personal_writes().await.is_empty());
}

#[tokio::test]
async fn complete_grid_fans_out_one_write_per_slot_teacher_pair() {
    let (fake, store, actor) = setup().await;
    fake.seed_class_slot(Day::Monday, 1, "m1", &["t1", "t2"]).await;
    fake.seed_class_slot(Day::Tuesday, 2, "m2", &["t3"]).await;

    let report = submit_timetable(&store, &actor).await.unwrap();
    assert_eq!(report.total(), 3);
    assert!(report.is_success());

    let mut writes = fake.personal_writes().await;
    writes.sort_by(|a, b| a.teacher_id.cmp(&b.teacher_id));
    assert_eq!(writes.len(), 3);

    assert_eq!(writes[0].teacher_id, "t1");
    assert_eq!(writes[0].key, SlotKey::new(Day::Monday, Period::new(1).unwrap()));
    assert_eq!(writes[0].subject_id, "m1");
    assert_eq!(writes[0].teacher_ids, vec!["t1".to_string()]);
    assert_eq!(writes[0].updated_by, "st-admin");

    assert_eq!(writes[1].teacher_id, "t2");
    assert_eq!(writes[1].key, SlotKey::new(Day::Monday, Period::new(1).unwrap()));
    assert_eq!(writes[1].teacher_ids, vec!["t2".to_string()]);

    assert_eq!(writes[2].teacher_id, "t3");
    assert_eq!(writes[2].subject_id, "m2");
}

#[tokio::test]
async fn submission_acts_on_server_truth_not_the_local_projection() {
    let (fake, store, actor) = setup().await;
    // the store loaded an empty grid; the server has rows by submit time
    store.load_scope().await.unwrap();
    fake.seed_class_slot(Day::Friday, 7, "m1", &["t1"]).await;

    let before = fake.list_slot_calls().await;
    let report = submit_timetable(&store, &actor).await.unwrap();
    assert_eq!(report.total(), 1);
    assert_eq!(fake.list_slot_calls().await, before + 1);
}

#[tokio::test]
async fn partial_fanout_failure_is_reported_per_item() {
    let (fake, store, actor) = setup().await;
    fake.seed_class_slot(Day::Monday, 1, "m1", &["t1", "t2", "t3"])
        .await;
    fake.fail_next_upsert(TimetableError::Conflict("slot taken".into()))
        .await;

    let report = submit_timetable(&store, &actor).await.unwrap();
    assert_eq!(report.total(), 3);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].slot,
        SlotKey::new(Day::Monday, Period::new(1).unwrap())
    );
    assert!(matches!(
        failures[0].result,
        Err(TimetableError::Conflict(_))
    ));
    // the other writes were not rolled back
    assert_eq!(fake.personal_writes().await.len(), 2);
}

#[tokio::test]
async fn empty_grid_submits_trivially_with_zero_writes() {
    let (fake, store, actor) = setup().await;
    let report = submit_timetable(&store, &actor).await.unwrap();
    assert_eq!(report.total(), 0);
    assert!(report.is_success());
    assert!(fake.personal_writes().await.is_empty());
}

#[tokio::test]
async fn submission_is_refused_in_personal_scope() {
    let (fake, store, actor) = setup().await;
    fake.seed_class_slot(Day::Monday, 1, "m1", &["t1"]).await;
    store.set_personal_scope(true).await.unwrap();

    let err = submit_timetable(&store, &actor).await.unwrap_err();
    assert!(matches!(err, TimetableError::Validation(_)));
    assert!(fake.personal_writes().await.is_empty());
}

#[tokio::test]
async fn gate_matches_completeness_projection() {
    let (fake, store, _actor) = setup().await;
    fake.seed_class_slot(Day::Monday, 1, "m1", &["t1"]).await;
    fake.seed_class_slot(Day::Monday, 2, "m2", &[]).await;
    store.load_scope().await.unwrap();

    let gate = store.completeness().await;
    assert_eq!(gate, submit::Completeness {
        assigned: 2,
        complete: 1
    });
    assert_eq!(gate.missing(), 1);
}
