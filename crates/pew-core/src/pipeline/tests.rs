use std::sync::{Arc, atomic::Ordering};

use chrono::{NaiveDate, NaiveDateTime};

use super::*;
use crate::{
  clock::FixedClock,
  recognition::DetectedFace,
  testing::{MemoryStore, ScriptedClient, face, jpeg},
};

fn sunday_morning() -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 1, 28)
    .unwrap()
    .and_hms_opt(9, 30, 0)
    .unwrap()
}

fn pipeline(
  store: &Arc<MemoryStore>,
  client: ScriptedClient,
) -> (RecognitionPipeline<MemoryStore, MemoryStore, ScriptedClient>, Arc<ScriptedClient>) {
  let client = Arc::new(client);
  let pipeline = RecognitionPipeline::new(
    store.clone(),
    store.clone(),
    client.clone(),
    PipelineConfig::default(),
  )
  .with_clock(Arc::new(FixedClock(sunday_morning())));
  (pipeline, client)
}

fn check_in(threshold: f64) -> CheckIn {
  CheckIn {
    image:      jpeg(),
    event_type: Some("sunday_service".to_owned()),
    threshold:  Threshold::new(threshold).unwrap(),
  }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn confident_match_records_attendance() {
  let store = Arc::new(MemoryStore::new());
  let jane = store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));

  let outcome = p.run(check_in(0.95)).await.unwrap();

  let Outcome::Success {
    member,
    record,
    confidence,
  } = outcome
  else {
    panic!("expected success, got {outcome:?}");
  };
  assert_eq!(member.member_id, jane.member_id);
  assert_eq!(confidence, 0.97);
  assert_eq!(record.similarity_score, Some(0.97));
  assert_eq!(record.event_type, "sunday_service");
  assert_eq!(record.attendance_date, sunday_morning().date());
  assert_eq!(record.check_in_time, sunday_morning().time());
  assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn below_threshold_is_low_confidence_without_writes() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.90)]));

  let outcome = p.run(check_in(0.95)).await.unwrap();

  assert_eq!(outcome, Outcome::LowConfidence { score: 0.90 });
  assert_eq!(outcome.tag(), "low_confidence");
  assert!(store.records().is_empty());
  assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn many_candidates_below_threshold_still_low_confidence() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(
    &store,
    ScriptedClient::matching(&[("a", 0.5), ("jane-doe", 0.94), ("b", 0.93)]),
  );

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome, Outcome::LowConfidence { score: 0.94 });
  assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn similarity_equal_to_threshold_is_accepted() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.85)]));

  let outcome = p.run(check_in(0.85)).await.unwrap();
  assert_eq!(outcome.tag(), "success");
}

#[tokio::test]
async fn manual_tier_accepts_what_realtime_rejects() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.90)]));
  let tiers = Thresholds::default();

  let mut attempt = check_in(0.0);
  attempt.threshold = tiers.realtime;
  assert_eq!(p.run(attempt.clone()).await.unwrap().tag(), "low_confidence");

  attempt.threshold = tiers.manual;
  assert_eq!(p.run(attempt).await.unwrap().tag(), "success");
}

// ─── No detection / no match ─────────────────────────────────────────────────

#[tokio::test]
async fn zero_faces_is_no_face_detected_without_writes() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::detecting(Vec::new()));

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome, Outcome::NoFaceDetected);
  assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn face_without_candidates_is_no_match() {
  let store = Arc::new(MemoryStore::new());
  let (p, _) = pipeline(&store, ScriptedClient::detecting(vec![DetectedFace::default()]));

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome, Outcome::NoMatchFound);
  assert_eq!(outcome.tag(), "no_match_found");
}

#[tokio::test]
async fn only_the_first_face_is_considered() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  store.seed_member("John", "Roe", "john-roe");
  let (p, _) = pipeline(
    &store,
    ScriptedClient::detecting(vec![
      face(&[("jane-doe", 0.60)]),
      face(&[("john-roe", 0.99)]),
    ]),
  );

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome, Outcome::LowConfidence { score: 0.60 });
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[test]
fn best_match_is_maximum_similarity() {
  let candidates = face(&[("a", 0.70), ("b", 0.98), ("c", 0.91)]).candidates;
  assert_eq!(select_best_match(&candidates).unwrap().subject_id, "b");
}

#[test]
fn ties_go_to_the_first_candidate() {
  let candidates = face(&[("a", 0.5), ("first", 0.97), ("second", 0.97)]).candidates;
  assert_eq!(select_best_match(&candidates).unwrap().subject_id, "first");

  let reversed = face(&[("second", 0.97), ("first", 0.97)]).candidates;
  assert_eq!(select_best_match(&reversed).unwrap().subject_id, "second");
}

#[test]
fn non_finite_scores_are_skipped() {
  let candidates = face(&[("nan", f64::NAN), ("ok", 0.2)]).candidates;
  assert_eq!(select_best_match(&candidates).unwrap().subject_id, "ok");
  assert!(select_best_match(&face(&[("nan", f64::NAN)]).candidates).is_none());
  assert!(select_best_match(&[]).is_none());
}

// ─── Identity resolution ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_subject_is_member_not_found() {
  let store = Arc::new(MemoryStore::new());
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("ghost", 0.99)]));

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(
    outcome,
    Outcome::MemberNotFound {
      subject_id: "ghost".to_owned(),
    }
  );
  assert!(store.records().is_empty());
}

#[tokio::test]
async fn inactive_member_is_not_matched() {
  let store = Arc::new(MemoryStore::new());
  let jane = store.seed_member("Jane", "Doe", "jane-doe");
  store.mark_inactive(jane.member_id).await.unwrap();
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.99)]));

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome.tag(), "member_not_found");
  assert!(store.records().is_empty());
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_check_in_is_already_recorded() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));

  let first = p.run(check_in(0.95)).await.unwrap();
  let second = p.run(check_in(0.95)).await.unwrap();

  let Outcome::Success { record: created, .. } = first else {
    panic!("expected success, got {first:?}");
  };
  let Outcome::AlreadyRecorded { record: existing, .. } = second else {
    panic!("expected already_recorded, got {second:?}");
  };
  assert_eq!(created.record_id, existing.record_id);
  assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn different_event_type_records_separately() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));

  p.run(check_in(0.95)).await.unwrap();
  let mut bible_study = check_in(0.95);
  bible_study.event_type = Some("bible_study".to_owned());
  let outcome = p.run(bible_study).await.unwrap();

  assert_eq!(outcome.tag(), "success");
  assert_eq!(store.records().len(), 2);
}

#[tokio::test]
async fn record_from_another_day_does_not_block() {
  let store = Arc::new(MemoryStore::new());
  let jane = store.seed_member("Jane", "Doe", "jane-doe");
  let last_week = NaiveDate::from_ymd_opt(2024, 1, 21)
    .unwrap()
    .and_hms_opt(9, 0, 0)
    .unwrap();
  store.seed_record(jane.member_id, last_week, "sunday_service");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome.tag(), "success");
}

#[tokio::test]
async fn missing_event_type_uses_configured_default() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));

  let mut attempt = check_in(0.95);
  attempt.event_type = None;
  let Outcome::Success { record, .. } = p.run(attempt).await.unwrap() else {
    panic!("expected success");
  };
  assert_eq!(record.event_type, "sunday_service");
}

#[tokio::test]
async fn concurrent_check_ins_store_one_record() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.97)]));
  let p = Arc::new(p);

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let p = p.clone();
      tokio::spawn(async move { p.run(check_in(0.95)).await })
    })
    .collect();

  let mut tags = Vec::new();
  for h in handles {
    tags.push(h.await.unwrap().unwrap().tag());
  }

  assert_eq!(tags.iter().filter(|t| **t == "success").count(), 1);
  assert_eq!(tags.iter().filter(|t| **t == "already_recorded").count(), 7);
  assert_eq!(store.records().len(), 1);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_service_is_service_unavailable() {
  let store = Arc::new(MemoryStore::new());
  store.seed_member("Jane", "Doe", "jane-doe");
  let (p, _) = pipeline(
    &store,
    ScriptedClient::failing(ClientError::Unreachable("connection refused".into())),
  );

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(outcome.tag(), "service_unavailable");
  assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn rejected_image_is_invalid_input() {
  let store = Arc::new(MemoryStore::new());
  let (p, _) = pipeline(
    &store,
    ScriptedClient::failing(ClientError::BadRequest("unsupported image".into())),
  );

  let outcome = p.run(check_in(0.95)).await.unwrap();
  assert_eq!(
    outcome,
    Outcome::InvalidInput {
      reason: "unsupported image".to_owned(),
    }
  );
}

#[tokio::test]
async fn invalid_images_never_reach_the_service() {
  let store = Arc::new(MemoryStore::new());
  let (p, client) = pipeline(&store, ScriptedClient::matching(&[("jane-doe", 0.99)]));

  for image in [Bytes::new(), Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0x00])] {
    let outcome = p
      .run(CheckIn {
        image,
        ..check_in(0.95)
      })
      .await
      .unwrap();
    assert_eq!(outcome.tag(), "invalid_input");
  }
  assert_eq!(client.detects.load(Ordering::SeqCst), 0);
}

#[test]
fn thresholds_outside_unit_interval_are_rejected() {
  assert!(Threshold::new(1.01).is_err());
  assert!(Threshold::new(-0.1).is_err());
  assert!(Threshold::new(f64::NAN).is_err());
  assert!(Threshold::new(0.0).is_ok());
}

#[test]
fn messages_mention_name_and_confidence() {
  let outcome = Outcome::LowConfidence { score: 0.9 };
  assert!(outcome.message().contains("90.0%"));
  assert_eq!(outcome.confidence(), Some(0.9));
  assert_eq!(Outcome::NoFaceDetected.tag(), "no_face_detected");
}
