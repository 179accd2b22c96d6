//! JSON REST API for the gradebook result engine.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any
//! [`ResultStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility; acting user ids arrive in request bodies.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", gradebook_api::api_router(engine.clone()))
//! ```

pub mod cohorts;
pub mod error;
pub mod results;
pub mod scores;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use gradebook_core::{
  store::ResultStore,
  term::{AcademicTerm, Term},
};
use gradebook_engine::Engine;
use serde::Deserialize;

pub use error::ApiError;

/// `?term=first&academic_year=2025`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TermQuery {
  pub term:          Term,
  pub academic_year: u16,
}

impl From<TermQuery> for AcademicTerm {
  fn from(q: TermQuery) -> Self { AcademicTerm::new(q.term, q.academic_year) }
}

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: ResultStore + 'static,
{
  Router::new()
    // Scores
    .route("/scores", get(scores::list::<S>).put(scores::upsert::<S>))
    // Cohorts
    .route(
      "/classes/{class_id}/subjects/{subject_assignment_id}/stats",
      get(cohorts::subject_stats::<S>),
    )
    .route("/classes/{class_id}/results", get(cohorts::list_class::<S>))
    .route("/classes/{class_id}/results/compile", post(cohorts::compile_class::<S>))
    .route("/students/{student_id}/results", get(cohorts::list_student::<S>))
    // Results
    .route("/results/compile", post(results::compile::<S>))
    .route("/results/{id}", get(results::get_one::<S>).delete(results::purge::<S>))
    .route("/results/{id}/submit", post(results::submit::<S>))
    .route("/results/{id}/approve", post(results::approve::<S>))
    .route("/results/{id}/reject", post(results::reject::<S>))
    .route("/results/{id}/reopen", post(results::reopen::<S>))
    .route("/results/{id}/narrative", put(results::set_narrative::<S>))
    .with_state(engine)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
  };
  use gradebook_core::{
    grading::{GradeBand, GradeTable},
    school::{AttendanceTotals, Student, SubjectAssignment},
  };
  use gradebook_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  struct Fixture {
    router:   Router,
    class_id: Uuid,
    subject:  Uuid,
    student:  Uuid,
    approver: Uuid,
  }

  async fn fixture() -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let term = AcademicTerm::new(Term::First, 2025);
    let class_id = Uuid::new_v4();
    let approver = Uuid::new_v4();

    let subject = SubjectAssignment {
      subject_assignment_id: Uuid::new_v4(),
      class_id,
      subject_name: "Mathematics".to_owned(),
      subject_teacher: "Mr Balogun".to_owned(),
      sort_order: 1,
    };
    store.add_subject_assignment(&subject).await.unwrap();
    let student = Student {
      student_id: Uuid::new_v4(),
      first_name: "Kemi".to_owned(),
      last_name:  "Alade".to_owned(),
    };
    store.add_student(&student).await.unwrap();
    store.enrol(class_id, student.student_id, term).await.unwrap();
    store
      .register(student.student_id, subject.subject_assignment_id, term)
      .await
      .unwrap();
    store
      .set_attendance(student.student_id, term, AttendanceTotals {
        present:       60,
        required_days: 60,
      })
      .await
      .unwrap();
    store.grant_approver(approver, class_id).await.unwrap();

    let grades = GradeTable::new(vec![
      GradeBand::new("A", "Excellent", 70, 100),
      GradeBand::new("B", "Very Good", 60, 69),
      GradeBand::new("C", "Good", 50, 59),
      GradeBand::new("D", "Fair", 40, 49),
      GradeBand::new("F", "Fail", 0, 39),
    ])
    .unwrap();

    Fixture {
      router: api_router(Arc::new(Engine::new(store, grades))),
      class_id,
      subject: subject.subject_assignment_id,
      student: student.student_id,
      approver,
    }
  }

  async fn send(
    router:  &Router,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    Option<Value>,
  ) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn put_score(f: &Fixture, exam: u32) -> Response<Body> {
    send(
      &f.router,
      "PUT",
      "/scores",
      vec![],
      Some(json!({
        "student_id": f.student,
        "subject_assignment_id": f.subject,
        "term": "first",
        "academic_year": 2025,
        "ca1": 18,
        "ca2": "17.5",
        "exam": exam,
      })),
    )
    .await
  }

  async fn compile(f: &Fixture) -> Response<Body> {
    send(
      &f.router,
      "POST",
      "/results/compile",
      vec![],
      Some(json!({
        "student_id": f.student,
        "class_id": f.class_id,
        "term": "first",
        "academic_year": 2025,
      })),
    )
    .await
  }

  // ── Scores ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn put_score_then_list_subject_cohort() {
    let f = fixture().await;
    assert_eq!(put_score(&f, 50).await.status(), StatusCode::OK);

    let uri = format!(
      "/scores?subject_assignment_id={}&term=first&academic_year=2025",
      f.subject
    );
    let resp = send(&f.router, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let scores = json_body(resp).await;
    assert_eq!(scores.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn subject_stats_for_unknown_subject_is_404() {
    let f = fixture().await;
    let uri = format!(
      "/classes/{}/subjects/{}/stats?term=first&academic_year=2025",
      f.class_id,
      Uuid::new_v4()
    );
    let resp = send(&f.router, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "not_found");
  }

  // ── Results ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn compile_returns_camel_case_document_with_etag() {
    let f = fixture().await;
    put_score(&f, 50).await;

    let resp = compile(&f).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(header::ETAG));
    let doc = json_body(resp).await;
    assert_eq!(doc["status"], "draft");
    assert_eq!(doc["snapshot"]["positionLabel"], "1st");
    assert_eq!(doc["snapshot"]["lines"][0]["grade"], "A");

    let id = doc["resultId"].as_str().unwrap();
    let resp = send(&f.router, "GET", &format!("/results/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn full_approval_flow_with_if_match() {
    let f = fixture().await;
    put_score(&f, 50).await;
    let doc = json_body(compile(&f).await).await;
    let id = doc["resultId"].as_str().unwrap().to_owned();

    let resp = send(&f.router, "POST", &format!("/results/{id}/submit"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = resp.headers()[header::ETAG].to_str().unwrap().to_owned();

    let approve = format!("/results/{id}/approve");
    let body = json!({ "approver_id": f.approver });
    let stale = send(
      &f.router,
      "POST",
      &approve,
      vec![(header::IF_MATCH, "\"stale\"")],
      Some(body.clone()),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::PRECONDITION_FAILED);

    let resp = send(
      &f.router,
      "POST",
      &approve,
      vec![(header::IF_MATCH, etag.as_str())],
      Some(body),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "approved");
  }

  #[tokio::test]
  async fn unauthorised_approver_is_403() {
    let f = fixture().await;
    put_score(&f, 50).await;
    let doc = json_body(compile(&f).await).await;
    let id = doc["resultId"].as_str().unwrap().to_owned();
    send(&f.router, "POST", &format!("/results/{id}/submit"), vec![], None).await;

    let resp = send(
      &f.router,
      "POST",
      &format!("/results/{id}/approve"),
      vec![],
      Some(json!({ "approver_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn illegal_transition_is_409() {
    let f = fixture().await;
    put_score(&f, 50).await;
    let doc = json_body(compile(&f).await).await;
    let id = doc["resultId"].as_str().unwrap().to_owned();

    let resp = send(&f.router, "POST", &format!("/results/{id}/reopen"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "illegal_transition");
    assert_eq!(body["details"]["from"], "draft");
  }

  #[tokio::test]
  async fn blank_rejection_comment_is_400() {
    let f = fixture().await;
    put_score(&f, 50).await;
    let doc = json_body(compile(&f).await).await;
    let id = doc["resultId"].as_str().unwrap().to_owned();
    send(&f.router, "POST", &format!("/results/{id}/submit"), vec![], None).await;

    let resp = send(
      &f.router,
      "POST",
      &format!("/results/{id}/reject"),
      vec![],
      Some(json!({ "approver_id": f.approver, "comment": "" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "rejection_comment_required");
  }

  #[tokio::test]
  async fn narrative_update_and_purge() {
    let f = fixture().await;
    put_score(&f, 50).await;
    let doc = json_body(compile(&f).await).await;
    let id = doc["resultId"].as_str().unwrap().to_owned();

    let resp = send(
      &f.router,
      "PUT",
      &format!("/results/{id}/narrative"),
      vec![],
      Some(json!({ "classTeacherComment": "Steady progress." })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      json_body(resp).await["narrative"]["classTeacherComment"],
      "Steady progress."
    );

    let resp = send(&f.router, "DELETE", &format!("/results/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&f.router, "GET", &format!("/results/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn class_and_student_listings() {
    let f = fixture().await;
    put_score(&f, 50).await;

    let compile_uri =
      format!("/classes/{}/results/compile?term=first&academic_year=2025", f.class_id);
    let resp = send(&f.router, "POST", &compile_uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    let uri = format!("/classes/{}/results?term=first&academic_year=2025", f.class_id);
    let listed = json_body(send(&f.router, "GET", &uri, vec![], None).await).await;
    assert_eq!(listed[0]["snapshot"]["position"], 1);

    let uri = format!("/students/{}/results?term=first&academic_year=2025", f.student);
    let listed = json_body(send(&f.router, "GET", &uri, vec![], None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
  }
}
