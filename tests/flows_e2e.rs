//! End-to-end flow tests against a stub LMS.

mod common;

use std::sync::atomic::Ordering;

use serde_json::json;

use lms_autoflow::flows::clone_program::{self, CloneProgramAction};
use lms_autoflow::flows::create_domain::{self, CreateDomainAction};
use lms_autoflow::flows::fix_syllabus::{self, FixSyllabusAction};
use lms_autoflow::flows::merge_data::{self, MergeDataAction};
use lms_autoflow::flows::update_kpi::{self, UpdateKpiAction};
use lms_autoflow::flows::{FlowErrorKind, FlowRequest};

use common::{seed_environment, spawn_stub_lms, test_state};

fn request<A>(environment_id: uuid::Uuid, action: A) -> FlowRequest<A> {
    FlowRequest {
        environment_id,
        dmn: None,
        user_code: None,
        pass: None,
        action,
    }
}

#[tokio::test]
async fn clone_get_programs_lists_two_with_one_history_entry() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let output = clone_program::run(
        &state,
        "alice",
        request(env_id, CloneProgramAction::GetPrograms { statuses: None }),
    )
    .await
    .expect("flow should succeed");

    assert_eq!(output.data["total"], json!(2));
    assert_eq!(output.data["programs"].as_array().unwrap().len(), 2);
    // login is not part of the action's history
    assert_eq!(output.history.len(), 1);
    assert!(output.history[0].url.ends_with("/program/search"));
    assert_eq!(output.history[0].status, Some(200));
}

#[tokio::test]
async fn clone_rejects_bad_program_iid_before_any_network_call() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let err = clone_program::run(
        &state,
        "alice",
        request(
            env_id,
            CloneProgramAction::CloneProgram {
                program_iid: json!("not-a-number"),
            },
        ),
    )
    .await
    .expect_err("flow should fail validation");

    assert_eq!(err.kind, FlowErrorKind::Validation);
    assert_eq!(stub.counters.login.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn clone_program_records_an_execution_audit_record() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    clone_program::run(
        &state,
        "alice",
        request(
            env_id,
            CloneProgramAction::CloneProgram {
                program_iid: json!("101"),
            },
        ),
    )
    .await
    .expect("clone should succeed");

    let records = state.clone_history.list(10).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].program_iid, 101);
    assert_eq!(records[0].admin_user, "alice");
    assert!(!records[0].request_history.is_empty());
}

#[tokio::test]
async fn create_domain_surfaces_business_failure_as_transport_success() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let output = create_domain::run(
        &state,
        "alice",
        request(
            env_id,
            CreateDomainAction::CreateDomain {
                slug: "acme".into(),
                domain_group: "g1".into(),
            },
        ),
    )
    .await
    .expect("transport-level success");

    assert_eq!(output.data["apiSuccess"], json!(false));
    assert_eq!(output.data["apiError"], json!("slug already exists"));
}

#[tokio::test]
async fn populate_failure_skips_the_status_change() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let err = fix_syllabus::run(
        &state,
        "alice",
        request(
            env_id,
            FixSyllabusAction::FixSyllabus {
                syllabus_id: json!(5),
                syllabus_iid: json!(55),
            },
        ),
    )
    .await
    .expect_err("populate failure should surface");

    assert_eq!(err.kind, FlowErrorKind::Execution);
    // the LMS body's own message reaches the operator
    assert_eq!(err.message, "populate: sequence conflict");
    assert_eq!(stub.counters.populate.load(Ordering::SeqCst), 1);
    assert_eq!(stub.counters.status_change.load(Ordering::SeqCst), 0);
    // the failing populate attempt is still in the history
    assert_eq!(err.history.len(), 1);
}

#[tokio::test]
async fn merge_names_the_failing_side() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let err = merge_data::run(
        &state,
        "alice",
        request(
            env_id,
            MergeDataAction::Merge {
                from_user_code: "alice".into(),
                to_user_code: "nobody".into(),
            },
        ),
    )
    .await
    .expect_err("unknown target user should fail");

    assert!(err.message.starts_with("To user:"), "got: {}", err.message);
}

#[tokio::test]
async fn merge_happy_path_resolves_both_users() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let output = merge_data::run(
        &state,
        "alice",
        request(
            env_id,
            MergeDataAction::Merge {
                from_user_code: "alice".into(),
                to_user_code: "bob".into(),
            },
        ),
    )
    .await
    .expect("merge should succeed");

    assert_eq!(output.data["fromUser"]["iid"], json!(11));
    assert_eq!(output.data["toUser"]["iid"], json!(22));
    // two lookups plus the merge call
    assert_eq!(output.history.len(), 3);
}

#[tokio::test]
async fn kpi_update_aggregates_per_question_failures() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let output = update_kpi::run(
        &state,
        "alice",
        request(
            env_id,
            UpdateKpiAction::UpdateBank {
                bank_iid: json!(7),
                tag: None,
            },
        ),
    )
    .await
    .expect("partial failures are not fatal");

    assert_eq!(output.data["processed"], json!(4));
    assert_eq!(output.data["updated"], json!(1));
    let errors = output.data["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 3);
    // an LMS-side refusal is named with the question and the LMS message
    assert!(errors.contains(&json!("question 4: question locked")));
    // only questions with a resolvable index were sent for update
    assert_eq!(stub.counters.question_update.load(Ordering::SeqCst), 2);

    // fetch + two updates, each update carrying its loop position
    assert_eq!(output.history.len(), 3);
    assert_eq!(output.history[1].loop_index, Some(0));
    assert_eq!(output.history[2].loop_index, Some(3));
}

#[tokio::test]
async fn history_resets_between_actions_and_session_is_reused() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    for _ in 0..2 {
        let output = clone_program::run(
            &state,
            "alice",
            request(env_id, CloneProgramAction::GetPrograms { statuses: None }),
        )
        .await
        .expect("flow should succeed");
        assert_eq!(output.history.len(), 1);
    }

    // the second action reused the cached session
    assert_eq!(stub.counters.login.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_login_surfaces_auth_error_with_history() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let mut req = request(env_id, CloneProgramAction::GetPrograms { statuses: None });
    req.user_code = Some("baduser".into());
    req.pass = Some("whatever".into());

    let err = clone_program::run(&state, "alice", req)
        .await
        .expect_err("login should be rejected");

    assert_eq!(err.kind, FlowErrorKind::Auth);
    assert!(err.message.contains("invalid credentials"));
    // the rejected login payload is inspectable
    assert_eq!(err.history.len(), 1);
    assert!(err.history[0].url.ends_with("/user/login"));
}

#[tokio::test]
async fn concurrent_first_requests_race_benignly() {
    let stub = spawn_stub_lms().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let env_id = seed_environment(&state, &stub.base_url);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            clone_program::run(
                &state,
                "alice",
                request(env_id, CloneProgramAction::GetPrograms { statuses: None }),
            )
            .await
        }));
    }

    for handle in handles {
        let output = handle.await.unwrap().expect("both invocations succeed");
        assert_eq!(output.data["total"], json!(2));
    }

    // both may have logged in; exactly one client remains cached
    assert!(stub.counters.login.load(Ordering::SeqCst) >= 1);
    assert_eq!(state.client_cache.len().await, 1);
}
