use std::sync::Arc;
use std::time::Duration;

use sipbridge_dialog_core::prelude::*;
use sipbridge_sip_core::{CSeq, HeaderName, Method, Request, Response, StatusCode};

const CALL_ID: &str = "call-1";

fn orchestrator() -> CallLegOrchestrator {
    let orchestrator = CallLegOrchestrator::default();
    orchestrator
        .create_call_leg_pair(CALL_ID, "u1", "s1", "sip:alice@atlanta.example.com", "sip:bob@biloxi.example.com", false)
        .unwrap();
    orchestrator
}

fn in_dialog(method: Method, seq: u32) -> Request {
    Request::new(method.clone(), "sip:bob@biloxi.example.com")
        .with_header(HeaderName::CallId, CALL_ID)
        .with_header(HeaderName::From, "<sip:alice@atlanta.example.com>;tag=u1")
        .with_header(HeaderName::To, "<sip:bob@biloxi.example.com>;tag=s1")
        .with_header(HeaderName::CSeq, CSeq::new(seq, method).to_string())
}

fn states(orchestrator: &CallLegOrchestrator) -> (CallLegState, CallLegState) {
    let (uac, uas) = orchestrator.try_get_call_legs(CALL_ID).unwrap();
    (uac.state(), uas.state())
}

fn both(state: CallLegState) -> (CallLegState, CallLegState) {
    (state, state)
}

#[test]
fn test_end_to_end_call() {
    let orchestrator = orchestrator();
    assert_eq!(states(&orchestrator), both(CallLegState::Initial));

    let trying = orchestrator.route_provisional_response(CALL_ID, Response::new(StatusCode::Trying));
    assert_eq!(trying.map(|r| r.status), Some(StatusCode::Trying));
    assert_eq!(states(&orchestrator), both(CallLegState::ProvisionalResponse));
    assert!(!orchestrator.is_dialog_confirmed(CALL_ID));

    orchestrator.route_final_response(CALL_ID, Response::new(StatusCode::Ok)).unwrap();
    assert_eq!(states(&orchestrator), both(CallLegState::Confirmed));
    assert!(orchestrator.is_dialog_confirmed(CALL_ID));

    let bye = in_dialog(Method::Bye, 2);
    assert_eq!(orchestrator.route_in_dialog_request(CALL_ID, bye.clone()), Some(bye));
    assert_eq!(states(&orchestrator), both(CallLegState::Terminating));
    assert!(!orchestrator.is_dialog_confirmed(CALL_ID));

    orchestrator.route_final_response(CALL_ID, Response::new(StatusCode::Ok)).unwrap();
    assert_eq!(states(&orchestrator), both(CallLegState::Terminated));
    assert_eq!(orchestrator.active_pair_count(), 0);
    assert_eq!(orchestrator.len(), 1);

    let pair = orchestrator.call_leg_pair(CALL_ID).unwrap();
    assert!(pair.is_terminated());
    assert!(pair.terminated_at().is_some());
}

#[test]
fn test_duplicate_pairing_keeps_original() {
    let orchestrator = orchestrator();
    orchestrator.route_provisional_response(CALL_ID, Response::new(StatusCode::Ringing));

    let err = orchestrator
        .create_call_leg_pair(CALL_ID, "u2", "s2", "sip:x@example.com", "sip:y@example.com", true)
        .unwrap_err();
    assert_eq!(err, DialogError::DuplicateCallId(CALL_ID.to_string()));

    let (uac, uas) = orchestrator.try_get_call_legs(CALL_ID).unwrap();
    assert_eq!(uac.local_tag(), "u1");
    assert_eq!(uas.local_tag(), "s1");
    assert!(!uac.is_secure());
    assert_eq!(uac.state(), CallLegState::ProvisionalResponse);
    assert_eq!(orchestrator.len(), 1);
}

#[test]
fn test_ack_is_consumed_and_idempotent() {
    let orchestrator = orchestrator();
    orchestrator.route_final_response(CALL_ID, Response::new(StatusCode::Ok));

    let ack = in_dialog(Method::Ack, 1);
    assert!(orchestrator.route_in_dialog_request(CALL_ID, ack.clone()).is_none());
    assert!(orchestrator.route_in_dialog_request(CALL_ID, ack).is_none());
    assert_eq!(states(&orchestrator), both(CallLegState::Confirmed));
}

#[test]
fn test_other_in_dialog_methods_are_forwarded() {
    let orchestrator = orchestrator();
    orchestrator.route_final_response(CALL_ID, Response::new(StatusCode::Ok));

    for (seq, method) in [Method::Update, Method::Refer, Method::Prack, Method::Options].into_iter().enumerate() {
        let request = in_dialog(method, seq as u32 + 2);
        assert_eq!(orchestrator.route_in_dialog_request(CALL_ID, request.clone()), Some(request));
    }
    assert_eq!(states(&orchestrator), both(CallLegState::Confirmed));

    // Sent by the caller (From tag u1): only the leg facing the caller
    // tracks its CSeq.
    let (uac, uas) = orchestrator.try_get_call_legs(CALL_ID).unwrap();
    assert_eq!(uas.remote_sequence_number(), 5);
    assert_eq!(uac.remote_sequence_number(), 0);
}

#[test]
fn test_invite_2xx_retransmission_after_bye_keeps_legs_terminating() {
    let orchestrator = orchestrator();
    let invite_ok = Response::new(StatusCode::Ok).with_header(HeaderName::CSeq, CSeq::new(1, Method::Invite).to_string());
    orchestrator.route_final_response(CALL_ID, invite_ok.clone()).unwrap();
    orchestrator.route_in_dialog_request(CALL_ID, in_dialog(Method::Bye, 2)).unwrap();

    orchestrator.route_final_response(CALL_ID, invite_ok).unwrap();
    assert_eq!(states(&orchestrator), both(CallLegState::Terminating));
    assert!(orchestrator.call_leg_pair(CALL_ID).unwrap().terminated_at().is_none());

    let bye_ok = Response::new(StatusCode::Ok).with_header(HeaderName::CSeq, CSeq::new(2, Method::Bye).to_string());
    orchestrator.route_final_response(CALL_ID, bye_ok).unwrap();
    assert_eq!(states(&orchestrator), both(CallLegState::Terminated));
}

#[test]
fn test_unknown_call_id_in_dialog_request() {
    let orchestrator = orchestrator();
    assert!(orchestrator.route_in_dialog_request("other", in_dialog(Method::Bye, 2)).is_none());
    assert_eq!(states(&orchestrator), both(CallLegState::Initial));
}

#[test]
fn test_error_response_fails_both_legs() {
    let orchestrator = orchestrator();
    orchestrator.route_provisional_response(CALL_ID, Response::new(StatusCode::Ringing));
    orchestrator.route_error_response(CALL_ID, Response::new(StatusCode::BusyHere)).unwrap();
    assert_eq!(states(&orchestrator), both(CallLegState::Failed));

    // A 200 racing the 486 cannot resurrect the call.
    orchestrator.route_final_response(CALL_ID, Response::new(StatusCode::Ok));
    assert_eq!(states(&orchestrator), both(CallLegState::Failed));
    assert!(orchestrator.call_leg_pair(CALL_ID).unwrap().is_terminated());
}

#[test]
fn test_legs_stay_symmetric_under_concurrent_routing() {
    let orchestrator = Arc::new(orchestrator());
    let statuses = [StatusCode::Trying, StatusCode::Ringing, StatusCode::SessionProgress, StatusCode::Ok];

    std::thread::scope(|scope| {
        for status in statuses {
            let orchestrator = orchestrator.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let response = Response::new(status);
                    if response.is_success() {
                        orchestrator.route_final_response(CALL_ID, response);
                    } else {
                        orchestrator.route_provisional_response(CALL_ID, response);
                    }
                    let (uac, uas) = states(&orchestrator);
                    assert!(uac.can_transition_to(CallLegState::Confirmed));
                    assert!(uas.can_transition_to(CallLegState::Confirmed));
                }
            });
        }
    });

    assert_eq!(states(&orchestrator), both(CallLegState::Confirmed));
}

#[test]
fn test_remove_call_leg_pair() {
    let orchestrator = orchestrator();
    assert!(orchestrator.remove_call_leg_pair(CALL_ID).is_some());
    assert!(orchestrator.remove_call_leg_pair(CALL_ID).is_none());
    assert!(orchestrator.is_empty());

    // The Call-ID can be paired again once removed.
    orchestrator
        .create_call_leg_pair(CALL_ID, "u3", "s3", "sip:a@example.com", "sip:b@example.com", false)
        .unwrap();
}

fn terminate(orchestrator: &CallLegOrchestrator, call_id: &str) {
    orchestrator.route_final_response(call_id, Response::new(StatusCode::Ok));
    orchestrator.route_in_dialog_request(call_id, Request::new(Method::Bye, "sip:bob@biloxi.example.com"));
    orchestrator.route_final_response(call_id, Response::new(StatusCode::Ok));
}

#[tokio::test(start_paused = true)]
async fn test_terminated_pairs_purged_after_ttl() {
    let config = OrchestratorConfig::default().with_terminated_pair_ttl(Duration::from_secs(10));
    let orchestrator = CallLegOrchestrator::new(config);
    orchestrator.create_call_leg_pair("done", "u1", "s1", "", "", false).unwrap();
    orchestrator.create_call_leg_pair("live", "u2", "s2", "", "", false).unwrap();
    terminate(&orchestrator, "done");

    assert_eq!(orchestrator.purge_terminated(), 0);
    tokio::time::advance(Duration::from_secs(9)).await;
    assert_eq!(orchestrator.purge_terminated(), 0);
    assert!(orchestrator.try_get_call_legs("done").is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(orchestrator.purge_terminated(), 1);
    assert!(orchestrator.try_get_call_legs("done").is_none());
    assert!(orchestrator.try_get_call_legs("live").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reaper_runs_periodically() {
    let config = OrchestratorConfig::default()
        .with_terminated_pair_ttl(Duration::from_secs(1))
        .with_reaper_interval(Duration::from_secs(2));
    let orchestrator = Arc::new(CallLegOrchestrator::new(config));
    let reaper = orchestrator.spawn_reaper().unwrap();

    orchestrator.create_call_leg_pair(CALL_ID, "u1", "s1", "", "", false).unwrap();
    terminate(&orchestrator, CALL_ID);
    assert_eq!(orchestrator.len(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(orchestrator.is_empty());

    drop(orchestrator);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(reaper.is_finished());
}

#[tokio::test]
async fn test_reaper_requires_interval() {
    let config = OrchestratorConfig::default().with_reaper_interval(Duration::ZERO);
    let orchestrator = Arc::new(CallLegOrchestrator::new(config));
    assert!(matches!(orchestrator.spawn_reaper(), Err(DialogError::Config(_))));
}
