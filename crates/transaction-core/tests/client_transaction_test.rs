mod common;

use std::time::Duration;

use sipbridge_sip_core::{CSeq, Method, StatusCode};
use sipbridge_transaction_core::prelude::*;

use common::{invite, remote, request, response_to, Harness, MockTransport};

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_millis(*v)).collect()
}

#[tokio::test]
async fn test_invite_timer_a_doubles_without_cap() {
    let mut h = Harness::new();
    let tx = InviteClientTransaction::start(invite("z9hG4bK-a"), remote(), &h.services).unwrap();
    assert_eq!(tx.state(), TransactionState::Calling);

    h.timers.wait_pending(TimerType::A).await;
    for _ in 0..4 {
        assert!(h.timers.fire(TimerType::A));
        h.timers.wait_pending(TimerType::A).await;
    }

    assert_eq!(h.timers.scheduled_delays(TimerType::A), ms(&[500, 1000, 2000, 4000, 8000]));
    assert_eq!(h.timers.scheduled_delays(TimerType::B), ms(&[32_000]));
    assert_eq!(h.transport.sent_requests(Method::Invite).len(), 5);
    assert!(h.transport.sent().iter().all(|(_, to)| *to == remote()));

    h.wait_for(|e| matches!(e, TransactionEvent::TimerTriggered { timer: TimerType::A, .. }))
        .await;
}

#[tokio::test]
async fn test_non_invite_timer_e_caps_at_t2() {
    let h = Harness::new();
    let options = request(Method::Options, "z9hG4bK-e", 1);
    let tx = NonInviteClientTransaction::start(options, remote(), &h.services).unwrap();
    assert_eq!(tx.state(), TransactionState::Trying);

    h.timers.wait_pending(TimerType::E).await;
    for _ in 0..4 {
        assert!(h.timers.fire(TimerType::E));
        h.timers.wait_pending(TimerType::E).await;
    }

    assert_eq!(h.timers.scheduled_delays(TimerType::E), ms(&[500, 1000, 2000, 4000, 4000]));
    assert_eq!(h.transport.sent_requests(Method::Options).len(), 5);
}

#[tokio::test]
async fn test_invite_provisional_then_success_terminates() {
    let mut h = Harness::new();
    let request = invite("z9hG4bK-ok");
    let tx = InviteClientTransaction::start(request.clone(), remote(), &h.services).unwrap();
    h.timers.wait_pending(TimerType::B).await;

    tx.receive_response(response_to(&request, StatusCode::Ringing)).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Proceeding);
    assert!(!h.timers.is_pending(TimerType::A));
    assert!(!h.timers.is_pending(TimerType::B));

    tx.receive_response(response_to(&request, StatusCode::Ok)).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Terminated);

    let mut seen = Vec::new();
    loop {
        let event = h.next_event().await;
        let done = matches!(event, TransactionEvent::Terminated { .. });
        seen.push(event);
        if done {
            break;
        }
    }
    assert!(seen.iter().any(|e| matches!(e, TransactionEvent::ProvisionalResponse { response, .. } if response.status == StatusCode::Ringing)));
    assert!(seen.iter().any(|e| matches!(e, TransactionEvent::SuccessResponse { response, .. } if response.status == StatusCode::Ok)));
    // The ACK for a 2xx belongs to the dialog layer.
    assert!(h.transport.sent_requests(Method::Ack).is_empty());
}

#[tokio::test]
async fn test_invite_failure_sends_ack_and_absorbs_retransmissions() {
    let mut h = Harness::new();
    let request = invite("z9hG4bK-busy");
    let tx = InviteClientTransaction::start(request.clone(), remote(), &h.services).unwrap();
    let busy = response_to(&request, StatusCode::BusyHere);

    tx.receive_response(busy.clone()).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Completed);
    assert!(h.timers.is_pending(TimerType::D));
    assert_eq!(h.timers.scheduled_delays(TimerType::D), ms(&[32_000]));

    let acks = h.transport.sent_requests(Method::Ack);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].via_branch(), Some("z9hG4bK-busy"));
    assert_eq!(acks[0].cseq(), Some(CSeq::new(1, Method::Ack)));
    assert_eq!(acks[0].to_tag(), Some("a6c85cf"));

    // Retransmitted final response: ACK again, no new event.
    tx.receive_response(busy).await.unwrap();
    assert_eq!(h.transport.sent_requests(Method::Ack).len(), 2);
    assert_eq!(tx.state(), TransactionState::Completed);

    assert!(h.timers.fire(TimerType::D));
    h.wait_terminated(tx.key()).await;
    assert_eq!(tx.state(), TransactionState::Terminated);
}

#[tokio::test]
async fn test_invite_timer_b_reports_timeout() {
    let mut h = Harness::new();
    let tx = InviteClientTransaction::start(invite("z9hG4bK-b"), remote(), &h.services).unwrap();
    h.timers.wait_pending(TimerType::B).await;

    assert!(h.timers.fire(TimerType::B));
    h.wait_for(|e| matches!(e, TransactionEvent::Timeout { .. })).await;
    h.wait_terminated(tx.key()).await;
    assert!(h.timers.pending().is_empty());
}

#[tokio::test]
async fn test_non_invite_timer_f_reports_timeout() {
    let mut h = Harness::new();
    let options = request(Method::Options, "z9hG4bK-f", 1);
    let tx = NonInviteClientTransaction::start(options.clone(), remote(), &h.services).unwrap();
    h.timers.wait_pending(TimerType::F).await;

    tx.receive_response(response_to(&options, StatusCode::Trying)).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Proceeding);
    assert_eq!(h.timers.scheduled_delays(TimerType::E).last(), Some(&Duration::from_secs(4)));

    assert!(h.timers.fire(TimerType::F));
    h.wait_for(|e| matches!(e, TransactionEvent::Timeout { .. })).await;
    h.wait_terminated(tx.key()).await;
}

#[tokio::test]
async fn test_non_invite_completed_waits_timer_k() {
    let mut h = Harness::new();
    let bye = request(Method::Bye, "z9hG4bK-k", 2);
    let tx = NonInviteClientTransaction::start(bye.clone(), remote(), &h.services).unwrap();

    tx.receive_response(response_to(&bye, StatusCode::Ok)).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Completed);
    assert!(!h.timers.is_pending(TimerType::E));
    assert!(!h.timers.is_pending(TimerType::F));
    assert_eq!(h.timers.scheduled_delays(TimerType::K), ms(&[5_000]));

    let err = tx.retransmit().await.unwrap_err();
    assert!(matches!(err, Error::InvalidOperation { state: TransactionState::Completed, .. }));

    assert!(h.timers.fire(TimerType::K));
    h.wait_terminated(tx.key()).await;
}

#[tokio::test]
async fn test_reliable_transport_skips_retransmissions_and_absorb_wait() {
    let mut h = Harness::with(MockTransport::default(), TimerSettings::for_reliable_transport());
    let register = request(Method::Register, "z9hG4bK-tcp", 1);
    let tx = NonInviteClientTransaction::start(register.clone(), remote(), &h.services).unwrap();
    h.timers.wait_pending(TimerType::F).await;
    assert!(h.timers.scheduled_delays(TimerType::E).is_empty());

    tx.receive_response(response_to(&register, StatusCode::Ok)).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Terminated);
    assert!(h.timers.scheduled_delays(TimerType::K).is_empty());
    h.wait_terminated(tx.key()).await;
}

#[tokio::test]
async fn test_transport_failure_terminates_client() {
    let mut h = Harness::with(MockTransport::failing(), TimerSettings::default());
    let tx = InviteClientTransaction::start(invite("z9hG4bK-down"), remote(), &h.services).unwrap();

    h.wait_for(|e| matches!(e, TransactionEvent::TransportError { .. })).await;
    h.wait_for(|e| matches!(e, TransactionEvent::Timeout { .. })).await;
    h.wait_terminated(tx.key()).await;
    assert_eq!(tx.state(), TransactionState::Terminated);
    assert!(h.timers.pending().is_empty());
}

#[tokio::test]
async fn test_reported_transport_error_terminates_client() {
    let mut h = Harness::new();
    let options = request(Method::Options, "z9hG4bK-rst", 1);
    let tx = NonInviteClientTransaction::start(options, remote(), &h.services).unwrap();

    tx.transport_error().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Terminated);
    h.wait_for(|e| matches!(e, TransactionEvent::TransportError { .. })).await;
    h.wait_terminated(tx.key()).await;

    // Operations on a finished transaction are ignored.
    tx.retransmit().await.unwrap();
}

#[tokio::test]
async fn test_client_rejects_wrong_method_or_missing_branch() {
    let h = Harness::new();
    let options = request(Method::Options, "z9hG4bK-x", 1);
    assert!(matches!(
        InviteClientTransaction::start(options, remote(), &h.services),
        Err(Error::MethodMismatch { .. })
    ));

    let mut no_branch = invite("z9hG4bK-y");
    no_branch.headers.set(sipbridge_sip_core::HeaderName::Via, "SIP/2.0/UDP host");
    assert!(matches!(
        InviteClientTransaction::start(no_branch, remote(), &h.services),
        Err(Error::MissingBranch)
    ));
}
