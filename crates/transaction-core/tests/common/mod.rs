#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use sipbridge_sip_core::{CSeq, HeaderName, Message, Method, Request, Response, StatusCode};
use sipbridge_transaction_core::prelude::*;

pub const EVENT_WAIT: Duration = Duration::from_secs(2);

/// Routes transaction logs to the test output, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn remote() -> SocketAddr {
    "192.0.2.20:5060".parse().unwrap()
}

/// Transport that records every message and can be told to fail.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(Message, SocketAddr)>>,
    fail: AtomicBool,
    sent_notify: Notify,
}

impl MockTransport {
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    pub fn sent(&self) -> Vec<(Message, SocketAddr)> {
        self.sent.lock().clone()
    }

    pub fn sent_requests(&self, method: Method) -> Vec<Request> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(m, _)| m.as_request())
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn sent_responses(&self, status: StatusCode) -> Vec<Response> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(m, _)| m.as_response())
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Waits until at least `n` messages have been sent.
    pub async fn wait_for_count(&self, n: usize) {
        timeout(EVENT_WAIT, async {
            loop {
                let notified = self.sent_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.count() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for sent messages");
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, message: Message, destination: SocketAddr) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::TransportError("simulated transport failure".to_string()));
        }
        self.sent.lock().push((message, destination));
        self.sent_notify.notify_waiters();
        Ok(())
    }
}

/// Transport, virtual clock and event stream wired into one [`TransactionServices`].
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub timers: ManualTimerProvider,
    pub services: TransactionServices,
    pub events: mpsc::UnboundedReceiver<TransactionEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockTransport::default(), TimerSettings::default())
    }

    pub fn with(transport: MockTransport, settings: TimerSettings) -> Self {
        init_tracing();
        let transport = Arc::new(transport);
        let timers = ManualTimerProvider::new(settings);
        let (events_tx, events) = mpsc::unbounded_channel();
        let services = TransactionServices::new(transport.clone(), events_tx, Arc::new(timers.clone()));
        Self {
            transport,
            timers,
            services,
            events,
        }
    }

    pub async fn next_event(&mut self) -> TransactionEvent {
        timeout(EVENT_WAIT, self.events.recv())
            .await
            .expect("timed out waiting for transaction event")
            .expect("event channel closed")
    }

    /// Skips events until one matches.
    pub async fn wait_for<F>(&mut self, mut matches: F) -> TransactionEvent
    where
        F: FnMut(&TransactionEvent) -> bool,
    {
        loop {
            let event = self.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    }

    pub async fn wait_terminated(&mut self, key: &TransactionKey) {
        self.wait_for(|e| matches!(e, TransactionEvent::Terminated { transaction_id } if transaction_id == key))
            .await;
    }

    pub async fn wait_state(&mut self, key: &TransactionKey, state: TransactionState) {
        self.wait_for(|e| {
            matches!(e, TransactionEvent::StateChanged { transaction_id, new_state, .. }
                if transaction_id == key && *new_state == state)
        })
        .await;
    }
}

pub fn request(method: Method, branch: &str, seq: u32) -> Request {
    Request::new(method.clone(), "sip:bob@biloxi.example.com")
        .with_header(
            HeaderName::Via,
            format!("SIP/2.0/UDP pc33.atlanta.example.com;branch={}", branch),
        )
        .with_header(HeaderName::MaxForwards, "70")
        .with_header(HeaderName::From, "Alice <sip:alice@atlanta.example.com>;tag=1928301774")
        .with_header(HeaderName::To, "Bob <sip:bob@biloxi.example.com>")
        .with_header(HeaderName::CallId, "a84b4c76e66710@pc33.atlanta.example.com")
        .with_header(HeaderName::CSeq, CSeq::new(seq, method).to_string())
}

pub fn invite(branch: &str) -> Request {
    request(Method::Invite, branch, 1)
}

/// Response to `request` with Via, From, Call-ID and CSeq copied and a To tag.
pub fn response_to(request: &Request, status: StatusCode) -> Response {
    let mut response = Response::new(status);
    for name in [HeaderName::Via, HeaderName::From, HeaderName::CallId, HeaderName::CSeq] {
        if let Some(value) = request.header(&name) {
            response.headers.push(name, value);
        }
    }
    if let Some(to) = request.header(&HeaderName::To) {
        response.headers.push(HeaderName::To, format!("{};tag=a6c85cf", to));
    }
    response
}
