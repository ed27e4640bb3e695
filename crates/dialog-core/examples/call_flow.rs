//! A bridged call driven through both transaction layers and the orchestrator.
//!
//! The caller's INVITE arrives at the server registry, the B2BUA originates an
//! INVITE of its own towards the callee and relays the callee's responses
//! back, keeping both call legs in step. Messages "sent" by the transport are
//! only printed.
//!
//! Run with `RUST_LOG=debug cargo run --example call_flow`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use sipbridge_dialog_core::{setup_logging, CallLegOrchestrator, LoggingConfig};
use sipbridge_sip_core::{CSeq, HeaderName, Message, Method, Request, Response, StatusCode};
use sipbridge_transaction_core::{
    generate_branch, generate_tag, ClientTransactionRegistry, Result, ServerRequestOutcome,
    ServerTransactionRegistry, TokioTimerProvider, TransactionEvent, TransactionServices,
    Transport,
};
use tokio::sync::mpsc;

#[derive(Debug)]
struct PrintingTransport;

#[async_trait]
impl Transport for PrintingTransport {
    async fn send_message(&self, message: Message, destination: SocketAddr) -> Result<()> {
        match &message {
            Message::Request(request) => println!("--> {} {} to {}", request.method, request.uri, destination),
            Message::Response(response) => println!("--> {} to {}", response.status, destination),
        }
        Ok(())
    }
}

fn invite(branch: &str, call_id: &str, from_tag: &str) -> Request {
    Request::new(Method::Invite, "sip:bob@biloxi.example.com")
        .with_header(HeaderName::Via, format!("SIP/2.0/UDP b2bua.example.com;branch={}", branch))
        .with_header(HeaderName::From, format!("<sip:alice@atlanta.example.com>;tag={}", from_tag))
        .with_header(HeaderName::To, "<sip:bob@biloxi.example.com>")
        .with_header(HeaderName::CallId, call_id)
        .with_header(HeaderName::CSeq, CSeq::new(1, Method::Invite).to_string())
}

fn answer(request: &Request, status: StatusCode, to_tag: &str) -> Response {
    let mut response = Response::new(status);
    for name in [HeaderName::Via, HeaderName::From, HeaderName::CallId, HeaderName::CSeq] {
        if let Some(value) = request.header(&name) {
            response.headers.push(name, value);
        }
    }
    response
        .headers
        .push(HeaderName::To, format!("<sip:bob@biloxi.example.com>;tag={}", to_tag));
    response
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    setup_logging(LoggingConfig::default())?;

    let caller: SocketAddr = "192.0.2.10:5060".parse()?;
    let callee: SocketAddr = "192.0.2.20:5060".parse()?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let services = TransactionServices::new(
        Arc::new(PrintingTransport),
        events_tx,
        Arc::new(TokioTimerProvider::default()),
    );
    let servers = ServerTransactionRegistry::new(services.clone());
    let clients = ClientTransactionRegistry::new(services);
    let orchestrator = CallLegOrchestrator::default();

    // Caller side
    let call_id = "a84b4c76e66710@atlanta.example.com";
    let incoming = invite(&generate_branch(), call_id, "u1");
    let ServerRequestOutcome::New(server_tx) = servers.receive_request(incoming.clone(), caller).await? else {
        return Err("expected a new server transaction".into());
    };

    // Callee side
    let uas_tag = generate_tag();
    orchestrator.create_call_leg_pair(
        call_id,
        "u1",
        &uas_tag,
        "sip:alice@atlanta.example.com",
        "sip:bob@biloxi.example.com",
        false,
    )?;
    let outgoing = invite(&generate_branch(), call_id, "u1");
    clients.send_request(outgoing.clone(), callee)?;

    // The callee rings, then answers.
    for status in [StatusCode::Ringing, StatusCode::Ok] {
        let response = answer(&outgoing, status, &uas_tag);
        clients.receive_response(response, callee).await;
    }

    while let Some(event) = events.recv().await {
        match event {
            TransactionEvent::ProvisionalResponse { response, .. } => {
                if let Some(relayed) = orchestrator.route_provisional_response(call_id, response) {
                    server_tx.send_response(answer(&incoming, relayed.status, &uas_tag)).await?;
                }
            }
            TransactionEvent::SuccessResponse { response, .. } => {
                if let Some(relayed) = orchestrator.route_final_response(call_id, response) {
                    server_tx.send_response(answer(&incoming, relayed.status, &uas_tag)).await?;
                }
                break;
            }
            TransactionEvent::StateChanged { transaction_id, previous_state, new_state } => {
                println!("    {} {:?} -> {:?}", transaction_id, previous_state, new_state);
            }
            _ => {}
        }
    }

    println!("dialog confirmed: {}", orchestrator.is_dialog_confirmed(call_id));
    Ok(())
}
