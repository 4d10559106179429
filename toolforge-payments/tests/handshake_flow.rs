//! End-to-end handshake tests against a wiremock tool server.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;
use toolforge_payments::testkit::{MockSigner, ScriptedPrompt};
use toolforge_payments::{
    Handshake, HandshakeOutcome, HandshakeState, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER,
    PAYMENT_VALIDITY_SECS, PaymentError, ToolDef,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tool(api_url: &str) -> ToolDef {
    ToolDef {
        id: "tool-1".to_string(),
        name: "summarizer".to_string(),
        description: Some("Summarizes text".to_string()),
        api_url: api_url.to_string(),
        price: 0.5,
        input_schema: None,
        output_schema: None,
    }
}

fn demand_header() -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(
        serde_json::to_vec(&json!({
            "payTo": "0xpayee",
            "maxAmountRequired": "20000",
            "network": "cronos-testnet"
        }))
        .unwrap(),
    )
}

async fn mount_challenge_once(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, demand_header().as_str()),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn paid_call_resolves_after_one_credentialed_retry() {
    let server = MockServer::start().await;
    mount_challenge_once(&server).await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header(PAYMENT_HEADER, "signed:0xpayee:20000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "short"})))
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::new();
    let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({"text": "hello"}), &prompt, &signer)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Success(json!({"summary": "short"})));
    assert_eq!(handshake.state(), HandshakeState::Resolved);
    assert!(handshake.pending().is_none());

    // The user was shown exactly the demanded payee and amount.
    let prompts = prompt.payment_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].pay_to, "0xpayee");
    assert_eq!(prompts[0].max_amount_required, "20000");

    // The signer saw the same demand, valid for ten minutes.
    let signed = signer.signed.lock().unwrap();
    assert_eq!(signed.len(), 1);
    let (pay_to, amount, valid_before) = &signed[0];
    assert_eq!(pay_to, "0xpayee");
    assert_eq!(amount, "20000");
    assert!(*valid_before >= before + PAYMENT_VALIDITY_SECS);
    assert!(*valid_before <= before + PAYMENT_VALIDITY_SECS + 5);
}

#[tokio::test]
async fn free_call_resolves_without_payment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::new();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    assert_eq!(outcome, HandshakeOutcome::Success(json!({"ok": true})));
    assert!(prompt.payment_prompts.lock().unwrap().is_empty());
    assert!(signer.signed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_challenge_after_payment_fails_rather_than_looping() {
    let server = MockServer::start().await;
    // The tool keeps demanding payment even with a credential.
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, demand_header().as_str()),
        )
        .expect(2)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::new();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    match outcome {
        HandshakeOutcome::Failed(reason) => assert!(reason.contains("demanded payment again")),
        other => panic!("expected failure, got {other:?}"),
    }
    // Exactly one payment was signed — no second prompt, no loop.
    assert_eq!(signer.signed.lock().unwrap().len(), 1);
    assert_eq!(prompt.payment_prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn bare_402_is_a_hard_error_before_any_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::new();

    let err = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::MalformedDemand(_)));
    assert!(prompt.payment_prompts.lock().unwrap().is_empty());
    assert!(signer.signed.lock().unwrap().is_empty());
    // Even an error path drops the suspended call.
    assert_eq!(handshake.state(), HandshakeState::Resolved);
    assert!(handshake.pending().is_none());
}

#[tokio::test]
async fn cancelled_payment_resolves_without_signing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, demand_header().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::cancel_payment();
    let signer = MockSigner::new();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    assert_eq!(outcome, HandshakeOutcome::PaymentCancelled);
    assert!(signer.signed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn payment_confirmation_timeout_cancels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, demand_header().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::with_decision_timeout(Duration::from_millis(20));
    let prompt = ScriptedPrompt::hang_on_payment();
    let signer = MockSigner::new();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    assert_eq!(outcome, HandshakeOutcome::PaymentCancelled);
}

#[tokio::test]
async fn signer_failure_resolves_as_payment_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, demand_header().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::failing();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    match outcome {
        HandshakeOutcome::PaymentFailed(reason) => assert!(reason.contains("wallet locked")),
        other => panic!("expected payment failure, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_server_error_resolves_as_failed() {
    let server = MockServer::start().await;
    mount_challenge_once(&server).await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let handshake = Handshake::new();
    let prompt = ScriptedPrompt::allow_all();
    let signer = MockSigner::new();

    let outcome = handshake
        .run(&tool(&server.uri()), json!({}), &prompt, &signer)
        .await
        .unwrap();
    assert!(matches!(outcome, HandshakeOutcome::Failed(_)));
}
