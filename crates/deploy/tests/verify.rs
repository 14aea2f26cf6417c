// deploy/tests/verify.rs
use chain_core::{Address, Bytes};
use deploy::{EtherscanVerifier, VerifyClass, VerifyOutcome};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use smart_contracts::{ArtifactRegistry, ContractArtifact, SourceMetadata};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted explorer: one answer for the submission, then one per status poll
#[derive(Default)]
struct MockExplorer {
    submit: Mutex<Option<(StatusCode, String)>>,
    statuses: Mutex<VecDeque<(StatusCode, String)>>,
    submitted_forms: Mutex<Vec<String>>,
    polls: Mutex<u32>,
}

fn answer(status: &str, result: &str) -> (StatusCode, String) {
    (
        StatusCode::OK,
        serde_json::json!({ "status": status, "message": "", "result": result }).to_string(),
    )
}

impl MockExplorer {
    fn new(submit: (StatusCode, String), statuses: Vec<(StatusCode, String)>) -> Arc<Self> {
        Arc::new(Self {
            submit: Mutex::new(Some(submit)),
            statuses: Mutex::new(statuses.into()),
            ..Default::default()
        })
    }

    fn spawn(self: &Arc<Self>) -> SocketAddr {
        let explorer = self.clone();
        let make_svc = make_service_fn(move |_| {
            let explorer = explorer.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let explorer = explorer.clone();
                    async move { explorer.handle(req).await }
                }))
            }
        });
        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
        let (status, body) = if req.method() == Method::POST {
            let body = hyper::body::to_bytes(req.into_body()).await?;
            self.submitted_forms
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&body).into_owned());
            self.submit
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| answer("0", "unexpected submission"))
        } else {
            *self.polls.lock().unwrap() += 1;
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| answer("0", "Pending in queue"))
        };
        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap())
    }

    fn polls(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

fn artifact() -> ContractArtifact {
    let registry = ArtifactRegistry::builtin().unwrap();
    let mut artifact = registry.native("FundMe").unwrap().artifact().clone();
    artifact.verification = Some(SourceMetadata {
        compiler_version: "v0.8.7+commit.e28d00a7".into(),
        contract_path: "contracts/FundMe.sol:FundMe".into(),
        standard_json_input: serde_json::json!({ "language": "Solidity", "sources": {} }),
    });
    artifact
}

fn verifier(addr: SocketAddr, max_polls: u32) -> EtherscanVerifier {
    EtherscanVerifier::new("test-key", "sepolia")
        .unwrap()
        .with_api_url(format!("http://{addr}/api"))
        .with_polling(Duration::from_millis(5), max_polls)
}

async fn run(explorer: &Arc<MockExplorer>, max_polls: u32) -> Result<VerifyOutcome, deploy::VerifyError> {
    let addr = explorer.spawn();
    verifier(addr, max_polls)
        .verify(Address::repeat_byte(0x42), &artifact(), &Bytes::from(vec![0xab, 0xcd]))
        .await
}

#[tokio::test]
async fn test_verified_after_pending() {
    let explorer = MockExplorer::new(
        answer("1", "guid-123"),
        vec![answer("0", "Pending in queue"), answer("1", "Pass - Verified")],
    );
    assert_eq!(run(&explorer, 5).await.unwrap(), VerifyOutcome::Verified);
    assert_eq!(explorer.polls(), 2);

    let forms = explorer.submitted_forms.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert!(forms[0].contains("action=verifysourcecode"));
    assert!(forms[0].contains("constructorArguements=abcd"));
    assert!(forms[0].contains("codeformat=solidity-standard-json-input"));
}

#[tokio::test]
async fn test_already_verified_on_submit() {
    let explorer = MockExplorer::new(answer("0", "Contract source code already verified"), vec![]);
    let outcome = run(&explorer, 5).await.unwrap();
    assert_eq!(outcome, VerifyOutcome::AlreadyVerified);
    assert!(outcome.is_verified());
    assert_eq!(explorer.polls(), 0);
}

#[tokio::test]
async fn test_invalid_api_key() {
    let explorer = MockExplorer::new(answer("0", "Invalid API Key"), vec![]);
    let err = run(&explorer, 5).await.unwrap_err();
    assert_eq!(err.class, VerifyClass::InvalidApiKey);
}

#[tokio::test]
async fn test_rejected_status_stops_polling() {
    let explorer = MockExplorer::new(
        answer("1", "guid-123"),
        vec![
            answer("0", "Fail - Unable to verify"),
            answer("1", "Pass - Verified"),
        ],
    );
    let err = run(&explorer, 5).await.unwrap_err();
    assert_eq!(err.class, VerifyClass::Rejected);
    assert_eq!(explorer.polls(), 1);
}

#[tokio::test]
async fn test_rate_limited_until_polls_run_out() {
    let limited = answer("0", "Max rate limit reached");
    let explorer = MockExplorer::new(
        answer("1", "guid-123"),
        vec![limited.clone(), limited.clone(), limited],
    );
    let err = run(&explorer, 3).await.unwrap_err();
    assert_eq!(err.class, VerifyClass::RateLimited);
    assert_eq!(explorer.polls(), 3);
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let explorer = MockExplorer::new(
        (StatusCode::BAD_GATEWAY, "upstream down".to_string()),
        vec![],
    );
    let err = run(&explorer, 5).await.unwrap_err();
    assert_eq!(err.class, VerifyClass::Transport);
    assert!(err.message.contains("502"));
}
