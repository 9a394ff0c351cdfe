use async_trait::async_trait;
use candid::{Nat, Principal};
use ic_agent::identity::AnonymousIdentity;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Barrier;
use upkeep_sdk::*;

const CONTRACT: &str = "bkyz2-fmaaa-aaaaa-qaaaq-cai";
const LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";
const INTERNET_IDENTITY: &str = "rdmx6-jaaaa-aaaaa-aaadq-cai";
const USER: &str = "2vxsx-fae";

fn principal(text: &str) -> Principal {
    Principal::from_text(text).unwrap()
}

fn local_config() -> ClientConfig {
    ClientConfig::new(Network::Local, principal(CONTRACT), principal(LEDGER))
        .with_identity_canister(principal(INTERNET_IDENTITY))
}

/// In-memory ledger and contract shared by every handle pair.
#[derive(Default)]
struct MockChain {
    balances: Mutex<HashMap<Principal, u64>>,
    allowances: Mutex<HashMap<Principal, u64>>,
    approvals: Mutex<Vec<(Principal, ApproveArgs)>>,
    register_calls: AtomicUsize,
    registered: Mutex<Vec<Principal>>,
    /// Holds every `register` call until the barrier fills.
    register_gate: Option<Arc<Barrier>>,
}

impl MockChain {
    fn fund(&self, owner: Principal, e8s: u64) {
        self.balances.lock().insert(owner, e8s);
    }

    fn approve_calls(&self) -> usize {
        self.approvals.lock().len()
    }
}

struct MockLedger {
    chain: Arc<MockChain>,
    caller: Principal,
}

#[async_trait]
impl LedgerHandle for MockLedger {
    fn canister_id(&self) -> Principal {
        principal(LEDGER)
    }

    async fn icrc2_approve(&self, args: ApproveArgs) -> Result<ApproveResult, ClientError> {
        self.chain.approvals.lock().push((self.caller, args.clone()));
        let balance = self
            .chain
            .balances
            .lock()
            .get(&self.caller)
            .copied()
            .unwrap_or(0);
        let amount: u64 = args.amount.0.try_into().unwrap();
        if balance < amount {
            return Ok(Err(ApproveError::InsufficientFunds {
                balance: Nat::from(balance),
            }));
        }
        self.chain.allowances.lock().insert(self.caller, amount);
        Ok(Ok(Nat::from(self.chain.approve_calls() as u64)))
    }
}

struct MockContract {
    chain: Arc<MockChain>,
    caller: Principal,
}

#[async_trait]
impl ContractHandle for MockContract {
    fn canister_id(&self) -> Principal {
        principal(CONTRACT)
    }

    async fn register(&self) -> Result<RegisterResult, ClientError> {
        self.chain.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.chain.register_gate {
            gate.wait().await;
        }
        let mut allowances = self.chain.allowances.lock();
        let allowance = allowances.get(&self.caller).copied().unwrap_or(0);
        if allowance < REGISTRATION_FEE.e8s() {
            return Ok(RegisterResult::Err(RegisterError::InsufficientFunds));
        }
        allowances.insert(self.caller, allowance - REGISTRATION_FEE.e8s());
        self.chain.registered.lock().push(self.caller);
        Ok(RegisterResult::Ok(Empty {}))
    }
}

struct MockConnector {
    chain: Arc<MockChain>,
    connects: AtomicUsize,
}

impl MockConnector {
    fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        credential: &Credential,
        _config: &ClientConfig,
    ) -> Result<Handles, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Handles {
            contract: Arc::new(MockContract {
                chain: Arc::clone(&self.chain),
                caller: credential.principal(),
            }),
            ledger: Arc::new(MockLedger {
                chain: Arc::clone(&self.chain),
                caller: credential.principal(),
            }),
        })
    }
}

/// Logs in as a fixed principal, or fails with a fixed reason.
struct StaticProvider {
    principal: Principal,
    failure: Option<LoginError>,
    expires_at: Option<SystemTime>,
    requests: Mutex<Vec<LoginRequest>>,
}

impl StaticProvider {
    fn signed_in(principal: Principal) -> Self {
        Self {
            principal,
            failure: None,
            expires_at: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(failure: LoginError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::signed_in(Principal::anonymous())
        }
    }

    /// Hands out a credential that expired before login returned.
    fn expired(principal: Principal) -> Self {
        Self {
            expires_at: Some(SystemTime::now() - Duration::from_secs(60)),
            ..Self::signed_in(principal)
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn login(&self, request: &LoginRequest) -> Result<Credential, LoginError> {
        self.requests.lock().push(request.clone());
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| SystemTime::now() + request.max_time_to_live);
        Ok(Credential::new(
            Arc::new(AnonymousIdentity),
            self.principal,
            request.identity_provider.clone(),
            expires_at,
        ))
    }
}

struct Harness {
    chain: Arc<MockChain>,
    connector: Arc<MockConnector>,
    provider: Arc<StaticProvider>,
    client: RegistrationClient,
}

fn harness(config: ClientConfig) -> Harness {
    harness_on(MockChain::default(), config)
}

fn harness_on(chain: MockChain, config: ClientConfig) -> Harness {
    let chain = Arc::new(chain);
    let connector = Arc::new(MockConnector::new(Arc::clone(&chain)));
    let provider = Arc::new(StaticProvider::signed_in(principal(USER)));
    let client = RegistrationClient::new(
        config,
        Arc::clone(&provider) as Arc<dyn IdentityProvider>,
        Arc::clone(&connector) as Arc<dyn Connector>,
    )
    .unwrap();
    Harness {
        chain,
        connector,
        provider,
        client,
    }
}

#[tokio::test]
async fn register_before_connect_is_rejected() {
    let h = harness(local_config());
    let err = h.client.register().await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
    assert!(err.requires_reconnect());
    assert_eq!(h.chain.register_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn approve_before_connect_is_rejected() {
    let h = harness(local_config());
    let err = h.client.approve_registration_cost().await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
    assert_eq!(h.chain.approve_calls(), 0);
}

#[tokio::test]
async fn connect_logs_in_against_configured_provider() {
    let h = harness(local_config());
    let who = h.client.connect().await.unwrap();
    assert_eq!(who, principal(USER));
    assert!(h.client.is_connected());
    assert_eq!(h.client.principal(), Some(principal(USER)));

    let requests = h.provider.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].identity_provider,
        format!("http://localhost:4943?canisterId={INTERNET_IDENTITY}#authorize")
    );
    assert_eq!(requests[0].max_time_to_live, DEFAULT_MAX_TIME_TO_LIVE);
}

#[tokio::test]
async fn approve_requests_exactly_the_registration_fee() {
    let h = harness(local_config());
    h.chain.fund(principal(USER), 10 * REGISTRATION_FEE.e8s());
    h.client.connect().await.unwrap();

    let first = h.client.approve_registration_cost().await.unwrap();
    assert!(first.is_ok());
    h.client.register().await.unwrap();
    let second = h.client.approve_registration_cost().await.unwrap();
    assert!(second.is_ok());

    let approvals = h.chain.approvals.lock();
    assert_eq!(approvals.len(), 2);
    for (caller, args) in approvals.iter() {
        assert_eq!(*caller, principal(USER));
        assert_eq!(args.amount, Nat::from(50_010_000u64));
        assert_eq!(args.spender, Account::of(principal(CONTRACT)));
        assert!(args.fee.is_none());
        assert!(args.memo.is_none());
        assert!(args.from_subaccount.is_none());
        assert!(args.created_at_time.is_none());
        assert!(args.expected_allowance.is_none());
        assert!(args.expires_at.is_none());
    }
}

#[tokio::test]
async fn approve_uses_configured_spender() {
    let spender = principal(INTERNET_IDENTITY);
    let h = harness(local_config().with_spender(spender));
    h.chain.fund(principal(USER), REGISTRATION_FEE.e8s());
    h.client.connect().await.unwrap();
    h.client.approve_registration_cost().await.unwrap().unwrap();
    assert_eq!(h.chain.approvals.lock()[0].1.spender.owner, spender);
}

#[tokio::test]
async fn ledger_rejection_is_returned_not_raised() {
    let h = harness(local_config());
    h.client.connect().await.unwrap();
    let reply = h.client.approve_registration_cost().await.unwrap();
    assert_eq!(
        reply,
        Err(ApproveError::InsufficientFunds {
            balance: Nat::from(0u64)
        })
    );
}

#[tokio::test]
async fn funded_identity_registers() {
    let h = harness(local_config());
    h.chain.fund(principal(USER), REGISTRATION_FEE.e8s());

    h.client.connect().await.unwrap();
    h.client.approve_registration_cost().await.unwrap().unwrap();
    let outcome = h.client.register().await.unwrap();

    assert_eq!(outcome, RegistrationOutcome::Registered);
    assert_eq!(*h.chain.registered.lock(), vec![principal(USER)]);
}

#[tokio::test]
async fn zero_allowance_reports_insufficient_funds() {
    let h = harness(local_config());
    h.client.connect().await.unwrap();
    let outcome = h.client.register().await.unwrap();
    assert_eq!(outcome, RegistrationOutcome::InsufficientFunds);
    assert!(h.chain.registered.lock().is_empty());
}

#[tokio::test]
async fn allowance_is_consumed_by_registration() {
    let h = harness(local_config());
    h.chain.fund(principal(USER), REGISTRATION_FEE.e8s());
    h.client.connect().await.unwrap();
    h.client.approve_registration_cost().await.unwrap().unwrap();

    assert_eq!(
        h.client.register().await.unwrap(),
        RegistrationOutcome::Registered
    );
    assert_eq!(
        h.client.register().await.unwrap(),
        RegistrationOutcome::InsufficientFunds
    );
}

#[tokio::test]
async fn connecting_twice_yields_independent_handle_pairs() {
    let chain = Arc::new(MockChain::default());
    chain.fund(principal(USER), 2 * REGISTRATION_FEE.e8s());
    let connector = MockConnector::new(Arc::clone(&chain));
    let config = local_config();
    let request = LoginRequest {
        identity_provider: config.identity_provider_url().unwrap(),
        max_time_to_live: config.max_time_to_live,
    };
    let credential = StaticProvider::signed_in(principal(USER))
        .login(&request)
        .await
        .unwrap();

    let first = connector.connect(&credential, &config).await.unwrap();
    let second = connector.connect(&credential, &config).await.unwrap();
    assert!(!Arc::ptr_eq(&first.contract, &second.contract));

    let args = ApproveArgs::new(Account::of(config.spender()), REGISTRATION_FEE);
    first.ledger.icrc2_approve(args.clone()).await.unwrap().unwrap();
    assert_eq!(
        first.contract.register().await.unwrap(),
        RegisterResult::Ok(Empty {})
    );
    second.ledger.icrc2_approve(args).await.unwrap().unwrap();
    assert_eq!(
        second.contract.register().await.unwrap(),
        RegisterResult::Ok(Empty {})
    );
}

#[tokio::test]
async fn reconnect_replaces_session() {
    let h = harness(local_config());
    h.client.connect().await.unwrap();
    h.client.connect().await.unwrap();
    assert_eq!(h.connector.connects.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.client.register().await.unwrap(),
        RegistrationOutcome::InsufficientFunds
    );
}

#[tokio::test]
async fn agent_connector_builds_independent_handles() {
    let config = ClientConfig::new(Network::Ic, principal(CONTRACT), principal(LEDGER));
    let request = LoginRequest {
        identity_provider: config.identity_provider_url().unwrap(),
        max_time_to_live: config.max_time_to_live,
    };
    let credential = Credential::for_request(Arc::new(AnonymousIdentity), &request).unwrap();

    let first = AgentConnector.connect(&credential, &config).await.unwrap();
    let second = AgentConnector.connect(&credential, &config).await.unwrap();
    for handles in [&first, &second] {
        assert_eq!(handles.contract.canister_id(), principal(CONTRACT));
        assert_eq!(handles.ledger.canister_id(), principal(LEDGER));
    }
    assert!(!Arc::ptr_eq(&first.ledger, &second.ledger));
}

#[tokio::test]
async fn cancelled_login_leaves_client_disconnected() {
    let chain = Arc::new(MockChain::default());
    let connector = Arc::new(MockConnector::new(Arc::clone(&chain)));
    let client = RegistrationClient::new(
        local_config(),
        Arc::new(StaticProvider::failing(LoginError::Cancelled)),
        Arc::clone(&connector) as Arc<dyn Connector>,
    )
    .unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Login(LoginError::Cancelled)));
    assert!(!client.is_connected());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_login_reports_reason() {
    let client = RegistrationClient::new(
        local_config(),
        Arc::new(StaticProvider::failing(LoginError::failed("bad password"))),
        Arc::new(MockConnector::new(Arc::default())),
    )
    .unwrap();
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.to_string(), "login failed: bad password");
}

#[tokio::test]
async fn expired_credential_does_not_connect() {
    let chain = Arc::new(MockChain::default());
    let connector = Arc::new(MockConnector::new(Arc::clone(&chain)));
    let client = RegistrationClient::new(
        local_config(),
        Arc::new(StaticProvider::expired(principal(USER))),
        Arc::clone(&connector) as Arc<dyn Connector>,
    )
    .unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(!client.is_connected());
    assert_eq!(client.principal(), None);
    assert!(matches!(
        client.register().await,
        Err(ClientError::NotConnected)
    ));
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    assert_eq!(chain.register_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn out_of_range_time_to_live_is_rejected_at_construction() {
    let mut config = local_config();
    config.max_time_to_live = Duration::from_secs(u64::MAX);
    let result = RegistrationClient::new(
        config,
        Arc::new(StaticProvider::signed_in(principal(USER))),
        Arc::new(MockConnector::new(Arc::default())),
    );
    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[tokio::test]
async fn concurrent_registrations_are_both_sent() {
    let chain = MockChain {
        register_gate: Some(Arc::new(Barrier::new(2))),
        ..MockChain::default()
    };
    let h = harness_on(chain, local_config());
    h.client.connect().await.unwrap();

    // Each call waits at the gate until the other one is in flight too.
    let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(h.client.register(), h.client.register())
    })
    .await
    .expect("both register calls should be in flight together");

    assert_eq!(first.unwrap(), RegistrationOutcome::InsufficientFunds);
    assert_eq!(second.unwrap(), RegistrationOutcome::InsufficientFunds);
    assert_eq!(h.chain.register_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disconnect_drops_handles() {
    let h = harness(local_config());
    h.client.connect().await.unwrap();
    h.client.disconnect();
    assert!(!h.client.is_connected());
    assert_eq!(h.client.principal(), None);
    assert!(matches!(
        h.client.register().await,
        Err(ClientError::NotConnected)
    ));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let config = ClientConfig::new(Network::Local, principal(CONTRACT), principal(LEDGER));
    let result = RegistrationClient::new(
        config,
        Arc::new(StaticProvider::signed_in(principal(USER))),
        Arc::new(MockConnector::new(Arc::default())),
    );
    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_dropped() {
    let mut config = local_config();
    config.max_time_to_live = Duration::from_secs(60);
    config.disable_idle = true;
    let h = harness(config);
    h.client.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(h.client.register().await.is_ok());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(matches!(
        h.client.register().await,
        Err(ClientError::SessionExpired)
    ));
    assert!(!h.client.is_connected());
    assert!(matches!(
        h.client.register().await,
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn idle_session_is_dropped() {
    let mut config = local_config();
    config.idle_timeout = Duration::from_secs(10);
    let h = harness(config);
    h.client.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(h.client.register().await.is_ok());
    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(h.client.register().await.is_ok());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(matches!(
        h.client.approve_registration_cost().await,
        Err(ClientError::IdleTimeout)
    ));
    assert!(!h.client.is_connected());
    assert_eq!(h.chain.approve_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_detection_can_be_disabled() {
    let mut config = local_config();
    config.idle_timeout = Duration::from_secs(10);
    config.disable_idle = true;
    let h = harness(config);
    h.client.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(h.client.register().await.is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn approval_amount_always_equals_configured_fee(
        fee in 1u64..=1_000_000_000_000,
        rounds in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let mut config = local_config();
        config.registration_fee = Tokens::from_e8s(fee);
        let h = harness(config);
        h.chain.fund(principal(USER), u64::MAX);

        runtime.block_on(async {
            h.client.connect().await.unwrap();
            for _ in 0..rounds {
                h.client.approve_registration_cost().await.unwrap().unwrap();
                let _ = h.client.register().await.unwrap();
            }
        });

        let approvals = h.chain.approvals.lock();
        prop_assert_eq!(approvals.len(), rounds);
        for (_, args) in approvals.iter() {
            prop_assert_eq!(&args.amount, &Nat::from(fee));
        }
    }
}
