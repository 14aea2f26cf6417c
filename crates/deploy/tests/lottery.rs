// deploy/tests/lottery.rs
use chain_core::{Address, ContractHandle, Provider, Token, U256};
use deploy::{harness::ensure_eq, DeployError, HarnessState, Runtime};
use smart_contracts::contracts::{lottery, vrf_coordinator_v2_mock as vrf};
use std::collections::HashMap;

/// Account that drives upkeep and fulfillment, so players only pay for
/// their own entries
const KEEPER: usize = 9;

struct Setup {
    runtime: Runtime,
    lottery: ContractHandle,
    coordinator: ContractHandle,
    keeper: Address,
    fee: U256,
    interval: u64,
}

async fn setup() -> Setup {
    let runtime = Runtime::hardhat().await.unwrap();
    runtime.fixture(&["all"]).await.unwrap();
    let keeper = runtime.accounts().await.unwrap()[KEEPER];
    let lottery = runtime.contract(lottery::NAME).await.unwrap();
    let coordinator = runtime.contract(vrf::NAME).await.unwrap();
    let fee = lottery.query_uint("getEntranceFee", &[]).await.unwrap();
    let interval = lottery.query_uint("getInterval", &[]).await.unwrap().as_u64();
    Setup {
        runtime,
        lottery,
        coordinator,
        keeper,
        fee,
        interval,
    }
}

fn no_data() -> [Token; 1] {
    [Token::Bytes(Vec::new())]
}

impl Setup {
    async fn enter(&self, player: Address) {
        let connected = self.lottery.connect(player);
        self.runtime
            .send(&connected, "participateToLottery", &[], self.fee)
            .await
            .unwrap();
    }

    async fn upkeep_needed(&self) -> bool {
        self.lottery.query("checkUpkeep", &no_data()).await.unwrap() == Token::Bool(true)
    }

    async fn state(&self) -> U256 {
        self.lottery.query_uint("getLotteryState", &[]).await.unwrap()
    }

    async fn perform_upkeep(&self) -> Result<chain_core::TransactionReceipt, DeployError> {
        let keeper = self.lottery.connect(self.keeper);
        self.runtime
            .send(&keeper, "performUpkeep", &no_data(), U256::zero())
            .await
    }
}

#[tokio::test]
async fn test_constructor() {
    let setup = setup().await;
    assert_eq!(setup.state().await, U256::zero());
    assert_eq!(setup.interval, setup.runtime.network().interval);
    assert_eq!(setup.fee, setup.runtime.network().entrance_fee);
    assert_eq!(
        setup.lottery.query_uint("getNumberOfPlayers", &[]).await.unwrap(),
        U256::zero()
    );
}

#[tokio::test]
async fn test_entry_below_fee_reverts() {
    let setup = setup().await;
    let err = setup
        .runtime
        .send(&setup.lottery, "participateToLottery", &[], setup.fee - 1)
        .await
        .unwrap_err();
    assert_eq!(err.revert_reason(), Some("Lottery__NotEnough()"));
}

#[tokio::test]
async fn test_entry_records_player_and_emits() {
    let setup = setup().await;
    let player = setup.runtime.player().await.unwrap();
    let connected = setup.lottery.connect(player);

    let armed = setup
        .runtime
        .listener(&setup.lottery, "ParticipateToLottery")
        .arm()
        .await
        .unwrap();
    let result = armed
        .fire(
            setup.runtime.send(&connected, "participateToLottery", &[], setup.fee),
            |event| async move {
                ensure_eq(event.param("player").cloned(), Some(Token::Address(player)), "player")
            },
        )
        .await;
    assert_eq!(HarnessState::of(&result), HarnessState::Fulfilled);

    assert_eq!(
        setup
            .lottery
            .query_address("getPlayer", &[Token::Uint(U256::zero())])
            .await
            .unwrap(),
        player
    );
}

#[tokio::test]
async fn test_no_entries_while_calculating() {
    let setup = setup().await;
    let player = setup.runtime.player().await.unwrap();
    setup.enter(player).await;
    setup.runtime.advance_time(setup.interval + 1).await.unwrap();
    setup.perform_upkeep().await.unwrap();
    assert_eq!(setup.state().await, U256::one());

    let connected = setup.lottery.connect(player);
    let err = setup
        .runtime
        .send(&connected, "participateToLottery", &[], setup.fee)
        .await
        .unwrap_err();
    assert_eq!(err.revert_reason(), Some("Lottery__Closed()"));
}

#[tokio::test]
async fn test_check_upkeep() {
    let setup = setup().await;
    let player = setup.runtime.player().await.unwrap();

    // no players, no balance
    setup.runtime.advance_time(setup.interval + 1).await.unwrap();
    assert!(!setup.upkeep_needed().await);

    setup.enter(player).await;
    assert!(setup.upkeep_needed().await);

    setup.perform_upkeep().await.unwrap();
    assert!(!setup.upkeep_needed().await);
}

#[tokio::test]
async fn test_check_upkeep_waits_for_interval() {
    let setup = setup().await;
    setup.enter(setup.runtime.player().await.unwrap()).await;
    setup.runtime.advance_time(setup.interval / 2).await.unwrap();
    assert!(!setup.upkeep_needed().await);
}

#[tokio::test]
async fn test_perform_upkeep_requires_upkeep() {
    let setup = setup().await;
    let err = setup.perform_upkeep().await.unwrap_err();
    assert_eq!(err.revert_reason(), Some("Lottery__UpkeepNotNeeded(0, 0, 0)"));
}

#[tokio::test]
async fn test_perform_upkeep_requests_winner() {
    let setup = setup().await;
    setup.enter(setup.runtime.player().await.unwrap()).await;
    setup.runtime.advance_time(setup.interval + 1).await.unwrap();

    let receipt = setup.perform_upkeep().await.unwrap();
    let requested = setup
        .lottery
        .events_in("RequestedLotteryWinner", &receipt)
        .unwrap();
    assert_eq!(requested.len(), 1);
    assert_eq!(
        requested[0].param("requestId"),
        Some(&Token::Uint(U256::one()))
    );
    assert_eq!(setup.state().await, U256::one());
}

#[tokio::test]
async fn test_fulfill_needs_pending_request() {
    let setup = setup().await;
    let keeper = setup.coordinator.connect(setup.keeper);
    for request_id in [0u64, 1] {
        let err = setup
            .runtime
            .send(
                &keeper,
                "fulfillRandomWords",
                &[
                    Token::Uint(U256::from(request_id)),
                    Token::Address(setup.lottery.address()),
                ],
                U256::zero(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some(vrf::NONEXISTENT_REQUEST));
    }
}

#[tokio::test]
async fn test_picks_winner_resets_and_pays() {
    let setup = setup().await;
    let runtime = &setup.runtime;
    let provider = runtime.provider();
    let accounts = runtime.accounts().await.unwrap();
    let players: Vec<Address> = accounts[..3].to_vec();

    for player in &players {
        setup.enter(*player).await;
    }
    let starting_timestamp = setup.lottery.query_uint("getLastTimeStamp", &[]).await.unwrap();
    let mut starting_balances = HashMap::new();
    for player in &players {
        starting_balances.insert(*player, provider.get_balance(*player).await.unwrap());
    }
    runtime.advance_time(setup.interval + 1).await.unwrap();

    let armed = runtime
        .listener(&setup.lottery, "WinnerPicked")
        .arm()
        .await
        .unwrap();

    let trigger = async {
        let receipt = setup.perform_upkeep().await?;
        let request_id = setup
            .lottery
            .events_in("RequestedLotteryWinner", &receipt)?
            .first()
            .and_then(|event| event.param("requestId").cloned())
            .and_then(Token::into_uint)
            .ok_or_else(|| DeployError::InvalidConfig("no request id".into()))?;
        let keeper = setup.coordinator.connect(setup.keeper);
        runtime
            .send(
                &keeper,
                "fulfillRandomWords",
                &[Token::Uint(request_id), Token::Address(setup.lottery.address())],
                U256::zero(),
            )
            .await
    };

    let fee = setup.fee;
    let lottery = setup.lottery.clone();
    let result = armed
        .fire(trigger, |event| {
            let provider = provider.clone();
            let starting_balances = starting_balances.clone();
            async move {
                let winner = event
                    .param("winner")
                    .cloned()
                    .and_then(Token::into_address)
                    .ok_or_else(|| deploy::HarnessError::Assertion("no winner".into()))?;
                let starting = starting_balances
                    .get(&winner)
                    .copied()
                    .ok_or_else(|| deploy::HarnessError::Assertion(format!("{winner:?} did not play")))?;

                ensure_eq(lottery.query_address("getLastWinner", &[]).await?, winner, "last winner")?;
                ensure_eq(lottery.query_uint("getLotteryState", &[]).await?, U256::zero(), "state")?;
                ensure_eq(
                    lottery.query_uint("getNumberOfPlayers", &[]).await?,
                    U256::zero(),
                    "players",
                )?;
                deploy::harness::ensure(
                    lottery.query_uint("getLastTimeStamp", &[]).await? > starting_timestamp,
                    "timestamp not updated",
                )?;
                ensure_eq(provider.get_balance(lottery.address()).await?, U256::zero(), "pot")?;
                ensure_eq(
                    provider.get_balance(winner).await?,
                    starting + fee * 3,
                    "winner balance",
                )?;
                Ok(winner)
            }
        })
        .await;

    assert_eq!(HarnessState::of(&result), HarnessState::Fulfilled);
    let winner = result.unwrap();
    for player in players.iter().filter(|player| **player != winner) {
        assert_eq!(
            provider.get_balance(*player).await.unwrap(),
            starting_balances[player]
        );
    }
}
