// deploy/tests/properties.rs
use chain_core::{units::ether, Address, Provider, Token, U256};
use deploy::Runtime;
use proptest::prelude::*;
use smart_contracts::contracts::{fund_me, lottery, vrf_coordinator_v2_mock as vrf};
use std::collections::BTreeMap;
use std::future::Future;

/// 50 USD at the mocked 2000 USD/ETH
const MINIMUM_WEI: u64 = 25_000_000_000_000_000;

/// Lottery entrance fee on the development chain (0.1 ETH)
const FEE_WEI: u64 = 100_000_000_000_000_000;

const KEEPER: usize = 9;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn runtime(tags: &[&str]) -> Runtime {
    let runtime = Runtime::hardhat().await.unwrap();
    runtime.fixture(tags).await.unwrap();
    runtime
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn funding_below_minimum_is_rejected(amount in 0u64..MINIMUM_WEI, funder in 1usize..10) {
        block_on(async {
            let runtime = runtime(&["fundme"]).await;
            let account = runtime.accounts().await.unwrap()[funder];
            let fund_me = runtime.contract_as(fund_me::NAME, account).await.unwrap();

            let err = runtime.send(&fund_me, "fund", &[], U256::from(amount)).await.unwrap_err();
            assert_eq!(err.revert_reason(), Some(fund_me::NOT_ENOUGH));
            let funded = fund_me
                .query_uint("addressToAmountFounded", &[Token::Address(account)])
                .await
                .unwrap();
            assert_eq!(funded, U256::zero());
        });
    }

    #[test]
    fn funders_listed_once_and_cleared_on_withdraw(
        fundings in proptest::collection::vec((1usize..4, MINIMUM_WEI..ether_u64(5)), 1..6)
    ) {
        block_on(async {
            let runtime = runtime(&["fundme"]).await;
            let provider = runtime.provider();
            let accounts = runtime.accounts().await.unwrap();
            let fund_me = runtime.contract(fund_me::NAME).await.unwrap();

            let mut expected: BTreeMap<Address, U256> = BTreeMap::new();
            for (index, amount) in &fundings {
                let account = accounts[*index];
                runtime
                    .send(&fund_me.connect(account), "fund", &[], U256::from(*amount))
                    .await
                    .unwrap();
                *expected.entry(account).or_default() += U256::from(*amount);
            }

            let count = fund_me.query_uint("getFundersCount", &[]).await.unwrap().as_usize();
            let mut listed = Vec::new();
            for i in 0..count {
                listed.push(fund_me.query_address("funders", &[Token::Uint(U256::from(i))]).await.unwrap());
            }
            listed.sort();
            let mut distinct: Vec<Address> = expected.keys().copied().collect();
            distinct.sort();
            assert_eq!(listed, distinct);
            for (account, amount) in &expected {
                let funded = fund_me
                    .query_uint("addressToAmountFounded", &[Token::Address(*account)])
                    .await
                    .unwrap();
                assert_eq!(funded, *amount);
            }

            runtime.send(&fund_me, "withdraw", &[], U256::zero()).await.unwrap();
            assert_eq!(provider.get_balance(fund_me.address()).await.unwrap(), U256::zero());
            assert_eq!(fund_me.query_uint("getFundersCount", &[]).await.unwrap(), U256::zero());
            for account in expected.keys() {
                let funded = fund_me
                    .query_uint("addressToAmountFounded", &[Token::Address(*account)])
                    .await
                    .unwrap();
                assert_eq!(funded, U256::zero());
            }
        });
    }

    #[test]
    fn only_owner_withdraws(caller in 1usize..10) {
        block_on(async {
            let runtime = runtime(&["fundme"]).await;
            let fund_me = runtime.contract(fund_me::NAME).await.unwrap();
            runtime.send(&fund_me, "fund", &[], ether(1)).await.unwrap();

            let account = runtime.accounts().await.unwrap()[caller];
            let err = runtime
                .send(&fund_me.connect(account), "withdraw", &[], U256::zero())
                .await
                .unwrap_err();
            assert_eq!(err.revert_reason(), Some(fund_me::NOT_OWNER));
        });
    }

    #[test]
    fn lottery_entry_requires_fee(amount in 0u64..2 * FEE_WEI) {
        block_on(async {
            let runtime = runtime(&["lottery"]).await;
            let player = runtime.player().await.unwrap();
            let lottery = runtime.contract_as(lottery::NAME, player).await.unwrap();

            let result = runtime
                .send(&lottery, "participateToLottery", &[], U256::from(amount))
                .await;
            let players = lottery.query_uint("getNumberOfPlayers", &[]).await.unwrap();
            if amount < FEE_WEI {
                assert_eq!(result.unwrap_err().revert_reason(), Some("Lottery__NotEnough()"));
                assert_eq!(players, U256::zero());
            } else {
                let receipt = result.unwrap();
                let entered = lottery.events_in("ParticipateToLottery", &receipt).unwrap();
                assert_eq!(entered.len(), 1);
                assert_eq!(entered[0].param("player"), Some(&Token::Address(player)));
                assert_eq!(players, U256::one());
            }
        });
    }

    #[test]
    fn winner_takes_whole_pot(extras in proptest::collection::vec(0u64..FEE_WEI, 1..5)) {
        block_on(async {
            let runtime = runtime(&["lottery"]).await;
            let provider = runtime.provider();
            let accounts = runtime.accounts().await.unwrap();
            let keeper = accounts[KEEPER];
            let lottery = runtime.contract(lottery::NAME).await.unwrap();
            let interval = lottery.query_uint("getInterval", &[]).await.unwrap().as_u64();

            let players: Vec<Address> = accounts[1..=extras.len()].to_vec();
            for (player, extra) in players.iter().zip(&extras) {
                runtime
                    .send(
                        &lottery.connect(*player),
                        "participateToLottery",
                        &[],
                        U256::from(FEE_WEI + extra),
                    )
                    .await
                    .unwrap();
            }
            runtime.advance_time(interval + 1).await.unwrap();
            let receipt = runtime
                .send(&lottery.connect(keeper), "performUpkeep", &[Token::Bytes(vec![])], U256::zero())
                .await
                .unwrap();
            let request_id = lottery.events_in("RequestedLotteryWinner", &receipt).unwrap()[0]
                .param("requestId")
                .cloned()
                .and_then(Token::into_uint)
                .unwrap();

            // closed until the winner is picked
            let late = runtime
                .send(&lottery.connect(accounts[8]), "participateToLottery", &[], U256::from(FEE_WEI))
                .await
                .unwrap_err();
            assert_eq!(late.revert_reason(), Some("Lottery__Closed()"));

            let pot = provider.get_balance(lottery.address()).await.unwrap();
            let mut before = BTreeMap::new();
            for player in &players {
                before.insert(*player, provider.get_balance(*player).await.unwrap());
            }
            let coordinator = runtime.contract_as(vrf::NAME, keeper).await.unwrap();
            runtime
                .send(
                    &coordinator,
                    "fulfillRandomWords",
                    &[Token::Uint(request_id), Token::Address(lottery.address())],
                    U256::zero(),
                )
                .await
                .unwrap();

            let winner = lottery.query_address("getLastWinner", &[]).await.unwrap();
            for player in &players {
                let after = provider.get_balance(*player).await.unwrap();
                if *player == winner {
                    assert_eq!(after, before[player] + pot);
                } else {
                    assert_eq!(after, before[player]);
                }
            }
            assert_eq!(lottery.query_uint("getNumberOfPlayers", &[]).await.unwrap(), U256::zero());
            assert_eq!(lottery.query_uint("getLotteryState", &[]).await.unwrap(), U256::zero());
        });
    }
}

const fn ether_u64(amount: u64) -> u64 {
    amount * 1_000_000_000_000_000_000
}
