// smart-contracts/src/contracts/mock_v3_aggregator.rs

//! Price feed mock answering `AggregatorV3Interface` reads with a
//! settable answer

use super::{int_arg, non_payable, uint_arg};
use crate::{
    abi::{dispatch, encode_output, Dispatch, Revert},
    state::NativeContract,
    vm::CallContext,
    ContractResult,
};
use chain_core::{Bytes, Token, U256};
use ethers_core::abi::Abi;
use std::collections::HashMap;
use std::sync::Arc;

pub const NAME: &str = "MockV3Aggregator";

/// Decimals of the development price feed
pub const DECIMALS: u8 = 8;

/// 200 USD with 8 decimals
pub const INITIAL_ANSWER: i64 = 20_000_000_000;

pub const ABI: &[&str] = &[
    "constructor(uint8 _decimals, int256 _initialAnswer)",
    "function decimals() view returns (uint8)",
    "function description() view returns (string)",
    "function version() view returns (uint256)",
    "function latestAnswer() view returns (int256)",
    "function latestTimestamp() view returns (uint256)",
    "function latestRound() view returns (uint256)",
    "function getAnswer(uint256) view returns (int256)",
    "function getTimestamp(uint256) view returns (uint256)",
    "function updateAnswer(int256 _answer)",
    "function updateRoundData(uint80 _roundId, int256 _answer, uint256 _timestamp, uint256 _startedAt)",
    "function getRoundData(uint80 _roundId) view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)",
    "function latestRoundData() view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)",
];

/// Stored answer for one round; `answer` is the two's complement int256
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Round {
    answer: U256,
    started_at: U256,
    updated_at: U256,
}

#[derive(Clone)]
pub struct MockV3Aggregator {
    abi: Arc<Abi>,
    decimals: u8,
    latest_round: U256,
    rounds: HashMap<U256, Round>,
}

/// Encode a signed answer as an `int256` word
pub fn int256(value: i64) -> U256 {
    if value >= 0 {
        U256::from(value as u64)
    } else {
        // two's complement
        !U256::from(value.unsigned_abs()) + U256::one()
    }
}

pub fn construct(
    ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    let decimals = uint_arg(&args, 0)?.low_u32() as u8;
    let initial_answer = int_arg(&args, 1)?;

    let mut feed = MockV3Aggregator {
        abi,
        decimals,
        latest_round: U256::zero(),
        rounds: HashMap::new(),
    };
    ctx.sstore(U256::zero(), U256::from(decimals))?;
    feed.update_answer(ctx, initial_answer)?;
    Ok(Box::new(feed))
}

impl MockV3Aggregator {
    fn update_answer(&mut self, ctx: &mut CallContext<'_>, answer: U256) -> ContractResult<()> {
        let now = U256::from(ctx.timestamp());
        let round = self.latest_round + U256::one();
        self.store_round(
            ctx,
            round,
            Round {
                answer,
                started_at: now,
                updated_at: now,
            },
        )
    }

    fn store_round(&mut self, ctx: &mut CallContext<'_>, round: U256, data: Round) -> ContractResult<()> {
        ctx.sstore(self.latest_round, round)?;
        ctx.sstore(U256::zero(), data.answer)?;
        ctx.sstore(U256::zero(), data.updated_at)?;
        ctx.sstore(U256::zero(), data.started_at)?;
        self.latest_round = round;
        self.rounds.insert(round, data);
        Ok(())
    }

    fn round(&self, id: U256) -> Round {
        self.rounds.get(&id).copied().unwrap_or_default()
    }

    fn round_data(&self, id: U256) -> Bytes {
        let round = self.round(id);
        encode_output(&[
            Token::Uint(id),
            Token::Int(round.answer),
            Token::Uint(round.started_at),
            Token::Uint(round.updated_at),
            Token::Uint(id),
        ])
    }
}

impl NativeContract for MockV3Aggregator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> ContractResult<Bytes> {
        let abi = self.abi.clone();
        let (function, args) = match dispatch(&abi, input)? {
            Dispatch::Call(function, args) => (function, args),
            Dispatch::Receive | Dispatch::Unknown => return Err(Revert::empty().into()),
        };
        non_payable(ctx)?;

        match function.name.as_str() {
            "decimals" => Ok(encode_output(&[Token::Uint(U256::from(self.decimals))])),
            "description" => Ok(encode_output(&[Token::String(
                "v0.8/tests/MockV3Aggregator.sol".into(),
            )])),
            "version" => Ok(encode_output(&[Token::Uint(U256::zero())])),
            "latestAnswer" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Int(self.round(self.latest_round).answer)]))
            }
            "latestTimestamp" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(self.round(self.latest_round).updated_at)]))
            }
            "latestRound" => Ok(encode_output(&[Token::Uint(self.latest_round)])),
            "getAnswer" => {
                ctx.sload()?;
                let round = uint_arg(&args, 0)?;
                Ok(encode_output(&[Token::Int(self.round(round).answer)]))
            }
            "getTimestamp" => {
                ctx.sload()?;
                let round = uint_arg(&args, 0)?;
                Ok(encode_output(&[Token::Uint(self.round(round).updated_at)]))
            }
            "updateAnswer" => {
                let answer = int_arg(&args, 0)?;
                self.update_answer(ctx, answer)?;
                Ok(Bytes::default())
            }
            "updateRoundData" => {
                let round = uint_arg(&args, 0)?;
                let data = Round {
                    answer: int_arg(&args, 1)?,
                    updated_at: uint_arg(&args, 2)?,
                    started_at: uint_arg(&args, 3)?,
                };
                self.store_round(ctx, round, data)?;
                Ok(Bytes::default())
            }
            "getRoundData" => {
                ctx.sload()?;
                Ok(self.round_data(uint_arg(&args, 0)?))
            }
            "latestRoundData" => {
                ctx.sload()?;
                Ok(self.round_data(self.latest_round))
            }
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int256_encoding() {
        assert_eq!(int256(INITIAL_ANSWER), U256::from(20_000_000_000u64));
        assert_eq!(int256(-1), U256::MAX);
        assert_eq!(int256(-2), U256::MAX - 1);
    }
}
