// smart-contracts/src/contracts/lottery.rs

//! Raffle that picks a winner with Chainlink VRF once the automation
//! upkeep conditions hold

use super::{
    address_arg, address_topic, address_word, bytes32_arg, index, non_payable, uint_arg,
    uint_array_arg, uint_topic,
};
use crate::{
    abi::{dispatch, encode_call, encode_output, event_topic, Dispatch, Revert, PANIC_DIVISION_BY_ZERO},
    state::NativeContract,
    vm::CallContext,
    ContractResult,
};
use chain_core::{Address, Bytes, Token, H256, U256};
use ethers_core::abi::{self, Abi, ParamType};
use std::sync::Arc;

pub const NAME: &str = "Lottery";

pub const REQUEST_CONFIRMATIONS: u16 = 3;
pub const NUM_WORDS: u32 = 1;

pub const NOT_ENOUGH: &str = "Lottery__NotEnough()";
pub const CLOSED: &str = "Lottery__Closed()";
pub const UPKEEP_NOT_NEEDED: &str = "Lottery__UpkeepNotNeeded(uint256,uint256,uint256)";
pub const TRANSFER_FAILED: &str = "Lottery__TransferFailed()";
pub const ONLY_COORDINATOR: &str = "OnlyCoordinatorCanFulfill(address,address)";

pub const PARTICIPATE_EVENT: &str = "ParticipateToLottery(address)";
pub const REQUESTED_WINNER_EVENT: &str = "RequestedLotteryWinner(uint256)";
pub const WINNER_PICKED_EVENT: &str = "WinnerPicked(address)";

pub const ABI: &[&str] = &[
    "constructor(address vrfCoordinatorV2, uint256 entranceFee, bytes32 gasLane, uint64 subscriptionId, uint32 callbackGasLimit, uint256 interval)",
    "function participateToLottery() payable",
    "function checkUpkeep(bytes) view returns (bool upkeepNeeded, bytes performData)",
    "function performUpkeep(bytes)",
    "function rawFulfillRandomWords(uint256 requestId, uint256[] randomWords)",
    "function getEntranceFee() view returns (uint256)",
    "function getPlayer(uint256 index) view returns (address)",
    "function getLastWinner() view returns (address)",
    "function getLotteryState() view returns (uint8)",
    "function getNumWords() pure returns (uint256)",
    "function getNumberOfPlayers() view returns (uint256)",
    "function getLastTimeStamp() view returns (uint256)",
    "function getRequestConfirmations() pure returns (uint256)",
    "function getInterval() view returns (uint256)",
    "function getSubscriptionId() view returns (uint64)",
    "event ParticipateToLottery(address indexed player)",
    "event RequestedLotteryWinner(uint256 indexed requestId)",
    "event WinnerPicked(address indexed winner)",
];

/// Whether the lottery accepts players
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LotteryState {
    Open = 0,
    Calculating = 1,
}

impl LotteryState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LotteryState::Open),
            1 => Some(LotteryState::Calculating),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Lottery {
    abi: Arc<Abi>,
    vrf_coordinator: Address,
    entrance_fee: U256,
    gas_lane: H256,
    subscription_id: U256,
    callback_gas_limit: U256,
    interval: U256,
    players: Vec<Address>,
    last_winner: Address,
    state: LotteryState,
    last_time_stamp: U256,
}

pub fn construct(
    ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    let lottery = Lottery {
        abi,
        vrf_coordinator: address_arg(&args, 0)?,
        entrance_fee: uint_arg(&args, 1)?,
        gas_lane: bytes32_arg(&args, 2)?,
        subscription_id: uint_arg(&args, 3)?,
        callback_gas_limit: uint_arg(&args, 4)?,
        interval: uint_arg(&args, 5)?,
        players: Vec::new(),
        last_winner: Address::zero(),
        state: LotteryState::Open,
        last_time_stamp: U256::from(ctx.timestamp()),
    };
    // immutables live in code; state and timestamp take storage
    ctx.sstore(U256::zero(), lottery.last_time_stamp)?;
    Ok(Box::new(lottery))
}

impl Lottery {
    fn participate(&mut self, ctx: &mut CallContext<'_>) -> ContractResult<Bytes> {
        if ctx.value() < self.entrance_fee {
            return Err(Revert::custom(NOT_ENOUGH, &[]).into());
        }
        ctx.sload()?;
        if self.state != LotteryState::Open {
            return Err(Revert::custom(CLOSED, &[]).into());
        }

        let player = ctx.sender();
        let len = U256::from(self.players.len());
        ctx.sstore(len, len + 1)?;
        ctx.sstore(U256::zero(), address_word(player))?;
        self.players.push(player);

        ctx.emit(
            vec![event_topic(PARTICIPATE_EVENT), address_topic(player)],
            Bytes::default(),
        )?;
        Ok(Bytes::default())
    }

    /// Upkeep is needed once the lottery is open, the interval has
    /// elapsed, and there are players and a balance
    fn upkeep_needed(&self, ctx: &mut CallContext<'_>) -> ContractResult<bool> {
        ctx.sload()?;
        ctx.sload()?;
        ctx.sload()?;
        let is_open = self.state == LotteryState::Open;
        let elapsed = U256::from(ctx.timestamp()).saturating_sub(self.last_time_stamp);
        let time_passed = elapsed > self.interval;
        let has_players = !self.players.is_empty();
        let has_balance = !ctx.self_balance().is_zero();
        Ok(is_open && time_passed && has_players && has_balance)
    }

    fn perform_upkeep(&mut self, ctx: &mut CallContext<'_>) -> ContractResult<Bytes> {
        if !self.upkeep_needed(ctx)? {
            return Err(Revert::custom(
                UPKEEP_NOT_NEEDED,
                &[
                    Token::Uint(ctx.self_balance()),
                    Token::Uint(U256::from(self.players.len())),
                    Token::Uint(U256::from(self.state as u8)),
                ],
            )
            .into());
        }

        ctx.sstore(U256::zero(), U256::from(LotteryState::Calculating as u8))?;
        self.state = LotteryState::Calculating;

        let request = encode_call(
            "requestRandomWords(bytes32,uint64,uint16,uint32,uint32)",
            &[
                Token::FixedBytes(self.gas_lane.as_bytes().to_vec()),
                Token::Uint(self.subscription_id),
                Token::Uint(U256::from(REQUEST_CONFIRMATIONS)),
                Token::Uint(self.callback_gas_limit),
                Token::Uint(U256::from(NUM_WORDS)),
            ],
        );
        let output = ctx.call(self.vrf_coordinator, &request, U256::zero())?;
        let request_id = abi::decode(&[ParamType::Uint(256)], &output)
            .ok()
            .and_then(|tokens| tokens.into_iter().next())
            .and_then(Token::into_uint)
            .ok_or_else(Revert::empty)?;

        ctx.emit(
            vec![event_topic(REQUESTED_WINNER_EVENT), uint_topic(request_id)],
            Bytes::default(),
        )?;
        Ok(Bytes::default())
    }

    fn fulfill_random_words(&mut self, ctx: &mut CallContext<'_>, words: &[U256]) -> ContractResult<Bytes> {
        let word = words.first().copied().ok_or_else(|| {
            Revert::panic(crate::abi::PANIC_OUT_OF_BOUNDS)
        })?;
        if self.players.is_empty() {
            return Err(Revert::panic(PANIC_DIVISION_BY_ZERO).into());
        }
        let winner_index = word % U256::from(self.players.len());
        let winner = index(&self.players, winner_index)?;

        ctx.sstore(address_word(self.last_winner), address_word(winner))?;
        ctx.sstore(U256::one(), U256::zero())?;
        ctx.sstore(U256::from(self.players.len()), U256::zero())?;
        ctx.sstore(self.last_time_stamp, U256::from(ctx.timestamp()))?;

        self.last_winner = winner;
        self.state = LotteryState::Open;
        self.players.clear();
        self.last_time_stamp = U256::from(ctx.timestamp());

        let prize = ctx.self_balance();
        if !ctx.send_value(winner, prize)? {
            return Err(Revert::custom(TRANSFER_FAILED, &[]).into());
        }

        ctx.emit(
            vec![event_topic(WINNER_PICKED_EVENT), address_topic(winner)],
            Bytes::default(),
        )?;
        Ok(Bytes::default())
    }
}

impl NativeContract for Lottery {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> ContractResult<Bytes> {
        let abi = self.abi.clone();
        let (function, args) = match dispatch(&abi, input)? {
            Dispatch::Call(function, args) => (function, args),
            Dispatch::Receive | Dispatch::Unknown => return Err(Revert::empty().into()),
        };

        if function.name == "participateToLottery" {
            return self.participate(ctx);
        }
        non_payable(ctx)?;

        match function.name.as_str() {
            "checkUpkeep" => {
                let needed = self.upkeep_needed(ctx)?;
                Ok(encode_output(&[Token::Bool(needed), Token::Bytes(Vec::new())]))
            }
            "performUpkeep" => self.perform_upkeep(ctx),
            "rawFulfillRandomWords" => {
                if ctx.sender() != self.vrf_coordinator {
                    return Err(Revert::custom(
                        ONLY_COORDINATOR,
                        &[Token::Address(ctx.sender()), Token::Address(self.vrf_coordinator)],
                    )
                    .into());
                }
                let words = uint_array_arg(&args, 1)?;
                self.fulfill_random_words(ctx, &words)
            }
            "getEntranceFee" => Ok(encode_output(&[Token::Uint(self.entrance_fee)])),
            "getPlayer" => {
                ctx.sload()?;
                let player = index(&self.players, uint_arg(&args, 0)?)?;
                Ok(encode_output(&[Token::Address(player)]))
            }
            "getLastWinner" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Address(self.last_winner)]))
            }
            "getLotteryState" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(U256::from(self.state as u8))]))
            }
            "getNumWords" => Ok(encode_output(&[Token::Uint(U256::from(NUM_WORDS))])),
            "getNumberOfPlayers" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(U256::from(self.players.len()))]))
            }
            "getLastTimeStamp" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(self.last_time_stamp)]))
            }
            "getRequestConfirmations" => {
                Ok(encode_output(&[Token::Uint(U256::from(REQUEST_CONFIRMATIONS))]))
            }
            "getInterval" => Ok(encode_output(&[Token::Uint(self.interval)])),
            "getSubscriptionId" => Ok(encode_output(&[Token::Uint(self.subscription_id)])),
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}
