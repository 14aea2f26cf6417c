// smart-contracts/src/contracts/vrf_coordinator_v2_mock.rs

//! Chainlink VRF v2 coordinator mock: subscriptions, random word
//! requests, and manual fulfillment

use super::{address_arg, address_topic, bytes32_arg, non_payable, uint_arg, uint_array_arg, uint_topic};
use crate::{
    abi::{dispatch, encode_call, encode_output, event_topic, Dispatch, Revert},
    state::NativeContract,
    vm::CallContext,
    ContractResult,
};
use chain_core::{Address, Bytes, Token, U256};
use ethers_core::abi::{self, Abi};
use ethers_core::utils::keccak256;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAME: &str = "VRFCoordinatorV2Mock";

/// Maximum consumers per subscription
pub const MAX_CONSUMERS: usize = 100;

/// Most random words one request may ask for
pub const MAX_NUM_WORDS: u32 = 500;

pub const INVALID_SUBSCRIPTION: &str = "InvalidSubscription()";
pub const INSUFFICIENT_BALANCE: &str = "InsufficientBalance()";
pub const MUST_BE_SUB_OWNER: &str = "MustBeSubOwner(address)";
pub const TOO_MANY_CONSUMERS: &str = "TooManyConsumers()";
pub const INVALID_CONSUMER: &str = "InvalidConsumer(uint64,address)";
pub const INVALID_RANDOM_WORDS: &str = "InvalidRandomWords()";
pub const NUM_WORDS_TOO_BIG: &str = "NumWordsTooBig(uint32,uint32)";
pub const NONEXISTENT_REQUEST: &str = "nonexistent request";

pub const SUBSCRIPTION_CREATED_EVENT: &str = "SubscriptionCreated(uint64,address)";
pub const SUBSCRIPTION_FUNDED_EVENT: &str = "SubscriptionFunded(uint64,uint256,uint256)";
pub const SUBSCRIPTION_CANCELED_EVENT: &str = "SubscriptionCanceled(uint64,address,uint256)";
pub const CONSUMER_ADDED_EVENT: &str = "ConsumerAdded(uint64,address)";
pub const CONSUMER_REMOVED_EVENT: &str = "ConsumerRemoved(uint64,address)";
pub const RANDOM_WORDS_REQUESTED_EVENT: &str =
    "RandomWordsRequested(bytes32,uint256,uint256,uint64,uint16,uint32,uint32,address)";
pub const RANDOM_WORDS_FULFILLED_EVENT: &str = "RandomWordsFulfilled(uint256,uint256,uint96,bool)";

pub const ABI: &[&str] = &[
    "constructor(uint96 _baseFee, uint96 _gasPriceLink)",
    "function BASE_FEE() view returns (uint96)",
    "function GAS_PRICE_LINK() view returns (uint96)",
    "function MAX_CONSUMERS() view returns (uint16)",
    "function createSubscription() returns (uint64 _subId)",
    "function fundSubscription(uint64 _subId, uint96 _amount)",
    "function addConsumer(uint64 _subId, address _consumer)",
    "function removeConsumer(uint64 _subId, address _consumer)",
    "function cancelSubscription(uint64 _subId, address _to)",
    "function getSubscription(uint64 _subId) view returns (uint96 balance, uint64 reqCount, address owner, address[] consumers)",
    "function consumerIsAdded(uint64 _subId, address _consumer) view returns (bool)",
    "function requestRandomWords(bytes32 _keyHash, uint64 _subId, uint16 _minimumRequestConfirmations, uint32 _callbackGasLimit, uint32 _numWords) returns (uint256)",
    "function fulfillRandomWords(uint256 _requestId, address _consumer)",
    "function fulfillRandomWordsWithOverride(uint256 _requestId, address _consumer, uint256[] _words)",
    "event SubscriptionCreated(uint64 indexed subId, address owner)",
    "event SubscriptionFunded(uint64 indexed subId, uint256 oldBalance, uint256 newBalance)",
    "event SubscriptionCanceled(uint64 indexed subId, address to, uint256 amount)",
    "event ConsumerAdded(uint64 indexed subId, address consumer)",
    "event ConsumerRemoved(uint64 indexed subId, address consumer)",
    "event RandomWordsRequested(bytes32 indexed keyHash, uint256 requestId, uint256 preSeed, uint64 indexed subId, uint16 minimumRequestConfirmations, uint32 callbackGasLimit, uint32 numWords, address indexed sender)",
    "event RandomWordsFulfilled(uint256 indexed requestId, uint256 outputSeed, uint96 payment, bool success)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Subscription {
    owner: Address,
    balance: U256,
    request_count: u64,
    consumers: Vec<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Request {
    subscription_id: U256,
    callback_gas_limit: U256,
    num_words: U256,
}

#[derive(Clone)]
pub struct VrfCoordinatorV2Mock {
    abi: Arc<Abi>,
    base_fee: U256,
    gas_price_link: U256,
    current_sub_id: U256,
    next_request_id: U256,
    next_pre_seed: U256,
    subscriptions: BTreeMap<U256, Subscription>,
    requests: BTreeMap<U256, Request>,
}

pub fn construct(
    ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    let base_fee = uint_arg(&args, 0)?;
    let gas_price_link = uint_arg(&args, 1)?;
    ctx.sstore(U256::zero(), U256::one())?;
    ctx.sstore(U256::zero(), U256::from(100))?;

    Ok(Box::new(VrfCoordinatorV2Mock {
        abi,
        base_fee,
        gas_price_link,
        current_sub_id: U256::zero(),
        next_request_id: U256::one(),
        next_pre_seed: U256::from(100),
        subscriptions: BTreeMap::new(),
        requests: BTreeMap::new(),
    }))
}

/// Deterministic random word `i` of a request: `keccak256(abi.encode(requestId, i))`
pub fn random_word(request_id: U256, i: usize) -> U256 {
    let encoded = abi::encode(&[Token::Uint(request_id), Token::Uint(U256::from(i))]);
    U256::from_big_endian(&keccak256(encoded))
}

impl VrfCoordinatorV2Mock {
    fn subscription(&self, id: U256) -> ContractResult<&Subscription> {
        self.subscriptions
            .get(&id)
            .ok_or_else(|| Revert::custom(INVALID_SUBSCRIPTION, &[]).into())
    }

    fn owned_subscription(&mut self, ctx: &CallContext<'_>, id: U256) -> ContractResult<&mut Subscription> {
        let subscription = self
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| Revert::custom(INVALID_SUBSCRIPTION, &[]))?;
        if subscription.owner != ctx.sender() {
            return Err(Revert::custom(MUST_BE_SUB_OWNER, &[Token::Address(subscription.owner)]).into());
        }
        Ok(subscription)
    }

    fn create_subscription(&mut self, ctx: &mut CallContext<'_>) -> ContractResult<Bytes> {
        let id = self.current_sub_id + 1;
        ctx.sstore(self.current_sub_id, id)?;
        ctx.sstore(U256::zero(), super::address_word(ctx.sender()))?;
        self.current_sub_id = id;
        self.subscriptions.insert(
            id,
            Subscription {
                owner: ctx.sender(),
                balance: U256::zero(),
                request_count: 0,
                consumers: Vec::new(),
            },
        );
        ctx.emit(
            vec![event_topic(SUBSCRIPTION_CREATED_EVENT), uint_topic(id)],
            abi::encode(&[Token::Address(ctx.sender())]).into(),
        )?;
        Ok(encode_output(&[Token::Uint(id)]))
    }

    fn fund_subscription(&mut self, ctx: &mut CallContext<'_>, id: U256, amount: U256) -> ContractResult<Bytes> {
        let old_balance = self.subscription(id)?.balance;
        let new_balance = old_balance.saturating_add(amount);
        ctx.sstore(old_balance, new_balance)?;
        if let Some(subscription) = self.subscriptions.get_mut(&id) {
            subscription.balance = new_balance;
        }
        ctx.emit(
            vec![event_topic(SUBSCRIPTION_FUNDED_EVENT), uint_topic(id)],
            abi::encode(&[Token::Uint(old_balance), Token::Uint(new_balance)]).into(),
        )?;
        Ok(Bytes::default())
    }

    fn add_consumer(&mut self, ctx: &mut CallContext<'_>, id: U256, consumer: Address) -> ContractResult<Bytes> {
        let subscription = self.owned_subscription(ctx, id)?;
        if subscription.consumers.contains(&consumer) {
            return Ok(Bytes::default());
        }
        if subscription.consumers.len() >= MAX_CONSUMERS {
            return Err(Revert::custom(TOO_MANY_CONSUMERS, &[]).into());
        }
        subscription.consumers.push(consumer);
        let len = U256::from(subscription.consumers.len());
        ctx.sstore(len - 1, len)?;
        ctx.sstore(U256::zero(), super::address_word(consumer))?;
        ctx.emit(
            vec![event_topic(CONSUMER_ADDED_EVENT), uint_topic(id)],
            abi::encode(&[Token::Address(consumer)]).into(),
        )?;
        Ok(Bytes::default())
    }

    fn remove_consumer(&mut self, ctx: &mut CallContext<'_>, id: U256, consumer: Address) -> ContractResult<Bytes> {
        let subscription = self.owned_subscription(ctx, id)?;
        let Some(position) = subscription.consumers.iter().position(|c| *c == consumer) else {
            return Err(Revert::custom(INVALID_CONSUMER, &[Token::Uint(id), Token::Address(consumer)]).into());
        };
        subscription.consumers.remove(position);
        ctx.sstore(super::address_word(consumer), U256::zero())?;
        ctx.emit(
            vec![event_topic(CONSUMER_REMOVED_EVENT), uint_topic(id)],
            abi::encode(&[Token::Address(consumer)]).into(),
        )?;
        Ok(Bytes::default())
    }

    fn cancel_subscription(&mut self, ctx: &mut CallContext<'_>, id: U256, to: Address) -> ContractResult<Bytes> {
        let balance = self.owned_subscription(ctx, id)?.balance;
        self.subscriptions.remove(&id);
        ctx.sstore(balance, U256::zero())?;
        ctx.emit(
            vec![event_topic(SUBSCRIPTION_CANCELED_EVENT), uint_topic(id)],
            abi::encode(&[Token::Address(to), Token::Uint(balance)]).into(),
        )?;
        Ok(Bytes::default())
    }

    fn request_random_words(&mut self, ctx: &mut CallContext<'_>, args: &[Token]) -> ContractResult<Bytes> {
        let key_hash = bytes32_arg(args, 0)?;
        let subscription_id = uint_arg(args, 1)?;
        let minimum_confirmations = uint_arg(args, 2)?;
        let callback_gas_limit = uint_arg(args, 3)?;
        let num_words = uint_arg(args, 4)?;

        let consumer = ctx.sender();
        let subscription = self.subscription(subscription_id)?;
        if !subscription.consumers.contains(&consumer) {
            return Err(Revert::custom(
                INVALID_CONSUMER,
                &[Token::Uint(subscription_id), Token::Address(consumer)],
            )
            .into());
        }
        if num_words > U256::from(MAX_NUM_WORDS) {
            return Err(Revert::custom(
                NUM_WORDS_TOO_BIG,
                &[Token::Uint(num_words), Token::Uint(MAX_NUM_WORDS.into())],
            )
            .into());
        }

        let request_id = self.next_request_id;
        let pre_seed = self.next_pre_seed;
        ctx.sstore(request_id, request_id + 1)?;
        ctx.sstore(pre_seed, pre_seed + 1)?;
        ctx.sstore(U256::zero(), subscription_id)?;
        self.next_request_id = request_id + 1;
        self.next_pre_seed = pre_seed + 1;
        self.requests.insert(
            request_id,
            Request {
                subscription_id,
                callback_gas_limit,
                num_words,
            },
        );
        if let Some(subscription) = self.subscriptions.get_mut(&subscription_id) {
            subscription.request_count += 1;
        }

        ctx.emit(
            vec![
                event_topic(RANDOM_WORDS_REQUESTED_EVENT),
                key_hash,
                uint_topic(subscription_id),
                address_topic(consumer),
            ],
            abi::encode(&[
                Token::Uint(request_id),
                Token::Uint(pre_seed),
                Token::Uint(minimum_confirmations),
                Token::Uint(callback_gas_limit),
                Token::Uint(num_words),
            ])
            .into(),
        )?;
        Ok(encode_output(&[Token::Uint(request_id)]))
    }

    fn fulfill_random_words(
        &mut self,
        ctx: &mut CallContext<'_>,
        request_id: U256,
        consumer: Address,
        override_words: Vec<U256>,
    ) -> ContractResult<Bytes> {
        let start_gas = ctx.gas_used();
        ctx.sload()?;
        let request = *self
            .requests
            .get(&request_id)
            .ok_or_else(|| Revert::message(NONEXISTENT_REQUEST))?;

        let words = if override_words.is_empty() {
            (0..request.num_words.low_u64() as usize)
                .map(|i| random_word(request_id, i))
                .collect::<Vec<_>>()
        } else if U256::from(override_words.len()) != request.num_words {
            return Err(Revert::custom(INVALID_RANDOM_WORDS, &[]).into());
        } else {
            override_words
        };

        let callback = encode_call(
            "rawFulfillRandomWords(uint256,uint256[])",
            &[
                Token::Uint(request_id),
                Token::Array(words.into_iter().map(Token::Uint).collect()),
            ],
        );
        let outcome = ctx.try_call(consumer, &callback, U256::zero())?;
        if let Err(err) = &outcome {
            tracing::debug!(?request_id, ?consumer, %err, "VRF callback failed");
        }

        let gas_spent = U256::from(ctx.gas_used().saturating_sub(start_gas));
        let payment = self.base_fee + gas_spent * self.gas_price_link;

        let subscription = self
            .subscriptions
            .get_mut(&request.subscription_id)
            .ok_or_else(|| Revert::custom(INVALID_SUBSCRIPTION, &[]))?;
        if subscription.balance < payment {
            return Err(Revert::custom(INSUFFICIENT_BALANCE, &[]).into());
        }
        let old_balance = subscription.balance;
        subscription.balance = old_balance - payment;
        ctx.sstore(old_balance, old_balance - payment)?;
        ctx.sstore(request_id, U256::zero())?;
        self.requests.remove(&request_id);

        ctx.emit(
            vec![event_topic(RANDOM_WORDS_FULFILLED_EVENT), uint_topic(request_id)],
            abi::encode(&[
                Token::Uint(request_id),
                Token::Uint(payment),
                Token::Bool(outcome.is_ok()),
            ])
            .into(),
        )?;
        Ok(Bytes::default())
    }
}

impl NativeContract for VrfCoordinatorV2Mock {
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
            "BASE_FEE" => Ok(encode_output(&[Token::Uint(self.base_fee)])),
            "GAS_PRICE_LINK" => Ok(encode_output(&[Token::Uint(self.gas_price_link)])),
            "MAX_CONSUMERS" => Ok(encode_output(&[Token::Uint(U256::from(MAX_CONSUMERS))])),
            "createSubscription" => self.create_subscription(ctx),
            "fundSubscription" => {
                let id = uint_arg(&args, 0)?;
                let amount = uint_arg(&args, 1)?;
                self.fund_subscription(ctx, id, amount)
            }
            "addConsumer" => {
                let id = uint_arg(&args, 0)?;
                let consumer = address_arg(&args, 1)?;
                self.add_consumer(ctx, id, consumer)
            }
            "removeConsumer" => {
                let id = uint_arg(&args, 0)?;
                let consumer = address_arg(&args, 1)?;
                self.remove_consumer(ctx, id, consumer)
            }
            "cancelSubscription" => {
                let id = uint_arg(&args, 0)?;
                let to = address_arg(&args, 1)?;
                self.cancel_subscription(ctx, id, to)
            }
            "getSubscription" => {
                ctx.sload()?;
                let subscription = self.subscription(uint_arg(&args, 0)?)?;
                Ok(encode_output(&[
                    Token::Uint(subscription.balance),
                    Token::Uint(U256::from(subscription.request_count)),
                    Token::Address(subscription.owner),
                    Token::Array(subscription.consumers.iter().copied().map(Token::Address).collect()),
                ]))
            }
            "consumerIsAdded" => {
                ctx.sload()?;
                let id = uint_arg(&args, 0)?;
                let consumer = address_arg(&args, 1)?;
                let added = self
                    .subscriptions
                    .get(&id)
                    .map_or(false, |s| s.consumers.contains(&consumer));
                Ok(encode_output(&[Token::Bool(added)]))
            }
            "requestRandomWords" => self.request_random_words(ctx, &args),
            "fulfillRandomWords" => {
                let request_id = uint_arg(&args, 0)?;
                let consumer = address_arg(&args, 1)?;
                self.fulfill_random_words(ctx, request_id, consumer, Vec::new())
            }
            "fulfillRandomWordsWithOverride" => {
                let request_id = uint_arg(&args, 0)?;
                let consumer = address_arg(&args, 1)?;
                let words = uint_array_arg(&args, 2)?;
                self.fulfill_random_words(ctx, request_id, consumer, words)
            }
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}
