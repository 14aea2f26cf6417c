// smart-contracts/src/contracts/fund_me.rs

//! Crowdfunding with a USD-denominated minimum, priced through an
//! `AggregatorV3Interface` feed

use super::{address_arg, address_word, index, non_payable};
use crate::{
    abi::{dispatch, encode_call, encode_output, Dispatch, Revert},
    state::NativeContract,
    vm::CallContext,
    ContractResult,
};
use chain_core::{Address, Bytes, Token, U256};
use ethers_core::abi::{self, Abi, ParamType};
use std::collections::HashMap;
use std::sync::Arc;

pub const NAME: &str = "FundMe";

pub const NOT_OWNER: &str = "FundMe__NotOwner()";

pub const NOT_ENOUGH: &str = "Not enougth";

pub const ABI: &[&str] = &[
    "constructor(address priceFeedAddress)",
    "function fund() payable",
    "function withdraw()",
    "function priceFeed() view returns (address)",
    "function getOwner() view returns (address)",
    "function MINIMUM_USD() view returns (uint256)",
    "function addressToAmountFounded(address) view returns (uint256)",
    "function funders(uint256) view returns (address)",
    "function getFundersCount() view returns (uint256)",
    "function getVersion() view returns (uint256)",
];

/// 50 USD with 18 decimals
pub fn minimum_usd() -> U256 {
    U256::from(50) * U256::exp10(18)
}

#[derive(Clone)]
pub struct FundMe {
    abi: Arc<Abi>,
    owner: Address,
    price_feed: Address,
    address_to_amount_funded: HashMap<Address, U256>,
    funders: Vec<Address>,
}

pub fn construct(
    ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    let price_feed = address_arg(&args, 0)?;
    let owner = ctx.sender();
    ctx.sstore(U256::zero(), address_word(price_feed))?;

    Ok(Box::new(FundMe {
        abi,
        owner,
        price_feed,
        address_to_amount_funded: HashMap::new(),
        funders: Vec::new(),
    }))
}

impl FundMe {
    /// ETH price in USD with 18 decimals
    fn eth_price(&self, ctx: &mut CallContext<'_>) -> ContractResult<U256> {
        let output = ctx.call(self.price_feed, &encode_call("latestRoundData()", &[]), U256::zero())?;
        let decoded = abi::decode(
            &[
                ParamType::Uint(80),
                ParamType::Int(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(80),
            ],
            &output,
        )
        .map_err(|_| Revert::empty())?;

        let answer = decoded
            .into_iter()
            .nth(1)
            .and_then(Token::into_int)
            .ok_or_else(Revert::empty)?;
        if answer.bit(255) {
            return Err(Revert::message("Negative price").into());
        }
        // feed answers carry 8 decimals
        answer
            .checked_mul(U256::exp10(10))
            .ok_or_else(|| Revert::panic(crate::abi::PANIC_OVERFLOW).into())
    }

    /// Value of `eth_amount` wei in USD with 18 decimals
    fn conversion_rate(&self, ctx: &mut CallContext<'_>, eth_amount: U256) -> ContractResult<U256> {
        let price = self.eth_price(ctx)?;
        let usd = price
            .checked_mul(eth_amount)
            .ok_or_else(|| Revert::panic(crate::abi::PANIC_OVERFLOW))?;
        Ok(usd / U256::exp10(18))
    }

    fn fund(&mut self, ctx: &mut CallContext<'_>) -> ContractResult<Bytes> {
        let value = ctx.value();
        if self.conversion_rate(ctx, value)? < minimum_usd() {
            return Err(Revert::message(NOT_ENOUGH).into());
        }

        let funder = ctx.sender();
        ctx.sload()?;
        let previous = self
            .address_to_amount_funded
            .get(&funder)
            .copied()
            .unwrap_or_default();
        let updated = previous
            .checked_add(value)
            .ok_or_else(|| Revert::panic(crate::abi::PANIC_OVERFLOW))?;
        ctx.sstore(previous, updated)?;
        self.address_to_amount_funded.insert(funder, updated);

        if !self.funders.contains(&funder) {
            let len = U256::from(self.funders.len());
            ctx.sstore(len, len + 1)?;
            ctx.sstore(U256::zero(), address_word(funder))?;
            self.funders.push(funder);
        }
        Ok(Bytes::default())
    }

    fn withdraw(&mut self, ctx: &mut CallContext<'_>) -> ContractResult<Bytes> {
        non_payable(ctx)?;
        if ctx.sender() != self.owner {
            return Err(Revert::custom(NOT_OWNER, &[]).into());
        }

        for funder in std::mem::take(&mut self.funders) {
            let amount = self
                .address_to_amount_funded
                .remove(&funder)
                .unwrap_or_default();
            ctx.sstore(amount, U256::zero())?;
            ctx.sstore(address_word(funder), U256::zero())?;
        }
        ctx.sstore(U256::one(), U256::zero())?;

        let balance = ctx.self_balance();
        if !ctx.send_value(self.owner, balance)? {
            return Err(Revert::message("Call failed").into());
        }
        Ok(Bytes::default())
    }
}

impl NativeContract for FundMe {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> ContractResult<Bytes> {
        let abi = self.abi.clone();
        let (function, args) = match dispatch(&abi, input)? {
            Dispatch::Call(function, args) => (function, args),
            // receive() and fallback() both fund
            Dispatch::Receive | Dispatch::Unknown => return self.fund(ctx),
        };

        if function.name != "fund" {
            non_payable(ctx)?;
        }

        match function.name.as_str() {
            "fund" => self.fund(ctx),
            "withdraw" => self.withdraw(ctx),
            "priceFeed" => Ok(encode_output(&[Token::Address(self.price_feed)])),
            "getOwner" => Ok(encode_output(&[Token::Address(self.owner)])),
            "MINIMUM_USD" => Ok(encode_output(&[Token::Uint(minimum_usd())])),
            "addressToAmountFounded" => {
                ctx.sload()?;
                let funder = address_arg(&args, 0)?;
                let amount = self
                    .address_to_amount_funded
                    .get(&funder)
                    .copied()
                    .unwrap_or_default();
                Ok(encode_output(&[Token::Uint(amount)]))
            }
            "funders" => {
                ctx.sload()?;
                let position = super::uint_arg(&args, 0)?;
                Ok(encode_output(&[Token::Address(index(&self.funders, position)?)]))
            }
            "getFundersCount" => Ok(encode_output(&[Token::Uint(U256::from(self.funders.len()))])),
            "getVersion" => ctx.call(self.price_feed, &encode_call("version()", &[]), U256::zero()),
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}
