// smart-contracts/src/contracts/events_example.rs

//! Number storage that announces every change with an event

use super::{non_payable, uint_arg, uint_topic};
use crate::{
    abi::{dispatch, encode_output, event_topic, Dispatch, Revert, PANIC_OVERFLOW},
    state::NativeContract,
    vm::CallContext,
    ContractResult,
};
use chain_core::{Bytes, Token, U256};
use ethers_core::abi::{self, Abi};
use std::sync::Arc;

pub const NAME: &str = "EventsExample";

pub const ABI: &[&str] = &[
    "function store(uint256 _favoriteNumber)",
    "function retrieve() view returns (uint256)",
    "event storedNumber(uint256 indexed oldNumber, uint256 indexed newNumber, uint256 addedNumber, address sender)",
];

pub const STORED_NUMBER: &str = "storedNumber(uint256,uint256,uint256,address)";

#[derive(Clone)]
pub struct EventsExample {
    abi: Arc<Abi>,
    favorite_number: U256,
}

pub fn construct(
    _ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    _args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    Ok(Box::new(EventsExample {
        abi,
        favorite_number: U256::zero(),
    }))
}

impl NativeContract for EventsExample {
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
            "store" => {
                let new_number = uint_arg(&args, 0)?;
                let old_number = self.favorite_number;
                let added = old_number
                    .checked_add(new_number)
                    .ok_or_else(|| Revert::panic(PANIC_OVERFLOW))?;

                ctx.emit(
                    vec![
                        event_topic(STORED_NUMBER),
                        uint_topic(old_number),
                        uint_topic(new_number),
                    ],
                    abi::encode(&[Token::Uint(added), Token::Address(ctx.sender())]).into(),
                )?;
                ctx.sstore(old_number, new_number)?;
                self.favorite_number = new_number;
                Ok(Bytes::default())
            }
            "retrieve" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(self.favorite_number)]))
            }
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}
