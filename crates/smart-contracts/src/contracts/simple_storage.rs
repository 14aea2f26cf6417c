// smart-contracts/src/contracts/simple_storage.rs

//! Favorite-number storage with a list of people

use super::{checked_index, non_payable, string_arg, uint_arg};
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

pub const NAME: &str = "SimpleStorage";

pub const ABI: &[&str] = &[
    "function store(uint256 _favoriteNumber)",
    "function retrieve() view returns (uint256)",
    "function addPerson(string _name, uint256 _favoriteNumber)",
    "function people(uint256) view returns (uint256 favoriteNumber, string name)",
    "function nameToFavoriteNumber(string) view returns (uint256)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub favorite_number: U256,
    pub name: String,
}

#[derive(Clone)]
pub struct SimpleStorage {
    abi: Arc<Abi>,
    favorite_number: U256,
    people: Vec<Person>,
    name_to_favorite_number: HashMap<String, U256>,
}

pub fn construct(
    _ctx: &mut CallContext<'_>,
    abi: Arc<Abi>,
    _args: Vec<Token>,
) -> ContractResult<Box<dyn NativeContract>> {
    Ok(Box::new(SimpleStorage {
        abi,
        favorite_number: U256::zero(),
        people: Vec::new(),
        name_to_favorite_number: HashMap::new(),
    }))
}

impl NativeContract for SimpleStorage {
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
                let value = uint_arg(&args, 0)?;
                ctx.sstore(self.favorite_number, value)?;
                self.favorite_number = value;
                Ok(Bytes::default())
            }
            "retrieve" => {
                ctx.sload()?;
                Ok(encode_output(&[Token::Uint(self.favorite_number)]))
            }
            "addPerson" => {
                let name = string_arg(&args, 0)?;
                let favorite_number = uint_arg(&args, 1)?;
                // length slot, person slots, mapping slot
                ctx.sstore(U256::from(self.people.len()), U256::from(self.people.len() + 1))?;
                ctx.sstore(U256::zero(), favorite_number)?;
                ctx.sstore(U256::zero(), U256::from(name.len().max(1)))?;
                let previous = self
                    .name_to_favorite_number
                    .get(&name)
                    .copied()
                    .unwrap_or_default();
                ctx.sstore(previous, favorite_number)?;

                self.name_to_favorite_number.insert(name.clone(), favorite_number);
                self.people.push(Person { favorite_number, name });
                Ok(Bytes::default())
            }
            "people" => {
                ctx.sload()?;
                let position = checked_index(self.people.len(), uint_arg(&args, 0)?)?;
                let person = &self.people[position];
                Ok(encode_output(&[
                    Token::Uint(person.favorite_number),
                    Token::String(person.name.clone()),
                ]))
            }
            "nameToFavoriteNumber" => {
                ctx.sload()?;
                let name = string_arg(&args, 0)?;
                let value = self
                    .name_to_favorite_number
                    .get(&name)
                    .copied()
                    .unwrap_or_default();
                Ok(encode_output(&[Token::Uint(value)]))
            }
            _ => Err(Revert::empty().into()),
        }
    }

    fn box_clone(&self) -> Box<dyn NativeContract> {
        Box::new(self.clone())
    }
}
