// smart-contracts/src/contracts/mod.rs

//! Bundled contracts

pub mod events_example;
pub mod fund_me;
pub mod lottery;
pub mod mock_v3_aggregator;
pub mod simple_storage;
pub mod vrf_coordinator_v2_mock;

use crate::{abi::Revert, artifact::ArtifactRegistry, vm::CallContext, ContractError, ContractResult};
use chain_core::{Address, Token, H256, U256};

pub(crate) fn register_all(registry: &mut ArtifactRegistry) -> ContractResult<()> {
    registry.register_native(simple_storage::NAME, simple_storage::ABI, simple_storage::construct)?;
    registry.register_native(events_example::NAME, events_example::ABI, events_example::construct)?;
    registry.register_native(
        mock_v3_aggregator::NAME,
        mock_v3_aggregator::ABI,
        mock_v3_aggregator::construct,
    )?;
    registry.register_native(
        vrf_coordinator_v2_mock::NAME,
        vrf_coordinator_v2_mock::ABI,
        vrf_coordinator_v2_mock::construct,
    )?;
    registry.register_native(fund_me::NAME, fund_me::ABI, fund_me::construct)?;
    registry.register_native(lottery::NAME, lottery::ABI, lottery::construct)?;
    Ok(())
}

fn bad_arg(index: usize) -> ContractError {
    ContractError::Abi(format!("unexpected type for argument {index}"))
}

pub(crate) fn uint_arg(args: &[Token], index: usize) -> ContractResult<U256> {
    args.get(index)
        .cloned()
        .and_then(Token::into_uint)
        .ok_or_else(|| bad_arg(index))
}

pub(crate) fn int_arg(args: &[Token], index: usize) -> ContractResult<U256> {
    args.get(index)
        .cloned()
        .and_then(Token::into_int)
        .ok_or_else(|| bad_arg(index))
}

pub(crate) fn address_arg(args: &[Token], index: usize) -> ContractResult<Address> {
    args.get(index)
        .cloned()
        .and_then(Token::into_address)
        .ok_or_else(|| bad_arg(index))
}

pub(crate) fn string_arg(args: &[Token], index: usize) -> ContractResult<String> {
    args.get(index)
        .cloned()
        .and_then(Token::into_string)
        .ok_or_else(|| bad_arg(index))
}

pub(crate) fn bytes32_arg(args: &[Token], index: usize) -> ContractResult<H256> {
    args.get(index)
        .cloned()
        .and_then(Token::into_fixed_bytes)
        .filter(|bytes| bytes.len() == 32)
        .map(|bytes| H256::from_slice(&bytes))
        .ok_or_else(|| bad_arg(index))
}

pub(crate) fn uint_array_arg(args: &[Token], index: usize) -> ContractResult<Vec<U256>> {
    args.get(index)
        .cloned()
        .and_then(Token::into_array)
        .and_then(|items| items.into_iter().map(Token::into_uint).collect())
        .ok_or_else(|| bad_arg(index))
}

/// Plain functions reject attached value
pub(crate) fn non_payable(ctx: &CallContext<'_>) -> ContractResult<()> {
    if ctx.value().is_zero() {
        Ok(())
    } else {
        Err(Revert::empty().into())
    }
}

/// Storage word holding an address (for gas accounting)
pub(crate) fn address_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub(crate) fn address_topic(address: Address) -> H256 {
    H256::from(address)
}

pub(crate) fn uint_topic(value: U256) -> H256 {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    H256::from(word)
}

/// Bounds check for `array[index]`
pub(crate) fn checked_index(len: usize, index: U256) -> ContractResult<usize> {
    if index >= U256::from(len) {
        return Err(Revert::panic(crate::abi::PANIC_OUT_OF_BOUNDS).into());
    }
    Ok(index.as_usize())
}

/// `array[index]` with the compiler's bounds check
pub(crate) fn index<T: Copy>(items: &[T], index: U256) -> ContractResult<T> {
    Ok(items[checked_index(items.len(), index)?])
}
