// smart-contracts/src/abi.rs

//! Selector dispatch and revert payloads

use crate::{ContractError, ContractResult};
use chain_core::{Bytes, H256, U256};
use ethers_core::abi::{self, Abi, Function, Token};
use ethers_core::utils::keccak256;

/// Selector of `Error(string)`
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Selector of `Panic(uint256)`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Panic code for out-of-bounds array access
pub const PANIC_OUT_OF_BOUNDS: u64 = 0x32;

/// Panic code for checked arithmetic overflow
pub const PANIC_OVERFLOW: u64 = 0x11;

/// Panic code for division or modulo by zero
pub const PANIC_DIVISION_BY_ZERO: u64 = 0x12;

/// First four bytes of the keccak hash of a signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of an event
pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// Calldata for `signature` applied to `args`
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// ABI-encode return values
pub fn encode_output(tokens: &[Token]) -> Bytes {
    abi::encode(tokens).into()
}

/// Parse a human-readable ABI
pub fn parse_human_abi(lines: &[&str]) -> ContractResult<Abi> {
    abi::parse_abi(lines).map_err(|e| ContractError::Abi(e.to_string()))
}

/// How an incoming call maps onto a contract's ABI
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// Empty calldata (plain value transfer)
    Receive,
    /// A known function with decoded arguments
    Call(&'a Function, Vec<Token>),
    /// Calldata that matches no function
    Unknown,
}

/// Resolve calldata against `abi`. Undecodable arguments revert without data.
pub fn dispatch<'a>(abi: &'a Abi, input: &[u8]) -> ContractResult<Dispatch<'a>> {
    if input.is_empty() {
        return Ok(Dispatch::Receive);
    }
    if input.len() < 4 {
        return Ok(Dispatch::Unknown);
    }
    let selector = &input[..4];
    let Some(function) = abi.functions().find(|f| f.short_signature() == selector) else {
        return Ok(Dispatch::Unknown);
    };
    let args = function
        .decode_input(&input[4..])
        .map_err(|_| ContractError::Revert(Revert::empty()))?;
    Ok(Dispatch::Call(function, args))
}

/// Revert payload plus its human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revert {
    pub reason: String,
    pub data: Bytes,
}

impl Revert {
    /// `revert("message")` / `require(cond, "message")`
    pub fn message(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut data = ERROR_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String(message.clone())]));
        Self {
            reason: message,
            data: data.into(),
        }
    }

    /// `revert Name(args)` for a custom error declared as `signature`,
    /// e.g. `Lottery__UpkeepNotNeeded(uint256,uint256,uint256)`
    pub fn custom(signature: &str, args: &[Token]) -> Self {
        let name = signature.split('(').next().unwrap_or(signature);
        let shown: Vec<String> = args.iter().map(display_token).collect();
        let mut data = selector(signature).to_vec();
        data.extend(abi::encode(args));
        Self {
            reason: format!("{}({})", name, shown.join(", ")),
            data: data.into(),
        }
    }

    /// Compiler-inserted panic
    pub fn panic(code: u64) -> Self {
        let description = match code {
            0x01 => "Assertion error",
            PANIC_OVERFLOW => "Arithmetic operation underflowed or overflowed outside of an unchecked block",
            PANIC_DIVISION_BY_ZERO => "Division or modulo division by zero",
            PANIC_OUT_OF_BOUNDS => "Array accessed at an out-of-bounds or negative index",
            _ => "Unknown panic code",
        };
        let mut data = PANIC_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::Uint(U256::from(code))]));
        Self {
            reason: format!("panic code {:#04x} ({})", code, description),
            data: data.into(),
        }
    }

    /// Bare `revert()`
    pub fn empty() -> Self {
        Self {
            reason: "reverted without a reason".into(),
            data: Bytes::default(),
        }
    }

    /// Human-readable reason for raw revert data. Custom errors are only
    /// recognisable when their ABI is known, so they fall back to hex.
    pub fn describe(data: &[u8]) -> String {
        if data.is_empty() {
            return Self::empty().reason;
        }
        if data.len() >= 4 && data[..4] == ERROR_SELECTOR {
            if let Ok(tokens) = abi::decode(&[abi::ParamType::String], &data[4..]) {
                if let Some(Token::String(message)) = tokens.into_iter().next() {
                    return message;
                }
            }
        }
        if data.len() >= 4 && data[..4] == PANIC_SELECTOR {
            if let Ok(tokens) = abi::decode(&[abi::ParamType::Uint(256)], &data[4..]) {
                if let Some(Token::Uint(code)) = tokens.into_iter().next() {
                    return Self::panic(code.low_u64()).reason;
                }
            }
        }
        format!("0x{}", hex::encode(data))
    }
}

fn display_token(token: &Token) -> String {
    match token {
        Token::Address(address) => format!("{:?}", address),
        Token::Uint(value) | Token::Int(value) => value.to_string(),
        Token::Bool(value) => value.to_string(),
        Token::String(value) => format!("\"{}\"", value),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => format!("0x{}", hex::encode(bytes)),
        Token::Array(items) | Token::FixedArray(items) => format!(
            "[{}]",
            items.iter().map(display_token).collect::<Vec<_>>().join(", ")
        ),
        Token::Tuple(items) => format!(
            "({})",
            items.iter().map(display_token).collect::<Vec<_>>().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector() {
        // transfer(address,uint256)
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("Error(string)"), ERROR_SELECTOR);
        assert_eq!(selector("Panic(uint256)"), PANIC_SELECTOR);
    }

    #[test]
    fn test_revert_message() {
        let revert = Revert::message("Not enough");
        assert_eq!(revert.reason, "Not enough");
        assert_eq!(&revert.data[..4], &ERROR_SELECTOR);
        assert_eq!(Revert::describe(&revert.data), "Not enough");
    }

    #[test]
    fn test_custom_error() {
        let revert = Revert::custom("FundMe__NotOwner()", &[]);
        assert_eq!(revert.reason, "FundMe__NotOwner()");
        assert_eq!(revert.data.to_vec(), selector("FundMe__NotOwner()").to_vec());

        let revert = Revert::custom(
            "Lottery__UpkeepNotNeeded(uint256,uint256,uint256)",
            &[Token::Uint(0.into()), Token::Uint(0.into()), Token::Uint(0.into())],
        );
        assert_eq!(revert.reason, "Lottery__UpkeepNotNeeded(0, 0, 0)");
        assert_eq!(
            &revert.data[..4],
            &selector("Lottery__UpkeepNotNeeded(uint256,uint256,uint256)")
        );
        assert_eq!(revert.data.len(), 4 + 3 * 32);
    }

    #[test]
    fn test_panic() {
        let revert = Revert::panic(PANIC_OUT_OF_BOUNDS);
        assert!(revert.reason.contains("0x32"));
        assert_eq!(Revert::describe(&revert.data), revert.reason);
        assert_eq!(Revert::describe(&[]), "reverted without a reason");
    }

    #[test]
    fn test_unknown_revert_data_shown_as_hex() {
        let revert = Revert::custom("FundMe__NotOwner()", &[]);
        assert_eq!(Revert::describe(&revert.data), format!("0x{}", hex::encode(&revert.data)));
        assert_eq!(Revert::describe(&[0xde, 0xad, 0x00]), "0xdead00");
        assert_eq!(display_token(&Token::Bytes(vec![0x0a, 0xff])), "0x0aff");
    }

    #[test]
    fn test_dispatch() {
        let abi = parse_human_abi(&[
            "function store(uint256 value)",
            "function retrieve() view returns (uint256)",
        ])
        .unwrap();

        assert!(matches!(dispatch(&abi, &[]).unwrap(), Dispatch::Receive));
        assert!(matches!(dispatch(&abi, &[1, 2]).unwrap(), Dispatch::Unknown));

        let data = encode_call("store(uint256)", &[Token::Uint(7.into())]);
        match dispatch(&abi, &data).unwrap() {
            Dispatch::Call(function, args) => {
                assert_eq!(function.name, "store");
                assert_eq!(args, vec![Token::Uint(7.into())]);
            }
            other => panic!("unexpected dispatch {:?}", other),
        }

        // truncated arguments revert
        let data = selector("store(uint256)");
        assert!(matches!(dispatch(&abi, &data), Err(ContractError::Revert(_))));
    }
}
