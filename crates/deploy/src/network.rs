// deploy/src/network.rs

//! Static per-network constants: oracle addresses, lottery parameters and
//! confirmation depth, keyed by chain id

use crate::{DeployError, DeployResult};
use chain_core::{units, Address, ChainId, H256, U256};
use devnet::config::DEV_CHAIN_ID;
use std::time::Duration;

/// Networks that run on an ephemeral local chain. Mocks are deployed and
/// verification is skipped on these.
pub const DEVELOPMENT_CHAINS: &[&str] = &["hardhat", "localhost"];

/// Default bound for event waits on a development chain
const DEV_EVENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound for event waits on a live chain, where keepers and the
/// oracle network have to act
const LIVE_EVENT_TIMEOUT: Duration = Duration::from_secs(500);

struct NetworkEntry {
    name: &'static str,
    chain_id: ChainId,
    eth_usd_price_feed: Option<&'static str>,
    vrf_coordinator: Option<&'static str>,
    gas_lane: Option<&'static str>,
    subscription_id: Option<u64>,
    entrance_fee: &'static str,
    callback_gas_limit: u32,
    interval: u64,
    block_confirmations: u64,
}

const HARDHAT_GAS_LANE: &str = "0xd89b2bf150e3b9e13446986e571fb9cab24b13cea0a43ea20a6049a85cc807cc";

const NETWORKS: &[NetworkEntry] = &[
    NetworkEntry {
        name: "hardhat",
        chain_id: DEV_CHAIN_ID,
        eth_usd_price_feed: None,
        vrf_coordinator: None,
        gas_lane: Some(HARDHAT_GAS_LANE),
        subscription_id: None,
        entrance_fee: "0.1",
        callback_gas_limit: 500_000,
        interval: 3060,
        block_confirmations: 1,
    },
    NetworkEntry {
        name: "localhost",
        chain_id: DEV_CHAIN_ID,
        eth_usd_price_feed: None,
        vrf_coordinator: None,
        gas_lane: Some(HARDHAT_GAS_LANE),
        subscription_id: None,
        entrance_fee: "0.1",
        callback_gas_limit: 500_000,
        interval: 3060,
        block_confirmations: 1,
    },
    NetworkEntry {
        name: "rinkeby",
        chain_id: 4,
        eth_usd_price_feed: Some("0x8A753747A1Fa494EC906cE90E9f37563A8AF630e"),
        vrf_coordinator: Some("0x6168499c0cFfCaCD319c818142124B7A15E857ab"),
        gas_lane: Some(HARDHAT_GAS_LANE),
        subscription_id: Some(9047),
        entrance_fee: "0.1",
        callback_gas_limit: 500_000,
        interval: 30,
        block_confirmations: 6,
    },
    NetworkEntry {
        name: "sepolia",
        chain_id: 11_155_111,
        eth_usd_price_feed: Some("0x694AA1769357215DE4FAC081bf1f309aDC325306"),
        vrf_coordinator: Some("0x8103B0A8A00be2DDC778e6e7eaa21791Cd364625"),
        gas_lane: Some("0x474e34a077df58807dbe9c96d3c009b23b3c6d0cce433e59bbf5b34f823bc56c"),
        subscription_id: None,
        entrance_fee: "0.01",
        callback_gas_limit: 500_000,
        interval: 30,
        block_confirmations: 6,
    },
    NetworkEntry {
        name: "polygon",
        chain_id: 137,
        eth_usd_price_feed: Some("0xf9680d99d6c9589e2a93a78a04a279e509205945"),
        vrf_coordinator: None,
        gas_lane: None,
        subscription_id: None,
        entrance_fee: "0.1",
        callback_gas_limit: 500_000,
        interval: 30,
        block_confirmations: 6,
    },
];

/// Constants for one target chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub name: String,
    pub chain_id: ChainId,
    /// ETH/USD price feed; mocked on development chains
    pub eth_usd_price_feed: Option<Address>,
    /// VRF coordinator; mocked on development chains
    pub vrf_coordinator: Option<Address>,
    /// VRF key hash selecting the gas price ceiling
    pub gas_lane: Option<H256>,
    /// VRF subscription; created on the fly on development chains
    pub subscription_id: Option<u64>,
    pub entrance_fee: U256,
    pub callback_gas_limit: u32,
    /// Seconds between lottery draws
    pub interval: u64,
    pub block_confirmations: u64,
    /// Upper bound for event waits
    pub event_timeout: Duration,
}

impl NetworkDescriptor {
    fn from_entry(entry: &NetworkEntry) -> DeployResult<Self> {
        let development = DEVELOPMENT_CHAINS.contains(&entry.name);
        Ok(Self {
            name: entry.name.to_string(),
            chain_id: entry.chain_id,
            eth_usd_price_feed: entry.eth_usd_price_feed.map(parse_address).transpose()?,
            vrf_coordinator: entry.vrf_coordinator.map(parse_address).transpose()?,
            gas_lane: entry.gas_lane.map(parse_hash).transpose()?,
            subscription_id: entry.subscription_id,
            entrance_fee: units::parse_ether(entry.entrance_fee)
                .map_err(|e| DeployError::InvalidConfig(e.to_string()))?,
            callback_gas_limit: entry.callback_gas_limit,
            interval: entry.interval,
            block_confirmations: entry.block_confirmations,
            event_timeout: if development { DEV_EVENT_TIMEOUT } else { LIVE_EVENT_TIMEOUT },
        })
    }

    pub fn is_development(&self) -> bool {
        is_development(&self.name)
    }

    pub fn price_feed(&self) -> DeployResult<Address> {
        self.eth_usd_price_feed.ok_or_else(|| self.missing("ethUsdPriceFeed"))
    }

    pub fn coordinator(&self) -> DeployResult<Address> {
        self.vrf_coordinator.ok_or_else(|| self.missing("vrfCoordinator"))
    }

    pub fn key_hash(&self) -> DeployResult<H256> {
        self.gas_lane.ok_or_else(|| self.missing("gasLane"))
    }

    pub fn subscription(&self) -> DeployResult<u64> {
        self.subscription_id.ok_or_else(|| self.missing("subscriptionId"))
    }

    fn missing(&self, key: &'static str) -> DeployError {
        DeployError::MissingNetworkValue {
            network: self.name.clone(),
            key,
        }
    }
}

pub fn is_development(name: &str) -> bool {
    DEVELOPMENT_CHAINS.contains(&name)
}

/// Constants for `chain_id`. The development chain id resolves to
/// `hardhat`.
pub fn network_config(chain_id: ChainId) -> DeployResult<NetworkDescriptor> {
    NETWORKS
        .iter()
        .find(|entry| entry.chain_id == chain_id)
        .ok_or_else(|| DeployError::UnknownNetwork(format!("chain id {chain_id}")))
        .and_then(NetworkDescriptor::from_entry)
}

pub fn network_by_name(name: &str) -> DeployResult<NetworkDescriptor> {
    NETWORKS
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
        .and_then(NetworkDescriptor::from_entry)
}

fn parse_address(raw: &str) -> DeployResult<Address> {
    raw.trim()
        .parse()
        .map_err(|e| DeployError::InvalidConfig(format!("invalid address {raw}: {e}")))
}

fn parse_hash(raw: &str) -> DeployResult<H256> {
    raw.trim()
        .parse()
        .map_err(|e| DeployError::InvalidConfig(format!("invalid hash {raw}: {e}")))
}
