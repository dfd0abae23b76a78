//! Record models
//!
//! Records come from the search index with camelCase field names. Unknown
//! fields are ignored and missing ones take their defaults, so a partially
//! indexed record still maps.

use crate::errors::GatewayResult;
use crate::search::SearchRecord;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Map a search record onto a model
pub fn from_record<T: DeserializeOwned>(record: SearchRecord) -> GatewayResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// NFT tag and how many NFTs carry it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Tag {
    pub tag: String,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Success,
    Pending,
    Invalid,
    Fail,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Pending => "pending",
            Self::Invalid => "invalid",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "invalid" => Ok(Self::Invalid),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Indexed transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub tx_hash: String,
    pub sender: String,
    pub receiver: String,
    pub sender_shard: Option<u32>,
    pub receiver_shard: Option<u32>,
    pub mini_block_hash: Option<String>,
    pub nonce: u64,
    pub round: Option<u64>,
    pub value: String,
    pub fee: Option<String>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u64>,
    pub gas_used: Option<u64>,
    pub data: Option<String>,
    pub function: Option<String>,
    pub signature: Option<String>,
    pub status: TransactionStatus,
    pub timestamp: u64,
}

/// Signed transaction submitted for broadcast
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionCreate {
    #[serde(rename = "chainID")]
    pub chain_id: String,
    pub nonce: u64,
    pub value: String,
    pub sender: String,
    pub receiver: String,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: Option<String>,
    pub signature: String,
    pub version: u32,
}

/// Node's answer to a broadcast
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionSendResult {
    pub tx_hash: String,
    pub sender: String,
    pub sender_shard: u32,
    pub receiver: String,
    pub receiver_shard: u32,
    pub status: TransactionStatus,
}

/// Network-wide supply and staking figures
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Economics {
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub staked: f64,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub apr: f64,
    pub top_up_apr: f64,
    pub base_apr: f64,
}

/// Totals of the legacy delegation contract; amounts are decimal strings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DelegationLegacy {
    pub total_withdraw_only_stake: String,
    pub total_waiting_stake: String,
    pub total_active_stake: String,
    pub total_unstaked_stake: String,
    pub total_deferred_payment_stake: String,
    pub num_users: u64,
}
