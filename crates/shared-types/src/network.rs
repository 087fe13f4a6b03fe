//! # Network Parameters
//!
//! Explicit selection of ledger parameters, passed at construction time.
//!
//! | Field | Mainnet | Testnet | Regtest |
//! |-------|---------|---------|---------|
//! | P2PKH version | 0x55 | 0x6f | 0x6f |
//! | P2SH version | 0x7a | 0xc4 | 0xc4 |
//! | Reorg limit | 200 | 200 | 200 |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::{hex_str_to_hash, BlockHash, HashX, Height};
use crate::errors::AddressError;
use crate::hashing::hashx_from_payment_script;

/// Serialized size of a block header.
pub const HEADER_SIZE: usize = 112;

/// Claims confirmed before this height expire sooner.
pub const EXTENDED_EXPIRATION_FORK: Height = 137_181;

/// Expiration delay before [`EXTENDED_EXPIRATION_FORK`].
pub const ORIGINAL_EXPIRATION_TIME: Height = 262_974;

/// Expiration delay from [`EXTENDED_EXPIRATION_FORK`] on.
pub const EXTENDED_EXPIRATION_TIME: Height = 2_102_400;

/// Which ledger the hub indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams {
                network: self,
                p2pkh_verbyte: 0x55,
                p2sh_verbyte: 0x7a,
                genesis_hash: "9c89283ba0f3227f6c03b70216b9f665f0118d5e0fa729cedf4fb34d6a34f463",
                reorg_limit: 200,
                default_rpc_port: 9245,
            },
            Network::Testnet => NetworkParams {
                network: self,
                p2pkh_verbyte: 0x6f,
                p2sh_verbyte: 0xc4,
                genesis_hash: "9c89283ba0f3227f6c03b70216b9f665f0118d5e0fa729cedf4fb34d6a34f463",
                reorg_limit: 200,
                default_rpc_port: 19245,
            },
            Network::Regtest => NetworkParams {
                network: self,
                p2pkh_verbyte: 0x6f,
                p2sh_verbyte: 0xc4,
                genesis_hash: "6e3fcf1299d4ec5d79c3a4c91d624a4acf9e2e173d95a1a0504f677669687556",
                reorg_limit: 200,
                default_rpc_port: 29245,
            },
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// The payment destination encoded by an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl AddressKind {
    /// The canonical output script paying to this destination.
    pub fn payment_script(&self) -> Vec<u8> {
        match self {
            AddressKind::PubkeyHash(hash) => {
                let mut script = Vec::with_capacity(25);
                script.extend_from_slice(&[0x76, 0xa9, 20]);
                script.extend_from_slice(hash);
                script.extend_from_slice(&[0x88, 0xac]);
                script
            }
            AddressKind::ScriptHash(hash) => {
                let mut script = Vec::with_capacity(23);
                script.extend_from_slice(&[0xa9, 20]);
                script.extend_from_slice(hash);
                script.push(0x87);
                script
            }
        }
    }
}

/// Ledger parameters for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub p2pkh_verbyte: u8,
    pub p2sh_verbyte: u8,
    /// Display-order hex of the genesis block hash.
    pub genesis_hash: &'static str,
    /// Deepest rewind performed automatically.
    pub reorg_limit: u32,
    pub default_rpc_port: u16,
}

impl NetworkParams {
    pub fn genesis_block_hash(&self) -> BlockHash {
        // The literals above are well-formed; fall back to zero rather than panic.
        hex_str_to_hash(self.genesis_hash).unwrap_or_default()
    }

    /// Decode a base58check address for this network.
    pub fn decode_address(&self, address: &str) -> Result<AddressKind, AddressError> {
        let raw = bs58::decode(address)
            .with_check(None)
            .into_vec()
            .map_err(|_| AddressError::Invalid {
                address: address.to_string(),
            })?;
        if raw.len() != 21 {
            return Err(AddressError::Invalid {
                address: address.to_string(),
            });
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&raw[1..]);
        match raw[0] {
            v if v == self.p2pkh_verbyte => Ok(AddressKind::PubkeyHash(hash)),
            v if v == self.p2sh_verbyte => Ok(AddressKind::ScriptHash(hash)),
            verbyte => Err(AddressError::UnknownVersion { verbyte }),
        }
    }

    /// Encode a destination as a base58check address.
    pub fn encode_address(&self, kind: &AddressKind) -> String {
        let (verbyte, hash) = match kind {
            AddressKind::PubkeyHash(hash) => (self.p2pkh_verbyte, hash),
            AddressKind::ScriptHash(hash) => (self.p2sh_verbyte, hash),
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(verbyte);
        payload.extend_from_slice(hash);
        bs58::encode(payload).with_check().into_string()
    }

    pub fn address_to_hashx(&self, address: &str) -> Result<HashX, AddressError> {
        let kind = self.decode_address(address)?;
        Ok(hashx_from_payment_script(&kind.payment_script()))
    }
}

/// Height at which a claim confirmed at `height` expires.
pub fn expiration_height(height: Height) -> Height {
    if height < EXTENDED_EXPIRATION_FORK {
        height + ORIGINAL_EXPIRATION_TIME
    } else {
        height + EXTENDED_EXPIRATION_TIME
    }
}
