//! Enforced executor options and their LayerZero type-3 encoding.

use crate::constants::{EXECUTOR_WORKER_ID, OPTIONS_TYPE_3};
use alloy::primitives::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use strum::{Display, EnumString};

/// LayerZero message type, as understood by the OApp.
pub type MsgType = u16;

/// Kind of an executor option.
///
/// Discriminants match the on-chain option type ids.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ExecutorOptionType {
    /// Gas (and optional native value) for `lzReceive` on the destination.
    #[serde(alias = "LZ_RECEIVE")]
    LzReceive = 1,
    /// Gas (and optional native value) for `lzCompose` of composed message 0.
    #[serde(alias = "COMPOSE")]
    Compose = 3,
    /// Requests in-order execution of messages.
    #[serde(alias = "ORDERED")]
    OrderedExecution = 4,
}

impl ExecutorOptionType {
    /// Whether the option guarantees execution and therefore needs a non-zero gas limit.
    pub const fn requires_gas(&self) -> bool {
        matches!(self, Self::LzReceive | Self::Compose)
    }

    /// The on-chain option type id.
    pub const fn id(&self) -> u8 {
        *self as u8
    }

    /// Resolves an on-chain option type id.
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::LzReceive),
            3 => Some(Self::Compose),
            4 => Some(Self::OrderedExecution),
            _ => None,
        }
    }

    fn encode_payload(&self, value: OptionValue) -> Vec<u8> {
        let mut payload = Vec::with_capacity(34);
        match self {
            Self::LzReceive => {
                payload.extend_from_slice(&value.gas.to_be_bytes());
                if value.native_value > 0 {
                    payload.extend_from_slice(&value.native_value.to_be_bytes());
                }
            }
            Self::Compose => {
                payload.extend_from_slice(&0u16.to_be_bytes());
                payload.extend_from_slice(&value.gas.to_be_bytes());
                if value.native_value > 0 {
                    payload.extend_from_slice(&value.native_value.to_be_bytes());
                }
            }
            Self::OrderedExecution => {}
        }
        payload
    }

    fn decode_payload(&self, payload: &[u8]) -> Result<OptionValue, OptionsError> {
        let invalid = || OptionsError::InvalidPayloadLength { kind: *self, len: payload.len() };
        match self {
            Self::LzReceive => match payload.len() {
                16 => Ok(OptionValue::new(read_u128(payload), 0)),
                32 => Ok(OptionValue::new(read_u128(&payload[..16]), read_u128(&payload[16..]))),
                _ => Err(invalid()),
            },
            Self::Compose => {
                if payload.len() != 18 && payload.len() != 34 {
                    return Err(invalid());
                }
                let index = u16::from_be_bytes([payload[0], payload[1]]);
                if index != 0 {
                    return Err(OptionsError::UnsupportedComposeIndex(index));
                }
                let gas = read_u128(&payload[2..18]);
                let native_value = if payload.len() == 34 { read_u128(&payload[18..]) } else { 0 };
                Ok(OptionValue::new(gas, native_value))
            }
            Self::OrderedExecution => {
                if payload.is_empty() {
                    Ok(OptionValue::default())
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

/// Key of an enforced option within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionKey {
    /// Message type the option applies to.
    pub msg_type: MsgType,
    /// Kind of the option.
    pub option_type: ExecutorOptionType,
}

impl OptionKey {
    /// Creates a new [`OptionKey`].
    pub const fn new(msg_type: MsgType, option_type: ExecutorOptionType) -> Self {
        Self { msg_type, option_type }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(msg_type={})", self.option_type, self.msg_type)
    }
}

/// Execution parameters of an enforced option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionValue {
    /// Gas limit.
    pub gas: u128,
    /// Native value forwarded with the call, in wei.
    pub native_value: u128,
}

impl OptionValue {
    /// Creates a new [`OptionValue`].
    pub const fn new(gas: u128, native_value: u128) -> Self {
        Self { gas, native_value }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gas={} value={}", self.gas, self.native_value)
    }
}

/// A mandatory execution parameter for one message type on one pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnforcedOption {
    /// Message type the option applies to.
    pub msg_type: MsgType,
    /// Kind of the option.
    pub option_type: ExecutorOptionType,
    /// Gas limit.
    #[serde(default)]
    pub gas: u128,
    /// Native value forwarded with the call, in wei.
    #[serde(default, rename = "value")]
    pub native_value: u128,
}

impl EnforcedOption {
    /// Creates a new `lzReceive` option.
    pub const fn lz_receive(msg_type: MsgType, gas: u128, native_value: u128) -> Self {
        Self { msg_type, option_type: ExecutorOptionType::LzReceive, gas, native_value }
    }

    /// Creates an [`EnforcedOption`] from its key and value.
    pub const fn from_parts(key: OptionKey, value: OptionValue) -> Self {
        Self {
            msg_type: key.msg_type,
            option_type: key.option_type,
            gas: value.gas,
            native_value: value.native_value,
        }
    }

    /// The key of the option.
    pub const fn key(&self) -> OptionKey {
        OptionKey::new(self.msg_type, self.option_type)
    }

    /// The execution parameters of the option.
    pub const fn value(&self) -> OptionValue {
        OptionValue::new(self.gas, self.native_value)
    }
}

/// Enforced options of one pathway, keyed by message and option type.
pub type OptionTable = BTreeMap<OptionKey, OptionValue>;

/// Errors returned when decoding an options blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    /// Options are not in the type-3 format.
    #[error("unsupported options format {0}")]
    UnsupportedFormat(u16),
    /// The blob ended in the middle of an option.
    #[error("options blob is truncated")]
    Truncated,
    /// An option addresses a worker other than the executor.
    #[error("unsupported worker id {0}")]
    UnsupportedWorker(u8),
    /// The option type id is unknown.
    #[error("unsupported option type {0}")]
    UnsupportedOptionType(u8),
    /// A compose option targets a compose index other than 0.
    #[error("unsupported compose index {0}")]
    UnsupportedComposeIndex(u16),
    /// Repeated options of one kind add up to more than fits in a `uint128`.
    #[error("{0} options overflow when summed")]
    Overflow(ExecutorOptionType),
    /// The payload length does not match the option type.
    #[error("invalid payload length {len} for {kind}")]
    InvalidPayloadLength {
        /// Kind of the option.
        kind: ExecutorOptionType,
        /// Length of the payload.
        len: usize,
    },
}

/// Encodes executor options for a single message type in the type-3 format.
///
/// The format is `0x0003` followed by, for each option:
/// - worker id (1 byte): always the executor
/// - option length (2 bytes): length of option type + payload
/// - option type (1 byte)
/// - payload (variable)
///
/// An empty iterator encodes to empty bytes, which means no options are enforced.
pub fn encode_options(
    options: impl IntoIterator<Item = (ExecutorOptionType, OptionValue)>,
) -> Bytes {
    let mut options = options.into_iter().peekable();
    if options.peek().is_none() {
        return Bytes::new();
    }

    let mut encoded = OPTIONS_TYPE_3.to_be_bytes().to_vec();
    for (kind, value) in options {
        let payload = kind.encode_payload(value);
        encoded.push(EXECUTOR_WORKER_ID);
        encoded.extend_from_slice(&(payload.len() as u16 + 1).to_be_bytes());
        encoded.push(kind.id());
        encoded.extend_from_slice(&payload);
    }
    encoded.into()
}

/// Decodes a type-3 options blob into executor options.
///
/// Repeated options of the same kind are summed, which is how the executor interprets them.
pub fn decode_options(
    encoded: &[u8],
) -> Result<BTreeMap<ExecutorOptionType, OptionValue>, OptionsError> {
    let mut options = BTreeMap::<ExecutorOptionType, OptionValue>::new();
    if encoded.is_empty() {
        return Ok(options);
    }
    if encoded.len() < 2 {
        return Err(OptionsError::Truncated);
    }

    let format = u16::from_be_bytes([encoded[0], encoded[1]]);
    if format != OPTIONS_TYPE_3 {
        return Err(OptionsError::UnsupportedFormat(format));
    }

    let mut cursor = 2;
    while cursor < encoded.len() {
        if encoded.len() - cursor < 4 {
            return Err(OptionsError::Truncated);
        }
        let worker = encoded[cursor];
        let len = u16::from_be_bytes([encoded[cursor + 1], encoded[cursor + 2]]) as usize;
        let start = cursor + 3;
        let end = start + len;
        if len == 0 || end > encoded.len() {
            return Err(OptionsError::Truncated);
        }
        if worker != EXECUTOR_WORKER_ID {
            return Err(OptionsError::UnsupportedWorker(worker));
        }

        let kind = ExecutorOptionType::from_id(encoded[start])
            .ok_or(OptionsError::UnsupportedOptionType(encoded[start]))?;
        let value = kind.decode_payload(&encoded[start + 1..end])?;

        let entry = options.entry(kind).or_default();
        *entry = entry
            .gas
            .checked_add(value.gas)
            .zip(entry.native_value.checked_add(value.native_value))
            .map(|(gas, native_value)| OptionValue::new(gas, native_value))
            .ok_or(OptionsError::Overflow(kind))?;

        cursor = end;
    }

    Ok(options)
}

/// Reads a big-endian `u128` from a slice of exactly 16 bytes.
fn read_u128(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    u128::from_be_bytes(buf)
}
