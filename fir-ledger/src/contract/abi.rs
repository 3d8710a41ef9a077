//! Solidity ABI encoding for the registry's calls and events.
//!
//! Only the shapes the registry uses are supported: `uint` values that fit
//! in a `u64`, addresses and strings.

use sha3::{Digest, Keccak256};

use super::traits::{CaseData, CaseRegistered, ContractError};
use crate::types::Address;

pub const ADMIN: &str = "admin()";
pub const CASE_COUNT: &str = "caseCount()";
pub const GET_CASE: &str = "getCase(uint256)";
pub const REGISTER_CASE: &str = "registerCase(string,string)";
pub const UPDATE_CASE_STATUS: &str = "updateCaseStatus(uint256,uint8)";
pub const CASE_REGISTERED: &str = "CaseRegistered(uint256,address,string,uint256)";

const WORD: usize = 32;

fn keccak(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// First four bytes of the signature hash
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of an event log
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak(signature.as_bytes())
}

/// Call argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u64),
    Address(Address),
    String(String),
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode arguments as a head of words followed by the dynamic tail.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Address(address) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(address.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::String(text) => {
                let offset = tokens.len() * WORD + tail.len();
                head.extend_from_slice(&uint_word(offset as u64));
                tail.extend_from_slice(&uint_word(text.len() as u64));
                tail.extend_from_slice(text.as_bytes());
                let padding = (WORD - text.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector followed by the encoded arguments
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

/// Reads words out of return data or log data.
pub struct Decoder<'a> {
    data: &'a [u8],
}

fn invalid(msg: impl Into<String>) -> ContractError {
    ContractError::InvalidResponse(msg.into())
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], ContractError> {
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| invalid(format!("{len} bytes at offset {start} out of range")))
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8], ContractError> {
        self.slice(offset, WORD)
    }

    fn uint_at(&self, offset: usize) -> Result<u64, ContractError> {
        let word = self.word_at(offset)?;
        if word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(invalid(format!("uint at offset {offset} exceeds u64")));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&word[WORD - 8..]);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Static `uint` in head slot `index`
    pub fn uint(&self, index: usize) -> Result<u64, ContractError> {
        self.uint_at(index * WORD)
    }

    /// Address in head slot `index`
    pub fn address(&self, index: usize) -> Result<Address, ContractError> {
        let word = self.word_at(index * WORD)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(invalid(format!("slot {index} is not an address")));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address::from_bytes(bytes))
    }

    /// String whose offset sits in head slot `index`
    pub fn string(&self, index: usize) -> Result<String, ContractError> {
        let offset = usize::try_from(self.uint(index)?)
            .map_err(|_| invalid(format!("string offset in slot {index} too large")))?;
        let len = usize::try_from(self.uint_at(offset)?)
            .map_err(|_| invalid(format!("string length at {offset} too large")))?;
        let start = offset
            .checked_add(WORD)
            .ok_or_else(|| invalid("string offset overflow"))?;
        let bytes = self.slice(start, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| invalid(e.to_string()))
    }
}

/// Decode a `getCase` answer
pub fn decode_case(data: &[u8]) -> Result<CaseData, ContractError> {
    let d = Decoder::new(data);
    let status = d.uint(4)?;
    Ok(CaseData {
        id: d.uint(0)?,
        complainant: d.address(1)?,
        details: d.string(2)?,
        crime_type: d.string(3)?,
        status_code: u8::try_from(status)
            .map_err(|_| invalid(format!("status {status} exceeds uint8")))?,
        timestamp: d.uint(5)?,
    })
}

/// Decode the data section of a `CaseRegistered` log
pub fn decode_case_registered(data: &[u8]) -> Result<CaseRegistered, ContractError> {
    let d = Decoder::new(data);
    Ok(CaseRegistered {
        id: d.uint(0)?,
        complainant: d.address(1)?,
        crime_type: d.string(2)?,
        timestamp: d.uint(3)?,
    })
}

/// `0x`-prefixed hex for the wire
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parse `0x`-prefixed hex data
pub fn from_hex(s: &str) -> Result<Vec<u8>, ContractError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| invalid(format!("{s}: {e}")))
}

/// Parse a JSON-RPC quantity such as `0x1b4`
pub fn quantity(s: &str) -> Result<u64, ContractError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| invalid(format!("quantity {s}: {e}")))
}
