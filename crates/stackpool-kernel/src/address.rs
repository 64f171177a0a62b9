// Copyright 2024 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::cbor;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Maximum length of a principal: a 41-character standard address, a dot, and a 40-character
/// contract name leave plenty of headroom at 128.
pub const MAX_ADDRESS_LENGTH: usize = 128;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("address is {0} characters long, above the {max} limit", max = MAX_ADDRESS_LENGTH)]
    TooLong(usize),
    #[error("invalid character {0:?} in address")]
    InvalidCharacter(char),
}

/// Identity of a participant: a standard principal (e.g. `ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM`)
/// or a contract principal (`<address>.<contract-name>`).
///
/// Addresses are opaque to the ledger; they're only compared, ordered and displayed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Result<Self, AddressError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(AddressError::Empty);
        }

        if raw.len() > MAX_ADDRESS_LENGTH {
            return Err(AddressError::TooLong(raw.len()));
        }

        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(AddressError::InvalidCharacter(c));
        }

        Ok(Address(raw))
    }

    /// Construct an address from a literal known to be well-formed, skipping validation.
    pub(crate) fn from_static(raw: &'static str) -> Self {
        Address(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Address::new(s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl<C> cbor::Encode<C> for Address {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.str(&self.0)?;
        Ok(())
    }
}

impl<'b, C> cbor::Decode<'b, C> for Address {
    fn decode(d: &mut cbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        let raw = d.str()?;
        Address::new(raw).map_err(|e| cbor::decode::Error::message(e.to_string()))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::Address;
    use proptest::prelude::*;

    pub fn any_address() -> impl Strategy<Value = Address> {
        "S[TP][0-9A-Z]{38,40}".prop_map(Address)
    }

    #[cfg(test)]
    mod internal {
        use super::super::{Address, AddressError};
        use test_case::test_case;

        #[test_case("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM" => Ok(()); "standard principal")]
        #[test_case("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.pox-pool-self-service" => Ok(()); "contract principal")]
        #[test_case("" => Err(AddressError::Empty); "empty")]
        #[test_case("ST1 PQ" => Err(AddressError::InvalidCharacter(' ')); "whitespace")]
        fn parse(raw: &str) -> Result<(), AddressError> {
            raw.parse::<Address>().map(|_| ())
        }

        #[test]
        fn too_long() {
            let raw = "S".repeat(129);
            assert_eq!(Address::new(raw), Err(AddressError::TooLong(129)));
        }

        #[test]
        fn serde_as_plain_string() {
            let address = Address::new("ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG").unwrap();
            let json = serde_json::to_string(&address).unwrap();
            assert_eq!(json, "\"ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG\"");
            assert!(serde_json::from_str::<Address>("\"not an address\"").is_err());
        }
    }
}
