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

pub use cycle_arithmetic::{
    BurnHeight, CycleBounds, CycleClock, CycleClockError, CycleId, CyclePosition, Phase,
};
pub use minicbor as cbor;

mod macros;

pub mod address;
pub use address::{Address, AddressError};

pub mod role;
pub use role::Role;

pub mod protocol_parameters;
pub use protocol_parameters::{
    DEVNET_DEPLOYER, ProtocolParameters, ProtocolParametersFileError,
    load_protocol_parameters_from_file,
};

/// Amounts are expressed in micro-STX; 1 STX = 1_000_000 µSTX.
pub type Ustx = u64;

/// Amounts as they arrive from the outside world, before validation. Anything negative, or too
/// large to fit a `Ustx`, is rejected by the ledger.
pub type RawAmount = i128;

/// Per-sender sequence number ordering submitted events.
pub type Nonce = u64;

/// A participant's proportional share of a cycle, expressed in units of `WEIGHT_SCALE`.
pub type Weight = u64;

/// Fixed-point divisor of weights. A weight of 1 corresponds to one millionth of a cycle's
/// rewards, the smallest share the pool distributes.
pub const WEIGHT_SCALE: u64 = 1_000_000;

/// Decode a value from CBOR bytes, panicking when the bytes are malformed. Only meant for data
/// that was previously encoded by us.
#[allow(clippy::panic)]
pub fn unsafe_decode<T: for<'d> cbor::Decode<'d, ()>>(bytes: &[u8]) -> T {
    cbor::decode(bytes).unwrap_or_else(|e| {
        panic!(
            "unable to decode {} from CBOR ({} bytes): {e:?}",
            std::any::type_name::<T>(),
            bytes.len()
        )
    })
}
