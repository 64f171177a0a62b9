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

pub mod aggregate;
pub mod weights;

use num::{BigUint, ToPrimitive, rational::Ratio};

// ------------------------------------------------------------------- SafeRatio

pub type SafeRatio = Ratio<BigUint>;

pub fn safe_ratio(numerator: u64, denominator: u64) -> SafeRatio {
    SafeRatio::new(BigUint::from(numerator), BigUint::from(denominator))
}

/// Truncate a ratio down to the closest integer. Values that don't fit in 64 bits saturate,
/// which can't happen for ratios that are at most 1 scaled by a `u64`.
pub fn floor_to_u64(r: SafeRatio) -> u64 {
    r.floor().to_integer().to_u64().unwrap_or(u64::MAX)
}
