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

use serde::Serialize;
use stackpool_kernel::{Address, CycleId, Ustx, cbor};
use std::collections::BTreeSet;

/// Reward cycle and position of the entry within that cycle. Indexes are assigned in order of
/// publication, starting at 0.
pub type Key = (CycleId, u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub operator: Address,
    pub total_ustx: Ustx,
    pub represented: BTreeSet<Address>,
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(3)?;
        e.encode_with(&self.operator, ctx)?;
        e.encode_with(self.total_ustx, ctx)?;
        e.encode_with(&self.represented, ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            operator: d.decode_with(ctx)?,
            total_ustx: d.decode_with(ctx)?,
            represented: d.decode_with(ctx)?,
        })
    }
}
