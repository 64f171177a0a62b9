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
use stackpool_kernel::{BurnHeight, CycleId, cbor};

pub type Key = CycleId;

/// Lifecycle of a reward cycle, once frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub frozen_at: BurnHeight,
    /// Set when an invariant violation was detected for the cycle. A halted cycle refuses any
    /// further mutation.
    pub halted: Option<String>,
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(self.frozen_at, ctx)?;
        e.encode_with(self.halted.as_deref(), ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            frozen_at: d.decode_with(ctx)?,
            halted: d.decode_with(ctx)?,
        })
    }
}
