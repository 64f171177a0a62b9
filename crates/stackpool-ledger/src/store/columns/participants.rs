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
use stackpool_kernel::{Address, BurnHeight, Role, cbor};
use std::collections::BTreeSet;

pub type Key = Address;

/// Roles a participant has acted under so far. Roles are only ever added; participants are
/// never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub roles: BTreeSet<Role>,
    pub first_seen_at: BurnHeight,
}

impl Row {
    pub fn new(role: Role, first_seen_at: BurnHeight) -> Self {
        Row {
            roles: BTreeSet::from([role]),
            first_seen_at,
        }
    }

    /// Extend an existing row (if any) with the given role. Returns `None` when the row already
    /// carries the role, in which case there's nothing to write.
    pub fn extend(existing: Option<Row>, role: Role, height: BurnHeight) -> Option<Row> {
        match existing {
            None => Some(Row::new(role, height)),
            Some(row) if row.roles.contains(&role) => None,
            Some(mut row) => {
                row.roles.insert(role);
                Some(row)
            }
        }
    }
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(&self.roles, ctx)?;
        e.encode_with(self.first_seen_at, ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            roles: d.decode_with(ctx)?,
            first_seen_at: d.decode_with(ctx)?,
        })
    }
}
