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

pub type Key = Address;

/// A participant's authorization for a pool operator to stack `amount` on their behalf. There's
/// at most one row per participant; delegating again overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub amount: Ustx,
    pub operator: Address,
    pub created_at_cycle: CycleId,
    pub active: bool,
    /// First cycle at whose start the delegated funds unlock. Set when a cycle freezes with this
    /// delegation counted in its aggregate.
    pub locked_until_cycle: Option<CycleId>,
    /// Stake counted for this delegation when it was last locked in.
    pub locked_amount: Ustx,
}

impl Row {
    /// Whether the funds backing this delegation are still locked during `cycle`.
    pub fn is_locked_in(&self, cycle: CycleId) -> bool {
        self.locked_until_cycle
            .map(|until| cycle < until)
            .unwrap_or(false)
    }

    /// Stake this delegation counts for when `cycle` freezes. A delegation still locked during
    /// the previous cycle can't drop below its locked amount.
    pub fn stake_for(&self, cycle: CycleId) -> Ustx {
        let still_locked = cycle
            .checked_sub(1)
            .is_some_and(|previous| self.is_locked_in(previous));

        if still_locked {
            self.amount.max(self.locked_amount)
        } else {
            self.amount
        }
    }
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(6)?;
        e.encode_with(self.amount, ctx)?;
        e.encode_with(&self.operator, ctx)?;
        e.encode_with(self.created_at_cycle, ctx)?;
        e.encode_with(self.active, ctx)?;
        e.encode_with(self.locked_until_cycle, ctx)?;
        e.encode_with(self.locked_amount, ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            amount: d.decode_with(ctx)?,
            operator: d.decode_with(ctx)?,
            created_at_cycle: d.decode_with(ctx)?,
            active: d.decode_with(ctx)?,
            locked_until_cycle: d.decode_with(ctx)?,
            locked_amount: d.decode_with(ctx)?,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::Row;
    use proptest::{option, prelude::*};
    use stackpool_kernel::{Ustx, address::tests::any_address, prop_cbor_roundtrip};

    prop_cbor_roundtrip!(Row, any_row());

    prop_compose! {
        pub fn any_row()(
            amount in any::<Ustx>(),
            operator in any_address(),
            created_at_cycle in 0u64..1_000,
            active in any::<bool>(),
            locked_until_cycle in option::of(0u64..1_000),
            locked_amount in any::<Ustx>(),
        ) -> Row {
            Row {
                amount,
                operator,
                created_at_cycle,
                active,
                locked_until_cycle,
                locked_amount,
            }
        }
    }

    #[cfg(test)]
    fn locked(amount: Ustx, locked_amount: Ustx, locked_until_cycle: Option<u64>) -> Row {
        Row {
            amount,
            operator: stackpool_kernel::Address::new("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM")
                .unwrap(),
            created_at_cycle: 3,
            active: true,
            locked_until_cycle,
            locked_amount,
        }
    }

    #[test]
    fn stake_holds_while_locked() {
        let row = locked(10, 125, Some(5));
        assert_eq!(row.stake_for(5), 125);
        assert_eq!(row.stake_for(6), 10);
    }

    #[test]
    fn stake_grows_while_locked() {
        assert_eq!(locked(200, 125, Some(5)).stake_for(5), 200);
    }

    #[test]
    fn stake_of_unlocked_delegation() {
        assert_eq!(locked(10, 125, None).stake_for(0), 10);
        assert_eq!(locked(10, 125, None).stake_for(4), 10);
    }
}
