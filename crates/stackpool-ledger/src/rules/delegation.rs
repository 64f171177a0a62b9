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

use crate::{
    error::{LedgerError, validate_amount},
    events::Outcome,
    rules::{Applied, Context},
    store::{
        ReadStore, StoreUpdate,
        columns::{allowances, delegations, memberships, participants},
    },
};
use stackpool_kernel::{Address, RawAmount, Role};
use tracing::{debug, info};

const EVENT_TARGET: &str = "stackpool::ledger::rules::delegation";

fn ensure_registered_pool(ctx: &Context<'_>, operator: &Address) -> Result<(), LedgerError> {
    if !ctx.parameters.is_pool_operator(operator) {
        return Err(LedgerError::UnknownPool(operator.clone()));
    }
    Ok(())
}

fn ensure_not_operator(ctx: &Context<'_>, participant: &Address) -> Result<(), LedgerError> {
    if ctx.parameters.is_pool_operator(participant) {
        return Err(LedgerError::RoleNotPermitted {
            participant: participant.clone(),
            role: Role::PoolOperator,
        });
    }
    Ok(())
}

/// Record that `participant` allows `operator` to stack on their behalf. Allowing the same
/// operator twice is a no-op.
pub fn allow_caller(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    participant: &Address,
    operator: &Address,
) -> Result<Applied, LedgerError> {
    ensure_registered_pool(ctx, operator)?;

    let mut update = StoreUpdate::default();

    let key = (participant.clone(), operator.clone());
    if db.allowance(&key)?.is_none() {
        update.allowances.insert(
            key,
            allowances::Row {
                granted_at: ctx.height,
            },
        );
        debug!(target: EVENT_TARGET, %participant, %operator, "allowance.granted");
    }

    Ok((
        update,
        Outcome::CallerAllowed {
            participant: participant.clone(),
            operator: operator.clone(),
        },
    ))
}

/// Make `participant` a member of the pool run by `operator`.
///
/// Joining the same pool again is a no-op. Moving to a different pool is only possible once the
/// participant no longer has an active delegation.
pub fn join_pool(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    participant: &Address,
    operator: &Address,
) -> Result<Applied, LedgerError> {
    ensure_not_operator(ctx, participant)?;
    ensure_registered_pool(ctx, operator)?;

    if db
        .allowance(&(participant.clone(), operator.clone()))?
        .is_none()
    {
        return Err(LedgerError::CallerNotAllowed {
            participant: participant.clone(),
            operator: operator.clone(),
        });
    }

    let outcome = |already_member| Outcome::Joined {
        participant: participant.clone(),
        operator: operator.clone(),
        already_member,
    };

    let mut update = StoreUpdate::default();

    match db.membership(participant)? {
        Some(membership) if &membership.operator == operator => {
            return Ok((update, outcome(true)));
        }
        Some(membership) => {
            if db
                .delegation(participant)?
                .is_some_and(|delegation| delegation.active)
            {
                return Err(LedgerError::AlreadyInDifferentPool {
                    participant: participant.clone(),
                    current: membership.operator,
                });
            }
            info!(
                target: EVENT_TARGET,
                %participant,
                from = %membership.operator,
                to = %operator,
                "membership.switched"
            );
        }
        None => {
            info!(target: EVENT_TARGET, %participant, %operator, "membership.joined");
        }
    }

    update.memberships.insert(
        participant.clone(),
        memberships::Row {
            operator: operator.clone(),
            joined_at: ctx.height,
        },
    );

    if let Some(row) =
        participants::Row::extend(db.participant(participant)?, Role::Delegator, ctx.height)
    {
        update.participants.insert(participant.clone(), row);
    }

    Ok((update, outcome(false)))
}

/// Delegate `amount` to the pool `participant` is a member of.
///
/// A new delegation replaces whatever delegation the participant had before: amounts are never
/// summed. The delegation counts towards the pool's aggregate from the next cycle freeze on,
/// provided it reaches the minimum delegation threshold. Lowering the amount doesn't release
/// locked funds: the pool keeps counting the locked amount for as long as the delegation stays
/// locked in.
pub fn delegate(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    participant: &Address,
    amount: RawAmount,
    operator: &Address,
) -> Result<Applied, LedgerError> {
    let amount = validate_amount(amount)?;

    match db.membership(participant)? {
        Some(membership) if &membership.operator == operator => (),
        Some(..) | None => {
            return Err(LedgerError::NotJoined {
                participant: participant.clone(),
                operator: operator.clone(),
            });
        }
    }

    let previous = db.delegation(participant)?;

    let replaced = previous
        .as_ref()
        .filter(|delegation| delegation.active)
        .map(|delegation| delegation.amount);

    let locked_amount = previous
        .as_ref()
        .filter(|delegation| &delegation.operator == operator)
        .map(|delegation| delegation.locked_amount)
        .unwrap_or_default();

    let row = delegations::Row {
        amount,
        operator: operator.clone(),
        created_at_cycle: ctx.cycle(),
        active: true,
        locked_until_cycle: previous.and_then(|delegation| delegation.locked_until_cycle),
        locked_amount,
    };

    match replaced {
        Some(previous_amount) => info!(
            target: EVENT_TARGET,
            %participant,
            %operator,
            previous_amount,
            amount,
            "delegation.replaced"
        ),
        None => info!(
            target: EVENT_TARGET,
            %participant,
            %operator,
            amount,
            "delegation.created"
        ),
    }

    if amount < ctx.parameters.minimum_delegation_ustx {
        debug!(
            target: EVENT_TARGET,
            %participant,
            amount,
            minimum = ctx.parameters.minimum_delegation_ustx,
            "delegation.below_threshold"
        );
    }

    let mut update = StoreUpdate::default();
    update.delegations.insert(participant.clone(), row);

    Ok((
        update,
        Outcome::Delegated {
            participant: participant.clone(),
            operator: operator.clone(),
            amount,
            replaced,
        },
    ))
}

/// Deactivate the participant's delegation. Funds already locked for a cycle remain so until
/// the delegation's `locked_until_cycle`.
pub fn revoke(
    db: &impl ReadStore,
    _ctx: &Context<'_>,
    participant: &Address,
) -> Result<Applied, LedgerError> {
    let mut delegation = db
        .delegation(participant)?
        .filter(|delegation| delegation.active)
        .ok_or_else(|| LedgerError::NotDelegated(participant.clone()))?;

    delegation.active = false;

    info!(
        target: EVENT_TARGET,
        %participant,
        operator = %delegation.operator,
        locked_until_cycle = ?delegation.locked_until_cycle,
        "delegation.revoked"
    );

    let locked_until_cycle = delegation.locked_until_cycle;

    let mut update = StoreUpdate::default();
    update.delegations.insert(participant.clone(), delegation);

    Ok((
        update,
        Outcome::Revoked {
            participant: participant.clone(),
            locked_until_cycle,
        },
    ))
}

/// The participant's active delegation, if any.
pub fn check_delegation(
    db: &impl ReadStore,
    participant: &Address,
) -> Result<Option<delegations::Row>, LedgerError> {
    Ok(db
        .delegation(participant)?
        .filter(|delegation| delegation.active))
}
