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
        columns::{participants, reserves},
    },
};
use stackpool_kernel::{Address, RawAmount, Role};
use tracing::info;

const EVENT_TARGET: &str = "stackpool::ledger::rules::reserve";

/// Credit `amount` to the provider's deposit.
pub fn deposit(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    provider: &Address,
    amount: RawAmount,
) -> Result<Applied, LedgerError> {
    let requested = validate_amount(amount)?;

    let mut account = db.reserve(provider)?.unwrap_or_default();
    account.deposited = account
        .deposited
        .checked_add(requested)
        .ok_or(LedgerError::InvalidAmount(amount))?;

    info!(
        target: EVENT_TARGET,
        %provider,
        amount = requested,
        deposited = account.deposited,
        "reserve.deposited"
    );

    let mut update = StoreUpdate::default();

    if let Some(row) = participants::Row::extend(
        db.participant(provider)?,
        Role::LiquidityProvider,
        ctx.height,
    ) {
        update.participants.insert(provider.clone(), row);
    }

    let deposited = account.deposited;
    update.reserves.insert(provider.clone(), account);

    Ok((
        update,
        Outcome::Deposited {
            provider: provider.clone(),
            deposited,
        },
    ))
}

/// Set `amount` of the provider's deposit aside to back future rewards.
pub fn reserve(
    db: &impl ReadStore,
    _ctx: &Context<'_>,
    provider: &Address,
    amount: RawAmount,
) -> Result<Applied, LedgerError> {
    let requested = validate_amount(amount)?;

    let mut account = db.reserve(provider)?.unwrap_or_default();

    let available = account.available();
    if requested > available {
        return Err(LedgerError::InsufficientDeposit {
            provider: provider.clone(),
            requested,
            available,
        });
    }

    account.reserved += requested;

    info!(
        target: EVENT_TARGET,
        %provider,
        amount = requested,
        reserved = account.reserved,
        "reserve.reserved"
    );

    let reserved = account.reserved;
    Ok((
        with_account(provider, account),
        Outcome::Reserved {
            provider: provider.clone(),
            reserved,
        },
    ))
}

/// Return `amount` of reserved funds to the provider's available deposit.
pub fn release(
    db: &impl ReadStore,
    _ctx: &Context<'_>,
    provider: &Address,
    amount: RawAmount,
) -> Result<Applied, LedgerError> {
    let requested = validate_amount(amount)?;

    let mut account = db.reserve(provider)?.unwrap_or_default();

    if requested > account.reserved {
        return Err(LedgerError::OverRelease {
            provider: provider.clone(),
            requested,
            reserved: account.reserved,
        });
    }

    account.reserved -= requested;

    info!(
        target: EVENT_TARGET,
        %provider,
        amount = requested,
        reserved = account.reserved,
        "reserve.released"
    );

    let reserved = account.reserved;
    Ok((
        with_account(provider, account),
        Outcome::Released {
            provider: provider.clone(),
            reserved,
        },
    ))
}

fn with_account(provider: &Address, account: reserves::Row) -> StoreUpdate {
    let mut update = StoreUpdate::default();
    update.reserves.insert(provider.clone(), account);
    update
}
