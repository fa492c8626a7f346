//! Per-owner token slot tables with a reverse owner index.
//!
//! A transferred-out token leaves an empty slot behind instead of shifting
//! the owner's list, so slot positions stay stable. The next token recorded
//! for that owner fills the first empty slot.

use std::collections::HashMap;

use crate::common::Address;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::TokenId;

#[derive(Debug, Clone, Default)]
pub struct OwnershipRegistry {
    slots: HashMap<Address, Vec<Option<TokenId>>>,
    owners: HashMap<TokenId, Address>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly minted token under `owner`.
    pub fn record_mint(&mut self, owner: Address, token_id: TokenId) {
        self.assign_slot(owner, token_id);
        self.owners.insert(token_id, owner);
    }

    /// Moves `token_id` from `from` to `to`.
    ///
    /// # Errors
    /// [`LedgerError::UnknownToken`] if the token was never minted,
    /// [`LedgerError::NotOwner`] if `from` does not hold it.
    pub fn transfer(&mut self, token_id: TokenId, from: Address, to: Address) -> LedgerResult<()> {
        let owner = self.owner_of(token_id)?;
        if owner != from {
            return Err(LedgerError::NotOwner(token_id));
        }

        let slot = self
            .slots
            .get_mut(&from)
            .and_then(|slots| slots.iter_mut().find(|slot| **slot == Some(token_id)))
            .ok_or(LedgerError::NotOwner(token_id))?;
        *slot = None;

        self.assign_slot(to, token_id);
        self.owners.insert(token_id, to);
        Ok(())
    }

    pub fn owner_of(&self, token_id: TokenId) -> LedgerResult<Address> {
        self.owners
            .get(&token_id)
            .copied()
            .ok_or(LedgerError::UnknownToken(token_id))
    }

    /// Number of occupied slots held by `owner`.
    pub fn balance_of(&self, owner: &Address) -> usize {
        self.slots
            .get(owner)
            .map_or(0, |slots| slots.iter().filter(|slot| slot.is_some()).count())
    }

    /// The owner's slot table, empty slots included.
    pub fn slots_of(&self, owner: &Address) -> &[Option<TokenId>] {
        self.slots.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tokens held by `owner` in slot order.
    pub fn tokens_of(&self, owner: &Address) -> Vec<TokenId> {
        self.slots_of(owner).iter().flatten().copied().collect()
    }

    fn assign_slot(&mut self, owner: Address, token_id: TokenId) {
        let slots = self.slots.entry(owner).or_default();
        let free = slots.iter().position(Option::is_none);
        match free {
            Some(index) => slots[index] = Some(token_id),
            None => slots.push(Some(token_id)),
        }
    }
}
