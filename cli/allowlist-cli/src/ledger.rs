//! The mint ledger: sale phase, allowlist roots, pricing, supply and token
//! ownership behind one owned struct.
//!
//! Every mutator takes `&mut self` and either applies completely or returns
//! an error with nothing changed, so a caller that serializes access (one
//! `Ledger`, one writer) gets a totally ordered history of operations.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::allowlist::{leaf_for, Cohort, LeafEncoding};
use crate::common::{hex_encode, serde_hex, Address, Digest};
use crate::error::{LedgerError, LedgerResult};
use crate::merkle::verify_proof;
use crate::ownership::OwnershipRegistry;
use crate::roots::RootRegistry;

pub type TokenId = u64;

/// Payment amount in the smallest currency unit.
pub type Amount = u128;

/// Sale phase. The operator may set any phase at any time; there is no
/// enforced ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintState {
    #[default]
    Closed,
    /// Minting requires a proof against a registered allowlist root.
    AllowlistPhase,
    /// Anyone may mint.
    PublicPhase,
}

fn default_max_supply() -> u64 {
    10_000
}

/// Deployment parameters for a [`Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// The single address allowed to run admin operations.
    #[serde(with = "serde_hex")]
    pub operator: Address,
    #[serde(default)]
    pub price: Amount,
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,
    /// Most tokens a wallet may hold when minting. `None` means unlimited.
    #[serde(default)]
    pub per_wallet_limit: Option<u32>,
    #[serde(default)]
    pub leaf_encoding: LeafEncoding,
    /// Metadata URI prefix.
    #[serde(default)]
    pub endpoint: String,
}

impl LedgerConfig {
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            price: 0,
            max_supply: default_max_supply(),
            per_wallet_limit: None,
            leaf_encoding: LeafEncoding::default(),
            endpoint: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    state: MintState,
    roots: RootRegistry,
    ownership: OwnershipRegistry,
    total_minted: u64,
    proceeds: Amount,
    staking_addresses: HashSet<Address>,
    proxies: HashSet<Address>,
    derived_counters: HashMap<TokenId, u64>,
}

impl Ledger {
    /// A closed sale with no roots registered.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            state: MintState::Closed,
            roots: RootRegistry::new(),
            ownership: OwnershipRegistry::new(),
            total_minted: 0,
            proceeds: 0,
            staking_addresses: HashSet::new(),
            proxies: HashSet::new(),
            derived_counters: HashMap::new(),
        }
    }

    /// Mints the next token to `caller`.
    ///
    /// Checks run in order: phase, allowlist proof (allowlist phase only),
    /// supply, per-wallet limit, payment. The first failing check is
    /// reported and nothing is recorded.
    pub fn mint(
        &mut self,
        caller: Address,
        proof: &[Digest],
        payment: Amount,
    ) -> LedgerResult<TokenId> {
        let cohort = match self.state {
            MintState::Closed => return Err(LedgerError::NotOpen),
            MintState::AllowlistPhase => Some(
                self.admitting_cohort(&caller, proof)
                    .ok_or(LedgerError::NotAllowlisted)?,
            ),
            MintState::PublicPhase => None,
        };

        if self.total_minted >= self.config.max_supply {
            return Err(LedgerError::SoldOut {
                max_supply: self.config.max_supply,
            });
        }
        if let Some(limit) = self.config.per_wallet_limit {
            if self.ownership.balance_of(&caller) >= limit as usize {
                return Err(LedgerError::WalletLimitReached { limit });
            }
        }
        if payment < self.config.price {
            return Err(LedgerError::Underpaid {
                required: self.config.price,
                offered: payment,
            });
        }

        let token_id = self.total_minted;
        self.ownership.record_mint(caller, token_id);
        self.total_minted += 1;
        self.proceeds = self.proceeds.saturating_add(payment);

        info!(
            token_id,
            caller = %hex_encode(caller),
            cohort = cohort.as_ref().map(Cohort::as_str),
            "minted token"
        );
        Ok(token_id)
    }

    /// The first registered cohort whose root accepts `proof` for `caller`.
    ///
    /// The caller's leaf is re-derived per cohort, so salted deployments
    /// bind each proof to the cohort it was built for.
    pub fn admitting_cohort(&self, caller: &Address, proof: &[Digest]) -> Option<Cohort> {
        self.roots
            .iter()
            .find(|&(cohort, root)| {
                let leaf = leaf_for(caller, Some(cohort), self.config.leaf_encoding);
                verify_proof(proof, &leaf, root)
            })
            .map(|(cohort, _)| cohort.clone())
    }

    /// Moves a token. `caller` must be the holder or an approved staking
    /// address.
    pub fn transfer(
        &mut self,
        caller: Address,
        token_id: TokenId,
        from: Address,
        to: Address,
    ) -> LedgerResult<()> {
        if caller != from && !self.staking_addresses.contains(&caller) {
            warn!(caller = %hex_encode(caller), token_id, "transfer by unapproved caller");
            return Err(LedgerError::Unauthorized);
        }
        self.ownership.transfer(token_id, from, to)?;
        debug!(token_id, from = %hex_encode(from), to = %hex_encode(to), "transferred token");
        Ok(())
    }

    /// Bumps the derived counter of `token_id`. Only approved proxies may
    /// call this; approval is checked on every call.
    pub fn increment_derived_counter(
        &mut self,
        caller: Address,
        token_id: TokenId,
    ) -> LedgerResult<u64> {
        if !self.proxies.contains(&caller) {
            warn!(caller = %hex_encode(caller), token_id, "counter bump by unapproved proxy");
            return Err(LedgerError::Unauthorized);
        }
        self.ownership.owner_of(token_id)?;
        let counter = self.derived_counters.entry(token_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    // Admin operations

    pub fn set_mint_state(&mut self, caller: Address, state: MintState) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        info!(from = ?self.state, to = ?state, "mint state changed");
        self.state = state;
        Ok(())
    }

    /// Replaces all allowlist roots at once.
    pub fn set_roots(&mut self, caller: Address, roots: Vec<(Cohort, Digest)>) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.roots.set_roots(roots)?;
        for (cohort, root) in self.roots.iter() {
            info!(cohort = %cohort, root = %hex_encode(root), "allowlist root registered");
        }
        Ok(())
    }

    pub fn set_price(&mut self, caller: Address, price: Amount) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.config.price = price;
        Ok(())
    }

    /// Lowering the cap below the minted count is accepted; the sale is then
    /// sold out.
    pub fn set_max_supply(&mut self, caller: Address, max_supply: u64) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.config.max_supply = max_supply;
        Ok(())
    }

    pub fn set_per_wallet_limit(
        &mut self,
        caller: Address,
        limit: Option<u32>,
    ) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.config.per_wallet_limit = limit;
        Ok(())
    }

    pub fn set_endpoint(
        &mut self,
        caller: Address,
        endpoint: impl Into<String>,
    ) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.config.endpoint = endpoint.into();
        Ok(())
    }

    pub fn approve_staking_address(
        &mut self,
        caller: Address,
        staking: Address,
    ) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.staking_addresses.insert(staking);
        Ok(())
    }

    pub fn approve_proxy(&mut self, caller: Address, proxy: Address) -> LedgerResult<()> {
        self.ensure_operator(&caller)?;
        self.proxies.insert(proxy);
        Ok(())
    }

    fn ensure_operator(&self, caller: &Address) -> LedgerResult<()> {
        if caller != &self.config.operator {
            warn!(caller = %hex_encode(caller), "admin operation by non-operator");
            return Err(LedgerError::Unauthorized);
        }
        Ok(())
    }

    // Read views

    pub fn owner_of(&self, token_id: TokenId) -> LedgerResult<Address> {
        self.ownership.owner_of(token_id)
    }

    pub fn balance_of(&self, owner: &Address) -> usize {
        self.ownership.balance_of(owner)
    }

    pub fn tokens_of(&self, owner: &Address) -> Vec<TokenId> {
        self.ownership.tokens_of(owner)
    }

    pub fn mint_state(&self) -> MintState {
        self.state
    }

    pub fn max_supply(&self) -> u64 {
        self.config.max_supply
    }

    pub fn price(&self) -> Amount {
        self.config.price
    }

    pub fn total_minted(&self) -> u64 {
        self.total_minted
    }

    pub fn proceeds(&self) -> Amount {
        self.proceeds
    }

    pub fn current_root(&self, cohort: &Cohort) -> Option<Digest> {
        self.roots.current_root(cohort)
    }

    pub fn derived_counter(&self, token_id: TokenId) -> u64 {
        self.derived_counters.get(&token_id).copied().unwrap_or(0)
    }

    pub fn is_staking_address(&self, address: &Address) -> bool {
        self.staking_addresses.contains(address)
    }

    pub fn is_proxy(&self, address: &Address) -> bool {
        self.proxies.contains(address)
    }

    /// Metadata URI: the endpoint prefix followed by the decimal token id.
    pub fn token_uri(&self, token_id: TokenId) -> LedgerResult<String> {
        self.ownership.owner_of(token_id)?;
        Ok(format!("{}{}", self.config.endpoint, token_id))
    }
}
