// crates/nacre-ledger/src/ledger.rs
//
// The staking ledger facade: one state machine owning the token books,
// the validator registry, the bonding/unbonding queues, the
// accountability machine, and the committee, driven block by block.
//
// External calls validate eagerly and either reject atomically or
// enqueue/commit. `finalize` advances the chain one block: it promotes
// expired accusations, distributes the block's reward pool over the
// committee fixed at the last boundary, and at the epoch boundary runs
// the end-of-epoch pipeline (slashing sweep, queue application, matured
// releases, deferred commission rates, committee recomputation).

use serde::{Deserialize, Serialize};
use tracing::info;

use nacre_accountability::Accountability;
use nacre_consensus::{compute_committee, select_proposer, Committee, EpochManager};
use nacre_core::{
    AccountabilityEvent, Address, Amount, BondingRequest, EventKind, LedgerEvent, NacreError,
    ProtocolConfig, RegistrationProof, UnbondingRequest, Validator, ValidatorState, RATE_PRECISION,
};
use nacre_economics::{split_member_reward, split_pool, AccountLedger, Treasury};
use nacre_staking::{BondingQueue, Registry, UnbondingQueue};

/// A validator seeded at genesis, already bonded and active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub treasury: Address,
    pub node_key: [u8; 32],
    pub oracle_key: [u8; 32],
    /// Initial self-bonded stake, in atto.
    pub bonded_stake: Amount,
    /// Commission rate against RATE_PRECISION.
    pub commission_rate: u64,
}

/// The complete staking ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingLedger {
    config: ProtocolConfig,
    /// Height of the last finalized block.
    block: u64,
    epochs: EpochManager,
    /// Stake token (NTN) account book.
    stake_token: AccountLedger,
    /// Fee-currency account book rewards are paid into.
    fee_token: AccountLedger,
    registry: Registry,
    bonding: BondingQueue,
    unbonding: UnbondingQueue,
    accountability: Accountability,
    /// Committee fixed at the last epoch boundary, voting power cached
    /// at selection time.
    committee: Committee,
    treasury: Treasury,
    /// Reward value lost to flooring in the per-member split. Retained
    /// forever so payouts plus dust always equal the injected pools.
    reward_dust: Amount,
    events: Vec<LedgerEvent>,
}

impl StakingLedger {
    /// Build the ledger from a genesis document: protocol parameters,
    /// the initial validator set (each self-bonded and active), and the
    /// initial stake-token balances.
    ///
    /// # Errors
    /// `NacreError::Validation` on a duplicate genesis validator or an
    /// out-of-range commission rate.
    pub fn genesis(
        config: ProtocolConfig,
        validators: Vec<GenesisValidator>,
        balances: Vec<(Address, Amount)>,
    ) -> Result<Self, NacreError> {
        let mut ledger = Self {
            epochs: EpochManager::new(config.epoch_period),
            accountability: Accountability::new(config.accountability.clone()),
            config,
            block: 0,
            stake_token: AccountLedger::new(),
            fee_token: AccountLedger::new(),
            registry: Registry::new(),
            bonding: BondingQueue::new(),
            unbonding: UnbondingQueue::new(),
            committee: Committee::default(),
            treasury: Treasury::new(),
            reward_dust: 0,
            events: Vec::new(),
        };

        for (account, amount) in balances {
            ledger.stake_token.mint(account, amount);
        }

        for genesis in validators {
            if genesis.commission_rate > RATE_PRECISION {
                return Err(NacreError::Validation(format!(
                    "genesis commission rate {} exceeds precision {}",
                    genesis.commission_rate, RATE_PRECISION
                )));
            }
            let address = Address::from_public_key(&genesis.node_key);
            if ledger.registry.contains(&address) {
                return Err(NacreError::Validation(format!(
                    "duplicate genesis validator {}",
                    address
                )));
            }
            // Genesis stake enters the supply directly bonded, never
            // having circulated.
            ledger.stake_token.mint(genesis.treasury, genesis.bonded_stake);
            ledger.stake_token.debit(genesis.treasury, genesis.bonded_stake)?;
            ledger.registry.insert_genesis(Validator {
                address,
                treasury: genesis.treasury,
                oracle: Address::from_public_key(&genesis.oracle_key),
                node_key: genesis.node_key,
                oracle_key: genesis.oracle_key,
                bonded_stake: genesis.bonded_stake,
                self_bonded_stake: genesis.bonded_stake,
                unbonding_stake: 0,
                unbonding_shares: 0,
                self_unbonding_stake: 0,
                self_unbonding_shares: 0,
                self_unbonding_stake_locked: 0,
                liquid_supply: 0,
                commission_rate: genesis.commission_rate,
                total_slashed: 0,
                provable_fault_count: 0,
                jail_release_block: 0,
                registration_block: 0,
                state: ValidatorState::Active,
            });
        }

        ledger.committee = compute_committee(
            ledger.registry.validators(),
            ledger.config.max_committee_size,
        );
        info!(
            validators = ledger.committee.len(),
            total_power = %ledger.committee.total_power,
            "genesis committee seated"
        );
        Ok(ledger)
    }

    // -----------------------------------------------------------------
    // Block processing
    // -----------------------------------------------------------------

    /// Finalize the next block: promote expired accusations, distribute
    /// `reward_pool` (fee currency accrued for this block) over the
    /// committee, and run the end-of-epoch pipeline when the block
    /// closes the epoch. Returns whether the epoch rolled over.
    pub fn finalize(&mut self, reward_pool: Amount) -> Result<bool, NacreError> {
        self.block += 1;
        let block = self.block;

        for id in self.accountability.promote_expired_accusations(block) {
            // Promoted ids index the machine's event arena.
            if let Some(event) = self.accountability.get_event(id) {
                let offender = event.offender;
                let severity = event.severity();
                self.events.push(LedgerEvent::NewFaultProof {
                    id,
                    offender,
                    severity,
                });
                self.jail_for_fault(offender)?;
            }
        }

        self.distribute_rewards(reward_pool)?;

        if self.epochs.is_epoch_end(block) {
            self.end_epoch()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Run the end-of-epoch pipeline. Invoked by `finalize` at the
    /// boundary block; exposed for engines that drive epochs directly.
    pub fn end_epoch(&mut self) -> Result<(), NacreError> {
        let block = self.block;
        let epoch = self.epochs.current_epoch();

        let outcomes = self.accountability.slashing_sweep(
            &mut self.registry,
            &mut self.treasury,
            block,
            self.config.epoch_period,
        )?;
        for outcome in outcomes {
            self.events.push(LedgerEvent::SlashingEvent {
                validator: outcome.validator,
                amount: outcome.amount,
                release_block: outcome.release_block,
                is_jailbound: outcome.jailbound,
                event_id: outcome.event_id,
            });
        }

        // Slashing first, so queued amounts convert at post-slash ratios,
        // and claims on pools the sweep emptied are voided before the
        // apply pass can refill them.
        self.unbonding.void_burned_shares(&self.registry)?;
        self.bonding.apply_pending(&mut self.registry)?;
        self.unbonding.apply_pending(&mut self.registry)?;
        self.unbonding.release_matured(
            &mut self.registry,
            &mut self.stake_token,
            block,
            self.config.unbonding_period,
        )?;

        for (validator, rate) in self.registry.apply_pending_rates(block) {
            self.events.push(LedgerEvent::CommissionRateChange { validator, rate });
        }

        self.committee =
            compute_committee(self.registry.validators(), self.config.max_committee_size);
        self.epochs.advance(block);
        self.events.push(LedgerEvent::EpochEnded { epoch });
        info!(
            epoch,
            block,
            committee = self.committee.len(),
            total_power = %self.committee.total_power,
            "epoch ended"
        );
        Ok(())
    }

    /// Split one block's reward pool: treasury fee off the top, the rest
    /// per committee member proportional to its cached voting power. A
    /// jailed member's whole share is escrowed to the reporting
    /// beneficiary instead.
    fn distribute_rewards(&mut self, pool: Amount) -> Result<(), NacreError> {
        if pool == 0 {
            return Ok(());
        }
        let members: Vec<(Address, Amount)> = self
            .committee
            .members
            .iter()
            .map(|m| (m.address, m.voting_power))
            .collect();
        let split = split_pool(pool, self.config.treasury_fee_rate, &members);
        self.treasury.deposit_fee(split.treasury_fee);
        self.reward_dust += split.dust;

        for (address, share) in split.member_shares {
            if share == 0 {
                continue;
            }
            let record = self.registry.get(&address)?;
            let (state, self_bonded, bonded, validator_treasury) = (
                record.state,
                record.self_bonded_stake,
                record.bonded_stake,
                record.treasury,
            );

            if matches!(state, ValidatorState::Jailed | ValidatorState::Jailbound) {
                match self.accountability.beneficiary(&address) {
                    Some(reporter) => self.fee_token.credit(reporter, share),
                    None => self.treasury.deposit_fee(share),
                }
                continue;
            }

            let (self_reward, delegator_reward) =
                split_member_reward(share, self_bonded, bonded);
            self.fee_token.credit(validator_treasury, self_reward);
            if delegator_reward > 0 {
                let commission = self
                    .registry
                    .liquid_of_mut(&address)?
                    .redistribute(delegator_reward);
                self.fee_token.credit(validator_treasury, commission);
            }
        }
        Ok(())
    }

    /// Jail an offender as soon as its fault proof is recorded, so its
    /// committee rewards escrow for the rest of the epoch. The slashing
    /// sweep sets the authoritative jail term.
    fn jail_for_fault(&mut self, offender: Address) -> Result<(), NacreError> {
        let jail_factor = self.config.accountability.jail_factor;
        let threshold = self.config.accountability.jailbound_fault_threshold;
        let epoch_period = self.config.epoch_period;
        let block = self.block;

        let record = self.registry.get_mut(&offender)?;
        if record.state == ValidatorState::Jailbound {
            return Ok(());
        }
        let faults = record.provable_fault_count + 1;
        if faults >= threshold {
            record.jailbind();
        } else {
            record.jail(block + faults * jail_factor * epoch_period)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Validator lifecycle
    // -----------------------------------------------------------------

    /// Register a new validator. The commission rate starts at the
    /// protocol's delegation rate; the address derives from the node key
    /// in the proof.
    pub fn register_validator(
        &mut self,
        treasury: Address,
        proof: &RegistrationProof,
    ) -> Result<Address, NacreError> {
        let address = self.registry.register(
            treasury,
            proof,
            self.config.delegation_rate,
            self.block,
        )?;
        let oracle = self.registry.get(&address)?.oracle;
        self.events.push(LedgerEvent::RegisteredValidator {
            validator: address,
            treasury,
            oracle,
        });
        Ok(address)
    }

    /// Voluntarily pause a validator. Treasury-only.
    pub fn pause_validator(
        &mut self,
        caller: Address,
        validator: Address,
    ) -> Result<(), NacreError> {
        self.registry.pause(caller, validator)?;
        self.events.push(LedgerEvent::PausedValidator { validator });
        Ok(())
    }

    /// Re-activate a paused validator, or a jailed one past its release
    /// block. Treasury-only.
    pub fn activate_validator(
        &mut self,
        caller: Address,
        validator: Address,
    ) -> Result<(), NacreError> {
        self.registry.activate(caller, validator, self.block)?;
        self.events.push(LedgerEvent::ActivatedValidator { validator });
        Ok(())
    }

    /// Queue a commission-rate change, effective one unbonding period
    /// out and applied at the following epoch boundary. Treasury-only.
    pub fn change_commission_rate(
        &mut self,
        caller: Address,
        validator: Address,
        rate: u64,
    ) -> Result<(), NacreError> {
        let effective_block = self.block + self.config.unbonding_period;
        self.registry
            .change_commission_rate(caller, validator, rate, effective_block)
    }

    // -----------------------------------------------------------------
    // Staking
    // -----------------------------------------------------------------

    /// Bond `amount` of the delegator's stake to `validator`. The stake
    /// is debited now; shares are minted at the epoch boundary. Bonding
    /// from the validator's own treasury is self-bonding and mints no
    /// liquid shares.
    ///
    /// # Errors
    /// `NacreError::ValidatorNotActive` unless the target is active;
    /// `NacreError::InsufficientBalance` on an uncovered debit.
    pub fn bond(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> Result<u64, NacreError> {
        if amount == 0 {
            return Err(NacreError::Validation(
                "bond amount must be positive".to_string(),
            ));
        }
        let record = self.registry.get(&validator)?;
        if record.state != ValidatorState::Active {
            return Err(NacreError::ValidatorNotActive(validator));
        }
        let self_bonded = delegator == record.treasury;
        self.stake_token.debit(delegator, amount)?;

        let id = self.bonding.enqueue(BondingRequest {
            delegator,
            delegatee: validator,
            amount,
            self_bonded,
            request_block: self.block,
            applied: false,
        });
        self.events.push(LedgerEvent::NewBondingRequest {
            id,
            validator,
            delegator,
            self_bonded,
            amount,
        });
        Ok(id)
    }

    /// Unbond from `validator`: `amount` is liquid shares for delegated
    /// stake, atto for self-bonded stake. Shares (or the self-bond hold)
    /// lock now; conversion happens at the epoch boundary and the stake
    /// releases one unbonding period later. Unbonding is allowed in any
    /// validator state.
    pub fn unbond(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> Result<u64, NacreError> {
        if amount == 0 {
            return Err(NacreError::Validation(
                "unbond amount must be positive".to_string(),
            ));
        }
        let record = self.registry.get(&validator)?;
        let self_bonded = delegator == record.treasury;

        if self_bonded {
            let available = record.self_bonded_stake - record.self_unbonding_stake_locked;
            if amount > available {
                return Err(NacreError::InsufficientSelfBonded {
                    available,
                    requested: amount,
                });
            }
            self.registry.get_mut(&validator)?.self_unbonding_stake_locked += amount;
        } else {
            self.registry
                .liquid_of_mut(&validator)?
                .lock(delegator, amount)
                .map_err(|err| match err {
                    NacreError::LockExceedsBalance {
                        available,
                        requested,
                    } => NacreError::InsufficientUnlockedLiquid {
                        available,
                        requested,
                    },
                    other => other,
                })?;
        }

        let id = self.unbonding.enqueue(UnbondingRequest {
            delegator,
            delegatee: validator,
            amount,
            self_bonded,
            request_block: self.block,
            unbonding_shares: 0,
            applied: false,
            released: false,
        });
        self.events.push(LedgerEvent::NewUnbondingRequest {
            id,
            validator,
            delegator,
            self_bonded,
            amount,
        });
        Ok(id)
    }

    // -----------------------------------------------------------------
    // Accountability
    // -----------------------------------------------------------------

    /// Submit an accountability event. The ledger stamps the reporting
    /// block and derives the offence epoch from the reference block; the
    /// submitted values of those fields are ignored.
    pub fn submit_accountability_event(
        &mut self,
        mut event: AccountabilityEvent,
    ) -> Result<u64, NacreError> {
        if !self.registry.contains(&event.offender) {
            return Err(NacreError::UnknownValidator(event.offender));
        }
        event.reporting_block = self.block;
        event.epoch = self.epochs.epoch_of_block(event.reference_block);
        let offender = event.offender;
        let severity = event.severity();

        match event.kind {
            EventKind::Accusation => {
                let id = self.accountability.submit_accusation(event)?;
                self.events.push(LedgerEvent::NewAccusation {
                    id,
                    offender,
                    severity,
                });
                Ok(id)
            }
            EventKind::FaultProof => {
                let id = self.accountability.submit_misbehavior(event)?;
                self.events.push(LedgerEvent::NewFaultProof {
                    id,
                    offender,
                    severity,
                });
                self.jail_for_fault(offender)?;
                Ok(id)
            }
            EventKind::InnocenceProof => {
                let accusation_id = self.accountability.submit_innocence(event)?;
                self.events.push(LedgerEvent::InnocenceProven {
                    offender,
                    accusation_id,
                });
                Ok(accusation_id)
            }
        }
    }

    // -----------------------------------------------------------------
    // Rewards and token surfaces
    // -----------------------------------------------------------------

    /// Pay out the holder's accrued delegation rewards in the fee
    /// currency. Returns the amount claimed.
    pub fn claim_rewards(
        &mut self,
        holder: Address,
        validator: Address,
    ) -> Result<Amount, NacreError> {
        let amount = self
            .registry
            .liquid_of_mut(&validator)?
            .claim_rewards(holder);
        self.fee_token.credit(holder, amount);
        Ok(amount)
    }

    /// Rewards accrued to `holder` against `validator` and not yet
    /// claimed.
    pub fn unclaimed_rewards(
        &self,
        holder: &Address,
        validator: &Address,
    ) -> Result<Amount, NacreError> {
        Ok(self.registry.liquid_of(validator)?.unclaimed_rewards(holder))
    }

    /// Mint stake tokens. Operator-only.
    pub fn mint(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        self.require_operator(caller)?;
        self.stake_token.mint(account, amount);
        Ok(())
    }

    /// Burn stake tokens from an account. Operator-only.
    pub fn burn(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        self.require_operator(caller)?;
        self.stake_token.burn(account, amount)
    }

    /// Transfer stake tokens out of the caller's account.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        self.stake_token.transfer(caller, to, amount)
    }

    /// Transfer liquid shares of `validator` between holders. Locked
    /// shares do not move.
    pub fn transfer_liquid(
        &mut self,
        validator: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), NacreError> {
        self.registry
            .liquid_of_mut(&validator)?
            .transfer(from, to, amount)
    }

    fn require_operator(&self, caller: Address) -> Result<(), NacreError> {
        if caller != self.config.operator_account {
            return Err(NacreError::Validation(format!(
                "caller {} is not the operator",
                caller
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn current_block(&self) -> u64 {
        self.block
    }

    pub fn current_epoch(&self) -> u64 {
        self.epochs.current_epoch()
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    /// Deterministic proposer for (height, round) under the current
    /// committee.
    pub fn proposer(&self, height: u64, round: u64) -> Option<Address> {
        select_proposer(&self.committee, self.epochs.current_epoch(), height, round)
    }

    pub fn get_validator(&self, validator: &Address) -> Result<&Validator, NacreError> {
        self.registry.get(validator)
    }

    pub fn get_bonding_request(&self, id: u64) -> Option<&BondingRequest> {
        self.bonding.get(id)
    }

    pub fn get_unbonding_request(&self, id: u64) -> Option<&UnbondingRequest> {
        self.unbonding.get(id)
    }

    pub fn get_accountability_event(&self, id: u64) -> Option<&AccountabilityEvent> {
        self.accountability.get_event(id)
    }

    pub fn stake_balance_of(&self, account: &Address) -> Amount {
        self.stake_token.balance_of(account)
    }

    pub fn fee_balance_of(&self, account: &Address) -> Amount {
        self.fee_token.balance_of(account)
    }

    pub fn total_supply(&self) -> Amount {
        self.stake_token.total_supply()
    }

    pub fn liquid_balance_of(
        &self,
        validator: &Address,
        holder: &Address,
    ) -> Result<Amount, NacreError> {
        Ok(self.registry.liquid_of(validator)?.balance_of(holder))
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Flooring remainder retained across all reward distributions.
    pub fn reward_dust(&self) -> Amount {
        self.reward_dust
    }

    /// Drain the events emitted since the last drain, in emission order.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
