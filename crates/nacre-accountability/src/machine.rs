// crates/nacre-accountability/src/machine.rs
//
// The accusation/misbehavior/innocence lifecycle.
//
// Per (offender, rule) at most one accusation is outstanding. An
// accusation not rebutted within the innocence window is promoted to a
// fault proof exactly once; a fault proof for the same offender and
// epoch at equal or higher severity suppresses the promotion instead.
// Faults queue for the epoch-end slashing sweep, which processes them in
// submission order so the collusion component of the rate sees earlier
// same-epoch offences and never future ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nacre_core::{
    AccountabilityConfig, AccountabilityEvent, Address, EventKind, NacreError, Rule, Severity,
};
use nacre_economics::Treasury;
use nacre_staking::Registry;

use crate::slashing::{slash, slashing_rate, SlashOutcome};

/// The accountability state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accountability {
    config: AccountabilityConfig,
    /// Arena of every submitted or promoted event, indexed by id.
    events: Vec<AccountabilityEvent>,
    /// Ids of outstanding (unrebutted, unexpired) accusations.
    active_accusations: Vec<u64>,
    /// Ids of fault proofs awaiting the epoch-end slashing sweep.
    pending_faults: Vec<u64>,
    /// Highest severity already slashed, per offender and offence epoch.
    slashing_history: BTreeMap<Address, BTreeMap<u64, Severity>>,
    /// Reporter of the most recent fault per offender; receives the
    /// offender's escrowed block rewards while jailed.
    beneficiaries: BTreeMap<Address, Address>,
}

impl Accountability {
    pub fn new(config: AccountabilityConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
            active_accusations: Vec::new(),
            pending_faults: Vec::new(),
            slashing_history: BTreeMap::new(),
            beneficiaries: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &AccountabilityConfig {
        &self.config
    }

    pub fn get_event(&self, id: u64) -> Option<&AccountabilityEvent> {
        self.events.get(id as usize)
    }

    /// Reporter entitled to the offender's escrowed rewards, if any.
    pub fn beneficiary(&self, offender: &Address) -> Option<Address> {
        self.beneficiaries.get(offender).copied()
    }

    fn recorded_severity(&self, offender: &Address, epoch: u64) -> Option<Severity> {
        self.slashing_history
            .get(offender)
            .and_then(|by_epoch| by_epoch.get(&epoch))
            .copied()
    }

    /// Whether a new accusation against `offender` for `rule` would be
    /// admissible: no outstanding accusation for the same rule class, and
    /// no equal-or-higher-severity slash already recorded for the epoch.
    pub fn can_accuse(&self, offender: &Address, rule: Rule, epoch: u64) -> bool {
        let outstanding = self.active_accusations.iter().any(|&id| {
            let event = &self.events[id as usize];
            event.offender == *offender && event.rule == rule
        });
        !outstanding && self.can_slash(offender, rule.severity(), epoch)
    }

    /// Whether a fault of `severity` for `epoch` is still slashable.
    pub fn can_slash(&self, offender: &Address, severity: Severity, epoch: u64) -> bool {
        match self.recorded_severity(offender, epoch) {
            Some(recorded) => recorded < severity,
            None => true,
        }
    }

    /// Submit an accusation. Rebuttable for
    /// `innocence_proof_submission_window` blocks.
    ///
    /// # Errors
    /// `NacreError::AccusationOutstanding` when an accusation for the
    /// same rule class is already pending;
    /// `NacreError::AlreadySlashed` when the epoch is already covered at
    /// equal or higher severity.
    pub fn submit_accusation(&mut self, event: AccountabilityEvent) -> Result<u64, NacreError> {
        debug_assert_eq!(event.kind, EventKind::Accusation);
        let outstanding = self.active_accusations.iter().any(|&id| {
            let existing = &self.events[id as usize];
            existing.offender == event.offender && existing.rule == event.rule
        });
        if outstanding {
            return Err(NacreError::AccusationOutstanding(event.offender));
        }
        if !self.can_slash(&event.offender, event.severity(), event.epoch) {
            return Err(NacreError::AlreadySlashed(event.offender));
        }
        let id = self.push_event(event);
        self.active_accusations.push(id);
        info!(id, "accusation submitted");
        Ok(id)
    }

    /// Submit a direct misbehavior proof. Queues the fault for the next
    /// slashing sweep and suppresses any outstanding accusation for the
    /// same offender and epoch at equal or lower severity.
    ///
    /// # Errors
    /// `NacreError::AlreadySlashed` when the epoch is already covered at
    /// equal or higher severity.
    pub fn submit_misbehavior(&mut self, event: AccountabilityEvent) -> Result<u64, NacreError> {
        debug_assert_eq!(event.kind, EventKind::FaultProof);
        if !self.can_slash(&event.offender, event.severity(), event.epoch) {
            return Err(NacreError::AlreadySlashed(event.offender));
        }

        // Tie goes to the misbehavior: an accusation of equal severity is
        // suppressed as well.
        let severity = event.severity();
        let events = &self.events;
        let offender = event.offender;
        let epoch = event.epoch;
        self.active_accusations.retain(|&id| {
            let accusation = &events[id as usize];
            !(accusation.offender == offender
                && accusation.epoch == epoch
                && accusation.severity() <= severity)
        });

        self.beneficiaries.insert(offender, event.reporter);
        let id = self.push_event(event);
        self.pending_faults.push(id);
        info!(id, "misbehavior proof submitted");
        Ok(id)
    }

    /// Submit an innocence proof against an outstanding accusation,
    /// identified by offender, rule, and offence block. Returns the id of
    /// the cancelled accusation.
    ///
    /// # Errors
    /// `NacreError::Validation` when no matching accusation is
    /// outstanding.
    pub fn submit_innocence(&mut self, event: AccountabilityEvent) -> Result<u64, NacreError> {
        debug_assert_eq!(event.kind, EventKind::InnocenceProof);
        let position = self.active_accusations.iter().position(|&id| {
            let accusation = &self.events[id as usize];
            accusation.offender == event.offender
                && accusation.rule == event.rule
                && accusation.reference_block == event.reference_block
        });
        match position {
            Some(index) => {
                let id = self.active_accusations.remove(index);
                self.push_event(event);
                info!(accusation = id, "innocence proven, accusation dropped");
                Ok(id)
            }
            None => {
                warn!(offender = %event.offender, "innocence proof without matching accusation");
                Err(NacreError::Validation(
                    "no matching accusation outstanding".to_string(),
                ))
            }
        }
    }

    /// Promote every accusation whose innocence window has expired into a
    /// fault proof. Runs once per block. Each accusation is promoted at
    /// most once; one already covered by a same-or-higher-severity slash
    /// is dropped instead. Returns the promoted fault ids.
    pub fn promote_expired_accusations(&mut self, current_block: u64) -> Vec<u64> {
        let window = self.config.innocence_proof_submission_window;
        let mut promoted = Vec::new();
        let mut remaining = Vec::new();

        for id in std::mem::take(&mut self.active_accusations) {
            let accusation = self.events[id as usize].clone();
            if accusation.reporting_block + window > current_block {
                remaining.push(id);
                continue;
            }
            if !self.can_slash(&accusation.offender, accusation.severity(), accusation.epoch) {
                continue;
            }
            let fault = AccountabilityEvent {
                kind: EventKind::FaultProof,
                reporting_block: current_block,
                ..accusation
            };
            self.beneficiaries.insert(fault.offender, fault.reporter);
            let fault_id = self.push_event(fault);
            self.pending_faults.push(fault_id);
            info!(accusation = id, fault = fault_id, "accusation promoted to fault");
            promoted.push(fault_id);
        }

        self.active_accusations = remaining;
        promoted
    }

    /// Execute every queued fault, in submission order. The collusion
    /// component counts offences per offence epoch as the batch
    /// progresses, so each slash sees the offences processed before it
    /// and not the ones after.
    pub fn slashing_sweep(
        &mut self,
        registry: &mut Registry,
        treasury: &mut Treasury,
        current_block: u64,
        epoch_period: u64,
    ) -> Result<Vec<SlashOutcome>, NacreError> {
        let mut outcomes = Vec::new();
        let mut epoch_offences: BTreeMap<u64, u64> = BTreeMap::new();

        for id in std::mem::take(&mut self.pending_faults) {
            let event = self.events[id as usize].clone();
            // A higher-severity slash may have landed since this fault
            // was queued.
            if !self.can_slash(&event.offender, event.severity(), event.epoch) {
                continue;
            }

            let count = epoch_offences.entry(event.epoch).or_insert(0);
            *count += 1;
            let validator = registry.get_mut(&event.offender)?;
            let rate = slashing_rate(
                &self.config,
                event.severity(),
                *count,
                validator.provable_fault_count,
            );
            let outcome = slash(
                validator,
                treasury,
                &self.config,
                rate,
                id,
                current_block,
                epoch_period,
            )?;

            let by_epoch = self.slashing_history.entry(event.offender).or_default();
            let recorded = by_epoch.entry(event.epoch).or_insert(event.severity());
            if *recorded < event.severity() {
                *recorded = event.severity();
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn push_event(&mut self, event: AccountabilityEvent) -> u64 {
        self.events.push(event);
        (self.events.len() - 1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacre_core::{Validator, ValidatorState};

    fn offender() -> Address {
        Address([1u8; 20])
    }

    fn reporter() -> Address {
        Address([9u8; 20])
    }

    fn machine() -> Accountability {
        Accountability::new(AccountabilityConfig::default())
    }

    fn second_offender() -> Address {
        Address([5u8; 20])
    }

    fn event(kind: EventKind, rule: Rule, epoch: u64, block: u64) -> AccountabilityEvent {
        event_by(offender(), kind, rule, epoch, block)
    }

    fn event_by(
        offender: Address,
        kind: EventKind,
        rule: Rule,
        epoch: u64,
        block: u64,
    ) -> AccountabilityEvent {
        AccountabilityEvent {
            kind,
            offender,
            reporter: reporter(),
            rule,
            reference_block: epoch,
            reporting_block: block,
            epoch,
            proof: vec![0xbe, 0xef],
        }
    }

    fn insert_validator(registry: &mut Registry, address: Address, stake: u128) {
        registry.insert_genesis(Validator {
            address,
            treasury: Address([2u8; 20]),
            oracle: Address([3u8; 20]),
            node_key: [0u8; 32],
            oracle_key: [0u8; 32],
            bonded_stake: stake,
            self_bonded_stake: stake,
            unbonding_stake: 0,
            unbonding_shares: 0,
            self_unbonding_stake: 0,
            self_unbonding_shares: 0,
            self_unbonding_stake_locked: 0,
            liquid_supply: 0,
            commission_rate: 0,
            total_slashed: 0,
            provable_fault_count: 0,
            jail_release_block: 0,
            registration_block: 0,
            state: ValidatorState::Active,
        });
    }

    fn seeded_registry(stake: u128) -> Registry {
        let mut registry = Registry::new();
        insert_validator(&mut registry, offender(), stake);
        registry
    }

    #[test]
    fn test_duplicate_accusation_rejected() {
        let mut machine = machine();
        machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 10))
            .unwrap();
        let err = machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 11))
            .unwrap_err();
        assert_eq!(err, NacreError::AccusationOutstanding(offender()));
        // A different rule class is still accusable.
        assert!(machine.can_accuse(&offender(), Rule::Equivocation, 1));
    }

    #[test]
    fn test_innocence_cancels_accusation() {
        let mut machine = machine();
        let id = machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 10))
            .unwrap();
        let cancelled = machine
            .submit_innocence(event(EventKind::InnocenceProof, Rule::InvalidVote, 1, 50))
            .unwrap();
        assert_eq!(cancelled, id);
        // Nothing left to promote.
        assert!(machine.promote_expired_accusations(10_000).is_empty());
        assert!(machine.can_accuse(&offender(), Rule::InvalidVote, 1));
    }

    #[test]
    fn test_unmatched_innocence_rejected() {
        let mut machine = machine();
        assert!(machine
            .submit_innocence(event(EventKind::InnocenceProof, Rule::InvalidVote, 1, 50))
            .is_err());
    }

    #[test]
    fn test_promotion_after_window_exactly_once() {
        let mut machine = machine();
        machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 10))
            .unwrap();
        // Window (100 blocks) not yet elapsed.
        assert!(machine.promote_expired_accusations(109).is_empty());
        let promoted = machine.promote_expired_accusations(110);
        assert_eq!(promoted.len(), 1);
        assert_eq!(
            machine.get_event(promoted[0]).unwrap().kind,
            EventKind::FaultProof
        );
        // Never promoted a second time.
        assert!(machine.promote_expired_accusations(200).is_empty());
    }

    #[test]
    fn test_higher_severity_misbehavior_suppresses_promotion() {
        let mut machine = machine();
        machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 10))
            .unwrap();
        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::Equivocation, 1, 20))
            .unwrap();
        // Only the direct misbehavior remains queued.
        assert!(machine.promote_expired_accusations(500).is_empty());
        assert_eq!(machine.pending_faults.len(), 1);
    }

    #[test]
    fn test_equal_severity_tie_goes_to_misbehavior() {
        let mut machine = machine();
        machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidVote, 1, 10))
            .unwrap();
        // InvalidProposal and InvalidVote are both mid severity.
        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::InvalidProposal, 1, 20))
            .unwrap();
        assert!(machine.promote_expired_accusations(500).is_empty());
    }

    #[test]
    fn test_lower_severity_misbehavior_keeps_accusation() {
        let mut machine = machine();
        machine
            .submit_accusation(event(EventKind::Accusation, Rule::InvalidProposal, 1, 10))
            .unwrap();
        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::VoteOmission, 1, 20))
            .unwrap();
        // Both offences end up slashed: the fault now and the accusation
        // at promotion.
        let promoted = machine.promote_expired_accusations(111);
        assert_eq!(promoted.len(), 1);
        assert_eq!(machine.pending_faults.len(), 2);
    }

    #[test]
    fn test_sweep_collusion_count_sees_prior_offences_only() {
        let mut machine = machine();
        let mut registry = seeded_registry(10_000);
        insert_validator(&mut registry, second_offender(), 10_000);
        let mut treasury = Treasury::new();

        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::VoteOmission, 1, 20))
            .unwrap();
        machine
            .submit_misbehavior(event_by(
                second_offender(),
                EventKind::FaultProof,
                Rule::VoteOmission,
                1,
                21,
            ))
            .unwrap();
        let outcomes = machine
            .slashing_sweep(&mut registry, &mut treasury, 100, 100)
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        // First slash sees only itself: base low (1000) + 1 * collusion
        // (500). The second, processed after it, counts both same-epoch
        // offences: base + 2 * collusion.
        assert_eq!(outcomes[0].validator, offender());
        assert_eq!(outcomes[0].rate, 1_500);
        assert_eq!(outcomes[0].amount, 1_500);
        assert_eq!(outcomes[1].validator, second_offender());
        assert_eq!(outcomes[1].rate, 2_000);
        assert_eq!(outcomes[1].amount, 2_000);
        assert_eq!(treasury.stake_balance(), 3_500);
    }

    #[test]
    fn test_sweep_skips_already_covered_fault() {
        let mut machine = machine();
        let mut registry = seeded_registry(10_000);
        let mut treasury = Treasury::new();

        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::Equivocation, 1, 20))
            .unwrap();
        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::VoteOmission, 1, 21))
            .unwrap();
        let outcomes = machine
            .slashing_sweep(&mut registry, &mut treasury, 100, 100)
            .unwrap();
        // The low-severity fault is covered by the high-severity slash.
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            machine.recorded_severity(&offender(), 1),
            Some(Severity::High)
        );
    }

    #[test]
    fn test_beneficiary_tracks_last_reporter() {
        let mut machine = machine();
        assert_eq!(machine.beneficiary(&offender()), None);
        machine
            .submit_misbehavior(event(EventKind::FaultProof, Rule::VoteOmission, 1, 20))
            .unwrap();
        assert_eq!(machine.beneficiary(&offender()), Some(reporter()));
    }
}
