//! The in-memory set of payments waiting for a proof post.
//!
//! Entries are keyed by a generation number handed out in creation order,
//! with a per-sender index so a proof post finds its payment without
//! scanning the whole set. Only the ingestion worker touches the set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use paysnap_types::{AccountName, HbdAmount, ProofRef, Timestamp};

use crate::classifier::PaymentCandidate;

/// A qualifying payment that has not been resolved yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPayment {
    pub generation: u64,
    pub sender: AccountName,
    pub store: AccountName,
    pub amount: HbdAmount,
    pub memo: String,
    pub block: u64,
    pub trx_id: String,
    pub created_at: Timestamp,
    /// Set at most once; the first matching proof post wins.
    pub proof: Option<ProofRef>,
}

type Origin = (u64, String, String);

#[derive(Debug, Default)]
pub struct PendingSet {
    next_generation: u64,
    entries: BTreeMap<u64, PendingPayment>,
    by_sender: HashMap<AccountName, BTreeSet<u64>>,
    origins: HashSet<Origin>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, generation: u64) -> Option<&PendingPayment> {
        self.entries.get(&generation)
    }

    /// Open payments, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingPayment> {
        self.entries.values()
    }

    /// Generations of all open payments, oldest first.
    pub fn generations(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Open a payment for `candidate`.
    ///
    /// Returns `None` when the same transfer (block, transaction, memo) is
    /// already open, which happens when a block is dispatched again after a
    /// failed commit.
    pub fn open(&mut self, candidate: PaymentCandidate, now: Timestamp) -> Option<u64> {
        let origin = (
            candidate.block,
            candidate.trx_id.clone(),
            candidate.memo.clone(),
        );
        if !self.origins.insert(origin) {
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.by_sender
            .entry(candidate.sender.clone())
            .or_default()
            .insert(generation);
        self.entries.insert(
            generation,
            PendingPayment {
                generation,
                sender: candidate.sender,
                store: candidate.store,
                amount: candidate.amount,
                memo: candidate.memo,
                block: candidate.block,
                trx_id: candidate.trx_id,
                created_at: now,
                proof: None,
            },
        );
        Some(generation)
    }

    /// Attach `proof` to the oldest open payment from its author that has no
    /// proof yet. Returns the generation it was attached to.
    ///
    /// A post already attached to some payment is not attached again, so an
    /// edit of the same post cannot claim a second payment.
    pub fn attach_proof(&mut self, proof: ProofRef) -> Option<u64> {
        let generations = self.by_sender.get(&proof.author)?;
        let already_used = generations
            .iter()
            .filter_map(|g| self.entries.get(g))
            .any(|p| p.proof.as_ref() == Some(&proof));
        if already_used {
            return None;
        }

        let generation = generations
            .iter()
            .copied()
            .find(|g| self.entries.get(g).is_some_and(|p| p.proof.is_none()))?;
        let entry = self.entries.get_mut(&generation)?;
        entry.proof = Some(proof);
        Some(generation)
    }

    /// Remove a resolved payment.
    pub fn remove(&mut self, generation: u64) -> Option<PendingPayment> {
        let payment = self.entries.remove(&generation)?;
        if let Some(gens) = self.by_sender.get_mut(&payment.sender) {
            gens.remove(&generation);
            if gens.is_empty() {
                self.by_sender.remove(&payment.sender);
            }
        }
        self.origins.remove(&(
            payment.block,
            payment.trx_id.clone(),
            payment.memo.clone(),
        ));
        Some(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(sender: &str, trx_id: &str) -> PaymentCandidate {
        PaymentCandidate {
            sender: AccountName::new(sender),
            store: AccountName::new("kcs-store"),
            amount: HbdAmount::from_milli(1_500),
            memo: "kcs-hpos-2024-0007".into(),
            block: 10,
            trx_id: trx_id.into(),
        }
    }

    #[test]
    fn generations_follow_creation_order() {
        let mut set = PendingSet::new();
        let a = set.open(candidate("alice", "t1"), Timestamp::new(1)).unwrap();
        let b = set.open(candidate("bob", "t2"), Timestamp::new(2)).unwrap();
        assert!(a < b);
        assert_eq!(set.generations(), vec![a, b]);
        assert_eq!(set.get(a).unwrap().created_at, Timestamp::new(1));
    }

    #[test]
    fn same_transfer_is_not_opened_twice() {
        let mut set = PendingSet::new();
        assert!(set.open(candidate("alice", "t1"), Timestamp::new(1)).is_some());
        assert!(set.open(candidate("alice", "t1"), Timestamp::new(2)).is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn proof_attaches_to_oldest_unproven_payment_of_author() {
        let mut set = PendingSet::new();
        let first = set.open(candidate("alice", "t1"), Timestamp::new(1)).unwrap();
        let second = set.open(candidate("alice", "t2"), Timestamp::new(2)).unwrap();
        set.open(candidate("bob", "t3"), Timestamp::new(3)).unwrap();

        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap-1")), Some(first));
        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap-2")), Some(second));
        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap-3")), None);
        assert_eq!(
            set.get(first).unwrap().proof,
            Some(ProofRef::new("alice", "snap-1"))
        );
    }

    #[test]
    fn second_proof_does_not_replace_first() {
        let mut set = PendingSet::new();
        let g = set.open(candidate("alice", "t1"), Timestamp::new(1)).unwrap();
        set.attach_proof(ProofRef::new("alice", "snap-1"));
        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap-2")), None);
        assert_eq!(set.get(g).unwrap().proof.as_ref().unwrap().permlink, "snap-1");
    }

    #[test]
    fn edited_post_does_not_claim_another_payment() {
        let mut set = PendingSet::new();
        set.open(candidate("alice", "t1"), Timestamp::new(1)).unwrap();
        let second = set.open(candidate("alice", "t2"), Timestamp::new(2)).unwrap();
        set.attach_proof(ProofRef::new("alice", "snap-1"));
        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap-1")), None);
        assert!(set.get(second).unwrap().proof.is_none());
    }

    #[test]
    fn proof_without_pending_payment_is_dropped() {
        let mut set = PendingSet::new();
        assert_eq!(set.attach_proof(ProofRef::new("carol", "snap")), None);
    }

    #[test]
    fn remove_clears_indexes() {
        let mut set = PendingSet::new();
        let g = set.open(candidate("alice", "t1"), Timestamp::new(1)).unwrap();
        assert!(set.remove(g).is_some());
        assert!(set.is_empty());
        assert_eq!(set.attach_proof(ProofRef::new("alice", "snap")), None);
        // The same transfer may be opened again once resolved.
        assert!(set.open(candidate("alice", "t1"), Timestamp::new(5)).is_some());
    }
}
