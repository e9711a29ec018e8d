//! Payout summaries for dashboards.
//!
//! Grouping is a stable partition: groups appear in the order their key is first
//! seen, and members keep their input order inside a group.

use crate::entities::{Platform, payout};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::hash::Hash;

/// Payouts sharing one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutGroup<K> {
    /// Value shared by every member
    pub key: K,
    /// Number of payouts in the group
    pub count: usize,
    /// Sum of member amounts
    pub total_amount: Decimal,
    /// Members in their input order
    pub payouts: Vec<payout::Model>,
}

/// Partitions payouts by an arbitrary key.
pub fn group_payouts_by<K, F>(payouts: &[payout::Model], key_of: F) -> Vec<PayoutGroup<K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&payout::Model) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<PayoutGroup<K>> = Vec::new();

    for payout in payouts {
        let key = key_of(payout);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(PayoutGroup {
                key,
                count: 0,
                total_amount: Decimal::ZERO,
                payouts: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.count += 1;
        group.total_amount += payout.amount;
        group.payouts.push(payout.clone());
    }

    groups
}

/// Groups payouts by how the funds arrived.
#[must_use]
pub fn group_payouts_by_method(payouts: &[payout::Model]) -> Vec<PayoutGroup<String>> {
    group_payouts_by(payouts, |p| p.method.clone())
}

/// Groups payouts by marketplace.
#[must_use]
pub fn group_payouts_by_platform(payouts: &[payout::Model]) -> Vec<PayoutGroup<Platform>> {
    group_payouts_by(payouts, |p| p.platform)
}
