//! Account balance calculations.
//!
//! - Asset/Expense: balance += debit - credit (debit-normal)
//! - Liability/Equity/Income: balance += credit - debit (credit-normal)

use std::collections::HashMap;
use std::hash::Hash;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::EntryType;
use super::types::AccountType;

/// Balance direction of an account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSide {
    /// Debit-normal accounts (Asset, Expense)
    DebitNormal,
    /// Credit-normal accounts (Liability, Equity, Income)
    CreditNormal,
}

impl BalanceSide {
    /// Balance side of an account type.
    #[must_use]
    pub const fn of(account_type: AccountType) -> Self {
        match account_type.normal_side() {
            EntryType::Debit => Self::DebitNormal,
            EntryType::Credit => Self::CreditNormal,
        }
    }

    /// Calculates the balance change for aggregated debits and credits.
    #[must_use]
    pub fn calculate_balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::DebitNormal => debit - credit,
            Self::CreditNormal => credit - debit,
        }
    }

    /// Balance change caused by a single entry.
    #[must_use]
    pub fn effect(self, entry_type: EntryType, amount: Decimal) -> Decimal {
        match entry_type {
            EntryType::Debit => self.calculate_balance_change(amount, Decimal::ZERO),
            EntryType::Credit => self.calculate_balance_change(Decimal::ZERO, amount),
        }
    }
}

/// Cumulative balances keyed by account (or office and account).
///
/// Keys never seen start at zero.
#[derive(Debug, Clone)]
pub struct RunningBalances<K> {
    balances: HashMap<K, Decimal>,
}

impl<K: Eq + Hash + Copy> RunningBalances<K> {
    /// Starts from the given balances.
    pub fn seeded(seeds: impl IntoIterator<Item = (K, Decimal)>) -> Self {
        Self {
            balances: seeds.into_iter().collect(),
        }
    }

    /// Adds `change` to `key` and returns the new cumulative balance.
    pub fn apply(&mut self, key: K, change: Decimal) -> Decimal {
        let balance = self.balances.entry(key).or_insert(Decimal::ZERO);
        *balance += change;
        *balance
    }

    /// Current balance of `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Decimal {
        self.balances.get(key).copied().unwrap_or(Decimal::ZERO)
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Returns true if no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl<K: Eq + Hash + Copy> Default for RunningBalances<K> {
    fn default() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn run(account_type: AccountType, entries: &[(EntryType, Decimal)]) -> Vec<Decimal> {
        let side = BalanceSide::of(account_type);
        let mut balances = RunningBalances::default();
        entries
            .iter()
            .map(|(entry_type, amount)| balances.apply(1_i64, side.effect(*entry_type, *amount)))
            .collect()
    }

    #[test]
    fn test_asset_running_balance_sequence() {
        let balances = run(
            AccountType::Asset,
            &[
                (EntryType::Debit, dec!(100)),
                (EntryType::Credit, dec!(30)),
                (EntryType::Debit, dec!(5)),
            ],
        );
        assert_eq!(balances, vec![dec!(100), dec!(70), dec!(75)]);
    }

    #[test]
    fn test_liability_running_balance_sequence() {
        let balances = run(
            AccountType::Liability,
            &[(EntryType::Credit, dec!(50)), (EntryType::Debit, dec!(20))],
        );
        assert_eq!(balances, vec![dec!(50), dec!(30)]);
    }

    #[test]
    fn test_sides_per_type() {
        assert_eq!(BalanceSide::of(AccountType::Expense), BalanceSide::DebitNormal);
        assert_eq!(BalanceSide::of(AccountType::Income), BalanceSide::CreditNormal);
        assert_eq!(BalanceSide::of(AccountType::Equity), BalanceSide::CreditNormal);
        assert_eq!(
            BalanceSide::CreditNormal.calculate_balance_change(dec!(20), dec!(50)),
            dec!(30)
        );
    }

    #[test]
    fn test_seeded_balances_continue() {
        let mut balances = RunningBalances::seeded([(7_i64, dec!(40))]);
        assert_eq!(balances.apply(7, dec!(-15)), dec!(25));
        assert_eq!(balances.get(&8), Decimal::ZERO);
        assert_eq!(balances.len(), 1);
    }

    /// Strategy for generating balance changes (can be positive or negative)
    fn balance_change_strategy() -> impl Strategy<Value = Decimal> {
        (-100_000i64..100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The final balance equals the sum of all changes.
        #[test]
        fn prop_final_balance_equals_sum_of_changes(
            changes in prop::collection::vec(balance_change_strategy(), 1..=20),
        ) {
            let mut balances = RunningBalances::default();
            let mut last = Decimal::ZERO;
            for change in &changes {
                last = balances.apply(0_u8, *change);
            }
            let expected: Decimal = changes.iter().copied().sum();
            prop_assert_eq!(last, expected);
        }

        /// A debit and a credit of the same amount cancel on either side.
        #[test]
        fn prop_opposite_entries_cancel(
            amount in (1i64..10_000_000i64).prop_map(|n| Decimal::new(n, 2)),
            debit_normal in any::<bool>(),
        ) {
            let side = if debit_normal { BalanceSide::DebitNormal } else { BalanceSide::CreditNormal };
            let net = side.effect(EntryType::Debit, amount) + side.effect(EntryType::Credit, amount);
            prop_assert_eq!(net, Decimal::ZERO);
        }
    }
}
