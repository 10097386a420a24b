//! Inter-office (interbranch) split planning.
//!
//! When a posting's lines span several offices, control-account entries are
//! added so that every office balances on its own. Exactly one side may
//! span several offices; the other side's single office is the home office.

use std::collections::BTreeMap;

use ledgerline_shared::types::OfficeId;
use rust_decimal::Decimal;

use super::entry::EntryType;
use super::error::{LedgerError, LedgerResult};

/// A control-account entry required by the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTransfer {
    /// Office the control entry is booked in.
    pub office_id: OfficeId,
    /// Side of the control entry.
    pub entry_type: EntryType,
    /// Amount.
    pub amount: Decimal,
}

/// Outcome of split planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    /// Office of the single-office side.
    pub home_office: OfficeId,
    /// Control entries to add, ordered by spoke office.
    pub transfers: Vec<ControlTransfer>,
}

impl SplitPlan {
    /// Returns true if the posting needs control entries.
    #[must_use]
    pub fn is_interbranch(&self) -> bool {
        !self.transfers.is_empty()
    }
}

fn office_totals(lines: &[(OfficeId, Decimal)]) -> BTreeMap<OfficeId, Decimal> {
    let mut totals = BTreeMap::new();
    for (office, amount) in lines {
        *totals.entry(*office).or_insert(Decimal::ZERO) += *amount;
    }
    totals
}

/// Plans the control entries for a posting given its `(office, amount)`
/// credit and debit lines.
///
/// If both sides sit in one office each, the debit side is home. For every
/// spoke office S on the other side with total X, S gets a control entry of
/// the opposite side for X and the home office gets one of the spoke side
/// for X.
///
/// # Errors
///
/// `NoDebitsOrCredits` if a side is empty, `InvalidOffices` if both sides
/// span several offices.
pub fn plan_split(
    credits: &[(OfficeId, Decimal)],
    debits: &[(OfficeId, Decimal)],
) -> LedgerResult<SplitPlan> {
    let credit_totals = office_totals(credits);
    let debit_totals = office_totals(debits);

    let (home_office, spokes, spoke_side) = match (
        single_office(&debit_totals),
        single_office(&credit_totals),
    ) {
        (Some(home), _) => (home, credit_totals, EntryType::Credit),
        (None, Some(home)) => (home, debit_totals, EntryType::Debit),
        (None, None) if credit_totals.is_empty() || debit_totals.is_empty() => {
            return Err(LedgerError::NoDebitsOrCredits);
        }
        (None, None) => return Err(LedgerError::InvalidOffices),
    };

    let mut transfers = Vec::new();
    for (office_id, amount) in spokes {
        if office_id == home_office || amount.is_zero() {
            continue;
        }
        transfers.push(ControlTransfer {
            office_id,
            entry_type: spoke_side.opposite(),
            amount,
        });
        transfers.push(ControlTransfer {
            office_id: home_office,
            entry_type: spoke_side,
            amount,
        });
    }

    Ok(SplitPlan {
        home_office,
        transfers,
    })
}

fn single_office(totals: &BTreeMap<OfficeId, Decimal>) -> Option<OfficeId> {
    match totals.len() {
        1 => totals.keys().next().copied(),
        _ => None,
    }
}
