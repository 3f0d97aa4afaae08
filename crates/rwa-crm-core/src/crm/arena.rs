//! Flat exposure storage with secondary group indices.
//!
//! Built once per batch from the reference-sorted exposure vector. Member
//! lists are in ascending index order, so every pooled sum and pro-rata
//! split iterates in reference order and reproduces bit-for-bit.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::error::CrmError;
use crate::model::{AdjustedExposure, BeneficiaryLevel};
use crate::types::Money;
use crate::CrmResult;

#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    by_reference: BTreeMap<String, usize>,
    by_facility: BTreeMap<String, Vec<usize>>,
    by_counterparty: BTreeMap<String, Vec<usize>>,
    len: usize,
}

impl GroupIndex {
    /// Index a reference-sorted batch. Duplicate exposure references abort.
    pub fn build(exposures: &[AdjustedExposure]) -> CrmResult<Self> {
        let mut index = GroupIndex {
            len: exposures.len(),
            ..Default::default()
        };
        for (idx, e) in exposures.iter().enumerate() {
            let exp = &e.exposure;
            if index
                .by_reference
                .insert(exp.exposure_reference.clone(), idx)
                .is_some()
            {
                return Err(CrmError::InvalidInput {
                    field: "exposure_reference".into(),
                    reason: format!("duplicate exposure reference {}", exp.exposure_reference),
                });
            }
            if let Some(facility) = &exp.facility_reference {
                index
                    .by_facility
                    .entry(facility.clone())
                    .or_default()
                    .push(idx);
            }
            index
                .by_counterparty
                .entry(exp.counterparty_reference.clone())
                .or_default()
                .push(idx);
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Positions of the exposures a mitigant at `level` refers to.
    pub fn members(&self, level: BeneficiaryLevel, reference: &str) -> Option<&[usize]> {
        match level {
            BeneficiaryLevel::Exposure => self.by_reference.get(reference).map(std::slice::from_ref),
            BeneficiaryLevel::Facility => self.by_facility.get(reference).map(Vec::as_slice),
            BeneficiaryLevel::Counterparty => {
                self.by_counterparty.get(reference).map(Vec::as_slice)
            }
        }
    }

    /// Fail when a stage returned a batch that no longer lines up with the index.
    pub fn check_alignment(&self, stage: &str, exposures: &[AdjustedExposure]) -> CrmResult<()> {
        if exposures.len() != self.len {
            return Err(CrmError::InvariantViolation(format!(
                "{stage} returned {} exposures, expected {}",
                exposures.len(),
                self.len
            )));
        }
        for (reference, &idx) in &self.by_reference {
            if exposures[idx].reference() != reference {
                return Err(CrmError::InvariantViolation(format!(
                    "{stage} reordered exposure {reference}"
                )));
            }
        }
        Ok(())
    }
}

/// Split `amount` across `weights` in proportion.
///
/// The last positively weighted member takes the remainder so the shares sum
/// to `amount` exactly. Returns `None` when the weights total zero.
pub fn allocate_pro_rata(amount: Money, weights: &[Money]) -> Option<Vec<Money>> {
    let weights: Vec<Money> = weights.iter().map(|w| (*w).max(Decimal::ZERO)).collect();
    let total: Money = weights.iter().copied().sum();
    if total <= Decimal::ZERO {
        return None;
    }
    let last = weights.iter().rposition(|w| *w > Decimal::ZERO)?;

    let mut shares = vec![Decimal::ZERO; weights.len()];
    let mut assigned = Decimal::ZERO;
    for (i, w) in weights.iter().enumerate() {
        if i == last {
            break;
        }
        let share = amount * *w / total;
        shares[i] = share;
        assigned += share;
    }
    shares[last] = amount - assigned;
    Some(shares)
}
