//! The CRM waterfall.
//!
//! Stages run in a fixed order, each mapping an immutable batch to a new one:
//!
//! 1. **Provisions** -- multi-level allocation, drawn-first deduction (SA).
//! 2. **CCF** -- undrawn commitment converted on the provision-adjusted nominal.
//! 3. **EAD** -- pre-mitigation exposure value.
//! 4. **Collateral** -- haircuts, overcollateralisation, minimum coverage, netting.
//! 5. **Guarantees** -- beneficial test, maturity mismatch, substitution.
//! 6. **Finalize** -- invariants, warnings, run status.
//!
//! Each computing stage sits behind a trait so an alternative jurisdictional
//! treatment can be plugged into [`CrmProcessor`].

pub mod arena;
pub mod ccf;
pub mod collateral;
pub mod ead;
pub mod finalize;
pub mod guarantees;
pub mod provisions;

use std::time::Instant;

use tracing::{debug, info};

use crate::capital::{CapitalFormula, SupervisoryIrbFormula};
use crate::config::CrmConfig;
use crate::model::{
    AdjustedExposure, Collateral, CrmAdjustedBundle, Exposure, Guarantee, GuarantorProfile,
    MitigantTables, Provision,
};
use crate::types::{with_metadata, ComputationOutput, CrmWarning, WarningCode};
use crate::CrmResult;

use arena::GroupIndex;

pub use ccf::StandardCcfApplicator;
pub use collateral::StandardCollateralAllocator;
pub use ead::StandardEadInitializer;
pub use guarantees::StandardGuaranteeSubstitution;
pub use provisions::StandardProvisionResolver;

// ---------------------------------------------------------------------------
// Stage contracts
// ---------------------------------------------------------------------------

/// Result of one stage: the new batch plus batch-level warnings.
///
/// Exposure-level warnings travel on the records themselves.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub exposures: Vec<AdjustedExposure>,
    pub warnings: Vec<CrmWarning>,
}

pub trait ProvisionResolver: Send + Sync {
    fn resolve(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        provisions: &[Provision],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput>;
}

pub trait CcfApplicator: Send + Sync {
    fn apply(&self, exposures: &[AdjustedExposure], config: &CrmConfig) -> CrmResult<StageOutput>;
}

pub trait EadInitializer: Send + Sync {
    fn initialize(
        &self,
        exposures: &[AdjustedExposure],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput>;
}

pub trait CollateralAllocator: Send + Sync {
    fn allocate(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        collateral: &[Collateral],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput>;
}

pub trait GuaranteeSubstitutor: Send + Sync {
    fn substitute(
        &self,
        exposures: &[AdjustedExposure],
        index: &GroupIndex,
        guarantees: &[Guarantee],
        guarantors: &[GuarantorProfile],
        config: &CrmConfig,
    ) -> CrmResult<StageOutput>;
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Composes the stages into the waterfall.
pub struct CrmProcessor {
    provisions: Box<dyn ProvisionResolver>,
    ccf: Box<dyn CcfApplicator>,
    ead: Box<dyn EadInitializer>,
    collateral: Box<dyn CollateralAllocator>,
    guarantees: Box<dyn GuaranteeSubstitutor>,
}

impl CrmProcessor {
    /// Standard stages with the supervisory IRB formula for `config`'s framework.
    pub fn new(config: &CrmConfig) -> Self {
        Self {
            provisions: Box::new(StandardProvisionResolver),
            ccf: Box::new(StandardCcfApplicator),
            ead: Box::new(StandardEadInitializer),
            collateral: Box::new(StandardCollateralAllocator),
            guarantees: Box::new(StandardGuaranteeSubstitution::new(Box::new(
                SupervisoryIrbFormula::new(config.framework),
            ))),
        }
    }

    pub fn with_provision_resolver(mut self, stage: impl ProvisionResolver + 'static) -> Self {
        self.provisions = Box::new(stage);
        self
    }

    pub fn with_ccf_applicator(mut self, stage: impl CcfApplicator + 'static) -> Self {
        self.ccf = Box::new(stage);
        self
    }

    pub fn with_collateral_allocator(mut self, stage: impl CollateralAllocator + 'static) -> Self {
        self.collateral = Box::new(stage);
        self
    }

    pub fn with_guarantee_substitutor(mut self, stage: impl GuaranteeSubstitutor + 'static) -> Self {
        self.guarantees = Box::new(stage);
        self
    }

    /// Standard guarantee stage backed by a different capital formula.
    pub fn with_capital_formula(self, formula: impl CapitalFormula + 'static) -> Self {
        self.with_guarantee_substitutor(StandardGuaranteeSubstitution::new(Box::new(formula)))
    }

    /// Run the full waterfall over one request.
    pub fn run(
        &self,
        exposures: Vec<Exposure>,
        mitigants: &MitigantTables,
        config: &CrmConfig,
    ) -> CrmResult<ComputationOutput<CrmAdjustedBundle>> {
        let start = Instant::now();
        config.validate()?;
        config.validate_against(&exposures)?;

        info!(
            framework = %config.framework,
            exposures = exposures.len(),
            provisions = mitigants.provisions.len(),
            collateral = mitigants.collateral.len(),
            guarantees = mitigants.guarantees.len(),
            "starting CRM waterfall"
        );

        let mut batch_warnings: Vec<CrmWarning> = Vec::new();
        let provisions = canonical(
            &mitigants.provisions,
            |p| &p.provision_reference,
            "provision",
            &mut batch_warnings,
        );
        let collateral = canonical(
            &mitigants.collateral,
            |c| &c.collateral_reference,
            "collateral",
            &mut batch_warnings,
        );
        let guarantees = canonical(
            &mitigants.guarantees,
            |g| &g.guarantee_reference,
            "guarantee",
            &mut batch_warnings,
        );
        let guarantors = canonical(
            &mitigants.guarantors,
            |g| &g.counterparty_reference,
            "guarantor",
            &mut batch_warnings,
        );

        let mut records = prepare(exposures);
        let index = GroupIndex::build(&records)?;

        let out = self.provisions.resolve(&records, &index, &provisions, config)?;
        records = absorb("provisions", out, &index, &mut batch_warnings)?;

        let out = self.ccf.apply(&records, config)?;
        records = absorb("ccf", out, &index, &mut batch_warnings)?;

        let out = self.ead.initialize(&records, config)?;
        records = absorb("ead", out, &index, &mut batch_warnings)?;

        let out = self.collateral.allocate(&records, &index, &collateral, config)?;
        records = absorb("collateral", out, &index, &mut batch_warnings)?;

        let out = self
            .guarantees
            .substitute(&records, &index, &guarantees, &guarantors, config)?;
        records = absorb("guarantees", out, &index, &mut batch_warnings)?;

        let (bundle, warnings) = finalize::finalize(records, batch_warnings)?;

        info!(
            exposures = bundle.exposures.len(),
            warnings = warnings.len(),
            status = ?bundle.status,
            "CRM waterfall complete"
        );

        let methodology = format!(
            "Credit risk mitigation waterfall ({}, {:?} collateral method)",
            config.framework, config.collateral_method
        );
        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(&methodology, config, warnings, elapsed, bundle))
    }
}

/// Apply the CRM waterfall with the standard stages.
pub fn apply_crm(
    exposures: Vec<Exposure>,
    mitigants: &MitigantTables,
    config: &CrmConfig,
) -> CrmResult<ComputationOutput<CrmAdjustedBundle>> {
    CrmProcessor::new(config).run(exposures, mitigants, config)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Log and keep a warning.
pub(crate) fn record_warning(target: &mut Vec<CrmWarning>, warning: CrmWarning) {
    tracing::warn!(
        code = %warning.code,
        exposure = warning.exposure_reference.as_deref().unwrap_or("-"),
        "{}",
        warning.message
    );
    target.push(warning);
}

/// Reference-sorted copy with duplicate references dropped (first kept).
fn canonical<T: Clone>(
    items: &[T],
    key: impl Fn(&T) -> &String,
    kind: &str,
    warnings: &mut Vec<CrmWarning>,
) -> Vec<T> {
    let mut sorted: Vec<T> = items.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(key(b)));
    let mut out: Vec<T> = Vec::with_capacity(sorted.len());
    for item in sorted {
        if let Some(prev) = out.last() {
            if key(prev) == key(&item) {
                record_warning(
                    warnings,
                    CrmWarning::batch(
                        WarningCode::DuplicateMitigantReference,
                        format!("Duplicate {kind} reference {}; first occurrence kept", key(&item)),
                    ),
                );
                continue;
            }
        }
        out.push(item);
    }
    out
}

/// Sort exposures by reference and flag negative input amounts.
fn prepare(mut exposures: Vec<Exposure>) -> Vec<AdjustedExposure> {
    exposures.sort_by(|a, b| a.exposure_reference.cmp(&b.exposure_reference));
    exposures
        .into_iter()
        .map(|exp| {
            let negatives: Vec<&str> = [
                ("drawn_amount", exp.drawn_amount),
                ("nominal_amount", exp.nominal_amount),
                ("accrued_interest", exp.accrued_interest),
            ]
            .iter()
            .filter(|(_, v)| v.is_sign_negative() && !v.is_zero())
            .map(|(name, _)| *name)
            .collect();
            let reference = exp.exposure_reference.clone();
            let mut record = AdjustedExposure::from_exposure(exp);
            for field in negatives {
                record_warning(
                    &mut record.warnings,
                    CrmWarning::exposure(
                        WarningCode::NegativeAmount,
                        &reference,
                        format!("Negative {field} treated as zero"),
                    ),
                );
            }
            record
        })
        .collect()
}

/// Check a stage result against the index and collect its batch warnings.
fn absorb(
    stage: &str,
    out: StageOutput,
    index: &GroupIndex,
    batch_warnings: &mut Vec<CrmWarning>,
) -> CrmResult<Vec<AdjustedExposure>> {
    index.check_alignment(stage, &out.exposures)?;
    debug!(stage, warnings = out.warnings.len(), "stage complete");
    batch_warnings.extend(out.warnings);
    Ok(out.exposures)
}
