use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rwa_crm_core::crm::arena::GroupIndex;
use rwa_crm_core::crm::{
    CcfApplicator, EadInitializer, ProvisionResolver, StandardCcfApplicator,
    StandardEadInitializer, StandardProvisionResolver,
};
use rwa_crm_core::model::{
    AdjustedExposure, Approach, BeneficiaryLevel, Collateral, CollateralType, CrmAdjustedBundle,
    Exposure, ExposureClass, Guarantee, GuarantorEntityType, GuarantorProfile, GuarantorTreatment,
    MitigantTables, Provision, RiskCategory, RunStatus,
};
use rwa_crm_core::{apply_crm, CrmConfig, CrmError, Severity, WarningCode};

// ===========================================================================
// Fixtures
// ===========================================================================

fn reporting_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 31).unwrap()
}

fn crr() -> CrmConfig {
    CrmConfig::crr(reporting_date())
}

fn drawn(reference: &str, amount: Decimal) -> Exposure {
    let mut e = Exposure::new(reference, "CPTY-1");
    e.drawn_amount = amount;
    e
}

fn provision(reference: &str, target: &str, amount: Decimal) -> Provision {
    Provision {
        provision_reference: reference.into(),
        beneficiary_level: BeneficiaryLevel::Exposure,
        beneficiary_reference: target.into(),
        amount,
    }
}

fn guarantee(reference: &str, target: &str, guarantor: &str) -> Guarantee {
    Guarantee {
        guarantee_reference: reference.into(),
        beneficiary_level: BeneficiaryLevel::Exposure,
        protected_reference: target.into(),
        guarantor_reference: guarantor.into(),
        covered_amount: None,
        percentage_covered: None,
        currency: None,
        maturity_date: None,
    }
}

fn aaa_sovereign(reference: &str) -> GuarantorProfile {
    GuarantorProfile {
        counterparty_reference: reference.into(),
        entity_type: GuarantorEntityType::Sovereign,
        credit_quality_step: Some(1),
        internal_pd: None,
        exposure_class: None,
    }
}

fn run(exposures: Vec<Exposure>, mitigants: &MitigantTables, config: &CrmConfig) -> CrmAdjustedBundle {
    apply_crm(exposures, mitigants, config).unwrap().result
}

fn real_estate_against_one_million(market_value: Decimal) -> AdjustedExposure {
    let mitigants = MitigantTables {
        collateral: vec![Collateral::new(
            "RE-1",
            BeneficiaryLevel::Exposure,
            "E1",
            CollateralType::RealEstate,
            market_value,
        )],
        ..Default::default()
    };
    run(vec![drawn("E1", dec!(1_000_000))], &mitigants, &crr())
        .exposures
        .remove(0)
}

// ===========================================================================
// Worked scenarios
// ===========================================================================

#[test]
fn test_drawn_only_with_direct_provision() {
    let mitigants = MitigantTables {
        provisions: vec![provision("P1", "E1", dec!(1_000_000))],
        ..Default::default()
    };
    let bundle = run(vec![drawn("E1", dec!(10_000_000))], &mitigants, &crr());
    let e = bundle.get("E1").unwrap();

    assert_eq!(e.provision_on_drawn, dec!(1_000_000));
    assert_eq!(e.provision_on_nominal, dec!(0));
    assert_eq!(e.ead_pre_crm, dec!(9_000_000));
    assert_eq!(e.ead_post_crm, dec!(9_000_000));
    assert!(e.crm_calculation().contains("prov=1000000"));
    assert_eq!(bundle.status, RunStatus::Clean);
}

#[test]
fn test_off_balance_provision_before_ccf() {
    let mut e = Exposure::new("E1", "CPTY-1");
    e.nominal_amount = dec!(5_000_000);
    e.risk_category = RiskCategory::Medium;
    let mitigants = MitigantTables {
        provisions: vec![provision("P1", "E1", dec!(500_000))],
        ..Default::default()
    };
    let bundle = run(vec![e], &mitigants, &crr());
    let e = &bundle.exposures[0];

    assert_eq!(e.nominal_after_provision, dec!(4_500_000));
    assert_eq!(e.ccf_original, dec!(0.50));
    assert_eq!(e.ead_from_ccf, dec!(2_250_000));
    assert_eq!(e.ead_pre_crm, dec!(2_250_000));
}

#[test]
fn test_sovereign_bond_collateral() {
    let mut bond = Collateral::new(
        "C1",
        BeneficiaryLevel::Exposure,
        "E1",
        CollateralType::SovereignBond,
        dec!(8_000_000),
    );
    bond.issuer_credit_quality_step = Some(1);
    bond.residual_maturity_years = Some(dec!(3));
    let mitigants = MitigantTables {
        collateral: vec![bond],
        ..Default::default()
    };
    let bundle = run(vec![drawn("E1", dec!(10_000_000))], &mitigants, &crr());
    let e = &bundle.exposures[0];

    assert_eq!(e.collateral_allocations[0].haircut, dec!(0.02));
    assert_eq!(e.collateral_allocations[0].adjusted_value, dec!(7_840_000));
    assert_eq!(e.net_exposure_after_collateral, dec!(2_160_000));
    assert_eq!(e.ead_post_crm, dec!(2_160_000));
}

#[test]
fn test_full_sovereign_guarantee_zero_rwa() {
    let mut g = guarantee("G1", "E1", "HMT");
    g.covered_amount = Some(dec!(1_000_000));
    let mitigants = MitigantTables {
        guarantees: vec![g],
        guarantors: vec![aaa_sovereign("HMT")],
        ..Default::default()
    };
    let bundle = run(vec![drawn("E1", dec!(1_000_000))], &mitigants, &crr());
    let e = &bundle.exposures[0];

    assert_eq!(e.guaranteed_portion, dec!(1_000_000));
    assert_eq!(e.unguaranteed_portion, dec!(0));
    assert_eq!(e.obligor_risk_weight, Some(dec!(1.00)));
    assert_eq!(e.guarantor_treatment, GuarantorTreatment::Standardised);
    assert_eq!(e.guarantor_risk_weight_or_pd, Some(dec!(0)));
    assert_eq!(e.substitution_rwa(), Some(dec!(0)));
}

#[test]
fn test_real_estate_below_threshold_unsecured() {
    // 280,000 / 1.4 = 200,000, i.e. 20% of EAD.
    let e = real_estate_against_one_million(dec!(280_000));

    assert_eq!(e.collateral_value_effective, dec!(0));
    assert!(!e.collateral_allocations[0].eligible);
    assert_eq!(e.net_exposure_after_collateral, dec!(1_000_000));
    assert_eq!(e.substitution_rwa(), Some(dec!(1_000_000)));
    assert_eq!(e.warnings[0].code, WarningCode::MinimumCoverageNotMet);
    assert_eq!(e.warnings[0].severity, Severity::Info);
}

#[test]
fn test_cross_approach_substitution() {
    let mut e = Exposure::new("E1", "CPTY-1");
    e.approach = Approach::FoundationIrb;
    e.drawn_amount = dec!(2_000_000);
    e.nominal_amount = dec!(8_000_000);
    e.risk_category = RiskCategory::Medium;
    e.probability_of_default = Some(dec!(0.01));
    let mut g = guarantee("G1", "E1", "HMT");
    g.percentage_covered = Some(dec!(0.6));
    let mitigants = MitigantTables {
        guarantees: vec![g],
        guarantors: vec![aaa_sovereign("HMT")],
        ..Default::default()
    };
    let config = crr().with_irb_permissions(&[ExposureClass::Corporate]);
    let bundle = run(vec![e], &mitigants, &config);
    let e = &bundle.exposures[0];

    assert_eq!(e.ccf_original, dec!(0.75));
    assert_eq!(e.ead_pre_crm, dec!(8_000_000));
    assert_eq!(e.ead_guaranteed, dec!(3_600_000));
    assert_eq!(e.ead_unguaranteed, dec!(3_200_000));
    assert_eq!(e.ead_post_crm, dec!(6_800_000));
    assert_eq!(e.ccf_guaranteed, dec!(0.50));
    assert_eq!(e.ccf_unguaranteed, dec!(0.75));
    assert_eq!(e.substitution_rwa(), None);
    assert_eq!(bundle.irb().len(), 1);
}

#[test]
fn test_foundation_irb_collateral_reduces_lgd_and_keeps_ead() {
    let mut e = drawn("E1", dec!(1000));
    e.approach = Approach::FoundationIrb;
    e.probability_of_default = Some(dec!(0.01));
    let mitigants = MitigantTables {
        collateral: vec![Collateral::new(
            "C1",
            BeneficiaryLevel::Exposure,
            "E1",
            CollateralType::Cash,
            dec!(600),
        )],
        ..Default::default()
    };
    let config = crr().with_irb_permissions(&[ExposureClass::Corporate]);
    let bundle = run(vec![e], &mitigants, &config);
    let e = &bundle.exposures[0];

    assert_eq!(e.ead_pre_crm, dec!(1000));
    assert_eq!(e.ead_post_crm, dec!(1000));
    assert_eq!(e.collateral_financial, dec!(600));
    assert_eq!(e.lgd_pre_crm, Some(dec!(0.45)));
    assert_eq!(e.lgd_post_crm, Some(dec!(0.18)));
}

// ===========================================================================
// Boundaries
// ===========================================================================

#[test]
fn test_real_estate_coverage_exactly_thirty_percent_retained() {
    // 420,000 / 1.4 = 300,000
    let e = real_estate_against_one_million(dec!(420_000));
    assert!(e.collateral_allocations[0].eligible);
    assert_eq!(e.collateral_real_estate, dec!(300_000));
    assert_eq!(e.net_exposure_after_collateral, dec!(700_000));
}

#[test]
fn test_real_estate_coverage_just_below_thirty_percent_zeroed() {
    // 419,986 / 1.4 = 299,990, i.e. 29.999%
    let e = real_estate_against_one_million(dec!(419_986));
    assert!(!e.collateral_allocations[0].eligible);
    assert_eq!(e.collateral_real_estate, dec!(0));
    assert_eq!(e.net_exposure_after_collateral, dec!(1_000_000));
}

#[test]
fn test_guarantee_maturity_equal_to_exposure() {
    let mut e = drawn("E1", dec!(1_000_000));
    e.maturity_years = dec!(2);
    let mut g = guarantee("G1", "E1", "HMT");
    g.covered_amount = Some(dec!(500_000));
    g.maturity_date = NaiveDate::from_ymd_opt(2028, 12, 30);
    let mitigants = MitigantTables {
        guarantees: vec![g],
        guarantors: vec![aaa_sovereign("HMT")],
        ..Default::default()
    };
    let bundle = run(vec![e], &mitigants, &crr());
    let e = &bundle.exposures[0];

    assert_eq!(e.guarantee_applications[0].maturity_adjustment, dec!(1));
    assert_eq!(e.guaranteed_portion, dec!(500_000));
    assert!(e.warnings.is_empty());
}

// ===========================================================================
// Waterfall properties
// ===========================================================================

#[test]
fn test_ccf_before_provisions_differs() {
    let mut e = Exposure::new("E1", "CPTY-1");
    e.nominal_amount = dec!(5_000_000);
    e.risk_category = RiskCategory::Medium;
    let provisions = vec![provision("P1", "E1", dec!(500_000))];
    let config = crr();

    let correct = run(
        vec![e.clone()],
        &MitigantTables {
            provisions: provisions.clone(),
            ..Default::default()
        },
        &config,
    );

    let records = vec![AdjustedExposure::from_exposure(e)];
    let index = GroupIndex::build(&records).unwrap();
    let converted = StandardCcfApplicator.apply(&records, &config).unwrap();
    let provisioned = StandardProvisionResolver
        .resolve(&converted.exposures, &index, &provisions, &config)
        .unwrap();
    let wrong = StandardEadInitializer
        .initialize(&provisioned.exposures, &config)
        .unwrap();

    assert_eq!(correct.exposures[0].ead_pre_crm, dec!(2_250_000));
    assert_eq!(wrong.exposures[0].ead_pre_crm, dec!(2_500_000));
}

#[test]
fn test_rerun_on_classified_output_is_idempotent() {
    let mut cash = Collateral::new("C1", BeneficiaryLevel::Counterparty, "CPTY-1", CollateralType::Cash, dec!(300));
    cash.currency = rwa_crm_core::Currency::USD;
    let mitigants = MitigantTables {
        provisions: vec![provision("P1", "E1", dec!(50))],
        collateral: vec![cash],
        ..Default::default()
    };
    let config = crr();
    let first = run(vec![drawn("E1", dec!(1000)), drawn("E2", dec!(500))], &mitigants, &config);
    let eads: Vec<Decimal> = first.exposures.iter().map(|e| e.ead_post_crm).collect();

    let second = run(first.into_classified(), &mitigants, &config);
    let rerun: Vec<Decimal> = second.exposures.iter().map(|e| e.ead_post_crm).collect();
    assert_eq!(eads, rerun);
}

#[test]
fn test_input_order_and_parallelism_do_not_change_output() {
    let exposures: Vec<Exposure> = (0..40)
        .map(|i| {
            let mut e = drawn(&format!("E{i:03}"), Decimal::from(1000 + i * 37));
            e.facility_reference = Some(format!("F{}", i % 3));
            e
        })
        .collect();
    let mitigants = MitigantTables {
        provisions: vec![Provision {
            provision_reference: "P-F0".into(),
            beneficiary_level: BeneficiaryLevel::Facility,
            beneficiary_reference: "F0".into(),
            amount: dec!(1234.5678),
        }],
        collateral: vec![Collateral::new(
            "C-F1",
            BeneficiaryLevel::Facility,
            "F1",
            CollateralType::Cash,
            dec!(9876.54321),
        )],
        ..Default::default()
    };

    let sequential = run(exposures.clone(), &mitigants, &crr());
    let mut reversed = exposures;
    reversed.reverse();
    let mut config = crr();
    config.parallel_threshold = 1;
    let parallel = run(reversed, &mitigants, &config);

    assert_eq!(sequential, parallel);
    let pooled: Decimal = sequential.exposures.iter().map(|e| e.provision_allocated).sum();
    assert_eq!(pooled, dec!(1234.5678));
}

// ===========================================================================
// Errors and reporting
// ===========================================================================

#[test]
fn test_duplicate_exposure_aborts() {
    let result = apply_crm(
        vec![drawn("E1", dec!(10)), drawn("E1", dec!(20))],
        &MitigantTables::default(),
        &crr(),
    );
    assert!(matches!(result, Err(CrmError::InvalidInput { .. })));
}

#[test]
fn test_irb_without_permission_is_configuration_error() {
    let mut e = drawn("E1", dec!(10));
    e.approach = Approach::FoundationIrb;
    let result = apply_crm(vec![e], &MitigantTables::default(), &crr());
    assert!(matches!(result, Err(CrmError::InvalidConfiguration { .. })));
}

#[test]
fn test_data_quality_issues_are_warnings() {
    let mitigants = MitigantTables {
        provisions: vec![
            provision("P1", "NOPE", dec!(10)),
            provision("P1", "E1", dec!(10)),
        ],
        ..Default::default()
    };
    let output = apply_crm(vec![drawn("E1", dec!(100))], &mitigants, &crr()).unwrap();
    let codes: Vec<WarningCode> = output.warnings.iter().map(|w| w.code).collect();

    assert_eq!(output.result.status, RunStatus::ProcessedWithWarnings);
    assert!(codes.contains(&WarningCode::DuplicateMitigantReference));
    // First occurrence in reference order is kept; it does not match.
    assert!(codes.contains(&WarningCode::UnmatchedProvision));
    assert_eq!(output.result.exposures[0].ead_post_crm, dec!(100));
}

#[test]
fn test_output_serializes_with_metadata() {
    let output = apply_crm(vec![drawn("E1", dec!(100))], &MitigantTables::default(), &crr()).unwrap();
    let json = serde_json::to_value(&output).unwrap();

    assert!(output.methodology.contains("CRR"));
    assert_eq!(json["result"]["status"], "clean");
    assert_eq!(json["result"]["exposures"][0]["exposure_reference"], "E1");
    assert_eq!(json["result"]["exposures"][0]["guarantor_treatment"], "none");
    assert_eq!(json["assumptions"]["framework"], "crr");
}
