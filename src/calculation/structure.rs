//! Compensation structure resolution.
//!
//! This module turns an annual cost-to-company figure into a complete,
//! reconciled [`Breakdown`]. Every step is rounded to currency precision
//! and recorded in the breakdown's audit trace.
//!
//! The special allowance is the balancing earning: it absorbs whatever is
//! left of CTC after fixed earnings and employer benefits, computed on
//! annual figures so that the breakdown reconciles exactly.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::warn;

use crate::config::{CompensationDefaults, check_amount, check_fraction};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Amount, AuditStep, AuditTrace, AuditWarning, Breakdown, BreakdownTotals, CalculationKind,
    ComponentLine, EarningRule, RuleKind, StructureOverrides, codes,
};

use super::formula::FormulaResolver;
use super::{mul_round, round_currency};

/// Warning code recorded when a breakdown drifts from its CTC.
pub const RECONCILIATION_WARNING: &str = "CTC_RECONCILIATION";

/// Applies overrides on top of the configured defaults.
///
/// Fields the overrides leave as `None` keep their default. Fixed
/// allowances are replaced as a whole when overridden.
pub fn effective_settings(
    overrides: &StructureOverrides,
    defaults: &CompensationDefaults,
) -> CompensationDefaults {
    let mut settings = defaults.clone();
    if let Some(v) = overrides.basic_fraction {
        settings.basic_fraction = v;
    }
    if let Some(v) = overrides.hra_fraction {
        settings.hra_fraction = v;
    }
    if let Some(v) = &overrides.fixed_allowances {
        settings.fixed_allowances = v.clone();
    }
    if let Some(v) = overrides.employer_pf_fraction {
        settings.employer_pf_fraction = v;
    }
    if let Some(v) = overrides.employee_pf_fraction {
        settings.employee_pf_fraction = v;
    }
    if overrides.pf_wage_cap.is_some() {
        settings.pf_wage_cap = overrides.pf_wage_cap;
    }
    if let Some(v) = overrides.gratuity_fraction {
        settings.gratuity_fraction = v;
    }
    if let Some(v) = overrides.insurance_monthly {
        settings.insurance_monthly = v;
    }
    if let Some(v) = overrides.professional_tax {
        settings.professional_tax = v;
    }
    if let Some(v) = overrides.esi_enabled {
        settings.esi.enabled = v;
    }
    settings
}

/// Resolves a breakdown using only the built-in defaults.
pub fn resolve_with_defaults(annual_ctc: Decimal) -> EngineResult<Breakdown> {
    resolve(
        annual_ctc,
        &StructureOverrides::default(),
        &CompensationDefaults::default(),
    )
}

/// Resolves the full compensation breakdown for an annual CTC.
///
/// Resolution order:
/// 1. Monthly CTC
/// 2. Basic as a fraction of monthly CTC
/// 3. HRA as a fraction of basic
/// 4. Fixed allowances, then additional template earnings
/// 5. Employer benefits (PF, gratuity, insurance, ESI)
/// 6. Special allowance, balancing the annual totals against CTC
/// 7. Employee deductions (PF, professional tax, ESI)
/// 8. Totals and the reconciliation check
///
/// # Errors
///
/// - `Validation` if the CTC or any setting is out of range
/// - `InsufficientCtc` if fixed earnings and benefits exceed CTC
/// - Formula errors from additional earnings
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::resolve_with_defaults;
/// use payroll_engine::models::codes;
/// use rust_decimal_macros::dec;
///
/// let breakdown = resolve_with_defaults(dec!(600000)).unwrap();
/// assert_eq!(breakdown.earning(codes::BASIC).unwrap().amount.monthly, dec!(20000));
/// assert_eq!(breakdown.totals.net_pay.monthly, dec!(44238));
/// assert_eq!(breakdown.totals.calculated_ctc, dec!(600000));
/// ```
pub fn resolve(
    annual_ctc: Decimal,
    overrides: &StructureOverrides,
    defaults: &CompensationDefaults,
) -> EngineResult<Breakdown> {
    let settings = effective_settings(overrides, defaults);
    validate(annual_ctc, &settings, &overrides.additional_earnings)?;

    let annual_ctc = round_currency(annual_ctc);
    let mut trace = TraceBuilder::default();

    // Step 1: monthly CTC
    let monthly_ctc = round_currency(annual_ctc / Decimal::from(12));
    trace.step(
        "monthly_ctc",
        "Monthly CTC",
        serde_json::json!({ "annual_ctc": annual_ctc.to_string() }),
        serde_json::json!({ "monthly_ctc": monthly_ctc.to_string() }),
        format!("{} / 12 = {}", annual_ctc, monthly_ctc),
    );

    // Step 2-3: basic and HRA
    let basic = mul_round(monthly_ctc, settings.basic_fraction);
    trace.step(
        "basic",
        "Basic Salary",
        serde_json::json!({
            "monthly_ctc": monthly_ctc.to_string(),
            "basic_fraction": settings.basic_fraction.to_string()
        }),
        serde_json::json!({ "basic": basic.to_string() }),
        format!(
            "{} x {} = {}",
            monthly_ctc, settings.basic_fraction, basic
        ),
    );

    let hra = mul_round(basic, settings.hra_fraction);
    trace.step(
        "hra",
        "House Rent Allowance",
        serde_json::json!({
            "basic": basic.to_string(),
            "hra_fraction": settings.hra_fraction.to_string()
        }),
        serde_json::json!({ "hra": hra.to_string() }),
        format!("{} x {} = {}", basic, settings.hra_fraction, hra),
    );

    let mut earnings = vec![
        ComponentLine {
            code: codes::BASIC.to_string(),
            name: "Basic Salary".to_string(),
            calculation: CalculationKind::PercentOfCtc {
                fraction: settings.basic_fraction,
            },
            amount: Amount::from_monthly(basic),
            formula: Some(format!("MONTHLY_CTC * {}", settings.basic_fraction)),
            resolved: true,
            prorated: true,
        },
        ComponentLine {
            code: codes::HRA.to_string(),
            name: "House Rent Allowance".to_string(),
            calculation: CalculationKind::PercentOfBasic {
                fraction: settings.hra_fraction,
            },
            amount: Amount::from_monthly(hra),
            formula: Some(format!("BASIC * {}", settings.hra_fraction)),
            resolved: true,
            prorated: settings.prorate_hra,
        },
    ];

    // Step 4: fixed allowances and additional earnings
    let mut included = Vec::new();
    let mut omitted = Vec::new();
    for allowance in &settings.fixed_allowances {
        let monthly = round_currency(allowance.monthly);
        if monthly.is_zero() && !allowance.required {
            omitted.push(allowance.code.clone());
            continue;
        }
        included.push(serde_json::json!({
            "code": allowance.code,
            "monthly": monthly.to_string()
        }));
        earnings.push(ComponentLine {
            code: allowance.code.clone(),
            name: allowance.name.clone(),
            calculation: CalculationKind::Flat,
            amount: monthly_amount(&allowance.code, monthly)?,
            formula: None,
            resolved: true,
            prorated: allowance.prorated,
        });
    }
    let reasoning = format!(
        "{} fixed allowance(s) included, {} zero-valued omitted",
        included.len(),
        omitted.len()
    );
    trace.step(
        "fixed_allowances",
        "Fixed Allowances",
        serde_json::json!({ "configured": settings.fixed_allowances.len() }),
        serde_json::json!({ "included": included, "omitted": omitted }),
        reasoning,
    );

    if !overrides.additional_earnings.is_empty() {
        let lines = resolve_additional_earnings(
            &overrides.additional_earnings,
            annual_ctc,
            monthly_ctc,
            basic,
            hra,
            settings.max_annual_ctc,
        )?;
        trace.step(
            "additional_earnings",
            "Additional Earnings",
            serde_json::json!({
                "rules": overrides
                    .additional_earnings
                    .iter()
                    .map(|r| r.code.clone())
                    .collect::<Vec<_>>()
            }),
            serde_json::json!(
                lines
                    .iter()
                    .map(|l| serde_json::json!({
                        "code": l.code,
                        "monthly": l.amount.monthly.to_string()
                    }))
                    .collect::<Vec<_>>()
            ),
            format!("{} additional earning(s) resolved", lines.len()),
        );
        earnings.extend(lines);
    }

    // Step 5: employer benefits
    let pf_basis = settings
        .pf_wage_cap
        .map(|cap| basic.min(round_currency(cap)))
        .unwrap_or(basic);
    let pf_basis_expr = match settings.pf_wage_cap {
        Some(cap) => format!("min(BASIC, {})", cap),
        None => "BASIC".to_string(),
    };
    let employer_pf = mul_round(pf_basis, settings.employer_pf_fraction);
    let gratuity = mul_round(basic, settings.gratuity_fraction);
    let insurance = round_currency(settings.insurance_monthly);

    let mut benefits = vec![
        ComponentLine {
            code: codes::EMPLOYER_PF.to_string(),
            name: "Employer PF Contribution".to_string(),
            calculation: CalculationKind::PercentOfBasic {
                fraction: settings.employer_pf_fraction,
            },
            amount: Amount::from_monthly(employer_pf),
            formula: Some(format!("{} * {}", pf_basis_expr, settings.employer_pf_fraction)),
            resolved: true,
            prorated: false,
        },
        ComponentLine {
            code: codes::GRATUITY.to_string(),
            name: "Gratuity".to_string(),
            calculation: CalculationKind::PercentOfBasic {
                fraction: settings.gratuity_fraction,
            },
            amount: Amount::from_monthly(gratuity),
            formula: Some(format!("BASIC * {}", settings.gratuity_fraction)),
            resolved: true,
            prorated: false,
        },
    ];
    if insurance > Decimal::ZERO {
        benefits.push(ComponentLine {
            code: codes::INSURANCE.to_string(),
            name: "Group Insurance".to_string(),
            calculation: CalculationKind::Flat,
            amount: monthly_amount(codes::INSURANCE, insurance)?,
            formula: None,
            resolved: true,
            prorated: false,
        });
    }
    trace.step(
        "employer_benefits",
        "Employer Benefits",
        serde_json::json!({
            "basic": basic.to_string(),
            "pf_wage_cap": settings.pf_wage_cap.map(|c| c.to_string()),
            "employer_pf_fraction": settings.employer_pf_fraction.to_string(),
            "gratuity_fraction": settings.gratuity_fraction.to_string()
        }),
        serde_json::json!({
            "pf_basis": pf_basis.to_string(),
            "employer_pf": employer_pf.to_string(),
            "gratuity": gratuity.to_string(),
            "insurance": insurance.to_string()
        }),
        format!(
            "Employer PF {} on PF wage {}, gratuity {}, insurance {}",
            employer_pf, pf_basis, gratuity, insurance
        ),
    );

    let esi = &settings.esi;
    let provisional_gross = round_currency(
        (monthly_ctc - employer_pf - gratuity - insurance) / (Decimal::ONE + esi.employer_fraction),
    );
    let esi_applies = esi.enabled
        && provisional_gross > Decimal::ZERO
        && provisional_gross <= esi.wage_ceiling;
    if esi_applies {
        let employer_esi = mul_round(provisional_gross, esi.employer_fraction);
        benefits.push(ComponentLine {
            code: codes::EMPLOYER_ESI.to_string(),
            name: "Employer ESI Contribution".to_string(),
            calculation: CalculationKind::Formula,
            amount: Amount::from_monthly(employer_esi),
            formula: Some(format!("GROSS * {}", esi.employer_fraction)),
            resolved: true,
            prorated: false,
        });
    }
    trace.step(
        "employer_esi",
        "Employer ESI",
        serde_json::json!({
            "enabled": esi.enabled,
            "provisional_gross": provisional_gross.to_string(),
            "wage_ceiling": esi.wage_ceiling.to_string()
        }),
        serde_json::json!({ "applies": esi_applies }),
        if !esi.enabled {
            "ESI disabled".to_string()
        } else if esi_applies {
            format!(
                "Provisional gross {} is within the ESI ceiling {}",
                provisional_gross, esi.wage_ceiling
            )
        } else {
            format!(
                "Provisional gross {} exceeds the ESI ceiling {}",
                provisional_gross, esi.wage_ceiling
            )
        },
    );

    // Step 6: special allowance balances the annual figures
    let special_overflow = || overflow(codes::SPECIAL_ALLOWANCE);
    let fixed_annual = Amount::checked_sum(earnings.iter().map(|l| &l.amount))
        .ok_or_else(special_overflow)?
        .annual;
    let benefits_annual = Amount::checked_sum(benefits.iter().map(|l| &l.amount))
        .ok_or_else(special_overflow)?
        .annual;
    let special_annual = annual_ctc
        .checked_sub(fixed_annual)
        .and_then(|v| v.checked_sub(benefits_annual))
        .ok_or_else(special_overflow)?;
    if special_annual < Decimal::ZERO {
        return Err(EngineError::InsufficientCtc {
            annual_ctc,
            shortfall: -special_annual,
        });
    }
    let special = Amount::from_annual(special_annual);
    trace.step(
        "special_allowance",
        "Special Allowance",
        serde_json::json!({
            "annual_ctc": annual_ctc.to_string(),
            "fixed_earnings_annual": fixed_annual.to_string(),
            "benefits_annual": benefits_annual.to_string()
        }),
        serde_json::json!({
            "annual": special.annual.to_string(),
            "monthly": special.monthly.to_string()
        }),
        format!(
            "{} - {} - {} = {} annually",
            annual_ctc, fixed_annual, benefits_annual, special.annual
        ),
    );
    earnings.push(ComponentLine {
        code: codes::SPECIAL_ALLOWANCE.to_string(),
        name: "Special Allowance".to_string(),
        calculation: CalculationKind::Balancing,
        amount: special,
        formula: Some("CTC - (EARNINGS + BENEFITS)".to_string()),
        resolved: true,
        prorated: settings.prorate_special_allowance,
    });

    // Step 7: employee deductions
    let gross_monthly = Amount::sum(earnings.iter().map(|l| &l.amount)).monthly;
    let employee_pf = mul_round(pf_basis, settings.employee_pf_fraction);
    let professional_tax = round_currency(settings.professional_tax);

    let mut deductions = vec![ComponentLine {
        code: codes::EMPLOYEE_PF.to_string(),
        name: "Employee PF Contribution".to_string(),
        calculation: CalculationKind::PercentOfBasic {
            fraction: settings.employee_pf_fraction,
        },
        amount: Amount::from_monthly(employee_pf),
        formula: Some(format!("{} * {}", pf_basis_expr, settings.employee_pf_fraction)),
        resolved: true,
        prorated: false,
    }];
    if professional_tax > Decimal::ZERO {
        deductions.push(ComponentLine {
            code: codes::PROFESSIONAL_TAX.to_string(),
            name: "Professional Tax".to_string(),
            calculation: CalculationKind::Flat,
            amount: monthly_amount(codes::PROFESSIONAL_TAX, professional_tax)?,
            formula: None,
            resolved: true,
            prorated: false,
        });
    }
    let employee_esi = if esi_applies {
        let amount = mul_round(gross_monthly, esi.employee_fraction);
        deductions.push(ComponentLine {
            code: codes::EMPLOYEE_ESI.to_string(),
            name: "Employee ESI Contribution".to_string(),
            calculation: CalculationKind::Formula,
            amount: Amount::from_monthly(amount),
            formula: Some(format!("GROSS * {}", esi.employee_fraction)),
            resolved: true,
            prorated: false,
        });
        amount
    } else {
        Decimal::ZERO
    };
    trace.step(
        "employee_deductions",
        "Employee Deductions",
        serde_json::json!({
            "pf_basis": pf_basis.to_string(),
            "employee_pf_fraction": settings.employee_pf_fraction.to_string(),
            "gross": gross_monthly.to_string()
        }),
        serde_json::json!({
            "employee_pf": employee_pf.to_string(),
            "professional_tax": professional_tax.to_string(),
            "employee_esi": employee_esi.to_string()
        }),
        format!(
            "Employee PF {}, professional tax {}, ESI {}",
            employee_pf, professional_tax, employee_esi
        ),
    );

    // Step 8: totals and reconciliation
    let totals = BreakdownTotals::from_lines(&earnings, &benefits, &deductions);
    let difference = totals.calculated_ctc - annual_ctc;
    trace.step(
        "totals",
        "Totals & Reconciliation",
        serde_json::json!({ "annual_ctc": annual_ctc.to_string() }),
        serde_json::json!({
            "gross_a": totals.gross_a.monthly.to_string(),
            "gross_b": totals.gross_b.monthly.to_string(),
            "gross_c": totals.gross_c.monthly.to_string(),
            "net_pay": totals.net_pay.monthly.to_string(),
            "calculated_ctc": totals.calculated_ctc.to_string(),
            "difference": difference.to_string()
        }),
        format!(
            "Calculated CTC {} against {} (difference {})",
            totals.calculated_ctc, annual_ctc, difference
        ),
    );

    let mut audit_trace = trace.finish();
    if difference.abs() > settings.reconciliation_tolerance {
        warn!(
            annual_ctc = %annual_ctc,
            calculated_ctc = %totals.calculated_ctc,
            difference = %difference,
            "Breakdown does not reconcile with CTC"
        );
        audit_trace.warnings.push(AuditWarning {
            code: RECONCILIATION_WARNING.to_string(),
            message: format!(
                "Calculated CTC {} differs from {} by {}",
                totals.calculated_ctc, annual_ctc, difference
            ),
            severity: "high".to_string(),
        });
    }

    Ok(Breakdown {
        annual_ctc,
        monthly_ctc,
        earnings,
        employer_benefits: benefits,
        employee_deductions: deductions,
        totals,
        audit_trace,
    })
}

fn validate(
    annual_ctc: Decimal,
    settings: &CompensationDefaults,
    rules: &[EarningRule],
) -> EngineResult<()> {
    if annual_ctc <= Decimal::ZERO {
        return Err(EngineError::validation(
            "annual_ctc",
            "must be greater than zero",
        ));
    }
    if annual_ctc > settings.max_annual_ctc {
        return Err(EngineError::validation(
            "annual_ctc",
            format!("must not exceed {}", settings.max_annual_ctc),
        ));
    }
    settings.validate()?;

    let mut seen: HashSet<&str> = HashSet::new();
    for allowance in &settings.fixed_allowances {
        if allowance.code.trim().is_empty() {
            return Err(EngineError::validation(
                "fixed_allowances",
                "allowance code must not be empty",
            ));
        }
        if !seen.insert(allowance.code.as_str()) {
            return Err(EngineError::validation(
                "fixed_allowances",
                format!("duplicate component code '{}'", allowance.code),
            ));
        }
    }

    let reserved = [
        "CTC",
        "MONTHLY_CTC",
        codes::BASIC,
        codes::HRA,
        codes::SPECIAL_ALLOWANCE,
    ];
    for rule in rules {
        let field = format!("additional_earnings.{}", rule.code);
        if rule.code.trim().is_empty() {
            return Err(EngineError::validation(
                "additional_earnings",
                "rule code must not be empty",
            ));
        }
        if reserved.contains(&rule.code.as_str()) || !seen.insert(rule.code.as_str()) {
            return Err(EngineError::validation(
                "additional_earnings",
                format!("duplicate component code '{}'", rule.code),
            ));
        }
        match &rule.kind {
            RuleKind::Flat { monthly } => check_amount(&field, *monthly, settings.max_annual_ctc)?,
            RuleKind::PercentOfBasic { fraction } | RuleKind::PercentOfCtc { fraction } => {
                check_fraction(&field, *fraction)?
            }
            RuleKind::Formula { .. } => {}
        }
    }
    Ok(())
}

fn monthly_amount(code: &str, monthly: Decimal) -> EngineResult<Amount> {
    Amount::checked_from_monthly(monthly).ok_or_else(|| overflow(code))
}

fn overflow(code: &str) -> EngineError {
    EngineError::InvalidResult {
        code: code.to_string(),
        reason: "arithmetic overflow".to_string(),
    }
}

fn resolve_additional_earnings(
    rules: &[EarningRule],
    annual_ctc: Decimal,
    monthly_ctc: Decimal,
    basic: Decimal,
    hra: Decimal,
    max_amount: Decimal,
) -> EngineResult<Vec<ComponentLine>> {
    let mut context: HashMap<String, Decimal> = HashMap::from([
        ("CTC".to_string(), annual_ctc),
        ("MONTHLY_CTC".to_string(), monthly_ctc),
        (codes::BASIC.to_string(), basic),
        (codes::HRA.to_string(), hra),
    ]);

    // Non-formula rules first so formulas can reference them.
    let mut formulas = Vec::new();
    for rule in rules {
        let value = match &rule.kind {
            RuleKind::Flat { monthly } => round_currency(*monthly),
            RuleKind::PercentOfBasic { fraction } => mul_round(basic, *fraction),
            RuleKind::PercentOfCtc { fraction } => mul_round(monthly_ctc, *fraction),
            RuleKind::Formula { expression } => {
                formulas.push((rule.code.clone(), expression.clone()));
                continue;
            }
        };
        context.insert(rule.code.clone(), value);
    }

    let formula_values = FormulaResolver::new(formulas)?.evaluate_all(&context)?;

    let mut lines = Vec::new();
    for rule in rules {
        let (calculation, formula) = match &rule.kind {
            RuleKind::Flat { .. } => (CalculationKind::Flat, None),
            RuleKind::PercentOfBasic { fraction } => (
                CalculationKind::PercentOfBasic {
                    fraction: *fraction,
                },
                Some(format!("BASIC * {}", fraction)),
            ),
            RuleKind::PercentOfCtc { fraction } => (
                CalculationKind::PercentOfCtc {
                    fraction: *fraction,
                },
                Some(format!("MONTHLY_CTC * {}", fraction)),
            ),
            RuleKind::Formula { expression } => {
                (CalculationKind::Formula, Some(expression.clone()))
            }
        };
        let value = context
            .get(&rule.code)
            .or_else(|| formula_values.get(&rule.code))
            .copied()
            .ok_or_else(|| EngineError::UnknownComponent {
                name: rule.code.clone(),
                referenced_by: "additional_earnings".to_string(),
            })?;
        if value.is_zero() {
            continue;
        }
        if value > max_amount {
            return Err(EngineError::InvalidResult {
                code: rule.code.clone(),
                reason: format!("amount {} exceeds {}", value, max_amount),
            });
        }
        lines.push(ComponentLine {
            code: rule.code.clone(),
            name: rule.name.clone(),
            calculation,
            amount: monthly_amount(&rule.code, value)?,
            formula,
            resolved: true,
            prorated: rule.prorated,
        });
    }
    Ok(lines)
}

#[derive(Default)]
struct TraceBuilder {
    steps: Vec<AuditStep>,
}

impl TraceBuilder {
    fn step(
        &mut self,
        rule_id: &str,
        rule_name: &str,
        input: serde_json::Value,
        output: serde_json::Value,
        reasoning: String,
    ) {
        let step_number = self.steps.len() as u32 + 1;
        self.steps.push(AuditStep {
            step_number,
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            input,
            output,
            reasoning,
        });
    }

    fn finish(self) -> AuditTrace {
        AuditTrace {
            steps: self.steps,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixedAllowance;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn monthly(lines: &[ComponentLine], code: &str) -> Decimal {
        lines
            .iter()
            .find(|l| l.code == code)
            .map(|l| l.amount.monthly)
            .unwrap_or_else(|| panic!("missing component {}", code))
    }

    // ==========================================================================
    // Reference scenarios
    // ==========================================================================

    #[test]
    fn test_resolve_600000_matches_reference_structure() {
        let b = resolve_with_defaults(dec("600000")).unwrap();

        assert_eq!(b.monthly_ctc, dec("50000"));
        assert_eq!(monthly(&b.earnings, codes::BASIC), dec("20000"));
        assert_eq!(monthly(&b.earnings, codes::HRA), dec("8000"));
        assert_eq!(monthly(&b.earnings, "CONVEYANCE"), dec("1600"));
        assert_eq!(monthly(&b.earnings, "MEDICAL"), dec("1250"));
        assert_eq!(monthly(&b.earnings, "EDUCATION"), dec("100"));
        assert_eq!(monthly(&b.earnings, codes::SPECIAL_ALLOWANCE), dec("15888"));
        assert_eq!(monthly(&b.employer_benefits, codes::EMPLOYER_PF), dec("2200"));
        assert_eq!(monthly(&b.employer_benefits, codes::GRATUITY), dec("962"));
        assert_eq!(monthly(&b.employee_deductions, codes::EMPLOYEE_PF), dec("2400"));
        assert_eq!(
            monthly(&b.employee_deductions, codes::PROFESSIONAL_TAX),
            dec("200")
        );
        assert_eq!(b.totals.net_pay.monthly, dec("44238"));
        assert_eq!(b.totals.calculated_ctc, dec("600000"));
        assert!(b.benefit(codes::EMPLOYER_ESI).is_none());
        assert!(b.audit_trace.warnings.is_empty());
    }

    #[test]
    fn test_resolve_600000_gross_tiers() {
        let b = resolve_with_defaults(dec("600000")).unwrap();
        assert_eq!(b.totals.gross_a.monthly, dec("46838"));
        assert_eq!(b.totals.gross_b.monthly, dec("47800"));
        assert_eq!(b.totals.gross_c.monthly, dec("50000"));
    }

    #[test]
    fn test_resolve_100000_is_insufficient() {
        match resolve_with_defaults(dec("100000")) {
            Err(EngineError::InsufficientCtc {
                annual_ctc,
                shortfall,
            }) => {
                assert_eq!(annual_ctc, dec("100000"));
                assert_eq!(shortfall, dec("672.56"));
            }
            other => panic!("Expected InsufficientCtc, got {:?}", other),
        }
    }

    #[test]
    fn test_esi_applies_below_ceiling() {
        let b = resolve_with_defaults(dec("240000")).unwrap();
        // monthly 20000, PF 880, gratuity 384.80
        // provisional gross = 18735.20 / 1.0325 = 18145.47
        assert_eq!(monthly(&b.employer_benefits, codes::EMPLOYER_ESI), dec("589.73"));
        let gross = b.totals.gross_a.monthly;
        assert_eq!(
            monthly(&b.employee_deductions, codes::EMPLOYEE_ESI),
            mul_round(gross, dec("0.0075"))
        );
        assert!(b.is_reconciled(Decimal::ONE));
    }

    #[test]
    fn test_esi_can_be_disabled_by_override() {
        let overrides = StructureOverrides {
            esi_enabled: Some(false),
            ..StructureOverrides::default()
        };
        let b = resolve(dec("240000"), &overrides, &CompensationDefaults::default()).unwrap();
        assert!(b.benefit(codes::EMPLOYER_ESI).is_none());
        assert!(b.deduction(codes::EMPLOYEE_ESI).is_none());
    }

    #[test]
    fn test_esi_disabled_makes_100000_resolvable() {
        let overrides = StructureOverrides {
            esi_enabled: Some(false),
            ..StructureOverrides::default()
        };
        let b = resolve(dec("100000"), &overrides, &CompensationDefaults::default()).unwrap();
        assert_eq!(monthly(&b.earnings, codes::SPECIAL_ALLOWANCE), dec("189.67"));
        assert_eq!(b.totals.calculated_ctc, dec("100000"));
    }

    // ==========================================================================
    // Overrides
    // ==========================================================================

    #[test]
    fn test_pf_wage_cap_limits_pf_basis() {
        let overrides = StructureOverrides {
            pf_wage_cap: Some(dec("15000")),
            ..StructureOverrides::default()
        };
        let b = resolve(dec("600000"), &overrides, &CompensationDefaults::default()).unwrap();

        assert_eq!(monthly(&b.employer_benefits, codes::EMPLOYER_PF), dec("1650"));
        assert_eq!(monthly(&b.employee_deductions, codes::EMPLOYEE_PF), dec("1800"));
        assert_eq!(monthly(&b.employer_benefits, codes::GRATUITY), dec("962"));
        assert_eq!(b.totals.calculated_ctc, dec("600000"));
        assert_eq!(
            b.benefit(codes::EMPLOYER_PF).unwrap().formula.as_deref(),
            Some("min(BASIC, 15000) * 0.11")
        );
    }

    #[test]
    fn test_zero_fixed_allowance_is_omitted_unless_required() {
        let defaults = CompensationDefaults {
            fixed_allowances: vec![
                FixedAllowance::new("CONVEYANCE", "Conveyance Allowance", Decimal::ZERO),
                FixedAllowance {
                    required: true,
                    ..FixedAllowance::new("MEDICAL", "Medical Allowance", Decimal::ZERO)
                },
            ],
            ..CompensationDefaults::default()
        };
        let b = resolve(dec("600000"), &StructureOverrides::default(), &defaults).unwrap();

        assert!(b.earning("CONVEYANCE").is_none());
        assert_eq!(b.earning("MEDICAL").unwrap().amount.monthly, Decimal::ZERO);
    }

    #[test]
    fn test_insurance_is_a_benefit_when_configured() {
        let overrides = StructureOverrides {
            insurance_monthly: Some(dec("500")),
            ..StructureOverrides::default()
        };
        let b = resolve(dec("600000"), &overrides, &CompensationDefaults::default()).unwrap();
        assert_eq!(monthly(&b.employer_benefits, codes::INSURANCE), dec("500"));
        // special shrinks by the annual insurance cost
        assert_eq!(b.earning(codes::SPECIAL_ALLOWANCE).unwrap().amount.annual, dec("184656"));
        assert_eq!(b.totals.calculated_ctc, dec("600000"));
    }

    #[test]
    fn test_additional_earnings_with_formulas() {
        let overrides = StructureOverrides {
            additional_earnings: vec![
                EarningRule {
                    code: "LTA".to_string(),
                    name: "Leave Travel Allowance".to_string(),
                    kind: RuleKind::PercentOfBasic {
                        fraction: dec("0.10"),
                    },
                    prorated: false,
                },
                EarningRule {
                    code: "INTERNET".to_string(),
                    name: "Internet Reimbursement".to_string(),
                    kind: RuleKind::Formula {
                        expression: "min(LTA / 2, 800)".to_string(),
                    },
                    prorated: true,
                },
            ],
            ..StructureOverrides::default()
        };
        let b = resolve(dec("600000"), &overrides, &CompensationDefaults::default()).unwrap();

        assert_eq!(monthly(&b.earnings, "LTA"), dec("2000"));
        assert_eq!(monthly(&b.earnings, "INTERNET"), dec("800"));
        assert!(b.earning("INTERNET").unwrap().prorated);
        assert_eq!(b.earning("INTERNET").unwrap().calculation, CalculationKind::Formula);
        // 15888 - 2000 - 800
        assert_eq!(monthly(&b.earnings, codes::SPECIAL_ALLOWANCE), dec("13088"));
        assert_eq!(b.totals.calculated_ctc, dec("600000"));
    }

    #[test]
    fn test_circular_formula_rules_fail() {
        let overrides = StructureOverrides {
            additional_earnings: vec![
                EarningRule {
                    code: "A".to_string(),
                    name: "A".to_string(),
                    kind: RuleKind::Formula {
                        expression: "B + 1".to_string(),
                    },
                    prorated: false,
                },
                EarningRule {
                    code: "B".to_string(),
                    name: "B".to_string(),
                    kind: RuleKind::Formula {
                        expression: "A + 1".to_string(),
                    },
                    prorated: false,
                },
            ],
            ..StructureOverrides::default()
        };
        assert!(matches!(
            resolve(dec("600000"), &overrides, &CompensationDefaults::default()),
            Err(EngineError::CircularReference { .. })
        ));
    }

    #[test]
    fn test_rule_code_clashing_with_builtin_is_rejected() {
        let overrides = StructureOverrides {
            additional_earnings: vec![EarningRule {
                code: "HRA".to_string(),
                name: "Extra HRA".to_string(),
                kind: RuleKind::Flat {
                    monthly: dec("100"),
                },
                prorated: false,
            }],
            ..StructureOverrides::default()
        };
        assert!(matches!(
            resolve(dec("600000"), &overrides, &CompensationDefaults::default()),
            Err(EngineError::Validation { .. })
        ));
    }

    // ==========================================================================
    // Validation
    // ==========================================================================

    #[test]
    fn test_non_positive_ctc_is_rejected() {
        for ctc in [Decimal::ZERO, dec("-1")] {
            match resolve_with_defaults(ctc) {
                Err(EngineError::Validation { field, .. }) => assert_eq!(field, "annual_ctc"),
                other => panic!("Expected Validation error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_ctc_above_maximum_is_rejected() {
        assert!(matches!(
            resolve_with_defaults(dec("1000000000.01")),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_out_of_range_override_fraction_is_rejected() {
        let overrides = StructureOverrides {
            basic_fraction: Some(dec("1.2")),
            ..StructureOverrides::default()
        };
        match resolve(dec("600000"), &overrides, &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "basic_fraction"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    fn rule(code: &str, kind: RuleKind) -> StructureOverrides {
        StructureOverrides {
            additional_earnings: vec![EarningRule {
                code: code.to_string(),
                name: code.to_string(),
                kind,
                prorated: false,
            }],
            ..StructureOverrides::default()
        }
    }

    #[test]
    fn test_oversized_fixed_allowance_is_rejected() {
        let overrides = StructureOverrides {
            fixed_allowances: Some(vec![FixedAllowance::new(
                "BIG",
                "Big",
                Decimal::MAX / dec("2"),
            )]),
            ..StructureOverrides::default()
        };
        match resolve(dec("600000"), &overrides, &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "fixed_allowances.BIG"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_flat_rule_is_rejected() {
        let overrides = rule(
            "BONUS",
            RuleKind::Flat {
                monthly: Decimal::MAX / dec("2"),
            },
        );
        match resolve(dec("600000"), &overrides, &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => {
                assert_eq!(field, "additional_earnings.BONUS")
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_formula_result_above_max_ctc_is_invalid() {
        let overrides = rule(
            "SQUARE",
            RuleKind::Formula {
                expression: "CTC * CTC".to_string(),
            },
        );
        match resolve(dec("600000"), &overrides, &CompensationDefaults::default()) {
            Err(EngineError::InvalidResult { code, .. }) => assert_eq!(code, "SQUARE"),
            other => panic!("Expected InvalidResult, got {:?}", other),
        }
    }

    // ==========================================================================
    // Audit trace
    // ==========================================================================

    #[test]
    fn test_audit_trace_is_sequential() {
        let b = resolve_with_defaults(dec("600000")).unwrap();
        let ids: Vec<&str> = b.audit_trace.steps.iter().map(|s| s.rule_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "monthly_ctc",
                "basic",
                "hra",
                "fixed_allowances",
                "employer_benefits",
                "employer_esi",
                "special_allowance",
                "employee_deductions",
                "totals",
            ]
        );
        for (i, step) in b.audit_trace.steps.iter().enumerate() {
            assert_eq!(step.step_number, i as u32 + 1);
        }
    }

    #[test]
    fn test_effective_settings_keeps_defaults_for_missing_overrides() {
        let overrides = StructureOverrides {
            hra_fraction: Some(dec("0.5")),
            ..StructureOverrides::default()
        };
        let settings = effective_settings(&overrides, &CompensationDefaults::default());
        assert_eq!(settings.hra_fraction, dec("0.5"));
        assert_eq!(settings.basic_fraction, dec("0.40"));
        assert_eq!(settings.fixed_allowances.len(), 3);
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    fn ctc_strategy() -> impl Strategy<Value = Decimal> {
        (200_000i64..50_000_000i64, 0i64..100).prop_map(|(rupees, paise)| {
            Decimal::new(rupees * 100 + paise, 2)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_resolved_breakdown_reconciles(ctc in ctc_strategy()) {
            let b = resolve_with_defaults(ctc).unwrap();
            prop_assert!(b.is_reconciled(Decimal::ONE));
            prop_assert!(b.audit_trace.warnings.is_empty());
        }

        #[test]
        fn prop_resolution_is_deterministic(ctc in ctc_strategy()) {
            prop_assert_eq!(resolve_with_defaults(ctc).unwrap(), resolve_with_defaults(ctc).unwrap());
        }

        #[test]
        fn prop_no_component_is_negative(ctc in 1_000i64..100_000_000i64) {
            let ctc = Decimal::from(ctc);
            match resolve_with_defaults(ctc) {
                Ok(b) => {
                    let all = b.earnings.iter().chain(&b.employer_benefits).chain(&b.employee_deductions);
                    for line in all {
                        prop_assert!(line.amount.monthly >= Decimal::ZERO, "{} is negative", line.code);
                        prop_assert!(line.amount.annual >= Decimal::ZERO, "{} is negative", line.code);
                    }
                }
                Err(EngineError::InsufficientCtc { shortfall, .. }) => {
                    prop_assert!(shortfall > Decimal::ZERO);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
