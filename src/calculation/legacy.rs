//! Adapters between [`Breakdown`] and flat `{name, monthly, yearly}` rows.
//!
//! Spreadsheet ingestion and older consumers exchange compensation as a
//! list of named rows. These functions are the only place that format is
//! produced or read; everything else works on the canonical breakdown.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::CompensationDefaults;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Amount, AuditStep, AuditTrace, Breakdown, BreakdownTotals, CalculationKind, ComponentLine,
    codes,
};

use super::round_currency;

/// Row name for the gross earnings total.
pub const GROSS_ROW: &str = "Gross Salary (A)";
/// Row name for the CTC total.
pub const CTC_ROW: &str = "Total CTC";
/// Row name for take-home pay.
pub const NET_ROW: &str = "Net Take Home";

/// One named compensation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRow {
    /// Component name as shown to users.
    pub name: String,
    /// Monthly amount.
    pub monthly: Decimal,
    /// Yearly amount.
    pub yearly: Decimal,
}

impl LegacyRow {
    fn new(name: &str, amount: Amount) -> Self {
        Self {
            name: name.to_string(),
            monthly: amount.monthly,
            yearly: amount.annual,
        }
    }
}

/// Renders a breakdown as rows: earnings, employer benefits, deductions,
/// then the gross, CTC and take-home totals.
pub fn to_legacy_rows(breakdown: &Breakdown) -> Vec<LegacyRow> {
    let lines = breakdown
        .earnings
        .iter()
        .chain(&breakdown.employer_benefits)
        .chain(&breakdown.employee_deductions);

    let mut rows: Vec<LegacyRow> = lines.map(|l| LegacyRow::new(&l.name, l.amount)).collect();
    rows.push(LegacyRow::new(GROSS_ROW, breakdown.totals.gross_a));
    rows.push(LegacyRow {
        name: CTC_ROW.to_string(),
        monthly: breakdown.monthly_ctc,
        yearly: breakdown.totals.calculated_ctc,
    });
    rows.push(LegacyRow::new(NET_ROW, breakdown.totals.net_pay));
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Earning,
    Benefit,
    Deduction,
    Total,
}

fn classify(name: &str, defaults: &CompensationDefaults) -> (Section, String) {
    let lower = name.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |word: &str| words.contains(&word);
    let is_pf = has("pf") || has("provident");

    if let Some(allowance) = defaults
        .fixed_allowances
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
    {
        return (Section::Earning, allowance.code.clone());
    }

    let is_total = matches!(words.first(), Some(&("gross" | "total" | "net")))
        || lower.contains("take home")
        || lower == "ctc";
    if is_total {
        return (Section::Total, String::new());
    }
    if has("employer") && is_pf {
        return (Section::Benefit, codes::EMPLOYER_PF.to_string());
    }
    if has("employer") && has("esi") {
        return (Section::Benefit, codes::EMPLOYER_ESI.to_string());
    }
    if has("gratuity") {
        return (Section::Benefit, codes::GRATUITY.to_string());
    }
    if has("insurance") {
        return (Section::Benefit, codes::INSURANCE.to_string());
    }
    if has("employee") && is_pf {
        return (Section::Deduction, codes::EMPLOYEE_PF.to_string());
    }
    if has("employee") && has("esi") {
        return (Section::Deduction, codes::EMPLOYEE_ESI.to_string());
    }
    if has("professional") && has("tax") {
        return (Section::Deduction, codes::PROFESSIONAL_TAX.to_string());
    }
    if has("basic") {
        return (Section::Earning, codes::BASIC.to_string());
    }
    if has("hra") || (has("house") && has("rent")) {
        return (Section::Earning, codes::HRA.to_string());
    }
    if has("special") {
        return (Section::Earning, codes::SPECIAL_ALLOWANCE.to_string());
    }

    let code: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    (Section::Earning, code)
}

/// Rebuilds a canonical breakdown from ingested rows.
///
/// Rows are classified by name into earnings, employer benefits and
/// employee deductions; total rows are ignored and recomputed. Amounts are
/// taken as given and marked unresolved.
///
/// # Errors
///
/// Returns `Validation` if a row has an empty name, a negative amount or
/// an amount above `max_annual_ctc`, if two rows map to the same component, or the earnings plus benefits
/// differ from `annual_ctc` by more than the configured tolerance.
pub fn breakdown_from_rows(
    rows: &[LegacyRow],
    annual_ctc: Decimal,
    defaults: &CompensationDefaults,
) -> EngineResult<Breakdown> {
    if annual_ctc <= Decimal::ZERO {
        return Err(EngineError::validation(
            "annual_ctc",
            "must be greater than zero",
        ));
    }
    defaults.validate()?;
    if annual_ctc > defaults.max_annual_ctc {
        return Err(EngineError::validation(
            "annual_ctc",
            format!("must not exceed {}", defaults.max_annual_ctc),
        ));
    }

    let mut earnings = Vec::new();
    let mut benefits = Vec::new();
    let mut deductions = Vec::new();
    let mut seen = HashSet::new();
    let mut ignored = Vec::new();

    for row in rows {
        if row.name.trim().is_empty() {
            return Err(EngineError::validation("rows", "row name must not be empty"));
        }
        if row.monthly < Decimal::ZERO || row.yearly < Decimal::ZERO {
            return Err(EngineError::validation(
                "rows",
                format!("row '{}' has a negative amount", row.name),
            ));
        }
        if row.monthly > defaults.max_annual_ctc || row.yearly > defaults.max_annual_ctc {
            return Err(EngineError::validation(
                "rows",
                format!(
                    "row '{}' exceeds the largest accepted CTC {}",
                    row.name, defaults.max_annual_ctc
                ),
            ));
        }

        let (section, code) = classify(&row.name, defaults);
        if section == Section::Total {
            ignored.push(row.name.clone());
            continue;
        }
        if !seen.insert(code.clone()) {
            return Err(EngineError::validation(
                "rows",
                format!("row '{}' duplicates component {}", row.name, code),
            ));
        }

        let prorated = match code.as_str() {
            codes::BASIC => true,
            codes::HRA => defaults.prorate_hra,
            codes::SPECIAL_ALLOWANCE => defaults.prorate_special_allowance,
            _ => defaults
                .fixed_allowances
                .iter()
                .find(|a| a.code == code)
                .is_some_and(|a| a.prorated),
        };
        let calculation = if code == codes::SPECIAL_ALLOWANCE {
            CalculationKind::Balancing
        } else {
            CalculationKind::Flat
        };
        let line = ComponentLine {
            code,
            name: row.name.trim().to_string(),
            calculation,
            amount: Amount {
                monthly: round_currency(row.monthly),
                annual: round_currency(row.yearly),
            },
            formula: None,
            resolved: false,
            prorated: section == Section::Earning && prorated,
        };
        match section {
            Section::Earning => earnings.push(line),
            Section::Benefit => benefits.push(line),
            Section::Deduction => deductions.push(line),
            Section::Total => {}
        }
    }

    let annual_ctc = round_currency(annual_ctc);
    let totals = BreakdownTotals::from_lines(&earnings, &benefits, &deductions);
    let difference = totals.calculated_ctc - annual_ctc;
    if difference.abs() > defaults.reconciliation_tolerance {
        return Err(EngineError::validation(
            "rows",
            format!(
                "rows total {} but CTC is {} (difference {})",
                totals.calculated_ctc, annual_ctc, difference
            ),
        ));
    }

    let audit_trace = AuditTrace {
        steps: vec![AuditStep {
            step_number: 1,
            rule_id: "legacy_import".to_string(),
            rule_name: "Legacy Row Import".to_string(),
            input: serde_json::json!({
                "rows": rows.len(),
                "annual_ctc": annual_ctc.to_string()
            }),
            output: serde_json::json!({
                "earnings": earnings.len(),
                "employer_benefits": benefits.len(),
                "employee_deductions": deductions.len(),
                "ignored": ignored,
                "calculated_ctc": totals.calculated_ctc.to_string()
            }),
            reasoning: format!(
                "Imported {} row(s); calculated CTC {} reconciles with {}",
                rows.len() - ignored.len(),
                totals.calculated_ctc,
                annual_ctc
            ),
        }],
        warnings: Vec::new(),
    };

    Ok(Breakdown {
        annual_ctc,
        monthly_ctc: round_currency(annual_ctc / Decimal::from(12)),
        earnings,
        employer_benefits: benefits,
        employee_deductions: deductions,
        totals,
        audit_trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::resolve_with_defaults;
    use rust_decimal_macros::dec;

    fn row(name: &str, monthly: Decimal) -> LegacyRow {
        LegacyRow {
            name: name.to_string(),
            monthly,
            yearly: monthly * dec!(12),
        }
    }

    #[test]
    fn test_rows_end_with_totals() {
        let breakdown = resolve_with_defaults(dec!(600000)).unwrap();
        let rows = to_legacy_rows(&breakdown);

        assert_eq!(rows[0].name, "Basic Salary");
        assert_eq!(rows[0].monthly, dec!(20000));
        assert_eq!(rows[0].yearly, dec!(240000));

        let tail: Vec<&str> = rows.iter().rev().take(3).map(|r| r.name.as_str()).collect();
        assert_eq!(tail, vec![NET_ROW, CTC_ROW, GROSS_ROW]);
        let ctc = rows.iter().find(|r| r.name == CTC_ROW).unwrap();
        assert_eq!(ctc.yearly, dec!(600000));
    }

    #[test]
    fn test_rendered_rows_import_back_to_same_components() {
        let defaults = CompensationDefaults::default();
        let original = resolve_with_defaults(dec!(600000)).unwrap();
        let imported =
            breakdown_from_rows(&to_legacy_rows(&original), dec!(600000), &defaults).unwrap();

        let codes_of = |lines: &[ComponentLine]| {
            lines.iter().map(|l| l.code.clone()).collect::<Vec<_>>()
        };
        assert_eq!(codes_of(&imported.earnings), codes_of(&original.earnings));
        assert_eq!(
            codes_of(&imported.employer_benefits),
            codes_of(&original.employer_benefits)
        );
        assert_eq!(
            codes_of(&imported.employee_deductions),
            codes_of(&original.employee_deductions)
        );
        assert_eq!(imported.totals, original.totals);
        assert!(imported.earnings.iter().all(|l| !l.resolved));
    }

    #[test]
    fn test_spreadsheet_rows_are_classified() {
        let rows = vec![
            row("Basic", dec!(20000)),
            row("HRA", dec!(8000)),
            row("Conveyance Allowance", dec!(1600)),
            row("Shift Allowance", dec!(1000)),
            row("Special Allowance", dec!(17800)),
            row("Employer Provident Fund", dec!(2200)),
            row("Gratuity", dec!(962)),
            row("Employee Provident Fund", dec!(2400)),
            row("Professional Tax", dec!(200)),
            row("Gross Total", dec!(48400)),
        ];
        let b = breakdown_from_rows(&rows, dec!(618744), &CompensationDefaults::default()).unwrap();

        assert!(b.earning(codes::BASIC).unwrap().prorated);
        assert!(b.earning(codes::HRA).is_some());
        assert!(b.earning("CONVEYANCE").is_some());
        assert!(b.earning("SHIFT_ALLOWANCE").is_some());
        assert_eq!(
            b.earning(codes::SPECIAL_ALLOWANCE).unwrap().calculation,
            CalculationKind::Balancing
        );
        assert!(b.benefit(codes::EMPLOYER_PF).is_some());
        assert!(b.benefit(codes::GRATUITY).is_some());
        assert!(b.deduction(codes::EMPLOYEE_PF).is_some());
        assert!(b.deduction(codes::PROFESSIONAL_TAX).is_some());
        assert_eq!(b.earnings.len(), 5);
        assert_eq!(b.totals.calculated_ctc, dec!(618744));
    }

    #[test]
    fn test_unreconciled_rows_are_rejected() {
        let rows = vec![row("Basic", dec!(20000))];
        match breakdown_from_rows(&rows, dec!(600000), &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "rows"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_components_are_rejected() {
        let rows = vec![row("Basic", dec!(10000)), row("Basic Salary", dec!(10000))];
        assert!(breakdown_from_rows(&rows, dec!(240000), &CompensationDefaults::default()).is_err());
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let rows = vec![row("Basic", dec!(-5))];
        assert!(breakdown_from_rows(&rows, dec!(100), &CompensationDefaults::default()).is_err());
    }

    #[test]
    fn test_oversized_rows_are_rejected_before_summing() {
        let huge = LegacyRow {
            name: "Basic".to_string(),
            monthly: Decimal::MAX / dec!(2),
            yearly: Decimal::MAX / dec!(2),
        };
        let rows = vec![huge.clone(), LegacyRow { name: "HRA".to_string(), ..huge }];
        match breakdown_from_rows(&rows, dec!(600000), &CompensationDefaults::default()) {
            Err(EngineError::Validation { field, .. }) => assert_eq!(field, "rows"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }
}
