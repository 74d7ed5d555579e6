use crate::error::{Result, RevenueScheduleError};
use crate::schema::{Contract, RevenueSchedule, RevenueTotals, ScheduleRow};
use crate::utils::month_ends_from;
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

pub const MONTHS_PER_YEAR: u32 = 12;

/// Turns a USD-denominated [`Contract`] into its monthly recognition schedule.
///
/// The whole multi-year license fee is recognized upfront in the first month
/// of the contract and reversed in equal monthly amounts over the full term,
/// while each year's license and maintenance value is recognized ratably over
/// that year's twelve months.
#[derive(Debug, Clone, Default)]
pub struct ScheduleGenerator {
    start_date: Option<NaiveDate>,
}

impl ScheduleGenerator {
    pub fn new() -> Self {
        Self { start_date: None }
    }

    /// Labels every generated row with its calendar month-end, counted from
    /// the month containing `start_date`.
    pub fn with_start_date(start_date: Option<NaiveDate>) -> Self {
        Self { start_date }
    }

    pub fn generate(&self, contract: &Contract) -> Result<RevenueSchedule> {
        validate_contract(contract)?;

        let total_months = contract_months(contract)?;

        let total_license_value =
            check_derived(None, "total license value", contract.total_license_value())?;
        let monthly_reversal = if total_license_value == 0.0 {
            0.0
        } else {
            -(total_license_value / total_months as f64)
        };

        debug!(
            "Generating {} months: total license value {:.2}, monthly reversal {:.4}",
            total_months, total_license_value, monthly_reversal
        );

        let period_ends = match self.start_date {
            Some(start) => Some(month_ends_from(start, total_months)?),
            None => None,
        };

        let mut rows = Vec::with_capacity(total_months as usize);
        let mut absolute_month: u32 = 0;

        for year in &contract.years {
            let monthly_ratable = check_derived(
                Some(year.year_index),
                "monthly ratable revenue",
                (year.license_amount_usd + year.maintenance_amount_usd) / MONTHS_PER_YEAR as f64,
            )?;

            for month_in_year in 1..=MONTHS_PER_YEAR {
                absolute_month += 1;

                let upfront_license_revenue = if absolute_month == 1 {
                    total_license_value
                } else {
                    0.0
                };

                let period_end = period_ends
                    .as_ref()
                    .and_then(|dates| dates.get(absolute_month as usize - 1))
                    .copied();

                rows.push(ScheduleRow {
                    absolute_month,
                    year: year.year_index,
                    month_in_year,
                    ratable_service_revenue: monthly_ratable,
                    upfront_license_revenue,
                    monthly_reversal,
                    total_net_revenue: monthly_ratable + upfront_license_revenue + monthly_reversal,
                    period_end,
                });
            }
        }

        let first_total = rows.first().map(|r| r.total_net_revenue).unwrap_or_default();
        check_derived(Some(1), "first month net revenue", first_total)?;

        let (year_totals, grand_totals) = accumulate_totals(&rows);
        for (year, totals) in &year_totals {
            check_totals(Some(*year), totals)?;
        }
        check_totals(None, &grand_totals)?;

        Ok(RevenueSchedule {
            total_license_value,
            total_months,
            monthly_reversal,
            rows,
            year_totals,
            grand_totals,
        })
    }
}

pub fn generate(contract: &Contract) -> Result<RevenueSchedule> {
    ScheduleGenerator::new().generate(contract)
}

/// Sums the revenue columns per contract year and across the whole term.
/// Values are kept at full precision.
pub fn accumulate_totals(rows: &[ScheduleRow]) -> (BTreeMap<u32, RevenueTotals>, RevenueTotals) {
    let mut year_totals: BTreeMap<u32, RevenueTotals> = BTreeMap::new();
    let mut grand_totals = RevenueTotals::default();

    for row in rows {
        year_totals.entry(row.year).or_default().add_row(row);
        grand_totals.add_row(row);
    }

    (year_totals, grand_totals)
}

/// Number of months covered by `contract`, failing when it does not fit in
/// a `u32`.
pub fn contract_months(contract: &Contract) -> Result<u32> {
    contract.total_months().ok_or_else(|| {
        RevenueScheduleError::invalid_input(
            None,
            format!("Contract with {} years is too long", contract.len()),
        )
    })
}

/// Rejects intermediate values that overflowed even though every input
/// amount was finite.
fn check_derived(year: Option<u32>, what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RevenueScheduleError::invalid_input(
            year,
            format!("{} overflows to {}; amounts are too large", what, value),
        ))
    }
}

fn check_totals(year: Option<u32>, totals: &RevenueTotals) -> Result<()> {
    check_derived(year, "ratable revenue total", totals.ratable)?;
    check_derived(year, "upfront revenue total", totals.upfront)?;
    check_derived(year, "reversal total", totals.reversal)?;
    check_derived(year, "net revenue total", totals.total)?;
    Ok(())
}

pub fn validate_contract(contract: &Contract) -> Result<()> {
    if contract.is_empty() {
        return Err(RevenueScheduleError::invalid_input(
            None,
            "Contract must contain at least one year",
        ));
    }

    for (idx, year) in contract.years.iter().enumerate() {
        let expected = idx as u32 + 1;
        if year.year_index != expected {
            return Err(RevenueScheduleError::invalid_input(
                Some(year.year_index),
                format!(
                    "Year indices must run 1..={} in order; found year {} at position {}",
                    contract.len(),
                    year.year_index,
                    expected
                ),
            ));
        }

        check_amount(year.year_index, "license", year.license_amount_usd)?;
        check_amount(year.year_index, "maintenance", year.maintenance_amount_usd)?;
    }

    Ok(())
}

fn check_amount(year: u32, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(RevenueScheduleError::invalid_input(
            Some(year),
            format!("{} amount {} is not a finite number", field, value),
        ));
    }
    if value < 0.0 {
        return Err(RevenueScheduleError::invalid_input(
            Some(year),
            format!("{} amount {} is negative", field, value),
        ));
    }
    Ok(())
}
