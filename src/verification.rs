use crate::engine::contract_months;
use crate::error::{Result, RevenueScheduleError};
use crate::schema::{Contract, RevenueSchedule};

/// Checks a generated schedule against the recognition invariants of the
/// contract that produced it.
pub struct ScheduleVerifier<'a> {
    contract: &'a Contract,
}

impl<'a> ScheduleVerifier<'a> {
    pub fn new(contract: &'a Contract) -> Self {
        Self { contract }
    }

    pub fn verify(&self, schedule: &RevenueSchedule, tolerance: f64) -> Result<()> {
        self.verify_shape(schedule)?;
        verify_finite(schedule)?;

        let total_license_value = self.contract.total_license_value();
        let allowed = self.allowed_error(schedule, tolerance);

        let upfront_sum: f64 = schedule
            .rows
            .iter()
            .map(|r| r.upfront_license_revenue)
            .sum();
        check_close("upfront equals total license value", total_license_value, upfront_sum, allowed)?;

        if let Some(row) = schedule
            .rows
            .iter()
            .find(|r| r.absolute_month != 1 && r.upfront_license_revenue != 0.0)
        {
            return Err(violation(
                "upfront only in first month",
                0.0,
                row.upfront_license_revenue,
            ));
        }

        let reversal_sum: f64 = schedule.rows.iter().map(|r| r.monthly_reversal).sum();
        check_close("reversal offsets upfront", -total_license_value, reversal_sum, allowed)?;

        if let Some(row) = schedule
            .rows
            .iter()
            .find(|r| r.monthly_reversal != schedule.monthly_reversal)
        {
            return Err(violation(
                "constant monthly reversal",
                schedule.monthly_reversal,
                row.monthly_reversal,
            ));
        }

        check_close(
            "grand total equals contract value",
            self.contract.total_contract_value(),
            schedule.grand_totals.total,
            allowed,
        )?;

        let year_total_sum: f64 = schedule.year_totals.values().map(|t| t.total).sum();
        check_close(
            "year totals add up to grand total",
            schedule.grand_totals.total,
            year_total_sum,
            allowed,
        )?;

        Ok(())
    }

    /// `tolerance`, widened to the rounding error that summing every row
    /// can accumulate for contracts of this size.
    fn allowed_error(&self, schedule: &RevenueSchedule, tolerance: f64) -> f64 {
        let magnitude =
            self.contract.total_contract_value() + 2.0 * self.contract.total_license_value();
        let terms = schedule.rows.len().max(1) as f64;
        tolerance.max(2.0 * magnitude * terms * f64::EPSILON)
    }

    fn verify_shape(&self, schedule: &RevenueSchedule) -> Result<()> {
        let expected_months = contract_months(self.contract)?;
        if schedule.rows.len() != expected_months as usize {
            return Err(violation(
                "row count",
                expected_months as f64,
                schedule.rows.len() as f64,
            ));
        }

        for (idx, row) in schedule.rows.iter().enumerate() {
            let expected = idx as u32 + 1;
            if row.absolute_month != expected {
                return Err(violation(
                    "contiguous months",
                    expected as f64,
                    row.absolute_month as f64,
                ));
            }
        }

        Ok(())
    }
}

fn verify_finite(schedule: &RevenueSchedule) -> Result<()> {
    for row in &schedule.rows {
        for value in [
            row.ratable_service_revenue,
            row.upfront_license_revenue,
            row.monthly_reversal,
            row.total_net_revenue,
        ] {
            if !value.is_finite() {
                return Err(violation("finite row values", row.absolute_month as f64, value));
            }
        }
    }

    let totals = schedule
        .year_totals
        .values()
        .chain(std::iter::once(&schedule.grand_totals));
    for t in totals {
        for value in [t.ratable, t.upfront, t.reversal, t.total] {
            if !value.is_finite() {
                return Err(violation("finite totals", 0.0, value));
            }
        }
    }

    Ok(())
}

/// NaN on either side always fails.
fn check_close(check: &str, expected: f64, actual: f64, allowed: f64) -> Result<()> {
    let difference = (expected - actual).abs();
    if !difference.is_finite() || difference > allowed {
        return Err(violation(check, expected, actual));
    }
    Ok(())
}

fn violation(check: &str, expected: f64, actual: f64) -> RevenueScheduleError {
    RevenueScheduleError::ScheduleInvariantViolation {
        check: check.to_string(),
        expected,
        actual,
    }
}

pub fn verify_schedule(
    contract: &Contract,
    schedule: &RevenueSchedule,
    tolerance: f64,
) -> Result<()> {
    ScheduleVerifier::new(contract).verify(schedule, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate;

    #[test]
    fn test_generated_schedule_verifies() {
        let contract = Contract::from_amounts(&[
            (43086.04, 147579.90),
            (45240.34, 154958.90),
            (47502.36, 162706.84),
        ]);
        let schedule = generate(&contract).unwrap();
        assert!(verify_schedule(&contract, &schedule, 0.01).is_ok());
    }

    #[test]
    fn test_detects_recurring_upfront() {
        let contract = Contract::from_amounts(&[(1_000.0, 0.0), (1_000.0, 0.0)]);
        let mut schedule = generate(&contract).unwrap();
        schedule.rows[12].upfront_license_revenue = 2_000.0;

        let err = verify_schedule(&contract, &schedule, 0.01).unwrap_err();
        assert!(matches!(
            err,
            RevenueScheduleError::ScheduleInvariantViolation { .. }
        ));
    }

    #[test]
    fn test_detects_missing_rows() {
        let contract = Contract::from_amounts(&[(1_000.0, 500.0)]);
        let mut schedule = generate(&contract).unwrap();
        schedule.rows.pop();

        match verify_schedule(&contract, &schedule, 0.01) {
            Err(RevenueScheduleError::ScheduleInvariantViolation {
                check,
                expected,
                actual,
            }) => {
                assert_eq!(check, "row count");
                assert_eq!(expected, 12.0);
                assert_eq!(actual, 11.0);
            }
            other => panic!("expected row count violation, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_totals_are_rejected() {
        let contract = Contract::from_amounts(&[(1_000.0, 500.0), (1_000.0, 500.0)]);
        let mut schedule = generate(&contract).unwrap();
        schedule.grand_totals.total = f64::NAN;

        let err = verify_schedule(&contract, &schedule, 0.01).unwrap_err();
        assert!(matches!(
            err,
            RevenueScheduleError::ScheduleInvariantViolation { .. }
        ));

        let mut schedule = generate(&contract).unwrap();
        for row in &mut schedule.rows {
            row.total_net_revenue = f64::NAN;
        }
        assert!(verify_schedule(&contract, &schedule, 0.01).is_err());
    }

    #[test]
    fn test_check_close_rejects_nan() {
        assert!(check_close("nan", f64::NAN, 1.0, 0.01).is_err());
        assert!(check_close("nan", 1.0, f64::NAN, 0.01).is_err());
        assert!(check_close("inf", f64::INFINITY, f64::INFINITY, 0.01).is_err());
        assert!(check_close("close", 1.0, 1.005, 0.01).is_ok());
    }

    #[test]
    fn test_large_contracts_verify_with_small_tolerance() {
        let amounts: Vec<(f64, f64)> = (0..10)
            .map(|i| (1e13 * 1.2345678 + i as f64 * 0.37, 1e13 * 3.3333 + 0.01))
            .collect();
        let contract = Contract::from_amounts(&amounts);
        let schedule = generate(&contract).unwrap();
        assert!(verify_schedule(&contract, &schedule, 0.01).is_ok());

        let mut broken = schedule.clone();
        broken.rows[5].upfront_license_revenue = 1e6;
        assert!(verify_schedule(&contract, &broken, 0.01).is_err());
    }

    #[test]
    fn test_detects_uneven_reversal() {
        let contract = Contract::from_amounts(&[(1_200.0, 0.0)]);
        let mut schedule = generate(&contract).unwrap();
        schedule.rows[3].monthly_reversal -= 50.0;
        schedule.rows[4].monthly_reversal += 50.0;

        assert!(verify_schedule(&contract, &schedule, 0.01).is_err());
    }
}
