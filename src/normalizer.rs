use crate::error::{Result, RevenueScheduleError};
use crate::schema::{Contract, ContractTerms, Currency, YearAmounts, YearInput};
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// How one contract year was converted into USD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvertedYear {
    pub year: u32,
    pub currency: Currency,
    pub exchange_rate: f64,
    pub license_original: f64,
    pub maintenance_original: f64,
    pub license_usd: f64,
    pub maintenance_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedContract {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub contract: Contract,
    pub conversions: Vec<ConvertedYear>,
}

pub fn normalize_terms(terms: &ContractTerms) -> Result<NormalizedContract> {
    if terms.years.is_empty() {
        return Err(RevenueScheduleError::invalid_input(
            None,
            "Contract must contain at least one year",
        ));
    }

    let conversions = terms
        .years
        .iter()
        .enumerate()
        .map(|(idx, amounts)| convert_year(idx as u32 + 1, amounts))
        .collect::<Result<Vec<_>>>()?;

    let contract = Contract::new(
        conversions
            .iter()
            .map(|c| YearInput::new(c.year, c.license_usd, c.maintenance_usd))
            .collect(),
    );

    Ok(NormalizedContract {
        name: terms.name.clone(),
        start_date: terms.start_date,
        contract,
        conversions,
    })
}

pub fn convert_year(year: u32, amounts: &YearAmounts) -> Result<ConvertedYear> {
    for (field, value) in [
        ("license", amounts.license),
        ("maintenance", amounts.maintenance),
    ] {
        if !value.is_finite() {
            return Err(RevenueScheduleError::invalid_input(
                Some(year),
                format!("Please enter a valid {} value", field),
            ));
        }
        if value < 0.0 {
            return Err(RevenueScheduleError::invalid_input(
                Some(year),
                format!("{} value {} must not be negative", field, value),
            ));
        }
    }

    let exchange_rate = if amounts.currency.is_usd() {
        if let Some(rate) = amounts.exchange_rate {
            if rate != 1.0 {
                warn!(
                    "Ignoring exchange rate {} supplied for USD year {}",
                    rate, year
                );
            }
        }
        1.0
    } else {
        match amounts.exchange_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate,
            other => {
                return Err(RevenueScheduleError::InvalidExchangeRate {
                    year,
                    currency: amounts.currency.code().to_string(),
                    rate: other.unwrap_or(f64::NAN),
                })
            }
        }
    };

    let converted = ConvertedYear {
        year,
        currency: amounts.currency,
        exchange_rate,
        license_original: amounts.license,
        maintenance_original: amounts.maintenance,
        license_usd: amounts.license * exchange_rate,
        maintenance_usd: amounts.maintenance * exchange_rate,
    };

    if !converted.license_usd.is_finite() || !converted.maintenance_usd.is_finite() {
        return Err(RevenueScheduleError::invalid_input(
            Some(year),
            format!(
                "converting {} at rate {} overflows the USD amount",
                amounts.currency, exchange_rate
            ),
        ));
    }

    if !amounts.currency.is_usd() {
        debug!(
            "Year {}: converted {} at {:.6} -> license {:.2} USD, maintenance {:.2} USD",
            year, amounts.currency, exchange_rate, converted.license_usd, converted.maintenance_usd
        );
    }

    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(years: Vec<YearAmounts>) -> ContractTerms {
        ContractTerms {
            name: "Test Contract".to_string(),
            start_date: None,
            years,
        }
    }

    #[test]
    fn test_usd_years_pass_through() {
        let normalized = normalize_terms(&terms(vec![
            YearAmounts::usd(43086.04, 147579.90),
            YearAmounts::usd(0.0, 0.0),
        ]))
        .unwrap();

        assert_eq!(normalized.contract.len(), 2);
        assert_eq!(normalized.contract.years[0].year_index, 1);
        assert_eq!(normalized.contract.years[1].year_index, 2);
        assert_eq!(normalized.contract.years[0].license_amount_usd, 43086.04);
        assert_eq!(normalized.conversions[0].exchange_rate, 1.0);
    }

    #[test]
    fn test_foreign_years_are_converted() {
        let normalized = normalize_terms(&terms(vec![YearAmounts::foreign(
            Currency::Eur,
            1.1,
            1_000.0,
            2_000.0,
        )]))
        .unwrap();

        let year = &normalized.contract.years[0];
        assert!((year.license_amount_usd - 1_100.0).abs() < 1e-9);
        assert!((year.maintenance_amount_usd - 2_200.0).abs() < 1e-9);

        let conversion = &normalized.conversions[0];
        assert_eq!(conversion.currency, Currency::Eur);
        assert_eq!(conversion.license_original, 1_000.0);
        assert_eq!(conversion.maintenance_original, 2_000.0);
    }

    #[test]
    fn test_usd_ignores_supplied_rate() {
        let amounts = YearAmounts {
            currency: Currency::Usd,
            exchange_rate: Some(0.5),
            license: 100.0,
            maintenance: 100.0,
        };
        let converted = convert_year(1, &amounts).unwrap();
        assert_eq!(converted.exchange_rate, 1.0);
        assert_eq!(converted.license_usd, 100.0);
    }

    #[test]
    fn test_missing_or_bad_exchange_rate() {
        let missing = YearAmounts {
            currency: Currency::Jpy,
            exchange_rate: None,
            license: 1.0,
            maintenance: 1.0,
        };
        let err = convert_year(2, &missing).unwrap_err();
        assert!(matches!(
            err,
            RevenueScheduleError::InvalidExchangeRate { year: 2, .. }
        ));

        for rate in [0.0, -1.2, f64::NAN, f64::INFINITY] {
            let amounts = YearAmounts::foreign(Currency::Gbp, rate, 1.0, 1.0);
            assert!(convert_year(1, &amounts).unwrap_err().is_invalid_input());
        }
    }

    #[test]
    fn test_rejects_non_finite_and_negative_amounts() {
        let err = normalize_terms(&terms(vec![
            YearAmounts::usd(1.0, 1.0),
            YearAmounts::usd(f64::NAN, 1.0),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            RevenueScheduleError::InvalidInput { year: Some(2), .. }
        ));

        let err = normalize_terms(&terms(vec![YearAmounts::usd(1.0, -5.0)])).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_conversion_overflow() {
        let amounts = YearAmounts::foreign(Currency::Inr, 1e10, 1e300, 0.0);
        let err = convert_year(4, &amounts).unwrap_err();
        assert!(matches!(
            err,
            RevenueScheduleError::InvalidInput { year: Some(4), .. }
        ));
    }

    #[test]
    fn test_rejects_empty_terms() {
        assert!(normalize_terms(&terms(vec![])).unwrap_err().is_invalid_input());
    }
}
