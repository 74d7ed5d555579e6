use crate::error::{Result, RevenueScheduleError};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    #[schemars(description = "US Dollar. The reporting currency; no exchange rate is needed.")]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
    Chf,
    Cny,
    Inr,
    Mxn,
    Brl,
    Zar,
    Sgd,
    Nzd,
    Sek,
    Nok,
    Dkk,
}

impl Currency {
    pub const ALL: [Currency; 17] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Cad,
        Currency::Aud,
        Currency::Jpy,
        Currency::Chf,
        Currency::Cny,
        Currency::Inr,
        Currency::Mxn,
        Currency::Brl,
        Currency::Zar,
        Currency::Sgd,
        Currency::Nzd,
        Currency::Sek,
        Currency::Nok,
        Currency::Dkk,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Jpy => "JPY",
            Currency::Chf => "CHF",
            Currency::Cny => "CNY",
            Currency::Inr => "INR",
            Currency::Mxn => "MXN",
            Currency::Brl => "BRL",
            Currency::Zar => "ZAR",
            Currency::Sgd => "SGD",
            Currency::Nzd => "NZD",
            Currency::Sek => "SEK",
            Currency::Nok => "NOK",
            Currency::Dkk => "DKK",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Currency::Usd => "US Dollar",
            Currency::Eur => "Euro",
            Currency::Gbp => "British Pound",
            Currency::Cad => "Canadian Dollar",
            Currency::Aud => "Australian Dollar",
            Currency::Jpy => "Japanese Yen",
            Currency::Chf => "Swiss Franc",
            Currency::Cny => "Chinese Yuan",
            Currency::Inr => "Indian Rupee",
            Currency::Mxn => "Mexican Peso",
            Currency::Brl => "Brazilian Real",
            Currency::Zar => "South African Rand",
            Currency::Sgd => "Singapore Dollar",
            Currency::Nzd => "New Zealand Dollar",
            Currency::Sek => "Swedish Krona",
            Currency::Nok => "Norwegian Krone",
            Currency::Dkk => "Danish Krone",
        }
    }

    pub fn is_usd(&self) -> bool {
        *self == Currency::Usd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = RevenueScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                RevenueScheduleError::invalid_input(
                    None,
                    format!("Unsupported currency code '{}'", s),
                )
            })
    }
}

/// Raw amounts for one contract year as entered, before conversion to USD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct YearAmounts {
    #[serde(default)]
    #[schemars(description = "Currency the license and maintenance values are quoted in. Defaults to USD.")]
    pub currency: Currency,

    #[serde(default)]
    #[schemars(
        description = "Manual exchange rate: 1 unit of `currency` equals this many USD. Required for non-USD years, ignored for USD."
    )]
    pub exchange_rate: Option<f64>,

    #[schemars(description = "Term license value for this year, in `currency`.")]
    pub license: f64,

    #[schemars(description = "Maintenance value for this year, in `currency`.")]
    pub maintenance: f64,
}

impl YearAmounts {
    pub fn usd(license: f64, maintenance: f64) -> Self {
        Self {
            currency: Currency::Usd,
            exchange_rate: None,
            license,
            maintenance,
        }
    }

    pub fn foreign(currency: Currency, exchange_rate: f64, license: f64, maintenance: f64) -> Self {
        Self {
            currency,
            exchange_rate: Some(exchange_rate),
            license,
            maintenance,
        }
    }
}

/// A contract as supplied by the caller: the configuration handed to the
/// processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ContractTerms {
    #[serde(default)]
    #[schemars(description = "Free-form label for the contract, used in logs and report titles.")]
    pub name: String,

    #[serde(default)]
    #[schemars(
        description = "Optional first day of the contract (YYYY-MM-DD). When set, each schedule row is labelled with its month-end date."
    )]
    pub start_date: Option<NaiveDate>,

    #[schemars(
        description = "One entry per contract year, in order. Year indices are implied by position, starting at 1."
    )]
    pub years: Vec<YearAmounts>,
}

impl ContractTerms {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ContractTerms)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One contract year in USD, ready for the schedule generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct YearInput {
    pub year_index: u32,
    pub license_amount_usd: f64,
    pub maintenance_amount_usd: f64,
}

impl YearInput {
    pub fn new(year_index: u32, license_amount_usd: f64, maintenance_amount_usd: f64) -> Self {
        Self {
            year_index,
            license_amount_usd,
            maintenance_amount_usd,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub years: Vec<YearInput>,
}

impl Contract {
    pub fn new(years: Vec<YearInput>) -> Self {
        Self { years }
    }

    /// Builds a contract from `(license, maintenance)` pairs, numbering the
    /// years from 1.
    pub fn from_amounts(amounts: &[(f64, f64)]) -> Self {
        let years = amounts
            .iter()
            .enumerate()
            .map(|(idx, &(license, maintenance))| {
                YearInput::new(idx as u32 + 1, license, maintenance)
            })
            .collect();
        Self { years }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// `None` when the term is too long to count in months.
    pub fn total_months(&self) -> Option<u32> {
        u32::try_from(self.years.len()).ok()?.checked_mul(12)
    }

    pub fn total_license_value(&self) -> f64 {
        self.years.iter().map(|y| y.license_amount_usd).sum()
    }

    pub fn total_contract_value(&self) -> f64 {
        self.years
            .iter()
            .map(|y| y.license_amount_usd + y.maintenance_amount_usd)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRow {
    /// Global month counter across the whole contract, starting at 1.
    pub absolute_month: u32,
    pub year: u32,
    pub month_in_year: u32,
    pub ratable_service_revenue: f64,
    pub upfront_license_revenue: f64,
    pub monthly_reversal: f64,
    pub total_net_revenue: f64,
    /// Month-end date of this row, only known when the contract has a start date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RevenueTotals {
    pub ratable: f64,
    pub upfront: f64,
    pub reversal: f64,
    pub total: f64,
}

impl RevenueTotals {
    pub fn add_row(&mut self, row: &ScheduleRow) {
        self.ratable += row.ratable_service_revenue;
        self.upfront += row.upfront_license_revenue;
        self.reversal += row.monthly_reversal;
        self.total += row.total_net_revenue;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueSchedule {
    pub total_license_value: f64,
    pub total_months: u32,
    pub monthly_reversal: f64,
    pub rows: Vec<ScheduleRow>,
    pub year_totals: BTreeMap<u32, RevenueTotals>,
    pub grand_totals: RevenueTotals,
}

impl RevenueSchedule {
    pub fn rows_for_year(&self, year: u32) -> impl Iterator<Item = &ScheduleRow> {
        self.rows.iter().filter(move |r| r.year == year)
    }

    pub fn row(&self, absolute_month: u32) -> Option<&ScheduleRow> {
        absolute_month
            .checked_sub(1)
            .and_then(|idx| self.rows.get(idx as usize))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DecimalPrecision {
    #[default]
    #[schemars(description = "Two fraction digits, e.g. 15,888.83")]
    Cents,

    #[schemars(description = "Whole currency units, e.g. 15,889")]
    Whole,
}

impl DecimalPrecision {
    pub fn fraction_digits(&self) -> usize {
        match self {
            DecimalPrecision::Cents => 2,
            DecimalPrecision::Whole => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReportOptions {
    #[serde(default)]
    pub precision: DecimalPrecision,

    #[serde(default = "default_true")]
    #[schemars(description = "Prepend the per-year currency conversion summary to exported reports.")]
    pub include_conversion_summary: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            precision: DecimalPrecision::Cents,
            include_conversion_summary: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = ContractTerms::schema_as_json().unwrap();
        assert!(schema_json.contains("start_date"));
        assert!(schema_json.contains("exchange_rate"));
        assert!(schema_json.contains("maintenance"));
    }

    #[test]
    fn test_contract_terms_from_json_defaults_to_usd() {
        let json = r#"{
            "name": "Acme renewal",
            "years": [
                { "license": 43086.04, "maintenance": 147579.90 },
                { "currency": "EUR", "exchange_rate": 1.08, "license": 100.0, "maintenance": 50.0 }
            ]
        }"#;

        let terms = ContractTerms::from_json_str(json).unwrap();
        assert_eq!(terms.name, "Acme renewal");
        assert_eq!(terms.start_date, None);
        assert_eq!(terms.years.len(), 2);
        assert_eq!(terms.years[0].currency, Currency::Usd);
        assert_eq!(terms.years[0].exchange_rate, None);
        assert_eq!(terms.years[1].currency, Currency::Eur);
        assert_eq!(terms.years[1].exchange_rate, Some(1.08));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = ContractTerms::from_json_str("{ \"years\": 3 }").unwrap_err();
        assert!(matches!(err, RevenueScheduleError::SerializationError(_)));
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" GBP ".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!(Currency::Dkk.to_string(), "DKK");
        assert_eq!(Currency::Zar.name(), "South African Rand");

        let err = "XYZ".parse::<Currency>().unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_contract_from_amounts_numbers_years() {
        let contract = Contract::from_amounts(&[(10.0, 20.0), (0.0, 5.0), (3.0, 0.0)]);
        let indices: Vec<u32> = contract.years.iter().map(|y| y.year_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(contract.total_months(), Some(36));
        assert!((contract.total_license_value() - 13.0).abs() < 1e-9);
        assert!((contract.total_contract_value() - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_options_defaults() {
        let options: ReportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.precision, DecimalPrecision::Cents);
        assert!(options.include_conversion_summary);

        let options: ReportOptions = serde_json::from_str(r#"{ "precision": "Whole" }"#).unwrap();
        assert_eq!(options.precision.fraction_digits(), 0);
    }
}
