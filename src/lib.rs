//! # Term License Revenue
//!
//! A library for turning multi-year software term license and maintenance
//! contracts into month-by-month revenue recognition schedules.
//!
//! ## Core Concepts
//!
//! - **Upfront License Revenue**: The entire multi-year license fee, recognized in the first month of the contract
//! - **Ratable Service Revenue**: Each year's license + maintenance value, spread evenly over that year's 12 months
//! - **Monthly Reversal**: A constant monthly offset that amortizes the upfront amount back out over the full term
//! - **Total Net Recognized Revenue**: Ratable + upfront + reversal for a given month
//!
//! Over the life of the contract the upfront recognition and the reversals
//! cancel, so the schedule's grand total always equals the sum of every
//! year's license and maintenance value.
//!
//! ## Example
//!
//! ```rust
//! use term_license_revenue::*;
//!
//! let terms = ContractTerms {
//!     name: "Acme renewal".to_string(),
//!     start_date: None,
//!     years: vec![
//!         YearAmounts::usd(43086.04, 147579.90),
//!         YearAmounts::foreign(Currency::Eur, 1.08, 40_000.0, 130_000.0),
//!     ],
//! };
//!
//! let processed = process_contract(&terms).unwrap();
//! assert_eq!(processed.schedule.rows.len(), 24);
//!
//! let csv = processed.report(ReportOptions::default()).to_csv().unwrap();
//! assert!(csv.contains("Year 2 Subtotal"));
//! ```

pub mod engine;
pub mod error;
pub mod normalizer;
pub mod report;
pub mod schema;
pub mod utils;
pub mod verification;

pub use engine::{accumulate_totals, contract_months, generate, validate_contract, ScheduleGenerator};
pub use error::{Result, RevenueScheduleError};
pub use normalizer::{convert_year, normalize_terms, ConvertedYear, NormalizedContract};
pub use report::{default_file_name, format_amount, ScheduleReport};
pub use schema::*;
pub use verification::{verify_schedule, ScheduleVerifier};

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// A normalized contract together with the schedule generated from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedContract {
    pub normalized: NormalizedContract,
    pub schedule: RevenueSchedule,
}

impl ProcessedContract {
    pub fn report(&self, options: ReportOptions) -> ScheduleReport<'_> {
        ScheduleReport::new(&self.schedule, options)
            .with_conversions(&self.normalized.conversions)
            .with_contract_name(&self.normalized.name)
    }
}

pub struct RevenueScheduleProcessor;

impl RevenueScheduleProcessor {
    pub fn process(terms: &ContractTerms) -> Result<ProcessedContract> {
        Self::process_with_verification(terms, DEFAULT_TOLERANCE)
    }

    pub fn process_with_verification(
        terms: &ContractTerms,
        tolerance: f64,
    ) -> Result<ProcessedContract> {
        let normalized = normalize_terms(terms)?;

        info!(
            "Generating revenue schedule for contract '{}': {} years, total license value {:.2} USD",
            normalized.name,
            normalized.contract.len(),
            normalized.contract.total_license_value()
        );

        let schedule =
            ScheduleGenerator::with_start_date(normalized.start_date).generate(&normalized.contract)?;

        verify_schedule(&normalized.contract, &schedule, tolerance)?;

        debug!(
            "Schedule has {} rows; grand total {:.2} USD",
            schedule.rows.len(),
            schedule.grand_totals.total
        );

        Ok(ProcessedContract {
            normalized,
            schedule,
        })
    }
}

pub fn process_contract(terms: &ContractTerms) -> Result<ProcessedContract> {
    RevenueScheduleProcessor::process(terms)
}

pub fn process_with_verification(
    terms: &ContractTerms,
    tolerance: f64,
) -> Result<ProcessedContract> {
    RevenueScheduleProcessor::process_with_verification(terms, tolerance)
}
