use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevenueScheduleError {
    #[error("Invalid input{}: {details}", year_suffix(.year))]
    InvalidInput { year: Option<u32>, details: String },

    #[error("Invalid exchange rate {rate} for year {year} ({currency} to USD): must be a finite number greater than 0")]
    InvalidExchangeRate {
        year: u32,
        currency: String,
        rate: f64,
    },

    #[error("Schedule invariant '{check}' violated: expected {expected}, got {actual}")]
    ScheduleInvariantViolation {
        check: String,
        expected: f64,
        actual: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RevenueScheduleError {
    pub fn invalid_input(year: Option<u32>, details: impl Into<String>) -> Self {
        Self::InvalidInput {
            year,
            details: details.into(),
        }
    }

    /// True for errors caused by the caller's contract data rather than by
    /// I/O or rendering.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::InvalidExchangeRate { .. }
        )
    }
}

fn year_suffix(year: &Option<u32>) -> String {
    match year {
        Some(y) => format!(" for year {}", y),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, RevenueScheduleError>;
