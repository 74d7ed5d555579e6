use crate::error::Result;
use crate::normalizer::ConvertedYear;
use crate::schema::{DecimalPrecision, ReportOptions, RevenueSchedule, RevenueTotals, ScheduleRow};
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;

pub const REPORT_TITLE: &str = "Term License Revenue Recognition Schedule - All values in USD";

pub const SCHEDULE_HEADER: [&str; 5] = [
    "Month",
    "Ratable Service Revenue (Maint + License)",
    "Upfront Term License Revenue",
    "Monthly Reversal of Upfront License",
    "Total Net Recognized Revenue",
];

const CONVERSION_HEADER: [&str; 7] = [
    "Year",
    "Currency",
    "License (Original)",
    "Maintenance (Original)",
    "Exchange Rate",
    "License (USD)",
    "Maintenance (USD)",
];

enum ReportLine<'a> {
    YearHeader(u32),
    Month(&'a ScheduleRow),
    Subtotal(u32, RevenueTotals),
    GrandTotal(RevenueTotals),
}

/// Read-only renderings of a generated schedule. Rounding happens here and
/// only here.
pub struct ScheduleReport<'a> {
    schedule: &'a RevenueSchedule,
    conversions: Option<&'a [ConvertedYear]>,
    contract_name: Option<&'a str>,
    options: ReportOptions,
}

impl<'a> ScheduleReport<'a> {
    pub fn new(schedule: &'a RevenueSchedule, options: ReportOptions) -> Self {
        Self {
            schedule,
            conversions: None,
            contract_name: None,
            options,
        }
    }

    pub fn with_conversions(mut self, conversions: &'a [ConvertedYear]) -> Self {
        self.conversions = Some(conversions);
        self
    }

    pub fn with_contract_name(mut self, name: &'a str) -> Self {
        if !name.trim().is_empty() {
            self.contract_name = Some(name);
        }
        self
    }

    fn lines(&self) -> Vec<ReportLine<'a>> {
        let mut lines = Vec::with_capacity(self.schedule.rows.len() + 2 * self.schedule.year_totals.len() + 1);
        let schedule = self.schedule;
        let mut current_year: Option<u32> = None;

        for row in &schedule.rows {
            if current_year != Some(row.year) {
                if let Some(year) = current_year {
                    lines.push(ReportLine::Subtotal(year, self.year_totals(year)));
                }
                lines.push(ReportLine::YearHeader(row.year));
                current_year = Some(row.year);
            }
            lines.push(ReportLine::Month(row));
        }

        if let Some(year) = current_year {
            lines.push(ReportLine::Subtotal(year, self.year_totals(year)));
        }
        lines.push(ReportLine::GrandTotal(schedule.grand_totals));

        lines
    }

    fn year_totals(&self, year: u32) -> RevenueTotals {
        self.schedule
            .year_totals
            .get(&year)
            .copied()
            .unwrap_or_default()
    }

    fn amounts(&self, totals: &RevenueTotals) -> [String; 4] {
        let p = self.options.precision;
        [
            format_amount(totals.ratable, p),
            format_amount(totals.upfront, p),
            format_amount(totals.reversal, p),
            format_amount(totals.total, p),
        ]
    }

    fn row_amounts(&self, row: &ScheduleRow) -> [String; 4] {
        let p = self.options.precision;
        [
            format_amount(row.ratable_service_revenue, p),
            format_amount(row.upfront_license_revenue, p),
            format_amount(row.monthly_reversal, p),
            format_amount(row.total_net_revenue, p),
        ]
    }

    pub fn write_csv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);

        writer.write_record([REPORT_TITLE])?;
        if let Some(name) = self.contract_name {
            writer.write_record(["Contract", name])?;
        }

        if self.options.include_conversion_summary {
            if let Some(conversions) = self.conversions {
                writer.write_record(["Currency Conversion Summary"])?;
                writer.write_record(CONVERSION_HEADER)?;
                for c in conversions {
                    writer.write_record(self.conversion_fields(c))?;
                }
            }
        }

        writer.write_record(["Revenue Recognition Schedule (USD)"])?;
        writer.write_record(SCHEDULE_HEADER)?;

        for line in self.lines() {
            match line {
                ReportLine::YearHeader(year) => {
                    writer.write_record([format!("Year {}", year)])?;
                }
                ReportLine::Month(row) => {
                    let [a, b, c, d] = self.row_amounts(row);
                    writer.write_record([month_label(row), a, b, c, d])?;
                }
                ReportLine::Subtotal(year, totals) => {
                    let [a, b, c, d] = self.amounts(&totals);
                    writer.write_record([format!("Year {} Subtotal", year), a, b, c, d])?;
                }
                ReportLine::GrandTotal(totals) => {
                    let [a, b, c, d] = self.amounts(&totals);
                    writer.write_record(["Total".to_string(), a, b, c, d])?;
                }
            }
        }

        writer.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    fn conversion_fields(&self, c: &ConvertedYear) -> [String; 7] {
        let p = self.options.precision;
        let rate = if c.currency.is_usd() {
            "N/A".to_string()
        } else {
            format!("{:.6}", c.exchange_rate)
        };
        [
            format!("Year {}", c.year),
            c.currency.code().to_string(),
            format_amount(c.license_original, p),
            format_amount(c.maintenance_original, p),
            rate,
            format_amount(c.license_usd, p),
            format_amount(c.maintenance_usd, p),
        ]
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        match self.contract_name {
            Some(name) => output.push_str(&format!(
                "# Revenue Recognition Schedule - {}\n\n",
                escape_markdown(name)
            )),
            None => output.push_str("# Revenue Recognition Schedule\n\n"),
        }
        output.push_str(&format!(
            "**Total License Value:** {} USD | **Term:** {} months | **Monthly Reversal:** {} USD\n\n",
            format_amount(self.schedule.total_license_value, self.options.precision),
            self.schedule.total_months,
            format_amount(self.schedule.monthly_reversal, self.options.precision),
        ));

        output.push_str(&format!("| {} |\n", SCHEDULE_HEADER.join(" | ")));
        output.push_str("|---|---:|---:|---:|---:|\n");

        for line in self.lines() {
            match line {
                ReportLine::YearHeader(year) => {
                    output.push_str(&format!("| **Year {}** | | | | |\n", year));
                }
                ReportLine::Month(row) => {
                    let [a, b, c, d] = self.row_amounts(row);
                    output.push_str(&format!(
                        "| {} | {} | {} | {} | {} |\n",
                        month_label(row),
                        a,
                        b,
                        c,
                        d
                    ));
                }
                ReportLine::Subtotal(year, totals) => {
                    let [a, b, c, d] = self.amounts(&totals);
                    output.push_str(&format!(
                        "| **Year {} Subtotal** | **{}** | **{}** | **{}** | **{}** |\n",
                        year, a, b, c, d
                    ));
                }
                ReportLine::GrandTotal(totals) => {
                    let [a, b, c, d] = self.amounts(&totals);
                    output.push_str(&format!(
                        "| **Total** | **{}** | **{}** | **{}** | **{}** |\n",
                        a, b, c, d
                    ));
                }
            }
        }

        output
    }

    pub fn to_text_table(&self) -> String {
        let label_width = 24;
        let amount_width = 18;

        let mut output = String::new();
        output.push_str(&format!(
            "{:<label_width$}{:>amount_width$}{:>amount_width$}{:>amount_width$}{:>amount_width$}\n",
            "Month", "Ratable", "Upfront", "Reversal", "Total Net"
        ));
        output.push_str(&format!("{}\n", "-".repeat(label_width + 4 * amount_width)));

        for line in self.lines() {
            let (label, amounts) = match line {
                ReportLine::YearHeader(year) => {
                    output.push_str(&format!("Year {}\n", year));
                    continue;
                }
                ReportLine::Month(row) => (month_label(row), self.row_amounts(row)),
                ReportLine::Subtotal(year, totals) => {
                    (format!("Year {} Subtotal", year), self.amounts(&totals))
                }
                ReportLine::GrandTotal(totals) => ("Total".to_string(), self.amounts(&totals)),
            };
            let [a, b, c, d] = amounts;
            output.push_str(&format!(
                "{:<label_width$}{:>amount_width$}{:>amount_width$}{:>amount_width$}{:>amount_width$}\n",
                label, a, b, c, d
            ));
        }

        output
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.schedule)?)
    }
}

fn month_label(row: &ScheduleRow) -> String {
    match row.period_end {
        Some(date) => format!("Month {} ({})", row.absolute_month, date.format("%b %Y")),
        None => format!("Month {}", row.absolute_month),
    }
}

/// Keeps free text on one line and stops `|` from opening a table cell.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '|' | '*' | '_' | '`' | '#' | '[' | ']' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\r' | '\n' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn default_file_name(date: NaiveDate) -> String {
    format!(
        "revenue-recognition-schedule-{}.csv",
        date.format("%Y-%m-%d")
    )
}

/// Rounds half away from zero to the configured number of fraction digits
/// and groups thousands with commas. A value that rounds to zero never
/// carries a minus sign.
pub fn format_amount(value: f64, precision: DecimalPrecision) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let digits = precision.fraction_digits();
    let factor = 10f64.powi(digits as i32);
    let rounded = (value * factor).round() / factor;

    let text = format!("{:.*}", digits, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut output = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded < 0.0 {
        output.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    if let Some(frac) = frac_part {
        output.push('.');
        output.push_str(frac);
    }

    output
}
