use chrono::{Local, NaiveDate};
use term_license_revenue::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let terms = match std::env::args().nth(1) {
        Some(path) => ContractTerms::from_json_file(path)?,
        None => ContractTerms {
            name: "Demo Software Co".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            years: vec![
                YearAmounts::usd(43086.04, 147579.90),
                YearAmounts::usd(45240.34, 154958.90),
                YearAmounts::foreign(Currency::Eur, 1.08, 44_000.0, 150_000.0),
            ],
        },
    };

    let processed = process_contract(&terms)?;
    let schedule = &processed.schedule;

    println!(
        "Total license value: ${}",
        format_amount(schedule.total_license_value, DecimalPrecision::Cents)
    );
    println!(
        "Monthly reversal over {} months: ${}",
        schedule.total_months,
        format_amount(schedule.monthly_reversal, DecimalPrecision::Cents)
    );
    println!();

    let report = processed.report(ReportOptions::default());
    print!("{}", report.to_text_table());

    let file_name = default_file_name(Local::now().date_naive());
    report.save_csv(&file_name)?;
    println!("\nReport written to {}", file_name);

    Ok(())
}
