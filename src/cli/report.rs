use chrono::{NaiveDate, Weekday};
use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{
    parse_weekday, purchases_over_time, weekday_profile, Bucket, Interval, WeekdayProfile,
};
use crate::cli::{FilterArgs, Source};
use crate::error::Result;
use crate::filter::{apply, Resolved, Selection};
use crate::fmt::{money, number};
use crate::models::{weekday_name, Table as TransactionTable, Transaction};

pub const NO_DATA: &str = "No data available for the selected filters.";

pub fn no_weekday_data(day: Weekday) -> String {
    format!("No data available for {}s within the selected date range.", weekday_name(day))
}

/// Run the filter chain for a selection.
pub fn run_filters<'a>(
    table: &'a TransactionTable,
    selection: &Selection,
    source: &Source,
) -> (Resolved, Vec<&'a Transaction>) {
    let resolved = selection.resolve(table, source.carrier_scope);
    let filtered = apply(&table.records, &resolved.params);
    info!(matched = filtered.len(), total = table.records.len(), "applied filters");
    (resolved, filtered)
}

/// One-line summary of the active filters.
pub fn describe(resolved: &Resolved, matched: usize) -> String {
    let p = &resolved.params;
    let open_date = |d: NaiveDate| {
        if d == NaiveDate::MIN || d == NaiveDate::MAX {
            "any".to_string()
        } else {
            d.to_string()
        }
    };
    let open_money = |v: f64| if v.is_finite() { money(v) } else { "any".to_string() };
    let dates = p
        .dates
        .map(|b| format!("{} to {}", open_date(b.min), open_date(b.max)))
        .unwrap_or_else(|| "any".to_string());
    let amounts = p
        .amounts
        .map(|b| format!("{} to {}", open_money(b.min), open_money(b.max)))
        .unwrap_or_else(|| "any".to_string());
    format!(
        "Brand: {} | Dates: {} | Hours: {}-{} | Amount: {} | Carriers: {} of {} | Services: {} of {} | Matching: {}",
        p.brand,
        dates,
        p.hours.min,
        p.hours.max,
        amounts,
        p.carriers.len(),
        resolved.options.carriers.len(),
        p.services.len(),
        resolved.offered_services.len(),
        number(matched),
    )
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TimelineReport<'a> {
    brand: String,
    interval: Interval,
    matched: usize,
    buckets: &'a [Bucket],
}

pub fn timeline(
    source: &Source,
    filters: &FilterArgs,
    interval: Option<Interval>,
    json: bool,
) -> Result<()> {
    let table = source.load()?;
    let selection = filters.selection()?;
    let interval = interval.unwrap_or(source.default_interval);
    let (resolved, filtered) = run_filters(&table, &selection, source);
    let buckets = purchases_over_time(&filtered, interval);

    if json {
        let report = TimelineReport {
            brand: resolved.params.brand.to_string(),
            interval,
            matched: filtered.len(),
            buckets: &buckets,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", describe(&resolved, filtered.len()));
        println!("{}", format_timeline(&buckets, interval));
    }
    Ok(())
}

pub fn format_timeline(buckets: &[Bucket], interval: Interval) -> String {
    if buckets.is_empty() {
        return NO_DATA.yellow().to_string();
    }
    let mut table = Table::new();
    table.set_header(vec![format!("Interval start ({interval})"), "Purchases".to_string()]);
    for b in buckets {
        table.add_row(vec![
            Cell::new(b.start.format("%Y-%m-%d %H:%M")),
            Cell::new(number(b.count)),
        ]);
    }
    let total: usize = buckets.iter().map(|b| b.count).sum();
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(number(total))]);
    table.to_string()
}

// ---------------------------------------------------------------------------
// Weekday
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WeekdayReport<'a> {
    brand: String,
    matched: usize,
    profile: &'a WeekdayProfile,
}

pub fn weekday(source: &Source, filters: &FilterArgs, day: &str, json: bool) -> Result<()> {
    let day = parse_weekday(day)?;
    let table = source.load()?;
    let selection = filters.selection()?;
    let (resolved, filtered) = run_filters(&table, &selection, source);
    let profile = weekday_profile(&filtered, day, resolved.date_span());

    if json {
        let report = WeekdayReport {
            brand: resolved.params.brand.to_string(),
            matched: filtered.len(),
            profile: &profile,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", describe(&resolved, filtered.len()));
        println!("{}", format_weekday(&profile, day));
    }
    Ok(())
}

pub fn format_weekday(profile: &WeekdayProfile, day: Weekday) -> String {
    if profile.is_empty() {
        return no_weekday_data(day).yellow().to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Time of day", "Purchases", "Avg per day"]);
    for slot in &profile.slots {
        table.add_row(vec![
            Cell::new(slot.time.format("%H:%M")),
            Cell::new(number(slot.count)),
            Cell::new(format!("{:.2}", slot.average)),
        ]);
    }
    format!(
        "{}s across {} day(s)\n{table}",
        profile.weekday,
        number(profile.days)
    )
}
