pub mod dashboard;
pub mod init;
pub mod options;
pub mod report;
pub mod status;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::aggregate::Interval;
use crate::error::{PaylensError, Result};
use crate::filter::{BrandFilter, Bounds, CarrierScope, Selection};
use crate::loader::{load_transactions, Encoding, LoadOptions};
use crate::models::Table;
use crate::settings::{load_settings, Settings};

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PaylensError::InvalidDate(raw.to_string()))
}

#[derive(Parser)]
#[command(
    name = "paylens",
    version,
    about = "Explore payment transactions: filter by brand, date, hour, amount and carrier, and chart purchases over time."
)]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the transactions come from. Each flag overrides the saved settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Payment CSV to load (default: the file saved by `paylens init`)
    #[arg(long, global = true)]
    pub file: Option<String>,
    /// Text encoding of the file: utf-8 or latin-1
    #[arg(long, global = true)]
    pub encoding: Option<Encoding>,
    /// Name of the timestamp column
    #[arg(long = "timestamp-column", global = true)]
    pub timestamp_column: Option<String>,
    /// Apply the carrier filter only for a single brand, or always
    #[arg(long = "carrier-scope", value_enum, global = true)]
    pub carrier_scope: Option<CarrierScope>,
}

/// Settings merged with command-line overrides.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub load: LoadOptions,
    pub carrier_scope: CarrierScope,
    pub default_interval: Interval,
}

impl SourceArgs {
    pub fn resolve(&self, settings: &Settings) -> Source {
        let mut load = settings.load_options();
        if let Some(encoding) = self.encoding {
            load.encoding = encoding;
        }
        if let Some(column) = &self.timestamp_column {
            load.timestamp_column = column.clone();
        }
        Source {
            path: PathBuf::from(self.file.as_deref().unwrap_or(&settings.data_file)),
            load,
            carrier_scope: self.carrier_scope.unwrap_or(settings.carrier_scope),
            default_interval: settings.default_interval,
        }
    }

    pub fn resolve_saved(&self) -> Source {
        self.resolve(&load_settings())
    }
}

impl Source {
    pub fn load(&self) -> Result<Table> {
        load_transactions(&self.path, &self.load)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive dashboard (default).
    Dashboard,
    /// Print a chart's data as a table or JSON.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Describe the loaded file.
    Status,
    /// List the brands, carriers and services available for filtering.
    Options {
        /// Restrict to one brand
        #[arg(long)]
        brand: Option<String>,
    },
    /// Save the payment file location; --encoding, --timestamp-column and
    /// --carrier-scope are saved along with it.
    Init {
        /// Path to the payment CSV
        path: String,
        /// Default chart interval: 10m, 15m, 30m, 1h, 2h
        #[arg(long)]
        interval: Option<Interval>,
    },
    /// Print shell completions to stdout.
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Purchases per fixed-width interval.
    Timeline {
        #[command(flatten)]
        filters: FilterArgs,
        /// Interval width: 10m, 15m, 30m, 1h, 2h
        #[arg(long)]
        interval: Option<Interval>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Purchases per 15-minute time-of-day slot on one weekday.
    Weekday {
        #[command(flatten)]
        filters: FilterArgs,
        /// Day of the week, e.g. Monday
        #[arg(long, default_value = "Monday")]
        day: String,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Brand to keep (default: all brands)
    #[arg(long)]
    pub brand: Option<String>,
    /// First date to keep: YYYY-MM-DD
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// Last date to keep: YYYY-MM-DD
    #[arg(long = "to")]
    pub to_date: Option<String>,
    /// Earliest hour of day (0-23)
    #[arg(long = "hour-min", value_parser = clap::value_parser!(u32).range(0..=23))]
    pub hour_min: Option<u32>,
    /// Latest hour of day (0-23)
    #[arg(long = "hour-max", value_parser = clap::value_parser!(u32).range(0..=23))]
    pub hour_max: Option<u32>,
    /// Smallest amount to keep
    #[arg(long = "amount-min")]
    pub amount_min: Option<f64>,
    /// Largest amount to keep
    #[arg(long = "amount-max")]
    pub amount_max: Option<f64>,
    /// Carrier to keep (repeatable; default: all carriers)
    #[arg(long = "carrier")]
    pub carriers: Vec<String>,
    /// Carrier service to keep (repeatable; default: all offered services)
    #[arg(long = "service")]
    pub services: Vec<String>,
}

impl FilterArgs {
    /// Turn flags into a selection. A one-sided range keeps the other side open.
    pub fn selection(&self) -> Result<Selection> {
        let brand = self
            .brand
            .as_deref()
            .map(BrandFilter::from_label)
            .unwrap_or_default();

        let from = self.from_date.as_deref().map(parse_date).transpose()?;
        let to = self.to_date.as_deref().map(parse_date).transpose()?;
        let dates = if from.is_some() || to.is_some() {
            Some(Bounds::new(
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            )?)
        } else {
            None
        };

        let hours = if self.hour_min.is_some() || self.hour_max.is_some() {
            Some(Bounds::new(self.hour_min.unwrap_or(0), self.hour_max.unwrap_or(23))?)
        } else {
            None
        };

        let amounts = if self.amount_min.is_some() || self.amount_max.is_some() {
            Some(Bounds::new(
                self.amount_min.unwrap_or(f64::NEG_INFINITY),
                self.amount_max.unwrap_or(f64::INFINITY),
            )?)
        } else {
            None
        };

        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        Ok(Selection {
            brand,
            dates,
            hours,
            amounts,
            carriers: non_empty(&self.carriers),
            services: non_empty(&self.services),
        })
    }
}
