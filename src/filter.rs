use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PaylensError, Result};
use crate::models::{Table, Transaction};

pub const ALL_LABEL: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrandFilter {
    #[default]
    All,
    Only(String),
}

impl BrandFilter {
    pub fn from_label(label: &str) -> Self {
        if label == ALL_LABEL {
            Self::All
        } else {
            Self::Only(label.to_string())
        }
    }

    pub fn matches(&self, brand: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(b) => b == brand,
        }
    }
}

impl fmt::Display for BrandFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All Brands"),
            Self::Only(b) => write!(f, "{b}"),
        }
    }
}

/// When the carrier predicate takes part in the final filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CarrierScope {
    /// Only when a specific brand is selected. With "All" brands the carrier
    /// selection only narrows the offered services.
    #[default]
    BrandOnly,
    /// Regardless of the brand selection.
    Always,
}

/// Inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + fmt::Debug> Bounds<T> {
    pub fn new(min: T, max: T) -> Result<Self> {
        if min > max {
            return Err(PaylensError::InvalidRange(format!("{min:?} > {max:?}")));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, v: T) -> bool {
        self.min <= v && v <= self.max
    }

    pub fn clamp(&self, v: T) -> T {
        if v < self.min {
            self.min
        } else if v > self.max {
            self.max
        } else {
            v
        }
    }
}

pub const HOUR_BOUNDS: Bounds<u32> = Bounds { min: 0, max: 23 };

// ---------------------------------------------------------------------------
// Options offered by the brand subset
// ---------------------------------------------------------------------------

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}

/// Distinct brands in first-seen order.
pub fn distinct_brands<'a>(records: impl IntoIterator<Item = &'a Transaction>) -> Vec<String> {
    let mut out = Vec::new();
    for r in records {
        push_unique(&mut out, &r.brand);
    }
    out
}

pub fn brand_subset<'a>(
    records: impl IntoIterator<Item = &'a Transaction>,
    brand: &BrandFilter,
) -> Vec<&'a Transaction> {
    records.into_iter().filter(|r| brand.matches(&r.brand)).collect()
}

/// Union of the services observed under each carrier, in carrier order.
pub fn services_for_carriers(records: &[&Transaction], carriers: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for carrier in carriers {
        for r in records.iter().filter(|r| &r.carrier == carrier) {
            push_unique(&mut out, &r.carrier_service);
        }
    }
    out
}

/// Widget choices and default ranges derived from the brand subset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOptions {
    pub date_bounds: Option<Bounds<NaiveDate>>,
    pub amount_bounds: Option<Bounds<f64>>,
    pub carriers: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[&Transaction]) -> Self {
        let mut date_bounds: Option<Bounds<NaiveDate>> = None;
        let mut amount_bounds: Option<Bounds<f64>> = None;
        let mut carriers = Vec::new();
        for r in records {
            if let Some(d) = r.date {
                date_bounds = Some(match date_bounds {
                    Some(b) => Bounds { min: b.min.min(d), max: b.max.max(d) },
                    None => Bounds { min: d, max: d },
                });
            }
            if let Some(a) = r.amount {
                amount_bounds = Some(match amount_bounds {
                    Some(b) => Bounds { min: b.min.min(a), max: b.max.max(a) },
                    None => Bounds { min: a, max: a },
                });
            }
            push_unique(&mut carriers, &r.carrier);
        }
        Self {
            date_bounds,
            amount_bounds,
            carriers,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Concrete predicate set. A `None` range means "no bound", but records
/// missing the underlying value still fail that predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub brand: BrandFilter,
    pub dates: Option<Bounds<NaiveDate>>,
    pub hours: Bounds<u32>,
    pub amounts: Option<Bounds<f64>>,
    pub carriers: Vec<String>,
    pub services: Vec<String>,
    pub carrier_scope: CarrierScope,
}

impl FilterParams {
    fn carrier_applies(&self) -> bool {
        match self.carrier_scope {
            CarrierScope::Always => true,
            CarrierScope::BrandOnly => self.brand != BrandFilter::All,
        }
    }

    pub fn matches(&self, r: &Transaction) -> bool {
        if !self.brand.matches(&r.brand) {
            return false;
        }
        let Some(date) = r.date else { return false };
        if let Some(b) = &self.dates {
            if !b.contains(date) {
                return false;
            }
        }
        match r.hour {
            Some(h) if self.hours.contains(h) => {}
            _ => return false,
        }
        let Some(amount) = r.amount else { return false };
        if let Some(b) = &self.amounts {
            if !b.contains(amount) {
                return false;
            }
        }
        if self.carrier_applies() && !self.carriers.contains(&r.carrier) {
            return false;
        }
        self.services.contains(&r.carrier_service)
    }
}

/// Apply every predicate. Re-applying the same params to the output is a no-op.
pub fn apply<'a>(
    records: impl IntoIterator<Item = &'a Transaction>,
    params: &FilterParams,
) -> Vec<&'a Transaction> {
    records.into_iter().filter(|r| params.matches(r)).collect()
}

/// What the user has picked so far. `None` fields fall back to defaults
/// computed from the brand subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub brand: BrandFilter,
    pub dates: Option<Bounds<NaiveDate>>,
    pub hours: Option<Bounds<u32>>,
    pub amounts: Option<Bounds<f64>>,
    pub carriers: Option<Vec<String>>,
    pub services: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub params: FilterParams,
    pub options: FilterOptions,
    pub offered_services: Vec<String>,
}

impl Resolved {
    /// Applied date range narrowed to the dates present in the brand subset.
    pub fn date_span(&self) -> Option<Bounds<NaiveDate>> {
        let data = self.options.date_bounds?;
        let applied = self.params.dates.unwrap_or(data);
        Bounds::new(applied.min.max(data.min), applied.max.min(data.max)).ok()
    }
}

impl Selection {
    /// Resolve against the table in dependency order: brand, then range
    /// defaults, then carriers, then the services those carriers offer.
    pub fn resolve(&self, table: &Table, scope: CarrierScope) -> Resolved {
        let subset = brand_subset(&table.records, &self.brand);
        let options = FilterOptions::from_records(&subset);

        let carriers = match &self.carriers {
            Some(picked) => options
                .carriers
                .iter()
                .filter(|c| picked.contains(c))
                .cloned()
                .collect(),
            None => options.carriers.clone(),
        };
        let offered_services = services_for_carriers(&subset, &carriers);
        let services = match &self.services {
            Some(picked) => offered_services
                .iter()
                .filter(|s| picked.contains(s))
                .cloned()
                .collect(),
            None => offered_services.clone(),
        };

        if scope == CarrierScope::BrandOnly
            && self.brand == BrandFilter::All
            && carriers.len() < options.carriers.len()
        {
            warn!(
                selected = carriers.len(),
                available = options.carriers.len(),
                "carrier selection is not applied while all brands are selected"
            );
        }

        let params = FilterParams {
            brand: self.brand.clone(),
            dates: self.dates.or(options.date_bounds),
            hours: self.hours.unwrap_or(HOUR_BOUNDS),
            amounts: self.amounts.or(options.amount_bounds),
            carriers,
            services,
            carrier_scope: scope,
        };
        debug!(?params, "resolved filter selection");
        Resolved {
            params,
            options,
            offered_services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").ok()
    }

    fn txn(at: &str, brand: &str, carrier: &str, service: &str, amount: f64) -> Transaction {
        Transaction::new(ts(at), brand, carrier, service, Some(amount))
    }

    fn sample_table() -> Table {
        Table {
            path: "sample.csv".into(),
            records: vec![
                txn("2024-10-01 09:10", "Acme", "DHL", "Express", 10.0),
                txn("2024-10-01 13:40", "Acme", "DHL", "Economy", 25.0),
                txn("2024-10-02 18:05", "Acme", "UPS", "Ground", 40.0),
                txn("2024-10-03 07:55", "Bolt", "DHL", "Express", 55.0),
                txn("2024-10-05 22:30", "Bolt", "FedEx", "Priority", 90.0),
                Transaction::new(None, "Acme", "DHL", "Express", Some(12.0)),
            ],
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_distinct_brands_first_seen_order() {
        let t = sample_table();
        assert_eq!(distinct_brands(&t.records), vec!["Acme", "Bolt"]);
    }

    #[test]
    fn test_options_from_brand_subset() {
        let t = sample_table();
        let subset = brand_subset(&t.records, &BrandFilter::Only("Bolt".into()));
        let opts = FilterOptions::from_records(&subset);
        assert_eq!(opts.carriers, vec!["DHL", "FedEx"]);
        assert_eq!(opts.date_bounds, Some(Bounds { min: d("2024-10-03"), max: d("2024-10-05") }));
        assert_eq!(opts.amount_bounds, Some(Bounds { min: 55.0, max: 90.0 }));
    }

    #[test]
    fn test_options_ignore_null_timestamps() {
        let t = Table {
            path: "x.csv".into(),
            records: vec![Transaction::new(None, "Acme", "DHL", "Express", Some(1.0))],
        };
        let opts = FilterOptions::from_records(&t.all());
        assert!(opts.date_bounds.is_none());
        assert_eq!(opts.carriers, vec!["DHL"]);
    }

    #[test]
    fn test_services_union_follows_carriers() {
        let t = sample_table();
        let all = t.all();
        let services = services_for_carriers(&all, &["UPS".to_string(), "DHL".to_string()]);
        assert_eq!(services, vec!["Ground", "Express", "Economy"]);
        assert!(services_for_carriers(&all, &[]).is_empty());
    }

    #[test]
    fn test_default_selection_keeps_every_timestamped_record() {
        let t = sample_table();
        let resolved = Selection::default().resolve(&t, CarrierScope::BrandOnly);
        let out = apply(&t.records, &resolved.params);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|r| r.created_at.is_some()));
    }

    #[test]
    fn test_ranges_are_inclusive() {
        let t = sample_table();
        let sel = Selection {
            dates: Some(Bounds::new(d("2024-10-01"), d("2024-10-02")).unwrap()),
            hours: Some(Bounds::new(9, 18).unwrap()),
            amounts: Some(Bounds::new(10.0, 40.0).unwrap()),
            ..Selection::default()
        };
        let out = apply(&t.records, &sel.resolve(&t, CarrierScope::BrandOnly).params);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_carrier_selection_restricts_brand_results() {
        let t = sample_table();
        let sel = Selection {
            brand: BrandFilter::Only("Acme".into()),
            carriers: Some(vec!["DHL".into()]),
            ..Selection::default()
        };
        let resolved = sel.resolve(&t, CarrierScope::BrandOnly);
        assert_eq!(resolved.offered_services, vec!["Express", "Economy"]);
        let out = apply(&t.records, &resolved.params);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.carrier == "DHL"));
    }

    #[test]
    fn test_all_brands_bypasses_carrier_predicate_by_default() {
        let t = Table {
            path: "x.csv".into(),
            records: vec![
                txn("2024-10-01 09:10", "Acme", "DHL", "Standard", 10.0),
                txn("2024-10-01 10:10", "Acme", "UPS", "Standard", 10.0),
            ],
        };
        let sel = Selection {
            carriers: Some(vec!["DHL".into()]),
            ..Selection::default()
        };
        let out = apply(&t.records, &sel.resolve(&t, CarrierScope::BrandOnly).params);
        assert_eq!(out.len(), 2);
        let out = apply(&t.records, &sel.resolve(&t, CarrierScope::Always).params);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].carrier, "DHL");
    }

    #[test]
    fn test_empty_carrier_selection_yields_nothing() {
        let t = sample_table();
        let sel = Selection {
            carriers: Some(vec![]),
            ..Selection::default()
        };
        let resolved = sel.resolve(&t, CarrierScope::BrandOnly);
        assert!(resolved.offered_services.is_empty());
        assert!(apply(&t.records, &resolved.params).is_empty());
    }

    #[test]
    fn test_services_are_intersected_with_offered() {
        let t = sample_table();
        let sel = Selection {
            brand: BrandFilter::Only("Acme".into()),
            carriers: Some(vec!["UPS".into()]),
            services: Some(vec!["Express".into(), "Ground".into()]),
            ..Selection::default()
        };
        let resolved = sel.resolve(&t, CarrierScope::BrandOnly);
        assert_eq!(resolved.params.services, vec!["Ground"]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let t = sample_table();
        let sel = Selection {
            hours: Some(Bounds::new(8, 20).unwrap()),
            ..Selection::default()
        };
        let params = sel.resolve(&t, CarrierScope::Always).params;
        let once = apply(&t.records, &params);
        let twice = apply(once.iter().copied(), &params);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_is_order_independent() {
        let t = sample_table();
        let params = Selection {
            amounts: Some(Bounds::new(20.0, 60.0).unwrap()),
            ..Selection::default()
        }
        .resolve(&t, CarrierScope::BrandOnly)
        .params;
        let forward = apply(&t.records, &params);
        let mut backward = apply(t.records.iter().rev(), &params);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    fn apply_in_order<'a>(
        records: &'a [Transaction],
        steps: &[FilterParams],
        order: &[usize],
    ) -> Vec<&'a Transaction> {
        let mut out: Vec<&Transaction> = records.iter().collect();
        for &i in order {
            out = apply(out, &steps[i]);
        }
        out
    }

    #[test]
    fn test_predicate_order_does_not_change_result() {
        let t = sample_table();
        let open = Selection::default().resolve(&t, CarrierScope::Always).params;
        let brand = BrandFilter::Only("Acme".into());
        let dates = Some(Bounds::new(d("2024-10-01"), d("2024-10-02")).unwrap());
        let hours = Bounds::new(9, 18).unwrap();
        let amounts = Some(Bounds::new(5.0, 30.0).unwrap());
        let carriers = vec!["DHL".to_string()];
        let services = vec!["Express".to_string(), "Economy".to_string()];

        // One predicate narrowed per step, the rest left open.
        let steps = vec![
            FilterParams { brand: brand.clone(), ..open.clone() },
            FilterParams { dates, ..open.clone() },
            FilterParams { hours, ..open.clone() },
            FilterParams { amounts, ..open.clone() },
            FilterParams { carriers: carriers.clone(), ..open.clone() },
            FilterParams { services: services.clone(), ..open.clone() },
        ];
        let all_at_once = FilterParams {
            brand,
            dates,
            hours,
            amounts,
            carriers,
            services,
            carrier_scope: CarrierScope::Always,
        };
        let expected = apply(&t.records, &all_at_once);
        assert_eq!(expected.len(), 2);

        for order in [[0, 1, 2, 3, 4, 5], [5, 4, 3, 2, 1, 0], [3, 0, 5, 1, 4, 2]] {
            assert_eq!(apply_in_order(&t.records, &steps, &order), expected);
        }
    }

    #[test]
    fn test_date_span_is_clamped_to_data() {
        let t = sample_table();
        let sel = Selection {
            dates: Some(Bounds::new(NaiveDate::MIN, d("2024-10-03")).unwrap()),
            ..Selection::default()
        };
        let span = sel.resolve(&t, CarrierScope::BrandOnly).date_span().unwrap();
        assert_eq!(span, Bounds { min: d("2024-10-01"), max: d("2024-10-03") });

        let sel = Selection {
            dates: Some(Bounds::new(d("2025-01-01"), d("2025-01-31")).unwrap()),
            ..Selection::default()
        };
        assert!(sel.resolve(&t, CarrierScope::BrandOnly).date_span().is_none());
    }

    #[test]
    fn test_missing_amount_never_matches() {
        let t = Table {
            path: "x.csv".into(),
            records: vec![Transaction::new(ts("2024-10-01 09:10"), "Acme", "DHL", "X", None)],
        };
        let params = Selection::default().resolve(&t, CarrierScope::BrandOnly).params;
        assert!(params.amounts.is_none());
        assert!(apply(&t.records, &params).is_empty());
    }

    #[test]
    fn test_bounds_reject_inverted_range() {
        assert!(Bounds::new(5, 3).is_err());
        let b = Bounds::new(2.0, 4.0).unwrap();
        assert_eq!(b.clamp(9.0), 4.0);
        assert_eq!(b.clamp(-1.0), 2.0);
    }
}
