use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

/// One row of the payment file. The date/hour/time fields are derived from
/// `created_at` when the record is built and are `None` exactly when the
/// timestamp failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub created_at: Option<NaiveDateTime>,
    pub date: Option<NaiveDate>,
    pub hour: Option<u32>,
    pub time: Option<NaiveTime>,
    pub brand: String,
    pub carrier: String,
    pub carrier_service: String,
    pub amount: Option<f64>,
}

impl Transaction {
    pub fn new(
        created_at: Option<NaiveDateTime>,
        brand: impl Into<String>,
        carrier: impl Into<String>,
        carrier_service: impl Into<String>,
        amount: Option<f64>,
    ) -> Self {
        Self {
            created_at,
            date: created_at.map(|ts| ts.date()),
            hour: created_at.map(|ts| ts.hour()),
            time: created_at.map(|ts| ts.time()),
            brand: brand.into(),
            carrier: carrier.into(),
            carrier_service: carrier_service.into(),
            amount,
        }
    }

    pub fn weekday(&self) -> Option<Weekday> {
        self.date.map(|d| d.weekday())
    }
}

/// The loaded file. Records are never mutated after load; every filtered
/// view borrows from here.
#[derive(Debug, Clone)]
pub struct Table {
    pub path: std::path::PathBuf,
    pub records: Vec<Transaction>,
}

impl Table {
    pub fn null_timestamps(&self) -> usize {
        self.records.iter().filter(|r| r.created_at.is_none()).count()
    }

    pub fn missing_amounts(&self) -> usize {
        self.records.iter().filter(|r| r.amount.is_none()).count()
    }

    pub fn all(&self) -> Vec<&Transaction> {
        self.records.iter().collect()
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields_follow_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(17, 42, 9)
            .unwrap();
        let t = Transaction::new(Some(ts), "Acme", "DHL", "Express", Some(12.5));
        assert_eq!(t.date, Some(NaiveDate::from_ymd_opt(2024, 11, 3).unwrap()));
        assert_eq!(t.hour, Some(17));
        assert_eq!(t.time, NaiveTime::from_hms_opt(17, 42, 9));
        assert_eq!(t.weekday(), Some(Weekday::Sun));
    }

    #[test]
    fn test_missing_timestamp_leaves_derived_fields_empty() {
        let t = Transaction::new(None, "Acme", "DHL", "Express", None);
        assert!(t.date.is_none());
        assert!(t.hour.is_none());
        assert!(t.time.is_none());
        assert!(t.weekday().is_none());
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(weekday_name(Weekday::Mon), "Monday");
        assert_eq!(weekday_name(Weekday::Mon.pred()), "Sunday");
    }
}
