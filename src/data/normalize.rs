use crate::data::record::OhlcvRecord;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use tracing::debug;

//cleans a decoded response into one bar per timestamp for a single symbol
//
//rows are sorted by event time, restricted to filter_symbol, de-duplicated on
//timestamp keeping the last row received, then shifted by bar_interval so the
//timestamp marks the bar close
pub fn normalize(
    mut records: Vec<OhlcvRecord>,
    filter_symbol: &str,
    bar_interval: Duration,
) -> Vec<OhlcvRecord> {
    let received = records.len();

    //stable sort keeps arrival order among equal timestamps
    records.sort_by_key(|r| r.timestamp);

    let mut by_timestamp: IndexMap<DateTime<Utc>, OhlcvRecord> = IndexMap::new();
    for record in records
        .into_iter()
        .filter(|r| r.symbol.as_deref() == Some(filter_symbol))
    {
        //insert replaces the value in place, so order survives
        by_timestamp.insert(record.timestamp, record);
    }

    let cleaned: Vec<OhlcvRecord> = by_timestamp
        .into_values()
        .map(|mut r| {
            r.timestamp += bar_interval;
            r
        })
        .collect();

    debug!(
        received,
        kept = cleaned.len(),
        filter_symbol,
        "normalized bar records"
    );

    cleaned
}
