use crate::data::Bar;
use chrono::{DateTime, Duration, Utc};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

//builds bars one minute apart from a list of closes, open equals the previous close
pub fn make_bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    let base = ts("2024-01-02T14:30:00Z");
    let mut prev = closes.first().copied().unwrap_or(0.0);

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar::new(
                base + Duration::minutes(i as i64),
                symbol,
                open,
                open.max(close) + 0.25,
                open.min(close) - 0.25,
                close,
                100,
            )
            .unwrap()
        })
        .collect()
}

#[path = "../tests/common/dbn_builder.rs"]
mod dbn_builder;

pub use dbn_builder::DbnBuilder;
