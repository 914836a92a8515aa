use crate::data::bar::{Bar, BarError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//one row of a vendor ohlcv response, as decoded from dbn
//timestamp holds the vendor event time until normalization moves it to bar close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    pub timestamp: DateTime<Utc>,
    pub rtype: u8,
    pub publisher_id: u16,
    pub instrument_id: u32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub symbol: Option<String>,
}

impl OhlcvRecord {
    //column order of the cleaned csv
    pub const COLUMNS: [&'static str; 10] = [
        "timestamp",
        "rtype",
        "publisher_id",
        "instrument_id",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "symbol",
    ];

    //converts to a validated engine bar, empty symbol when unresolved
    pub fn to_bar(&self) -> Result<Bar, BarError> {
        Bar::new(
            self.timestamp,
            self.symbol.clone().unwrap_or_default(),
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}
