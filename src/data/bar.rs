use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BarError {
    #[error("Bar at {0} has a non-finite or non-positive price")]
    InvalidPrice(DateTime<Utc>),
    #[error("Bar at {timestamp}: high ({high}) < low ({low})")]
    InvalidHighLow {
        timestamp: DateTime<Utc>,
        high: f64,
        low: f64,
    },
    #[error("Bar at {timestamp}: {field} ({value}) outside high-low range [{low}, {high}]")]
    OutsideRange {
        timestamp: DateTime<Utc>,
        field: &'static str,
        value: f64,
        high: f64,
        low: f64,
    },
}

//one minute (or other interval) of trading in a single contract
//timestamp is the bar close time once normalized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    //creates a bar and checks its prices are consistent
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, BarError> {
        let bar = Bar {
            timestamp,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    pub fn validate(&self) -> Result<(), BarError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarError::InvalidPrice(self.timestamp));
        }

        if self.high < self.low {
            return Err(BarError::InvalidHighLow {
                timestamp: self.timestamp,
                high: self.high,
                low: self.low,
            });
        }

        for (field, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(BarError::OutsideRange {
                    timestamp: self.timestamp,
                    field,
                    value,
                    high: self.high,
                    low: self.low,
                });
            }
        }

        Ok(())
    }
}
