use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InstrumentError {
    #[error("Invalid expiry month {0}, expected 1-12")]
    InvalidExpiryMonth(u32),
    #[error("Invalid tick size {0}, must be positive")]
    InvalidTickSize(f64),
}

//cme month codes, january first
const MONTH_CODES: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

//represents a futures contract specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesContract {
    //product root (eg es, nq)
    pub root: String,

    //exchange symbol of this expiry (eg esh4)
    pub symbol: String,

    //contract month (eg 2024-03)
    pub contract_month: String,

    //minimum price fluctuation
    pub tick_size: f64,

    //dollar value of one tick
    pub tick_value: f64,

    //dollar value of one full point move
    pub point_value: f64,

    //venue where traded
    pub venue: String,

    //currency denomination
    pub currency: String,

    //contract multiplier (often same as point_value)
    pub multiplier: f64,

    //initial margin per contract
    pub initial_margin: f64,

    //maintenance margin per contract
    pub maintenance_margin: f64,
}

impl FuturesContract {
    //creates a contract for one expiry of a product
    //symbol follows the exchange convention root + month code + last year digit
    #[allow(clippy::too_many_arguments)]
    pub fn future(
        root: &str,
        expiry_year: i32,
        expiry_month: u32,
        venue: &str,
        tick_size: f64,
        tick_value: f64,
        initial_margin: f64,
        maintenance_margin: f64,
    ) -> Result<Self, InstrumentError> {
        let month_code = month_code(expiry_month)?;
        if tick_size <= 0.0 {
            return Err(InstrumentError::InvalidTickSize(tick_size));
        }

        let point_value = tick_value / tick_size;

        Ok(FuturesContract {
            root: root.to_string(),
            symbol: format!("{}{}{}", root, month_code, expiry_year.rem_euclid(10)),
            contract_month: format!("{:04}-{:02}", expiry_year, expiry_month),
            tick_size,
            tick_value,
            point_value,
            venue: venue.to_string(),
            currency: "USD".to_string(),
            multiplier: point_value,
            initial_margin,
            maintenance_margin,
        })
    }

    //e-mini s&p 500 on globex
    pub fn es_future(expiry_year: i32, expiry_month: u32) -> Result<Self, InstrumentError> {
        FuturesContract::future(
            "ES",
            expiry_year,
            expiry_month,
            "GLBX",
            0.25,    //tick_size
            12.50,   //tick_value (0.25 * 50)
            13000.0, //initial_margin (approximate)
            12000.0, //maintenance_margin (approximate)
        )
    }

    //instrument id in symbol.venue form (eg esh4.glbx)
    pub fn id(&self) -> String {
        format!("{}.{}", self.symbol, self.venue)
    }

    //converts a price difference to ticks
    pub fn price_to_ticks(&self, price_diff: f64) -> f64 {
        price_diff / self.tick_size
    }

    //calculates pnl from a price move
    //arguments
    //price_diff - the price difference (exit_price - entry_price for long)
    //quantity - number of contracts (positive for long, negative for short)
    pub fn pnl_from_price_move(&self, price_diff: f64, quantity: i32) -> f64 {
        let ticks = self.price_to_ticks(price_diff);
        ticks * self.tick_value * quantity as f64
    }

    //calculates the notional value of a position
    pub fn notional_value(&self, price: f64, quantity: i32) -> f64 {
        price * self.multiplier * quantity.abs() as f64
    }

    //returns the initial margin requirement for a given quantity
    pub fn initial_margin_requirement(&self, quantity: i32) -> f64 {
        self.initial_margin * quantity.abs() as f64
    }

    //returns the maintenance margin requirement for a given quantity
    pub fn maintenance_margin_requirement(&self, quantity: i32) -> f64 {
        self.maintenance_margin * quantity.abs() as f64
    }
}

fn month_code(month: u32) -> Result<char, InstrumentError> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_CODES.get(i as usize))
        .copied()
        .ok_or(InstrumentError::InvalidExpiryMonth(month))
}
