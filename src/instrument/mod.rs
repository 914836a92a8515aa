pub mod bar_type;
pub mod futures_contract;

pub use bar_type::{AggregationSource, BarAggregation, BarType, BarTypeError, PriceType};
pub use futures_contract::{FuturesContract, InstrumentError};
