//fetches futures bars from databento and backtests moving average crossovers on them

pub mod config;
pub mod data;
pub mod databento;
pub mod engine;
pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

#[cfg(test)]
pub mod test_helpers;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BacktestConfiguration, ContractConfig, CrossoverParams, EngineSettings};
    pub use crate::data::{
        describe_and_fetch, fetch_and_store, filter_by_symbol, load_bars, load_csv, Bar, OhlcvRecord,
    };
    pub use crate::databento::{
        DatabentoClient, FetchError, HistoricalClient, RangeRequest, SType, Schema, VendorMetadata,
    };
    pub use crate::engine::{
        AccountType, BacktestEngine, BacktestResult, EngineConfig, EngineError, Fill, OmsType,
        Order, OrderSide, VenueConfig,
    };
    pub use crate::instrument::{BarType, FuturesContract};
    pub use crate::logging::init_logging;
    pub use crate::metrics::{write_equity_csv, write_fills_csv, EquityPoint, SummaryMetrics};
    pub use crate::portfolio::{Account, Position};
    pub use crate::strategy::{
        CrossoverStrategy, MovingAverageKind, Strategy, StrategyContext,
    };
}
