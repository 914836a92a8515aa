pub mod backtest;
pub mod execution;
pub mod risk;
pub mod venue;

pub use backtest::{BacktestEngine, BacktestResult, EngineConfig, EngineError};
pub use execution::{
    ExecutionEngine, Fill, Order, OrderError, OrderSide, OrderStatus, MAX_ORDER_QTY,
};
pub use risk::{OrderDenied, RiskConfig, RiskEngine};
pub use venue::{AccountType, OmsType, VenueConfig};
