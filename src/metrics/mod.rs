pub mod reports;
pub mod summary;
pub mod timeseries;

pub use reports::{account_report, order_fills_report, positions_report, write_fills_csv};
pub use summary::SummaryMetrics;
pub use timeseries::{calculate_equity_curve, write_equity_csv, EquityPoint};
