use crate::engine::execution::Fill;
use crate::metrics::timeseries::{calculate_returns, max_drawdown, EquityPoint};
use crate::portfolio::Position;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub exposure: f64,
}

impl SummaryMetrics {
    //calculate summary metrics from the equity curve, fills and positions
    //a trade is a closed position
    pub fn from_backtest(
        equity_curve: &[EquityPoint],
        fills: &[Fill],
        positions: &[Position],
        initial_balance: f64,
    ) -> Self {
        let final_balance = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        let total_return = final_balance - initial_balance;
        let total_return_pct = total_return / initial_balance;

        //calculate cagr
        let cagr = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if equity_curve.len() >= 2 => {
                let duration_days = (last.timestamp - first.timestamp).num_days() as f64;
                let years = duration_days / 365.25;

                if years > 0.0 {
                    ((final_balance / initial_balance).powf(1.0 / years) - 1.0) * 100.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        //max drawdown
        let max_dd = max_drawdown(equity_curve);

        //calculate returns for sharpe and sortino
        let equity_values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = calculate_returns(&equity_values);

        let sharpe = calculate_sharpe_ratio(&returns);
        let sortino = calculate_sortino_ratio(&returns);

        //trade statistics
        let closed_pnls: Vec<f64> = positions
            .iter()
            .filter(|p| p.ts_closed.is_some())
            .map(|p| p.realized_pnl)
            .collect();
        let trade_stats = calculate_trade_statistics(&closed_pnls);

        //exposure calculation (percentage of bars in market)
        let exposure = calculate_exposure(equity_curve, fills);

        SummaryMetrics {
            initial_balance,
            final_balance,
            total_return,
            total_return_pct,
            cagr,
            max_drawdown: max_dd,
            sharpe_ratio: sharpe,
            sortino_ratio: sortino,
            win_rate: trade_stats.win_rate,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            profit_factor: trade_stats.profit_factor,
            num_trades: trade_stats.num_trades,
            num_winning_trades: trade_stats.num_winning_trades,
            num_losing_trades: trade_stats.num_losing_trades,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            total_fees: fills.iter().map(|f| f.fees).sum(),
            exposure,
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        self.to_table().printstd();
    }

    pub fn to_table(&self) -> Table {
        let rows = [
            ("Initial Balance", format!("${:.2}", self.initial_balance)),
            ("Final Balance", format!("${:.2}", self.final_balance)),
            (
                "Total Return",
                format!(
                    "${:.2} ({:.2}%)",
                    self.total_return,
                    self.total_return_pct * 100.0
                ),
            ),
            ("CAGR", format!("{:.2}%", self.cagr)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Number of Trades", format!("{}", self.num_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Total Fees", format!("${:.2}", self.total_fees)),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
        for (label, value) in rows {
            table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
        }
        table
    }
}

#[derive(Debug, Default, PartialEq)]
struct TradeStats {
    num_trades: usize,
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

fn calculate_trade_statistics(pnls: &[f64]) -> TradeStats {
    if pnls.is_empty() {
        return TradeStats::default();
    }

    let winning_trades: Vec<f64> = pnls.iter().filter(|&&pnl| pnl > 0.0).copied().collect();
    let losing_trades: Vec<f64> = pnls.iter().filter(|&&pnl| pnl < 0.0).copied().collect();

    let num_winning = winning_trades.len();
    let num_losing = losing_trades.len();
    let total = pnls.len();

    let avg_win = if num_winning > 0 {
        winning_trades.iter().sum::<f64>() / num_winning as f64
    } else {
        0.0
    };

    let avg_loss = if num_losing > 0 {
        losing_trades.iter().sum::<f64>() / num_losing as f64
    } else {
        0.0
    };

    let total_wins: f64 = winning_trades.iter().sum();
    let total_losses: f64 = losing_trades.iter().sum::<f64>().abs();

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    TradeStats {
        num_trades: total,
        num_winning_trades: num_winning,
        num_losing_trades: num_losing,
        win_rate: num_winning as f64 / total as f64,
        avg_win,
        avg_loss,
        profit_factor,
        largest_win: winning_trades.iter().fold(0.0f64, |a, &b| a.max(b)),
        largest_loss: losing_trades.iter().fold(0.0f64, |a, &b| a.min(b)),
    }
}

fn calculate_sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if std_dev == 0.0 || std_dev.is_nan() {
        return 0.0;
    }

    //annualized as if returns were daily
    (mean / std_dev) * (252.0_f64).sqrt()
}

fn calculate_sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.mean();

    //calculate downside deviation (only negative returns)
    let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();

    if negative_returns.is_empty() {
        return if mean > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_dev = negative_returns.std_dev();

    if downside_dev == 0.0 || downside_dev.is_nan() {
        return 0.0;
    }

    //annualize
    (mean / downside_dev) * (252.0_f64).sqrt()
}

fn calculate_exposure(equity_curve: &[EquityPoint], fills: &[Fill]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    //track position over time
    let mut in_market_count = 0;
    let mut current_position = 0i32;
    let mut fill_idx = 0;

    for point in equity_curve {
        //update position based on fills up to this timestamp
        while fill_idx < fills.len() && fills[fill_idx].timestamp <= point.timestamp {
            current_position += fills[fill_idx].qty;
            fill_idx += 1;
        }

        if current_position != 0 {
            in_market_count += 1;
        }
    }

    in_market_count as f64 / equity_curve.len() as f64
}
