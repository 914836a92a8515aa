use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

//a point in the equity curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub drawdown: f64,
    pub returns: f64,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, equity: f64, drawdown: f64, returns: f64) -> Self {
        EquityPoint {
            timestamp,
            equity,
            drawdown,
            returns,
        }
    }
}

//calculates the equity curve with drawdowns
pub fn calculate_equity_curve(
    timestamps: &[DateTime<Utc>],
    equity_values: &[f64],
    initial_balance: f64,
) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(timestamps.len());
    let mut peak = initial_balance;
    let mut prev_equity = initial_balance;

    for (i, (&timestamp, &equity)) in timestamps.iter().zip(equity_values.iter()).enumerate() {
        //update peak
        if equity > peak {
            peak = equity;
        }

        //calculate drawdown
        let drawdown = if peak > 0.0 {
            (peak - equity) / peak
        } else {
            0.0
        };

        //calculate returns
        let returns = if i == 0 || prev_equity == 0.0 {
            0.0
        } else {
            (equity - prev_equity) / prev_equity
        };

        curve.push(EquityPoint::new(timestamp, equity, drawdown, returns));
        prev_equity = equity;
    }

    curve
}

//calculates maximum drawdown from equity curve
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}

//calculates returns from equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    if equity_values.len() < 2 {
        return vec![];
    }

    equity_values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

//writes the equity curve as csv, one row per bar
pub fn write_equity_csv(curve: &[EquityPoint], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in curve {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ts;

    #[test]
    fn drawdown_tracks_running_peak() {
        let times = [
            ts("2024-01-02T14:31:00Z"),
            ts("2024-01-02T14:32:00Z"),
            ts("2024-01-02T14:33:00Z"),
        ];
        let curve = calculate_equity_curve(&times, &[100_000.0, 110_000.0, 99_000.0], 100_000.0);

        assert_eq!(curve[1].returns, 0.1);
        assert_eq!(curve[2].drawdown, 0.1);
        assert_eq!(max_drawdown(&curve), 0.1);
    }

    #[test]
    fn returns_skip_zero_equity() {
        assert_eq!(calculate_returns(&[100.0]), Vec::<f64>::new());
        assert_eq!(calculate_returns(&[100.0, 150.0, 75.0]), vec![0.5, -0.5]);
        assert_eq!(calculate_returns(&[0.0, 10.0]), Vec::<f64>::new());
    }

    #[test]
    fn equity_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity.csv");
        let curve = vec![EquityPoint::new(ts("2024-01-02T14:31:00Z"), 100_000.0, 0.0, 0.0)];

        write_equity_csv(&curve, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("timestamp,equity,drawdown,returns"));
        assert_eq!(lines.next(), Some("2024-01-02T14:31:00Z,100000.0,0.0,0.0"));
    }
}
