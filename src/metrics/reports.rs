use crate::engine::execution::{Fill, Order};
use crate::portfolio::{AccountState, Position};
use chrono::{DateTime, SecondsFormat, Utc};
use prettytable::{Cell, Row, Table};
use std::collections::HashMap;
use std::path::Path;

fn header(columns: &[&str]) -> Row {
    Row::new(columns.iter().map(|c| Cell::new(c)).collect())
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

//one row per account state change
pub fn account_report(states: &[AccountState]) -> Table {
    let mut table = Table::new();
    table.add_row(header(&["timestamp", "total", "locked", "free", "currency"]));

    for state in states {
        table.add_row(Row::new(vec![
            Cell::new(&fmt_ts(state.timestamp)),
            Cell::new(&format!("{:.2}", state.total)),
            Cell::new(&format!("{:.2}", state.locked)),
            Cell::new(&format!("{:.2}", state.free)),
            Cell::new(&state.currency),
        ]));
    }

    table
}

//one row per fill, with the submitting order's time as ts_init
pub fn order_fills_report(orders: &[Order], fills: &[Fill]) -> Table {
    let submitted: HashMap<u64, DateTime<Utc>> =
        orders.iter().map(|o| (o.id, o.timestamp)).collect();

    let mut table = Table::new();
    table.add_row(header(&[
        "order_id",
        "instrument",
        "side",
        "quantity",
        "avg_px",
        "fees",
        "ts_init",
        "ts_last",
    ]));

    for fill in fills {
        let ts_init = submitted
            .get(&fill.order_id)
            .map(|t| fmt_ts(*t))
            .unwrap_or_default();

        table.add_row(Row::new(vec![
            Cell::new(&fill.order_id.to_string()),
            Cell::new(&fill.symbol),
            Cell::new(fill.side.as_str()),
            Cell::new(&fill.qty.unsigned_abs().to_string()),
            Cell::new(&format!("{:.2}", fill.fill_price)),
            Cell::new(&format!("{:.2}", fill.fees)),
            Cell::new(&ts_init),
            Cell::new(&fmt_ts(fill.timestamp)),
        ]));
    }

    table
}

//one row per position, closed or still open
pub fn positions_report(positions: &[&Position]) -> Table {
    let mut table = Table::new();
    table.add_row(header(&[
        "position_id",
        "instrument",
        "entry",
        "side",
        "peak_qty",
        "ts_opened",
        "ts_closed",
        "avg_px_open",
        "avg_px_close",
        "realized_pnl",
    ]));

    for position in positions {
        let side = if position.is_long() {
            "LONG"
        } else if position.is_short() {
            "SHORT"
        } else {
            "FLAT"
        };
        let avg_px_close = if position.closed_qty > 0 {
            format!("{:.2}", position.avg_exit_price)
        } else {
            String::new()
        };

        table.add_row(Row::new(vec![
            Cell::new(&position.id),
            Cell::new(&position.symbol),
            Cell::new(position.entry.as_str()),
            Cell::new(side),
            Cell::new(&position.peak_qty.to_string()),
            Cell::new(&fmt_ts(position.ts_opened)),
            Cell::new(&position.ts_closed.map(fmt_ts).unwrap_or_default()),
            Cell::new(&format!("{:.2}", position.avg_entry_price)),
            Cell::new(&avg_px_close),
            Cell::new(&format!("{:.2}", position.realized_pnl)),
        ]));
    }

    table
}

//writes the fills as csv, one row per fill
pub fn write_fills_csv(fills: &[Fill], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for fill in fills {
        writer.serialize(fill)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::OrderSide;
    use crate::test_helpers::ts;

    fn cell(table: &Table, row: usize, col: usize) -> String {
        table
            .get_row(row)
            .and_then(|r| r.get_cell(col))
            .map(|c| c.get_content())
            .unwrap_or_default()
    }

    #[test]
    fn account_rows_follow_states() {
        let states = vec![AccountState {
            timestamp: ts("2024-01-02T14:31:00Z"),
            total: 100_000.0,
            locked: 13_000.0,
            free: 87_000.0,
            currency: "USD".into(),
        }];

        let table = account_report(&states);

        assert_eq!(table.len(), 2);
        assert_eq!(cell(&table, 1, 0), "2024-01-02T14:31:00Z");
        assert_eq!(cell(&table, 1, 2), "13000.00");
        assert_eq!(cell(&table, 1, 4), "USD");
    }

    #[test]
    fn fills_show_submit_and_fill_times() {
        let order = Order::market(
            7,
            ts("2024-01-02T14:31:00Z"),
            "ESH4".into(),
            2,
            OrderSide::Sell,
        )
        .unwrap();
        let fill = Fill::from_order(1, &order, 4800.25, ts("2024-01-02T14:32:00Z"));

        let table = order_fills_report(&[order], &[fill]);

        assert_eq!(cell(&table, 1, 0), "7");
        assert_eq!(cell(&table, 1, 2), "SELL");
        assert_eq!(cell(&table, 1, 3), "2");
        assert_eq!(cell(&table, 1, 4), "4800.25");
        assert_eq!(cell(&table, 1, 6), "2024-01-02T14:31:00Z");
        assert_eq!(cell(&table, 1, 7), "2024-01-02T14:32:00Z");
    }

    #[test]
    fn open_positions_leave_close_columns_blank() {
        let position = Position::open(
            "ESH4.GLBX-1".into(),
            "ESH4".into(),
            -1,
            4800.0,
            ts("2024-01-02T14:31:00Z"),
        );

        let table = positions_report(&[&position]);

        assert_eq!(cell(&table, 1, 0), "ESH4.GLBX-1");
        assert_eq!(cell(&table, 1, 3), "SHORT");
        assert_eq!(cell(&table, 1, 6), "");
        assert_eq!(cell(&table, 1, 8), "");
    }

    #[test]
    fn fills_csv_uses_field_names_as_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fills.csv");
        let order =
            Order::market(1, ts("2024-01-02T14:31:00Z"), "ESH4".into(), 1, OrderSide::Buy).unwrap();
        let fill = Fill::from_order(1, &order, 4800.0, ts("2024-01-02T14:32:00Z"));

        write_fills_csv(&[fill], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().next(),
            Some("id,order_id,timestamp,symbol,qty,side,fill_price,fees")
        );
        assert_eq!(contents.lines().count(), 2);
    }
}
