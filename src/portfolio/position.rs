use crate::engine::execution::OrderSide;
use crate::instrument::FuturesContract;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a netting position in one futures contract, from the fill that opened it
//until the fill that brought it back to flat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    //position id (eg esh4.glbx-1)
    pub id: String,

    //contract symbol
    pub symbol: String,

    //side of the opening fill
    pub entry: OrderSide,

    //net quantity (positive for long, negative for short, 0 once closed)
    pub net_qty: i32,

    //largest absolute quantity held
    pub peak_qty: u32,

    //average entry price
    pub avg_entry_price: f64,

    //average exit price over all reducing fills
    pub avg_exit_price: f64,

    //contracts closed so far
    pub closed_qty: u32,

    //realized pnl from closed contracts
    pub realized_pnl: f64,

    pub ts_opened: DateTime<Utc>,
    pub ts_closed: Option<DateTime<Utc>>,
}

impl Position {
    //opens a position with its first fill
    pub fn open(
        id: String,
        symbol: String,
        qty: i32,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Position {
            id,
            symbol,
            entry: if qty > 0 {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            },
            net_qty: qty,
            peak_qty: qty.unsigned_abs(),
            avg_entry_price: price,
            avg_exit_price: 0.0,
            closed_qty: 0,
            realized_pnl: 0.0,
            ts_opened: timestamp,
            ts_closed: None,
        }
    }

    //calculates unrealized pnl at a given price
    pub fn unrealized_pnl(&self, current_price: f64, contract: &FuturesContract) -> f64 {
        if self.net_qty == 0 {
            return 0.0;
        }

        let price_diff = current_price - self.avg_entry_price;
        contract.pnl_from_price_move(price_diff, self.net_qty)
    }

    //returns true if the position is flat (no open position)
    pub fn is_flat(&self) -> bool {
        self.net_qty == 0
    }

    //returns true if the position is long
    pub fn is_long(&self) -> bool {
        self.net_qty > 0
    }

    //returns true if the position is short
    pub fn is_short(&self) -> bool {
        self.net_qty < 0
    }

    //adds to the position in its own direction, averaging the entry price
    pub fn increase(&mut self, qty: i32, price: f64) {
        let total_qty = self.net_qty + qty;
        let total_cost = self.avg_entry_price * self.net_qty as f64 + price * qty as f64;
        self.avg_entry_price = total_cost / total_qty as f64;
        self.net_qty = total_qty;
        self.peak_qty = self.peak_qty.max(total_qty.unsigned_abs());
    }

    //reduces the position by up to its size and returns the realized pnl
    //qty is the signed fill quantity, opposite to the position
    pub fn reduce(
        &mut self,
        qty: i32,
        price: f64,
        timestamp: DateTime<Utc>,
        contract: &FuturesContract,
    ) -> f64 {
        let close_qty = qty.abs().min(self.net_qty.abs());
        if close_qty == 0 {
            return 0.0;
        }

        //calculate realized pnl for the closed portion
        let price_diff = if self.net_qty > 0 {
            //closing long
            price - self.avg_entry_price
        } else {
            //closing short
            self.avg_entry_price - price
        };
        let realized_pnl = contract.pnl_from_price_move(price_diff, close_qty);

        let prior_closed = self.closed_qty as f64;
        self.closed_qty += close_qty as u32;
        self.avg_exit_price =
            (self.avg_exit_price * prior_closed + price * close_qty as f64) / self.closed_qty as f64;

        self.realized_pnl += realized_pnl;
        self.net_qty -= close_qty * self.net_qty.signum();

        if self.net_qty == 0 {
            self.ts_closed = Some(timestamp);
        }

        realized_pnl
    }

    //returns the notional value of the position
    pub fn notional_value(&self, current_price: f64, contract: &FuturesContract) -> f64 {
        contract.notional_value(current_price, self.net_qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ts;

    fn es() -> FuturesContract {
        FuturesContract::es_future(2024, 3).unwrap()
    }

    #[test]
    fn increase_averages_entry() {
        let t = ts("2024-01-02T14:31:00Z");
        let mut position = Position::open("P-1".into(), "ESH4".into(), 1, 4800.0, t);

        position.increase(1, 4802.0);

        assert_eq!(position.net_qty, 2);
        assert_eq!(position.peak_qty, 2);
        assert_eq!(position.avg_entry_price, 4801.0);
        assert!(position.is_long());
    }

    #[test]
    fn reduce_realizes_pnl_and_closes() {
        let t0 = ts("2024-01-02T14:31:00Z");
        let t1 = ts("2024-01-02T14:45:00Z");
        let mut position = Position::open("P-1".into(), "ESH4".into(), -2, 4800.0, t0);

        //short two, buy back two a point lower
        let pnl = position.reduce(2, 4799.0, t1, &es());

        assert_eq!(pnl, 100.0);
        assert!(position.is_flat());
        assert_eq!(position.entry, OrderSide::Sell);
        assert_eq!(position.avg_exit_price, 4799.0);
        assert_eq!(position.ts_closed, Some(t1));
    }

    #[test]
    fn reduce_never_goes_past_flat() {
        let t = ts("2024-01-02T14:31:00Z");
        let mut position = Position::open("P-1".into(), "ESH4".into(), 1, 4800.0, t);

        let pnl = position.reduce(-3, 4801.0, t, &es());

        assert_eq!(pnl, 50.0);
        assert_eq!(position.net_qty, 0);
        assert_eq!(position.closed_qty, 1);
    }

    #[test]
    fn unrealized_pnl_follows_price() {
        let t = ts("2024-01-02T14:31:00Z");
        let position = Position::open("P-1".into(), "ESH4".into(), 1, 4800.0, t);

        assert_eq!(position.unrealized_pnl(4802.5, &es()), 125.0);
        assert_eq!(position.notional_value(4800.0, &es()), 240_000.0);
    }
}
