use crate::engine::execution::Fill;
use crate::engine::venue::AccountType;
use crate::instrument::FuturesContract;
use crate::portfolio::position::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//account balances after a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub timestamp: DateTime<Utc>,
    //cash balance including realized pnl and fees
    pub total: f64,
    //margin held against open positions
    pub locked: f64,
    pub free: f64,
    pub currency: String,
}

//represents a trading account with positions and cash
#[derive(Debug, Clone)]
pub struct Account {
    //initial account balance
    pub initial_balance: f64,

    //margin or cash accounting
    pub account_type: AccountType,

    //base currency
    pub currency: String,

    //current cash (includes realized pnl, subtracts commissions)
    pub cash: f64,

    //current total equity (cash + unrealized pnl)
    pub equity: f64,

    //total margin currently in use
    pub margin_used: f64,

    //open positions by symbol, at most one per symbol under netting
    pub open_positions: HashMap<String, Position>,

    //positions that have gone back to flat, in closing order
    pub closed_positions: Vec<Position>,

    //complete trade log
    pub trade_log: Vec<Fill>,

    //balance history, one entry per state change
    pub states: Vec<AccountState>,

    //commission per contract per side
    pub commission_per_contract: f64,

    //slippage per contract per side
    pub slippage_per_contract: f64,

    positions_opened: u64,
}

impl Account {
    //creates a new account with initial balance
    pub fn new(
        initial_balance: f64,
        account_type: AccountType,
        currency: &str,
        commission_per_contract: f64,
        slippage_per_contract: f64,
    ) -> Self {
        Account {
            initial_balance,
            account_type,
            currency: currency.to_string(),
            cash: initial_balance,
            equity: initial_balance,
            margin_used: 0.0,
            open_positions: HashMap::new(),
            closed_positions: Vec::new(),
            trade_log: Vec::new(),
            states: Vec::new(),
            commission_per_contract,
            slippage_per_contract,
            positions_opened: 0,
        }
    }

    //processes a fill and updates the account
    //a fill against the open position reduces it first, any remainder opens a new one
    pub fn process_fill(&mut self, mut fill: Fill, contract: &FuturesContract) {
        //calculate total costs (commission + slippage)
        let total_cost =
            (self.commission_per_contract + self.slippage_per_contract) * fill.qty.abs() as f64;

        //deduct costs from cash
        self.cash -= total_cost;
        fill.fees = total_cost;

        let mut remaining = fill.qty;
        let mut closed = false;

        if let Some(position) = self.open_positions.get_mut(&fill.symbol) {
            if position.net_qty.signum() == remaining.signum() {
                position.increase(remaining, fill.fill_price);
                remaining = 0;
            } else {
                let closing = remaining.signum() * remaining.abs().min(position.net_qty.abs());
                let realized_pnl =
                    position.reduce(remaining, fill.fill_price, fill.timestamp, contract);

                //add realized pnl to cash
                self.cash += realized_pnl;
                remaining -= closing;
                closed = position.is_flat();
            }
        }

        if closed {
            if let Some(position) = self.open_positions.remove(&fill.symbol) {
                self.closed_positions.push(position);
            }
        }

        if remaining != 0 {
            self.positions_opened += 1;
            let position = Position::open(
                format!("{}-{}", contract.id(), self.positions_opened),
                fill.symbol.clone(),
                remaining,
                fill.fill_price,
                fill.timestamp,
            );
            self.open_positions.insert(fill.symbol.clone(), position);
        }

        //update margin used
        self.update_margin_used(contract);
        self.update_equity(fill.fill_price, contract);
        self.record_state(fill.timestamp);

        //log the fill
        self.trade_log.push(fill);
    }

    //updates total equity based on the current market price
    pub fn update_equity(&mut self, price: f64, contract: &FuturesContract) {
        self.equity = self.cash + self.total_unrealized_pnl(price, contract);
    }

    //appends the current balances to the state history
    pub fn record_state(&mut self, timestamp: DateTime<Utc>) {
        self.states.push(AccountState {
            timestamp,
            total: self.cash,
            locked: self.margin_used,
            free: self.buying_power(),
            currency: self.currency.clone(),
        });
    }

    //margin a position of qty contracts at price ties up
    //cash accounts hold the full notional
    pub fn required_margin(&self, contract: &FuturesContract, qty: i32, price: f64) -> f64 {
        match self.account_type {
            AccountType::Margin => contract.initial_margin_requirement(qty),
            AccountType::Cash => contract.notional_value(price, qty),
        }
    }

    //updates margin used based on current positions
    fn update_margin_used(&mut self, contract: &FuturesContract) {
        self.margin_used = self
            .open_positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|p| self.required_margin(contract, p.net_qty, p.avg_entry_price))
            .sum();
    }

    //returns the position for a symbol, or none if flat
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.get(symbol)
    }

    //net quantity held in a symbol
    pub fn net_qty(&self, symbol: &str) -> i32 {
        self.get_position(symbol).map(|p| p.net_qty).unwrap_or(0)
    }

    //returns available buying power (cash - margin_used)
    pub fn buying_power(&self) -> f64 {
        self.cash - self.margin_used
    }

    //checks if the account has sufficient margin for a new position
    pub fn has_sufficient_margin(&self, required_margin: f64) -> bool {
        self.buying_power() >= required_margin
    }

    //checks for margin breach (equity below maintenance margin)
    pub fn is_margin_breach(&self, contract: &FuturesContract) -> bool {
        let total_maintenance_margin: f64 = self
            .open_positions
            .values()
            .map(|p| contract.maintenance_margin_requirement(p.net_qty))
            .sum();

        self.equity < total_maintenance_margin
    }

    //returns total realized pnl across all positions
    pub fn total_realized_pnl(&self) -> f64 {
        self.closed_positions
            .iter()
            .chain(self.open_positions.values())
            .map(|p| p.realized_pnl)
            .sum()
    }

    //returns total unrealized pnl at the given price
    pub fn total_unrealized_pnl(&self, price: f64, contract: &FuturesContract) -> f64 {
        self.open_positions
            .values()
            .map(|p| p.unrealized_pnl(price, contract))
            .sum()
    }

    //every position, closed ones first then those still open
    pub fn all_positions(&self) -> Vec<&Position> {
        let mut open: Vec<&Position> = self.open_positions.values().collect();
        open.sort_by_key(|p| p.ts_opened);
        self.closed_positions.iter().chain(open).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::{Fill, OrderSide};
    use crate::test_helpers::ts;

    fn es() -> FuturesContract {
        FuturesContract::es_future(2024, 3).unwrap()
    }

    fn fill(id: u64, qty: i32, price: f64, at: &str) -> Fill {
        Fill {
            id,
            order_id: id,
            timestamp: ts(at),
            symbol: "ESH4".to_string(),
            qty,
            side: if qty > 0 { OrderSide::Buy } else { OrderSide::Sell },
            fill_price: price,
            fees: 0.0,
        }
    }

    #[test]
    fn round_trip_realizes_pnl_into_cash() {
        let mut account = Account::new(100_000.0, AccountType::Margin, "USD", 0.0, 0.0);

        account.process_fill(fill(1, 1, 4800.0, "2024-01-02T14:31:00Z"), &es());
        assert_eq!(account.margin_used, 13_000.0);
        assert_eq!(account.buying_power(), 87_000.0);

        account.process_fill(fill(2, -1, 4802.0, "2024-01-02T14:40:00Z"), &es());

        assert_eq!(account.cash, 100_100.0);
        assert_eq!(account.equity, 100_100.0);
        assert_eq!(account.margin_used, 0.0);
        assert!(account.open_positions.is_empty());
        assert_eq!(account.closed_positions.len(), 1);
        assert_eq!(account.states.len(), 2);
        assert_eq!(account.states[1].free, 100_100.0);
    }

    #[test]
    fn reversal_closes_and_opens_a_new_position() {
        let mut account = Account::new(100_000.0, AccountType::Margin, "USD", 0.0, 0.0);

        account.process_fill(fill(1, 1, 4800.0, "2024-01-02T14:31:00Z"), &es());
        account.process_fill(fill(2, -2, 4790.0, "2024-01-02T14:40:00Z"), &es());

        assert_eq!(account.closed_positions.len(), 1);
        assert_eq!(account.closed_positions[0].realized_pnl, -500.0);
        assert_eq!(account.closed_positions[0].id, "ESH4.GLBX-1");

        let open = account.get_position("ESH4").unwrap();
        assert_eq!(open.id, "ESH4.GLBX-2");
        assert_eq!(open.net_qty, -1);
        assert_eq!(open.avg_entry_price, 4790.0);
        assert_eq!(account.net_qty("ESH4"), -1);
        assert_eq!(account.all_positions().len(), 2);
    }

    #[test]
    fn fees_are_charged_per_contract_and_logged() {
        let mut account = Account::new(100_000.0, AccountType::Margin, "USD", 2.5, 1.0);

        account.process_fill(fill(1, 2, 4800.0, "2024-01-02T14:31:00Z"), &es());

        assert_eq!(account.cash, 100_000.0 - 7.0);
        assert_eq!(account.trade_log[0].fees, 7.0);
    }

    #[test]
    fn cash_accounts_hold_full_notional() {
        let account = Account::new(100_000.0, AccountType::Cash, "USD", 0.0, 0.0);
        assert_eq!(account.required_margin(&es(), 1, 4800.0), 240_000.0);

        let account = Account::new(100_000.0, AccountType::Margin, "USD", 0.0, 0.0);
        assert_eq!(account.required_margin(&es(), 1, 4800.0), 13_000.0);
    }
}
