pub mod crossover;

use crate::data::Bar;
use crate::engine::execution::OrderSide;
use crate::instrument::BarType;
use crate::portfolio::Account;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub use crossover::CrossoverStrategy;

//strategy interface that all strategies must implement
pub trait Strategy: Send {
    //called once at the start of the backtest
    fn on_start(&mut self, context: &mut StrategyContext);

    //called on each new bar
    fn on_bar(&mut self, context: &mut StrategyContext, bar: &Bar);

    //called at the end of the backtest
    fn on_end(&mut self, context: &mut StrategyContext);

    //returns the strategy name
    fn name(&self) -> &str;

    //bars this strategy subscribes to
    fn bar_type(&self) -> &BarType;
}

//an order the strategy asked for, handed to the execution engine after the callback
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: u32,
    pub side: OrderSide,
}

//what a strategy sees of the engine: the clock, its net position and an order queue
#[derive(Debug)]
pub struct StrategyContext {
    //symbol being traded
    pub symbol: String,

    //close time of the bar being processed
    pub current_time: DateTime<Utc>,

    //net position as of the current bar
    net_qty: i32,

    orders: Vec<OrderRequest>,
    cancel_requested: bool,
}

impl StrategyContext {
    pub fn new(symbol: String) -> Self {
        StrategyContext {
            symbol,
            current_time: DateTime::<Utc>::default(),
            net_qty: 0,
            orders: Vec::new(),
            cancel_requested: false,
        }
    }

    //moves the clock to the bar about to be handed to the strategy
    pub fn advance(&mut self, bar: &Bar) {
        self.current_time = bar.timestamp;
    }

    //refreshes the position snapshot the strategy sees
    pub fn sync(&mut self, account: &Account) {
        self.net_qty = account.net_qty(&self.symbol);
    }

    //queues a market order for the strategy's symbol
    pub fn market_order(&mut self, qty: u32, side: OrderSide) {
        if qty == 0 {
            return;
        }
        self.orders.push(OrderRequest {
            symbol: self.symbol.clone(),
            qty,
            side,
        });
    }

    //queues an order that flattens the current position
    pub fn close_position(&mut self) {
        let qty = self.net_qty.unsigned_abs();
        if self.net_qty > 0 {
            self.market_order(qty, OrderSide::Sell);
        } else if self.net_qty < 0 {
            self.market_order(qty, OrderSide::Buy);
        }
    }

    //net quantity held as of the current bar
    pub fn net_position(&self) -> i32 {
        self.net_qty
    }

    pub fn is_flat(&self) -> bool {
        self.net_qty == 0
    }

    pub fn is_net_long(&self) -> bool {
        self.net_qty > 0
    }

    pub fn is_net_short(&self) -> bool {
        self.net_qty < 0
    }

    //drops queued orders and asks the engine to cancel anything pending
    pub fn cancel_all_orders(&mut self) {
        self.orders.clear();
        self.cancel_requested = true;
    }

    //hands the queued orders to the engine
    pub fn take_orders(&mut self) -> Vec<OrderRequest> {
        std::mem::take(&mut self.orders)
    }

    //returns and clears a pending cancel request
    pub fn take_cancel_request(&mut self) -> bool {
        std::mem::take(&mut self.cancel_requested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovingAverageKind {
    Simple,
    Exponential,
}

impl MovingAverageKind {
    //parse moving average kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "simple" => Some(MovingAverageKind::Simple),
            "ema" | "exponential" => Some(MovingAverageKind::Exponential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovingAverageKind::Simple => "SMA",
            MovingAverageKind::Exponential => "EMA",
        }
    }
}

//incremental moving average over close prices
//the ema is seeded with the first price and uses alpha = 2 / (period + 1)
#[derive(Debug, Clone)]
pub struct MovingAverage {
    kind: MovingAverageKind,
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    value: f64,
    count: usize,
}

impl MovingAverage {
    pub fn new(kind: MovingAverageKind, period: usize) -> Self {
        let period = period.max(1);
        MovingAverage {
            kind,
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            value: 0.0,
            count: 0,
        }
    }

    pub fn update(&mut self, price: f64) {
        self.count += 1;

        match self.kind {
            MovingAverageKind::Simple => {
                self.window.push_back(price);
                self.sum += price;
                if self.window.len() > self.period {
                    if let Some(oldest) = self.window.pop_front() {
                        self.sum -= oldest;
                    }
                }
                self.value = self.sum / self.window.len() as f64;
            }
            MovingAverageKind::Exponential => {
                if self.count == 1 {
                    self.value = price;
                } else {
                    let alpha = 2.0 / (self.period as f64 + 1.0);
                    self.value = alpha * price + (1.0 - alpha) * self.value;
                }
            }
        }
    }

    //true once period prices have been seen
    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    //current value, none until ready
    pub fn value(&self) -> Option<f64> {
        self.is_ready().then_some(self.value)
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.value = 0.0;
        self.count = 0;
    }
}
