use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

//fills carry signed i32 quantities
pub const MAX_ORDER_QTY: u32 = i32::MAX as u32;

#[derive(Error, Debug, PartialEq)]
pub enum OrderError {
    #[error("Order quantity {0} is outside 1..={max}", max = MAX_ORDER_QTY)]
    InvalidQuantity(u32),
}

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //converts to quantity sign (Buy = +1, Sell = -1)
    pub fn to_qty_sign(&self) -> i32 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

//lifecycle of a market order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Filled,
    Denied,
    Canceled,
}

//represents a market order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    //time the strategy submitted the order
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub qty: u32,
    pub side: OrderSide,
    pub status: OrderStatus,
}

impl Order {
    //creates a new market order for 1..=MAX_ORDER_QTY contracts
    pub fn market(
        id: u64,
        timestamp: DateTime<Utc>,
        symbol: String,
        qty: u32,
        side: OrderSide,
    ) -> Result<Self, OrderError> {
        if qty == 0 || qty > MAX_ORDER_QTY {
            return Err(OrderError::InvalidQuantity(qty));
        }

        Ok(Order {
            id,
            timestamp,
            symbol,
            qty,
            side,
            status: OrderStatus::Submitted,
        })
    }

    //returns the signed quantity (positive for buy, negative for sell)
    pub fn signed_qty(&self) -> i32 {
        i32::try_from(self.qty).unwrap_or(i32::MAX) * self.side.to_qty_sign()
    }
}

//represents a filled order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: u64,
    //time of the bar the order filled on
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub qty: i32, //signed: positive for long, negative for short
    pub side: OrderSide,
    pub fill_price: f64,
    pub fees: f64, //total fees (commission + slippage)
}

impl Fill {
    pub fn from_order(
        fill_id: u64,
        order: &Order,
        fill_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Fill {
            id: fill_id,
            order_id: order.id,
            timestamp,
            symbol: order.symbol.clone(),
            qty: order.signed_qty(),
            side: order.side,
            fill_price,
            fees: 0.0,
        }
    }
}

//simulates market order execution against bar prices
#[derive(Debug)]
pub struct ExecutionEngine {
    next_order_id: u64,
    next_fill_id: u64,
    pending_orders: Vec<Order>,
    //every order seen, in submission order, with its final status
    orders: Vec<Order>,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        ExecutionEngine {
            next_order_id: 1,
            next_fill_id: 1,
            pending_orders: Vec::new(),
            orders: Vec::new(),
        }
    }

    //creates and queues a market order, returns its id
    pub fn market_order(
        &mut self,
        timestamp: DateTime<Utc>,
        symbol: String,
        qty: u32,
        side: OrderSide,
    ) -> Result<u64, OrderError> {
        let order = Order::market(self.next_order_id, timestamp, symbol, qty, side)?;
        self.next_order_id += 1;

        let id = order.id;
        self.pending_orders.push(order);
        Ok(id)
    }

    //removes pending orders for pre-trade checks, in submission order
    pub fn take_pending(&mut self) -> Vec<Order> {
        std::mem::take(&mut self.pending_orders)
    }

    //fills an order at price and returns the fill
    pub fn fill(&mut self, mut order: Order, price: f64, timestamp: DateTime<Utc>) -> Fill {
        let fill = Fill::from_order(self.next_fill_id, &order, price, timestamp);
        self.next_fill_id += 1;

        debug!(
            order_id = order.id,
            side = order.side.as_str(),
            qty = order.qty,
            price,
            "order filled"
        );

        order.status = OrderStatus::Filled;
        self.orders.push(order);
        fill
    }

    //records an order rejected before it reached the market
    pub fn deny(&mut self, mut order: Order) {
        order.status = OrderStatus::Denied;
        self.orders.push(order);
    }

    //fills every pending market order at price
    pub fn process_orders(&mut self, price: f64, timestamp: DateTime<Utc>) -> Vec<Fill> {
        self.take_pending()
            .into_iter()
            .map(|order| self.fill(order, price, timestamp))
            .collect()
    }

    //every order that left the pending queue
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    //cancels all pending orders
    pub fn cancel_all_orders(&mut self) {
        for mut order in self.pending_orders.drain(..) {
            order.status = OrderStatus::Canceled;
            self.orders.push(order);
        }
    }

    pub fn reset(&mut self) {
        *self = ExecutionEngine::new();
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
