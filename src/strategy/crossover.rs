use crate::data::Bar;
use crate::engine::execution::OrderSide;
use crate::instrument::BarType;
use crate::strategy::{MovingAverage, MovingAverageKind, Strategy, StrategyContext};
use tracing::{debug, info};

//moving average crossover strategy
//long while the fast average is at or above the slow one, short while below
//a flat strategy enters on the first bar both averages are ready
#[derive(Debug, Clone)]
pub struct CrossoverStrategy {
    bar_type: BarType,
    trade_size: u32,
    name: String,

    //state
    fast: MovingAverage,
    slow: MovingAverage,
}

impl CrossoverStrategy {
    pub fn new(
        bar_type: BarType,
        kind: MovingAverageKind,
        fast_period: usize,
        slow_period: usize,
        trade_size: u32,
    ) -> Self {
        CrossoverStrategy {
            name: format!("{} Crossover", kind.as_str()),
            bar_type,
            trade_size,
            fast: MovingAverage::new(kind, fast_period),
            slow: MovingAverage::new(kind, slow_period),
        }
    }

    //side the averages currently point to, none until both are ready
    fn signal(&self) -> Option<OrderSide> {
        let fast = self.fast.value()?;
        let slow = self.slow.value()?;

        if fast >= slow {
            Some(OrderSide::Buy)
        } else {
            Some(OrderSide::Sell)
        }
    }
}

impl Strategy for CrossoverStrategy {
    fn on_start(&mut self, _context: &mut StrategyContext) {
        //initialize state
        self.fast.reset();
        self.slow.reset();

        info!(
            bar_type = %self.bar_type,
            fast = self.fast.period(),
            slow = self.slow.period(),
            trade_size = self.trade_size,
            "{} started",
            self.name
        );
    }

    fn on_bar(&mut self, context: &mut StrategyContext, bar: &Bar) {
        self.fast.update(bar.close);
        self.slow.update(bar.close);

        let Some(signal) = self.signal() else {
            return;
        };

        match signal {
            OrderSide::Buy => {
                if context.is_flat() {
                    context.market_order(self.trade_size, OrderSide::Buy);
                } else if context.is_net_short() {
                    debug!(ts = %bar.timestamp, "bullish cross, reversing short");
                    context.close_position();
                    context.market_order(self.trade_size, OrderSide::Buy);
                }
            }
            OrderSide::Sell => {
                if context.is_flat() {
                    context.market_order(self.trade_size, OrderSide::Sell);
                } else if context.is_net_long() {
                    debug!(ts = %bar.timestamp, "bearish cross, reversing long");
                    context.close_position();
                    context.market_order(self.trade_size, OrderSide::Sell);
                }
            }
        }
    }

    fn on_end(&mut self, context: &mut StrategyContext) {
        //cancel anything pending and close any open position
        context.cancel_all_orders();
        context.close_position();
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn bar_type(&self) -> &BarType {
        &self.bar_type
    }
}
