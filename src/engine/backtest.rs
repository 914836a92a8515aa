use crate::data::Bar;
use crate::engine::execution::{ExecutionEngine, Fill, Order};
use crate::engine::risk::{RiskConfig, RiskEngine};
use crate::engine::venue::{OmsType, VenueConfig};
use crate::instrument::{AggregationSource, BarType, FuturesContract, PriceType};
use crate::metrics::{
    account_report, calculate_equity_curve, order_fills_report, positions_report, EquityPoint,
    SummaryMetrics,
};
use crate::portfolio::{Account, AccountState, Position};
use crate::strategy::{Strategy, StrategyContext};
use chrono::{DateTime, Duration, Utc};
use prettytable::Table;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq)]
pub enum EngineError {
    #[error("No venue added")]
    NoVenue,
    #[error("Venue {0} already added")]
    VenueAlreadyAdded(String),
    #[error("OMS type {0} is not supported")]
    UnsupportedOmsType(OmsType),
    #[error("No instrument added")]
    NoInstrument,
    #[error("Instrument {instrument} trades on {instrument_venue}, not on venue {venue}")]
    VenueMismatch {
        instrument: String,
        instrument_venue: String,
        venue: String,
    },
    #[error("Bars for {found} do not match instrument {expected}")]
    DataMismatch { expected: String, found: String },
    #[error("No data added")]
    NoData,
    #[error("No strategy added")]
    NoStrategy,
    #[error("A strategy is already added")]
    StrategyAlreadyAdded,
    #[error("Strategy subscribes to {bar_type}, which is not for instrument {instrument}")]
    BarTypeMismatch { bar_type: String, instrument: String },
    #[error("Strategy subscribes to {0}, only LAST-EXTERNAL bars from the data are supported")]
    UnsupportedBarType(String),
    #[error("Strategy subscribes to {bar_type}, but the data is spaced {data_seconds}s apart")]
    BarIntervalMismatch { bar_type: String, data_seconds: i64 },
    #[error("Engine has been disposed")]
    Disposed,
}

//result of a backtest
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: SummaryMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub orders: Vec<Order>,
    pub positions: Vec<Position>,
    pub account_states: Vec<AccountState>,
}

//engine-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub trader_id: String,
    pub log_level: String,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trader_id: "BACKTESTER-001".to_string(),
            log_level: "INFO".to_string(),
            risk: RiskConfig { bypass: true },
        }
    }
}

//single-venue, single-instrument bar-driven backtest engine
pub struct BacktestEngine {
    config: EngineConfig,
    venue: Option<VenueConfig>,
    contract: Option<FuturesContract>,
    bars: Vec<Bar>,
    strategy: Option<Box<dyn Strategy>>,
    account: Option<Account>,
    execution: ExecutionEngine,
    risk: RiskEngine,
    equity_history: Vec<(DateTime<Utc>, f64)>,
    disposed: bool,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(config: EngineConfig) -> Self {
        let risk = RiskEngine::new(config.risk.clone());

        BacktestEngine {
            config,
            venue: None,
            contract: None,
            bars: Vec::new(),
            strategy: None,
            account: None,
            execution: ExecutionEngine::new(),
            risk,
            equity_history: Vec::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    //adds the simulated venue, only netting venues are supported
    pub fn add_venue(&mut self, venue: VenueConfig) -> Result<(), EngineError> {
        self.ensure_live()?;

        if let Some(existing) = &self.venue {
            return Err(EngineError::VenueAlreadyAdded(existing.venue.clone()));
        }
        if venue.oms_type != OmsType::Netting {
            return Err(EngineError::UnsupportedOmsType(venue.oms_type));
        }

        info!(
            venue = %venue.venue,
            oms_type = %venue.oms_type,
            account_type = %venue.account_type,
            starting_balance = venue.starting_balance,
            currency = %venue.base_currency,
            "added venue"
        );
        self.venue = Some(venue);
        Ok(())
    }

    //adds the traded instrument, which must list on the added venue
    pub fn add_instrument(&mut self, contract: FuturesContract) -> Result<(), EngineError> {
        self.ensure_live()?;

        let venue = self.venue.as_ref().ok_or(EngineError::NoVenue)?;
        if contract.venue != venue.venue {
            return Err(EngineError::VenueMismatch {
                instrument: contract.id(),
                instrument_venue: contract.venue.clone(),
                venue: venue.venue.clone(),
            });
        }

        info!(instrument = %contract.id(), "added instrument");
        self.contract = Some(contract);
        Ok(())
    }

    //adds bars for the instrument, kept sorted by timestamp
    pub fn add_data(&mut self, bars: Vec<Bar>) -> Result<(), EngineError> {
        self.ensure_live()?;

        let contract = self.contract.as_ref().ok_or(EngineError::NoInstrument)?;
        if let Some(bar) = bars.iter().find(|b| b.symbol != contract.symbol) {
            return Err(EngineError::DataMismatch {
                expected: contract.symbol.clone(),
                found: bar.symbol.clone(),
            });
        }

        info!(count = bars.len(), instrument = %contract.id(), "added bars");
        self.bars.extend(bars);
        self.bars.sort_by_key(|b| b.timestamp);
        Ok(())
    }

    //adds the strategy, whose bar type must be for the added instrument
    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) -> Result<(), EngineError> {
        self.ensure_live()?;

        if self.strategy.is_some() {
            return Err(EngineError::StrategyAlreadyAdded);
        }
        self.check_bar_type(strategy.bar_type())?;

        info!(strategy = strategy.name(), bar_type = %strategy.bar_type(), "added strategy");
        self.strategy = Some(strategy);
        Ok(())
    }

    //runs the backtest over every added bar
    //orders submitted on a bar fill at the next bar's open
    pub fn run(&mut self) -> Result<BacktestResult, EngineError> {
        self.ensure_live()?;

        let venue = self.venue.clone().ok_or(EngineError::NoVenue)?;
        let contract = self.contract.clone().ok_or(EngineError::NoInstrument)?;
        let (first_ts, last_bar) = match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.clone()),
            _ => return Err(EngineError::NoData),
        };
        if let Some(strategy) = &self.strategy {
            //data may have been added after the strategy
            self.check_bar_type(strategy.bar_type())?;
        }
        let mut strategy = self.strategy.take().ok_or(EngineError::NoStrategy)?;

        info!(
            trader_id = %self.config.trader_id,
            strategy = strategy.name(),
            bars = self.bars.len(),
            "backtest starting"
        );

        self.execution.reset();
        self.equity_history.clear();

        let mut account = Account::new(
            venue.starting_balance,
            venue.account_type,
            &venue.base_currency,
            venue.commission_per_contract,
            venue.slippage_per_contract,
        );
        account.record_state(first_ts);

        //create strategy context
        let mut context = StrategyContext::new(contract.symbol.clone());
        context.sync(&account);

        //call strategy initialization
        strategy.on_start(&mut context);
        self.submit_orders(&mut context);

        //main backtest loop
        for bar in &self.bars {
            //orders from the previous bar fill at this bar's open
            fill_pending(
                &mut self.execution,
                &self.risk,
                &mut account,
                &contract,
                bar.open,
                bar.timestamp,
            );

            //update account equity
            account.update_equity(bar.close, &contract);
            if account.is_margin_breach(&contract) {
                warn!(ts = %bar.timestamp, equity = account.equity, "margin breach");
            }

            //update context with new bar and call strategy
            context.advance(bar);
            context.sync(&account);
            strategy.on_bar(&mut context, bar);
            submit_orders(&mut self.execution, &mut context);

            //record equity
            self.equity_history.push((bar.timestamp, account.equity));
        }

        //call strategy finalization
        context.sync(&account);
        strategy.on_end(&mut context);
        self.submit_orders(&mut context);

        //anything still pending fills at the last close
        fill_pending(
            &mut self.execution,
            &self.risk,
            &mut account,
            &contract,
            last_bar.close,
            last_bar.timestamp,
        );

        //final equity update
        account.update_equity(last_bar.close, &contract);
        if let Some(last) = self.equity_history.last_mut() {
            last.1 = account.equity;
        }

        info!(
            trader_id = %self.config.trader_id,
            fills = account.trade_log.len(),
            positions = account.closed_positions.len() + account.open_positions.len(),
            realized_pnl = account.total_realized_pnl(),
            equity = account.equity,
            "backtest finished"
        );

        self.strategy = Some(strategy);
        self.account = Some(account);

        //build result
        Ok(self.build_result(venue.starting_balance))
    }

    //the bar type must name the instrument and match the spacing of the added bars
    fn check_bar_type(&self, bar_type: &BarType) -> Result<(), EngineError> {
        let contract = self.contract.as_ref().ok_or(EngineError::NoInstrument)?;
        if bar_type.instrument_id != contract.id() {
            return Err(EngineError::BarTypeMismatch {
                bar_type: bar_type.to_string(),
                instrument: contract.id(),
            });
        }
        if bar_type.price_type != PriceType::Last || bar_type.source != AggregationSource::External
        {
            return Err(EngineError::UnsupportedBarType(bar_type.to_string()));
        }
        if let Some(spacing) = bar_spacing(&self.bars) {
            if spacing != bar_type.interval() {
                return Err(EngineError::BarIntervalMismatch {
                    bar_type: bar_type.to_string(),
                    data_seconds: spacing.num_seconds(),
                });
            }
        }
        Ok(())
    }

    fn submit_orders(&mut self, context: &mut StrategyContext) {
        submit_orders(&mut self.execution, context);
    }

    fn build_result(&self, initial_balance: f64) -> BacktestResult {
        let timestamps: Vec<_> = self.equity_history.iter().map(|(t, _)| *t).collect();
        let equity_values: Vec<_> = self.equity_history.iter().map(|(_, e)| *e).collect();

        let equity_curve = calculate_equity_curve(&timestamps, &equity_values, initial_balance);

        let (fills, positions, account_states) = match &self.account {
            Some(account) => (
                account.trade_log.clone(),
                account.all_positions().into_iter().cloned().collect(),
                account.states.clone(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let summary =
            SummaryMetrics::from_backtest(&equity_curve, &fills, &positions, initial_balance);

        BacktestResult {
            summary,
            equity_curve,
            fills,
            orders: self.execution.orders().to_vec(),
            positions,
            account_states,
        }
    }

    //one row per account state change, empty before a run
    pub fn generate_account_report(&self) -> Table {
        let states = self.account.as_ref().map(|a| a.states.as_slice()).unwrap_or(&[]);
        account_report(states)
    }

    //one row per fill, empty before a run
    pub fn generate_order_fills_report(&self) -> Table {
        let fills = self
            .account
            .as_ref()
            .map(|a| a.trade_log.as_slice())
            .unwrap_or(&[]);
        order_fills_report(self.execution.orders(), fills)
    }

    //one row per position opened during the run, empty before a run
    pub fn generate_positions_report(&self) -> Table {
        let positions = self
            .account
            .as_ref()
            .map(|a| a.all_positions())
            .unwrap_or_default();
        positions_report(&positions)
    }

    //returns a reference to the account after a run
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    //returns a reference to the contract
    pub fn contract(&self) -> Option<&FuturesContract> {
        self.contract.as_ref()
    }

    //clears run state, keeps venue, instrument, data and strategy for another run
    pub fn reset(&mut self) {
        debug!(trader_id = %self.config.trader_id, "resetting engine");
        self.account = None;
        self.execution.reset();
        self.equity_history.clear();
    }

    //releases everything, the engine cannot be used afterwards
    pub fn dispose(&mut self) {
        debug!(trader_id = %self.config.trader_id, "disposing engine");
        self.reset();
        self.venue = None;
        self.contract = None;
        self.bars = Vec::new();
        self.strategy = None;
        self.disposed = true;
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.disposed {
            Err(EngineError::Disposed)
        } else {
            Ok(())
        }
    }
}

//smallest gap between consecutive bars, none with fewer than two distinct times
fn bar_spacing(bars: &[Bar]) -> Option<Duration> {
    bars.windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .filter(|gap| *gap > Duration::zero())
        .min()
}

//hands orders queued by the strategy to the execution engine
fn submit_orders(execution: &mut ExecutionEngine, context: &mut StrategyContext) {
    if context.take_cancel_request() {
        execution.cancel_all_orders();
    }

    for request in context.take_orders() {
        match execution.market_order(
            context.current_time,
            request.symbol,
            request.qty,
            request.side,
        ) {
            Ok(id) => debug!(
                order_id = id,
                side = request.side.as_str(),
                qty = request.qty,
                "order submitted"
            ),
            Err(e) => warn!(ts = %context.current_time, "order rejected: {}", e),
        }
    }
}

//runs pending orders through the risk engine and fills the survivors at price
fn fill_pending(
    execution: &mut ExecutionEngine,
    risk: &RiskEngine,
    account: &mut Account,
    contract: &FuturesContract,
    price: f64,
    timestamp: DateTime<Utc>,
) {
    for order in execution.take_pending() {
        if let Err(denied) = risk.check(&order, account, contract, price) {
            warn!(ts = %timestamp, "{}", denied);
            execution.deny(order);
            continue;
        }

        let fill = execution.fill(order, price, timestamp);
        account.process_fill(fill, contract);
    }
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("trader_id", &self.config.trader_id)
            .field("venue", &self.venue.as_ref().map(|v| v.venue.as_str()))
            .field("instrument", &self.contract.as_ref().map(|c| c.id()))
            .field("bars", &self.bars.len())
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .field("disposed", &self.disposed)
            .finish()
    }
}
