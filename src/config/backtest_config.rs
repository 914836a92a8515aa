use crate::databento::RangeRequest;
use crate::engine::{EngineConfig, RiskConfig, VenueConfig, MAX_ORDER_QTY};
use crate::instrument::{BarType, BarTypeError, FuturesContract, InstrumentError};
use crate::strategy::MovingAverageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub trader_id: String,
    pub log_level: String,
    pub bypass_risk: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        EngineSettings {
            trader_id: engine.trader_id,
            log_level: engine.log_level,
            bypass_risk: engine.risk.bypass,
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            trader_id: self.trader_id.clone(),
            log_level: self.log_level.clone(),
            risk: RiskConfig {
                bypass: self.bypass_risk,
            },
        }
    }
}

//contract configuration (simpler than full futurescontract)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub root: String,
    pub expiry_year: i32,
    pub expiry_month: u32,
    pub venue: String,
    pub tick_size: f64,
    pub tick_value: f64,
    pub initial_margin: f64,
    pub maintenance_margin: f64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        ContractConfig {
            root: "ES".to_string(),
            expiry_year: 2024,
            expiry_month: 3,
            venue: "GLBX".to_string(),
            tick_size: 0.25,
            tick_value: 12.5,
            initial_margin: 13000.0,
            maintenance_margin: 12000.0,
        }
    }
}

impl ContractConfig {
    //converts to a FuturesContract
    pub fn to_futures_contract(&self) -> Result<FuturesContract, InstrumentError> {
        FuturesContract::future(
            &self.root,
            self.expiry_year,
            self.expiry_month,
            &self.venue,
            self.tick_size,
            self.tick_value,
            self.initial_margin,
            self.maintenance_margin,
        )
    }
}

//crossover strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub trade_size: u32,
    pub moving_average: MovingAverageKind,

    //defaults to one-minute last-price external bars of the contract
    pub bar_type: Option<String>,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        CrossoverParams {
            fast_period: 20,
            slow_period: 50,
            trade_size: 1,
            moving_average: MovingAverageKind::Exponential,
            bar_type: None,
        }
    }
}

impl CrossoverParams {
    pub fn resolve_bar_type(&self, contract: &FuturesContract) -> Result<BarType, BarTypeError> {
        match &self.bar_type {
            Some(bar_type) => bar_type.parse(),
            None => Ok(BarType::minute_last_external(&contract.id())),
        }
    }
}

//complete backtest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfiguration {
    pub engine: EngineSettings,
    pub venue: VenueConfig,

    //contract specification
    pub contract: ContractConfig,

    //raw .dbn.zst from the fetch step, or a csv of bars
    pub data_path: PathBuf,

    //strategy
    pub strategy: CrossoverParams,

    //optional output paths
    pub output_equity_csv: Option<PathBuf>,
    pub output_fills_csv: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            engine: EngineSettings::default(),
            venue: VenueConfig::default(),
            contract: ContractConfig::default(),
            data_path: RangeRequest::default().raw_path(Path::new("data")),
            strategy: CrossoverParams::default(),
            output_equity_csv: None,
            output_fills_csv: None,
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    //rejects strategy parameters the engine cannot trade
    pub fn validate(&self) -> anyhow::Result<()> {
        let params = &self.strategy;
        if params.trade_size == 0 || params.trade_size > MAX_ORDER_QTY {
            anyhow::bail!(
                "trade_size {} is outside 1..={}",
                params.trade_size,
                MAX_ORDER_QTY
            );
        }
        if params.fast_period == 0 || params.slow_period == 0 {
            anyhow::bail!("moving average periods must be positive");
        }
        Ok(())
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
