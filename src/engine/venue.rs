use serde::{Deserialize, Serialize};
use std::fmt;

//order management system type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OmsType {
    //one aggregate position per instrument
    Netting,
    //one position per opening order
    Hedging,
}

impl fmt::Display for OmsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmsType::Netting => write!(f, "NETTING"),
            OmsType::Hedging => write!(f, "HEDGING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Margin,
    Cash,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Margin => write!(f, "MARGIN"),
            AccountType::Cash => write!(f, "CASH"),
        }
    }
}

//simulated venue the account trades on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub venue: String,
    pub oms_type: OmsType,
    pub account_type: AccountType,
    pub base_currency: String,
    pub starting_balance: f64,

    //commission per contract per side
    #[serde(default)]
    pub commission_per_contract: f64,

    //slippage per contract per side
    #[serde(default)]
    pub slippage_per_contract: f64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        VenueConfig {
            venue: "GLBX".to_string(),
            oms_type: OmsType::Netting,
            account_type: AccountType::Margin,
            base_currency: "USD".to_string(),
            starting_balance: 100_000.0,
            commission_per_contract: 0.0,
            slippage_per_contract: 0.0,
        }
    }
}
