use crate::engine::execution::Order;
use crate::instrument::FuturesContract;
use crate::portfolio::Account;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    //skip all pre-trade checks
    pub bypass: bool,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("order {order_id} denied: requires {required:.2} margin, {available:.2} available")]
pub struct OrderDenied {
    pub order_id: u64,
    pub required: f64,
    pub available: f64,
}

//pre-trade checks applied to each order before it fills
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        RiskEngine { config }
    }

    pub fn is_bypassed(&self) -> bool {
        self.config.bypass
    }

    //orders that only reduce exposure always pass
    //orders that add exposure need the extra margin in buying power
    pub fn check(
        &self,
        order: &Order,
        account: &Account,
        contract: &FuturesContract,
        price: f64,
    ) -> Result<(), OrderDenied> {
        if self.config.bypass {
            return Ok(());
        }

        let current = account.net_qty(&order.symbol);
        let after = current + order.signed_qty();

        if after.abs() <= current.abs() && after.signum() != -current.signum() {
            return Ok(());
        }

        let required = account.required_margin(contract, after, price)
            - account.required_margin(contract, current, price);

        if account.has_sufficient_margin(required) {
            Ok(())
        } else {
            Err(OrderDenied {
                order_id: order.id,
                required,
                available: account.buying_power(),
            })
        }
    }
}
