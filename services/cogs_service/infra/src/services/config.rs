//! Engine configuration assembly

use cogs_service_core::domains::cogs::{CostingConfig, CostingMethod, LotMergePolicy};
use cogs_service_core::Result;
use shared_error::AppError;

/// Build the engine's costing configuration from the environment config
pub fn costing_config_from(config: &shared_config::Config) -> Result<CostingConfig> {
    let lot_merge_policy = LotMergePolicy::parse(&config.lot_merge_policy).ok_or_else(|| {
        AppError::ConfigError(format!(
            "unrecognized lot_merge_policy '{}'",
            config.lot_merge_policy
        ))
    })?;

    Ok(CostingConfig {
        mode: CostingMethod::Fifo,
        require_date_guard: config.require_date_guard,
        lot_merge_policy,
        monetary_scale: config.monetary_scale,
        intermediate_scale: config.intermediate_scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_cleanly() {
        let config = shared_config::Config::from_env().unwrap();
        let costing = costing_config_from(&config).unwrap();
        assert!(costing.require_date_guard);
        assert_eq!(costing.lot_merge_policy, LotMergePolicy::UpsertIncreaseOnly);
        assert_eq!(costing.monetary_scale, 2);
        assert_eq!(costing.intermediate_scale, 4);
    }
}
