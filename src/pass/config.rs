//! Configuration for the chain factorization pass.

use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::optimization::CostModel;

/// Operand count above which the search refuses to enumerate by default.
///
/// `10!` is about 3.6M orders.
pub const DEFAULT_MAX_OPERANDS: usize = 10;

/// Configuration options for [`ChainFactorizer`](super::ChainFactorizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorizeConfig {
    /// Whether chains are rewritten at all.
    pub enabled: bool,
    /// Cost model used to rank fold orders.
    pub cost_model: CostModel,
    /// Longest chain the search will enumerate; `None` for no limit.
    pub max_operands: Option<usize>,
}

impl Default for FactorizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cost_model: CostModel::default(),
            max_operands: Some(DEFAULT_MAX_OPERANDS),
        }
    }
}

impl FactorizeConfig {
    /// Creates a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the pass.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the cost model.
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Sets the operand limit of the search.
    pub fn with_max_operands(mut self, max_operands: Option<usize>) -> Self {
        self.max_operands = max_operands;
        self
    }

    /// A config that leaves every chain untouched.
    pub fn disabled() -> Self {
        Self::default().with_enabled(false)
    }

    /// A config that also charges for transposed layouts.
    pub fn layout_aware(transpose_weight: u64) -> Self {
        Self::default().with_cost_model(CostModel::layout_aware(transpose_weight))
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `CUBEK_TC_FACTORIZE=0` - Disable the pass
    /// * `CUBEK_TC_MAX_OPERANDS=N` - Search limit, `0` for unlimited (default: 10)
    /// * `CUBEK_TC_TRANSPOSE_WEIGHT=N` - Layout penalty weight (default: 0)
    #[cfg(feature = "std")]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// Unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("CUBEK_TC_FACTORIZE") {
            config.enabled = !matches!(value.trim(), "0" | "false" | "off");
        }
        if let Some(limit) = lookup("CUBEK_TC_MAX_OPERANDS").and_then(|s| s.trim().parse().ok()) {
            config.max_operands = (limit > 0).then_some(limit);
        }
        if let Some(weight) =
            lookup("CUBEK_TC_TRANSPOSE_WEIGHT").and_then(|s| s.trim().parse().ok())
        {
            config.cost_model = CostModel::layout_aware(weight);
        }

        config
    }
}
