use incentive_core::error::CoreError;
use incentive_core::progress::{AcceptanceGate, CalculationOptions};

/// Default number of campaigns recomputed in parallel by `recalculate_all`.
const DEFAULT_RECALC_CONCURRENCY: usize = 8;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Which campaign kinds honour `accepted_at`.
    pub acceptance_gate: AcceptanceGate,
    /// Parallelism of batch recalculation (minimum 1).
    pub recalc_concurrency: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `PROGRESS_ACCEPTANCE_GATE`    | `all`   |
    /// | `PROGRESS_RECALC_CONCURRENCY` | `8`     |
    pub fn from_env() -> Result<Self, CoreError> {
        let acceptance_gate = match std::env::var("PROGRESS_ACCEPTANCE_GATE") {
            Ok(raw) => AcceptanceGate::from_str_value(&raw)?,
            Err(_) => AcceptanceGate::default(),
        };

        let recalc_concurrency = match std::env::var("PROGRESS_RECALC_CONCURRENCY") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                CoreError::Validation(format!(
                    "PROGRESS_RECALC_CONCURRENCY must be a positive integer, got '{raw}'"
                ))
            })?,
            Err(_) => DEFAULT_RECALC_CONCURRENCY,
        };

        Ok(Self {
            acceptance_gate,
            recalc_concurrency: recalc_concurrency.max(1),
        })
    }

    pub fn calculation_options(&self) -> CalculationOptions {
        CalculationOptions {
            acceptance_gate: self.acceptance_gate,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_gate: AcceptanceGate::default(),
            recalc_concurrency: DEFAULT_RECALC_CONCURRENCY,
        }
    }
}
