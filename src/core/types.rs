use serde::Serialize;
use thiserror::Error;

/// A one-time deposit landing at the start of a future month.
///
/// Injections with the same `month` accumulate: the engine sums them before
/// running the recurrence, so the order of the input sequence is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Injection {
    pub month: u32,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationParameters {
    pub initial_balance: f64,
    /// Annual yield as a fraction, e.g. 0.12 for 12%. Divided by 12 for the
    /// monthly crediting rate.
    pub annual_yield_rate: f64,
    /// Flat withholding rate on gross interest, in [0, 1].
    pub tax_rate: f64,
    pub monthly_spend: f64,
    pub injections: Vec<Injection>,
    /// The simulation never runs past this month, regardless of balance.
    pub horizon_months: u32,
    /// Reporting-only target; never alters the recurrence.
    pub goal_amount: Option<f64>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            initial_balance: 0.0,
            annual_yield_rate: 0.0,
            tax_rate: 0.0,
            monthly_spend: 0.0,
            injections: Vec::new(),
            horizon_months: 120,
            goal_amount: None,
        }
    }
}

/// Balance observed at the start of a month, floored at zero for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    pub balance: f64,
    pub is_injection_month: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub records: Vec<MonthlyRecord>,
    /// Index of the last recorded month, i.e. `records.len() - 1`.
    pub runway_months: u32,
    pub total_interest_earned: f64,
    pub total_tax_paid: f64,
    pub ending_balance: f64,
    pub peak_balance: f64,
    /// First month whose recorded balance met the goal, when a goal was set.
    pub goal_hit_month: Option<u32>,
}

/// The only failure the engine itself can produce: a precondition violation
/// on the inputs. The recurrence is total over valid parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },
}

impl SimulationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidParameter { field, .. } => field,
        }
    }
}
