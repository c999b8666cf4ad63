mod engine;
mod types;

pub use engine::run;
pub use types::{
    Injection, MonthlyRecord, SimulationError, SimulationParameters, SimulationResult,
};
