use std::collections::BTreeMap;

use super::types::{
    Injection, MonthlyRecord, SimulationError, SimulationParameters, SimulationResult,
};

/// Runs the month-by-month runway simulation.
///
/// Pure and deterministic: the same parameters always produce the same
/// result, and the loop is bounded by `horizon_months + 1` iterations no
/// matter what the balance does.
pub fn run(params: &SimulationParameters) -> Result<SimulationResult, SimulationError> {
    validate(params)?;

    let schedule = injection_schedule(&params.injections);
    let monthly_rate = params.annual_yield_rate / 12.0;

    let mut balance = params.initial_balance;
    let mut total_interest_earned = 0.0;
    let mut total_tax_paid = 0.0;
    let mut records = Vec::with_capacity(params.horizon_months as usize + 1);

    for month in 0..=params.horizon_months {
        let injected = schedule.get(&month).copied();
        records.push(MonthlyRecord {
            month,
            balance: balance.max(0.0),
            is_injection_month: injected.is_some(),
        });

        // Termination is decided on the true balance; the record above has
        // already floored it for display. An insolvent month is recorded
        // once and earns nothing.
        if balance <= 0.0 {
            break;
        }

        // Injections land before interest, so a windfall starts compounding
        // the month it arrives.
        if let Some(amount) = injected {
            balance += amount;
        }

        let gross_interest = balance * monthly_rate;
        let tax = gross_interest * params.tax_rate;
        total_interest_earned += gross_interest;
        total_tax_paid += tax;

        balance += gross_interest - tax - params.monthly_spend;
    }

    let runway_months = (records.len() - 1) as u32;
    let ending_balance = records.last().map_or(0.0, |r| r.balance);
    let peak_balance = records.iter().map(|r| r.balance).fold(0.0, f64::max);
    let goal_hit_month = params
        .goal_amount
        .and_then(|goal| records.iter().find(|r| r.balance >= goal).map(|r| r.month));

    Ok(SimulationResult {
        records,
        runway_months,
        total_interest_earned,
        total_tax_paid,
        ending_balance,
        peak_balance,
        goal_hit_month,
    })
}

fn validate(params: &SimulationParameters) -> Result<(), SimulationError> {
    if !params.initial_balance.is_finite() || params.initial_balance < 0.0 {
        return Err(SimulationError::invalid(
            "initial_balance",
            "must be finite and >= 0",
        ));
    }
    if !params.annual_yield_rate.is_finite() || params.annual_yield_rate < 0.0 {
        return Err(SimulationError::invalid(
            "annual_yield_rate",
            "must be finite and >= 0",
        ));
    }
    if !params.tax_rate.is_finite() || !(0.0..=1.0).contains(&params.tax_rate) {
        return Err(SimulationError::invalid(
            "tax_rate",
            "must be between 0 and 1",
        ));
    }
    if !params.monthly_spend.is_finite() {
        return Err(SimulationError::invalid("monthly_spend", "must be finite"));
    }
    for injection in &params.injections {
        if injection.month == 0 {
            return Err(SimulationError::invalid(
                "injections",
                format!("month must be >= 1, got {}", injection.month),
            ));
        }
        if !injection.amount.is_finite() || injection.amount < 0.0 {
            return Err(SimulationError::invalid(
                "injections",
                format!(
                    "amount for month {} must be finite and >= 0",
                    injection.month
                ),
            ));
        }
    }
    if let Some(goal) = params.goal_amount {
        if !goal.is_finite() || goal < 0.0 {
            return Err(SimulationError::invalid(
                "goal_amount",
                "must be finite and >= 0",
            ));
        }
    }
    Ok(())
}

// Duplicate months sum, so callers may supply the schedule in any order and
// split a month's inflow across entries.
fn injection_schedule(injections: &[Injection]) -> BTreeMap<u32, f64> {
    let mut schedule = BTreeMap::new();
    for injection in injections {
        *schedule.entry(injection.month).or_insert(0.0) += injection.amount;
    }
    schedule
}
