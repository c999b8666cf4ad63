use std::ffi::OsString;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::core::{self, Injection, MonthlyRecord, SimulationParameters, SimulationResult};
use crate::currency::{CurrencyError, CurrencyTable};

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Windfall runway simulator (monthly compounding, flat withholding tax, one-time injections)"
)]
struct Cli {
    #[arg(long, default_value_t = 50_000.0, help = "Starting balance")]
    initial_balance: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual yield in percent, e.g. 10 for a 10% money-market fund"
    )]
    annual_yield: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Flat withholding tax on interest in percent"
    )]
    tax_rate: f64,
    #[arg(long, default_value_t = 2_500.0, help = "Total monthly expenses")]
    monthly_spend: f64,
    #[arg(
        long = "inject",
        value_name = "MONTH:AMOUNT",
        help = "One-time deposit at a future month (repeatable), e.g. --inject 6:10000"
    )]
    inject: Vec<String>,
    #[arg(long, default_value_t = 120, help = "Months to simulate")]
    horizon_months: u32,
    #[arg(long, help = "Savings goal to check the trajectory against")]
    goal: Option<f64>,
    #[arg(long, default_value = "USD", help = "Unit of account for all amounts")]
    currency: String,
    #[arg(long, help = "Also report aggregates converted to this currency")]
    display_currency: Option<String>,
}

#[derive(Debug)]
struct ApiRequest {
    params: SimulationParameters,
    currency: String,
    display_currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    initial_balance: Option<f64>,
    annual_yield: Option<f64>,
    tax_rate: Option<f64>,
    monthly_spend: Option<f64>,
    injections: Option<Vec<InjectionPayload>>,
    horizon_months: Option<u32>,
    goal: Option<f64>,
    currency: Option<String>,
    display_currency: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct InjectionPayload {
    month: u32,
    amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    runway_months: u32,
    total_interest_earned: f64,
    total_tax_paid: f64,
    ending_balance: f64,
    peak_balance: f64,
    goal_hit_month: Option<u32>,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<DisplayAggregates>,
    records: Vec<MonthlyRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayAggregates {
    currency: String,
    total_interest_earned: f64,
    total_tax_paid: f64,
    ending_balance: f64,
    peak_balance: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_injection_flag(spec: &str) -> Result<Injection, String> {
    let Some((month, amount)) = spec.split_once(':') else {
        return Err(format!("--inject expects MONTH:AMOUNT, got `{spec}`"));
    };
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| format!("--inject month `{month}` is not a whole number"))?;
    if month == 0 {
        return Err("--inject month must be >= 1".to_string());
    }
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("--inject amount `{amount}` is not a number"))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err("--inject amount must be >= 0".to_string());
    }
    Ok(Injection { month, amount })
}

fn request_from_cli(cli: Cli) -> Result<ApiRequest, String> {
    if !cli.initial_balance.is_finite() || cli.initial_balance < 0.0 {
        return Err("--initial-balance must be >= 0".to_string());
    }

    if !cli.annual_yield.is_finite() || cli.annual_yield < 0.0 {
        return Err("--annual-yield must be >= 0".to_string());
    }

    if !(0.0..=100.0).contains(&cli.tax_rate) {
        return Err("--tax-rate must be between 0 and 100".to_string());
    }

    if !cli.monthly_spend.is_finite() {
        return Err("--monthly-spend must be a finite amount".to_string());
    }

    if let Some(goal) = cli.goal {
        if !goal.is_finite() || goal < 0.0 {
            return Err("--goal must be >= 0".to_string());
        }
    }

    let mut injections = Vec::with_capacity(cli.inject.len());
    for spec in &cli.inject {
        injections.push(parse_injection_flag(spec)?);
    }

    let table = CurrencyTable::builtin();
    if table.rate(&cli.currency).is_err() {
        return Err(format!(
            "--currency `{}` is not in the rate table",
            cli.currency
        ));
    }
    if let Some(code) = &cli.display_currency {
        if table.rate(code).is_err() {
            return Err(format!("--display-currency `{code}` is not in the rate table"));
        }
    }

    Ok(ApiRequest {
        params: SimulationParameters {
            initial_balance: cli.initial_balance,
            annual_yield_rate: cli.annual_yield / 100.0,
            tax_rate: cli.tax_rate / 100.0,
            monthly_spend: cli.monthly_spend,
            injections,
            horizon_months: cli.horizon_months,
            goal_amount: cli.goal,
        },
        currency: cli.currency.to_uppercase(),
        display_currency: cli.display_currency.map(|code| code.to_uppercase()),
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        initial_balance: 50_000.0,
        annual_yield: 10.0,
        tax_rate: 15.0,
        monthly_spend: 2_500.0,
        inject: Vec::new(),
        horizon_months: 120,
        goal: None,
        currency: "USD".to_string(),
        display_currency: None,
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.initial_balance {
        cli.initial_balance = v;
    }
    if let Some(v) = payload.annual_yield {
        cli.annual_yield = v;
    }
    if let Some(v) = payload.tax_rate {
        cli.tax_rate = v;
    }
    if let Some(v) = payload.monthly_spend {
        cli.monthly_spend = v;
    }
    if let Some(v) = payload.horizon_months {
        cli.horizon_months = v;
    }
    if let Some(v) = payload.goal {
        cli.goal = Some(v);
    }
    if let Some(v) = payload.currency {
        cli.currency = v;
    }
    if let Some(v) = payload.display_currency {
        cli.display_currency = Some(v);
    }
    if let Some(list) = &payload.injections {
        cli.inject = list
            .iter()
            .map(|i| format!("{}:{}", i.month, i.amount))
            .collect();
    }

    request_from_cli(cli)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("runway HTTP API listening on http://{addr}");
    axum::serve(listener, app).await
}

/// Runs one simulation from CLI flags and prints the report to stdout.
pub fn run_cli<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(
        std::iter::once(OsString::from("runway")).chain(args.into_iter().map(Into::into)),
    );
    let request = request_from_cli(cli)?;
    let result = core::run(&request.params).map_err(|e| e.to_string())?;
    let report = render_report(&request, &result)?;
    println!("{report}");
    Ok(())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            log::warn!("rejected simulate request: {msg}");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let result = match core::run(&request.params) {
        Ok(result) => result,
        Err(err) => {
            log::warn!("rejected simulate request: {err}");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    match build_simulate_response(&request, result) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn build_simulate_response(
    request: &ApiRequest,
    result: SimulationResult,
) -> Result<SimulateResponse, String> {
    let display = display_aggregates(
        &CurrencyTable::builtin(),
        &request.currency,
        request.display_currency.as_deref(),
        &result,
    )
    .map_err(|e| e.to_string())?;

    Ok(SimulateResponse {
        runway_months: result.runway_months,
        total_interest_earned: result.total_interest_earned,
        total_tax_paid: result.total_tax_paid,
        ending_balance: result.ending_balance,
        peak_balance: result.peak_balance,
        goal_hit_month: result.goal_hit_month,
        currency: request.currency.clone(),
        display,
        records: result.records,
    })
}

// Conversion touches reported aggregates only; the recorded series stays in
// the unit of account the recurrence ran in.
fn display_aggregates(
    table: &CurrencyTable,
    currency: &str,
    display_currency: Option<&str>,
    result: &SimulationResult,
) -> Result<Option<DisplayAggregates>, CurrencyError> {
    let Some(display_currency) = display_currency else {
        return Ok(None);
    };

    Ok(Some(DisplayAggregates {
        currency: display_currency.to_string(),
        total_interest_earned: table.convert(
            result.total_interest_earned,
            currency,
            display_currency,
        )?,
        total_tax_paid: table.convert(result.total_tax_paid, currency, display_currency)?,
        ending_balance: table.convert(result.ending_balance, currency, display_currency)?,
        peak_balance: table.convert(result.peak_balance, currency, display_currency)?,
    }))
}

fn render_report(request: &ApiRequest, result: &SimulationResult) -> Result<String, String> {
    let currency = &request.currency;
    let mut lines = vec![
        format!("Runway: {} months", result.runway_months),
        format!(
            "Total interest earned: {}",
            fmt_money(result.total_interest_earned, currency)
        ),
        format!(
            "Total tax paid: {}",
            fmt_money(result.total_tax_paid, currency)
        ),
        format!(
            "Ending balance: {}",
            fmt_money(result.ending_balance, currency)
        ),
        format!("Peak balance: {}", fmt_money(result.peak_balance, currency)),
    ];

    if let Some(display) = display_aggregates(
        &CurrencyTable::builtin(),
        currency,
        request.display_currency.as_deref(),
        result,
    )
    .map_err(|e| e.to_string())?
    {
        lines.push(format!(
            "Converted: interest {}, tax {}, ending {}, peak {}",
            fmt_money(display.total_interest_earned, &display.currency),
            fmt_money(display.total_tax_paid, &display.currency),
            fmt_money(display.ending_balance, &display.currency),
            fmt_money(display.peak_balance, &display.currency),
        ));
    }

    lines.push(runway_insight(result, request.params.horizon_months));
    if let Some(goal) = request.params.goal_amount {
        lines.push(goal_insight(result, goal, currency));
    }

    Ok(lines.join("\n"))
}

fn runway_insight(result: &SimulationResult, horizon_months: u32) -> String {
    if result.runway_months >= horizon_months {
        format!(
            "Interest covers spending: the balance outlasts the whole {horizon_months}-month horizon."
        )
    } else if result.runway_months > 24 {
        format!(
            "Runway is healthy at {} years and {} months.",
            result.runway_months / 12,
            result.runway_months % 12
        )
    } else {
        format!(
            "Runway is only {} months; consider reducing expenses.",
            result.runway_months
        )
    }
}

fn goal_insight(result: &SimulationResult, goal: f64, currency: &str) -> String {
    match result.goal_hit_month {
        Some(month) => format!("Goal of {} hit in month {month}.", fmt_money(goal, currency)),
        None => format!(
            "Peak balance {} falls {} short of the goal.",
            fmt_money(result.peak_balance, currency),
            fmt_money(goal - result.peak_balance, currency)
        ),
    }
}

fn fmt_money(amount: f64, currency: &str) -> String {
    format!("{currency} {}", group_thousands(amount.round() as i64))
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
