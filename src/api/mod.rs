use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    ChartRow, IntegerYearRecord, Projection, ProjectionParams, TaxRegime, TaxYear, run_projection,
};

const MAX_YEARS: u32 = 200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliTaxYear {
    #[value(name = "2024")]
    Y2024,
    #[value(name = "2025")]
    Y2025,
}

impl From<CliTaxYear> for TaxYear {
    fn from(value: CliTaxYear) -> Self {
        match value {
            CliTaxYear::Y2024 => TaxYear::Y2024,
            CliTaxYear::Y2025 => TaxYear::Y2025,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    years: Option<u32>,
    tax_year: Option<u16>,

    initial_equity: Option<f64>,
    initial_bonds: Option<f64>,
    initial_property: Option<f64>,

    market_return: Option<f64>,
    dividend_yield: Option<f64>,
    coupon: Option<f64>,
    rental_yield: Option<f64>,
    fee: Option<f64>,
    inflation: Option<f64>,

    partners: Option<bool>,
    mark_to_market: Option<bool>,
    chart_only: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "holding",
    about = "Year-by-year projection of a holding portfolio with corporate and box 2 tax"
)]
pub struct Cli {
    #[arg(long, default_value_t = 10_000.0, help = "Initial equity contribution")]
    initial_equity: f64,
    #[arg(long, default_value_t = 10_000.0, help = "Initial bond contribution")]
    initial_bonds: f64,
    #[arg(long, default_value_t = 0.0, help = "Initial property contribution")]
    initial_property: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        allow_hyphen_values = true,
        help = "Annual equity price return in percent"
    )]
    market_return: f64,
    #[arg(long, default_value_t = 2.0, help = "Dividend yield in percent")]
    dividend_yield: f64,
    #[arg(long, default_value_t = 3.5, help = "Bond coupon rate in percent")]
    coupon: f64,
    #[arg(long, default_value_t = 6.5, help = "Net rental yield in percent")]
    rental_yield: f64,
    #[arg(long, default_value_t = 25.0, help = "Fixed annual fee")]
    fee: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        allow_hyphen_values = true,
        help = "Property appreciation (inflation) in percent"
    )]
    inflation: f64,
    #[arg(long, help = "Shareholders are fiscal partners (box 2 threshold doubles)")]
    partners: bool,
    #[arg(long, help = "Book equity at fair value each year")]
    mark_to_market: bool,
    #[arg(long, value_enum, default_value_t = CliTaxYear::Y2024)]
    tax_year: CliTaxYear,
    #[arg(long, default_value_t = 50, help = "Number of years to project")]
    years: u32,
    #[arg(long, help = "Only print investment value, exit tax and net value")]
    chart_only: bool,
}

#[derive(Debug)]
struct ProjectRequest {
    params: ProjectionParams,
    tax_year: TaxYear,
    years: u32,
    chart_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    tax_year: u16,
    years: u32,
    partners: bool,
    mark_to_market: bool,
    regime: TaxRegime,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<IntegerYearRecord>>,
    chart: Vec<ChartRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegimeEntry {
    tax_year: u16,
    regime: TaxRegime,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(cli: Cli) -> Result<ProjectRequest, String> {
    if cli.years == 0 || cli.years > MAX_YEARS {
        return Err(format!("--years must be between 1 and {MAX_YEARS}"));
    }

    Ok(ProjectRequest {
        params: ProjectionParams {
            initial_equity: cli.initial_equity,
            initial_bonds: cli.initial_bonds,
            initial_property: cli.initial_property,
            market_return_rate: cli.market_return / 100.0,
            dividend_yield: cli.dividend_yield / 100.0,
            coupon_rate: cli.coupon / 100.0,
            rental_yield: cli.rental_yield / 100.0,
            fee_amount: cli.fee,
            inflation_rate: cli.inflation / 100.0,
            partners: cli.partners,
            mark_to_market: cli.mark_to_market,
        },
        tax_year: cli.tax_year.into(),
        years: cli.years,
        chart_only: cli.chart_only,
    })
}

pub fn run_cli(cli: Cli) -> Result<String, String> {
    let request = build_request(cli)?;
    let projection = project(&request)?;
    Ok(render_table(&projection, request.chart_only))
}

fn project(request: &ProjectRequest) -> Result<Projection, String> {
    run_projection(
        request.params.clone(),
        TaxRegime::for_year(request.tax_year),
        request.years,
    )
    .map_err(|e| e.to_string())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "holding projection API listening");
    info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/regimes", get(regimes_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn regimes_handler() -> Response {
    let regimes = TaxYear::ALL
        .into_iter()
        .map(|year| RegimeEntry {
            tax_year: year.year(),
            regime: TaxRegime::for_year(year),
        })
        .collect::<Vec<_>>();
    json_response(StatusCode::OK, regimes)
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let request = match project_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let projection = match project(&request) {
        Ok(projection) => projection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    json_response(StatusCode::OK, build_project_response(&request, &projection))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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

#[cfg(test)]
fn project_request_from_json(json: &str) -> Result<ProjectRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    project_request_from_payload(payload)
}

fn project_request_from_payload(payload: ProjectPayload) -> Result<ProjectRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.tax_year {
        cli.tax_year = match TaxYear::from_year(v) {
            Some(TaxYear::Y2024) => CliTaxYear::Y2024,
            Some(TaxYear::Y2025) => CliTaxYear::Y2025,
            None => return Err(format!("taxYear {v} is not supported")),
        };
    }

    if let Some(v) = payload.initial_equity {
        cli.initial_equity = v;
    }
    if let Some(v) = payload.initial_bonds {
        cli.initial_bonds = v;
    }
    if let Some(v) = payload.initial_property {
        cli.initial_property = v;
    }

    if let Some(v) = payload.market_return {
        cli.market_return = v;
    }
    if let Some(v) = payload.dividend_yield {
        cli.dividend_yield = v;
    }
    if let Some(v) = payload.coupon {
        cli.coupon = v;
    }
    if let Some(v) = payload.rental_yield {
        cli.rental_yield = v;
    }
    if let Some(v) = payload.fee {
        cli.fee = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }

    if let Some(v) = payload.partners {
        cli.partners = v;
    }
    if let Some(v) = payload.mark_to_market {
        cli.mark_to_market = v;
    }
    if let Some(v) = payload.chart_only {
        cli.chart_only = v;
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        initial_equity: 10_000.0,
        initial_bonds: 10_000.0,
        initial_property: 0.0,
        market_return: 6.0,
        dividend_yield: 2.0,
        coupon: 3.5,
        rental_yield: 6.5,
        fee: 25.0,
        inflation: 2.0,
        partners: true,
        mark_to_market: true,
        tax_year: CliTaxYear::Y2024,
        years: 50,
        chart_only: false,
    }
}

fn build_project_response(request: &ProjectRequest, projection: &Projection) -> ProjectResponse {
    ProjectResponse {
        tax_year: request.tax_year.year(),
        years: request.years,
        partners: request.params.partners,
        mark_to_market: request.params.mark_to_market,
        regime: TaxRegime::for_year(request.tax_year),
        records: (!request.chart_only).then(|| projection.to_integer_records()),
        chart: projection.chart_rows(),
    }
}

fn render_table(projection: &Projection, chart_only: bool) -> String {
    let mut out = String::new();
    if chart_only {
        let _ = writeln!(
            out,
            "{:>4} {:>14} {:>12} {:>14}",
            "year", "investment", "exit_tax", "net_value"
        );
        for row in projection.chart_rows() {
            let _ = writeln!(
                out,
                "{:>4} {:>14} {:>12} {:>14}",
                row.year, row.investment_value, row.exit_tax, row.net_value
            );
        }
        return out;
    }

    let _ = writeln!(
        out,
        "{:>4} {:>12} {:>12} {:>12} {:>10} {:>10} {:>12} {:>10} {:>12} {:>12} {:>14} {:>12} {:>14}",
        "year",
        "equity_fv",
        "bonds_fv",
        "property_fv",
        "income",
        "vpb",
        "cash",
        "gain",
        "deferred",
        "box2_income",
        "investment",
        "exit_tax",
        "net_value"
    );
    for row in projection.to_integer_records() {
        let _ = writeln!(
            out,
            "{:>4} {:>12} {:>12} {:>12} {:>10} {:>10} {:>12} {:>10} {:>12} {:>12} {:>14} {:>12} {:>14}",
            row.year,
            row.equity_fv,
            row.bonds_fv,
            row.property_fv,
            row.taxable_income_current,
            row.current_period_tax,
            row.cash_balance,
            row.unrealized_gain,
            row.deferred_tax,
            row.portfolio_income,
            row.investment_value,
            row.exit_tax,
            row.net_value
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    #[test]
    fn build_request_converts_percentages_to_fractions() {
        let request = build_request(sample_cli()).expect("valid request");
        let p = &request.params;
        assert_approx(p.market_return_rate, 0.06);
        assert_approx(p.dividend_yield, 0.02);
        assert_approx(p.coupon_rate, 0.035);
        assert_approx(p.rental_yield, 0.065);
        assert_approx(p.inflation_rate, 0.02);
        assert_approx(p.fee_amount, 25.0);
        assert!(p.partners);
        assert!(p.mark_to_market);
        assert_eq!(request.tax_year, TaxYear::Y2024);
        assert_eq!(request.years, 50);
    }

    #[test]
    fn build_request_rejects_out_of_range_years() {
        let mut cli = sample_cli();
        cli.years = 0;
        let err = build_request(cli).expect_err("zero years");
        assert!(err.contains("--years"));

        let mut cli = sample_cli();
        cli.years = MAX_YEARS + 1;
        assert!(build_request(cli).is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "holding",
            "--initial-equity",
            "50000",
            "--market-return",
            "-3.5",
            "--partners",
            "--tax-year",
            "2025",
            "--years",
            "5",
        ])
        .expect("flags should parse");
        assert!(cli.partners);
        assert!(!cli.mark_to_market);
        assert_eq!(cli.tax_year, CliTaxYear::Y2025);

        let request = build_request(cli).expect("valid request");
        assert_approx(request.params.initial_equity, 50_000.0);
        assert_approx(request.params.market_return_rate, -0.035);
        assert_eq!(request.years, 5);
    }

    #[test]
    fn run_cli_renders_one_line_per_year_plus_header() {
        let mut cli = sample_cli();
        cli.years = 3;
        let table = run_cli(cli).expect("table");
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().next().expect("header").contains("net_value"));

        let mut cli = sample_cli();
        cli.years = 1;
        cli.chart_only = true;
        let table = run_cli(cli).expect("table");
        let row = table.lines().nth(1).expect("first year");
        assert!(row.contains("20911"));
        assert!(row.contains("20687"));
    }

    #[test]
    fn run_cli_reports_engine_validation_errors() {
        let mut cli = sample_cli();
        cli.initial_equity = -5.0;
        let err = run_cli(cli).expect_err("negative equity");
        assert!(err.contains("initial_equity"));
    }

    #[test]
    fn project_request_from_json_parses_web_keys() {
        let json = r#"{
          "years": 12,
          "taxYear": 2025,
          "initialEquity": 25000,
          "initialBonds": 5000,
          "initialProperty": 300000,
          "marketReturn": 7,
          "dividendYield": 1.5,
          "coupon": 4,
          "rentalYield": 5,
          "fee": 100,
          "inflation": 2.5,
          "partners": false,
          "markToMarket": false,
          "chartOnly": true
        }"#;
        let request = project_request_from_json(json).expect("json should parse");
        let p = &request.params;

        assert_eq!(request.years, 12);
        assert_eq!(request.tax_year, TaxYear::Y2025);
        assert!(request.chart_only);
        assert_approx(p.initial_equity, 25_000.0);
        assert_approx(p.initial_bonds, 5_000.0);
        assert_approx(p.initial_property, 300_000.0);
        assert_approx(p.market_return_rate, 0.07);
        assert_approx(p.dividend_yield, 0.015);
        assert_approx(p.coupon_rate, 0.04);
        assert_approx(p.rental_yield, 0.05);
        assert_approx(p.fee_amount, 100.0);
        assert_approx(p.inflation_rate, 0.025);
        assert!(!p.partners);
        assert!(!p.mark_to_market);
    }

    #[test]
    fn project_request_rejects_unknown_tax_year() {
        let err = project_request_from_json(r#"{"taxYear": 1999}"#).expect_err("bad year");
        assert!(err.contains("taxYear"));
    }

    #[test]
    fn empty_payload_uses_reference_scenario() {
        let request = project_request_from_json("{}").expect("defaults");
        assert_eq!(request.years, 50);
        assert!(request.params.partners);
        assert!(request.params.mark_to_market);
        assert_approx(request.params.initial_total(), 20_000.0);
    }

    #[test]
    fn project_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.years = 2;
        let request = build_request(cli).expect("valid request");
        let projection = project(&request).expect("projection");
        let response = build_project_response(&request, &projection);
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"taxYear\":2024"));
        assert!(json.contains("\"markToMarket\":true"));
        assert!(json.contains("\"records\""));
        assert!(json.contains("\"chart\""));
        assert!(json.contains("\"investmentValue\""));
        assert!(json.contains("\"exitTax\""));
        assert!(json.contains("\"netValue\""));
        assert!(json.contains("\"deferredTax\""));
        assert!(json.contains("\"substantialInterest\""));
    }

    #[test]
    fn chart_only_response_omits_records() {
        let mut cli = sample_cli();
        cli.years = 2;
        cli.chart_only = true;
        let request = build_request(cli).expect("valid request");
        let projection = project(&request).expect("projection");
        let response = build_project_response(&request, &projection);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(!json.contains("\"records\""));
        assert_eq!(response.chart.len(), 2);
    }

    #[tokio::test]
    async fn project_handler_returns_chart_for_defaults() {
        let payload = ProjectPayload {
            years: Some(1),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some("no-store".as_bytes())
        );

        let body = body_json(response).await;
        let chart = body["chart"].as_array().expect("chart array");
        assert_eq!(chart.len(), 1);
        assert_eq!(chart[0]["investmentValue"], 20_911);
        assert_eq!(chart[0]["exitTax"], 223);
        assert_eq!(chart[0]["netValue"], 20_687);
        assert_eq!(body["records"][0]["cashBalance"], 311);
    }

    #[tokio::test]
    async fn project_handler_rejects_invalid_parameters() {
        let payload = ProjectPayload {
            coupon: Some(-1.0),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .expect("error message")
                .contains("coupon_rate")
        );
    }

    #[tokio::test]
    async fn regimes_handler_lists_every_tax_year() {
        let response = regimes_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let entries = body.as_array().expect("array");
        assert_eq!(entries.len(), TaxYear::ALL.len());
        assert_eq!(entries[1]["taxYear"], 2025);
        assert_eq!(entries[1]["regime"]["substantialInterest"]["threshold"], 67_804.0);
    }

    #[tokio::test]
    async fn not_found_handler_returns_json_error() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Not found");
    }
}
