use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Address, PositionSnapshot, TimeMs};
use crate::error::AppError;
use crate::orchestration::CollectStats;

fn parse_account(input: &str) -> Result<Address, AppError> {
    if !input.starts_with("0x") || input.len() < 3 {
        return Err(AppError::BadRequest("Invalid account address".to_string()));
    }
    if !input[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::BadRequest("Invalid account address".to_string()));
    }
    Ok(Address::new(input.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioQuery {
    pub account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub account: String,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub account: String,
    pub time_ms: i64,
    pub run_id: String,
    pub net_delta: String,
    pub lp_fee_apr: String,
    pub funding_apr: String,
    pub net_apr: String,
    pub needs_rebalance: bool,
    pub categories: Vec<CategoryDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub category: String,
    pub delta: String,
    pub usd_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub snapshots: Vec<SnapshotDto>,
}

impl From<&PositionSnapshot> for SnapshotDto {
    fn from(snapshot: &PositionSnapshot) -> Self {
        SnapshotDto {
            account: snapshot.account.as_str().to_string(),
            time_ms: snapshot.time_ms.as_ms(),
            run_id: snapshot.run_id.clone(),
            net_delta: snapshot.net_delta().to_canonical_string(),
            lp_fee_apr: snapshot.lp_fee_apr.to_canonical_string(),
            funding_apr: snapshot.funding_apr.to_canonical_string(),
            net_apr: snapshot.net_apr.to_canonical_string(),
            needs_rebalance: snapshot.needs_rebalance,
            categories: snapshot
                .categories
                .iter()
                .map(|(category, exposure)| CategoryDto {
                    category: category.as_str().to_string(),
                    delta: exposure.delta.to_canonical_string(),
                    usd_value: exposure.usd_value.to_canonical_string(),
                })
                .collect(),
        }
    }
}

/// Latest stored snapshot for an account.
pub async fn get_portfolio(
    Query(params): Query<PortfolioQuery>,
    State(state): State<AppState>,
) -> Result<Json<SnapshotDto>, AppError> {
    let account = parse_account(&params.account)?;

    let snapshot = state
        .repo
        .latest_snapshot(&account)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No snapshots for {}", account)))?;

    Ok(Json(SnapshotDto::from(&snapshot)))
}

fn validated_range(
    from_ms: Option<i64>,
    to_ms: Option<i64>,
) -> Result<(Option<TimeMs>, Option<TimeMs>), AppError> {
    let from_ms = from_ms.map(TimeMs::new);
    let to_ms = to_ms.map(TimeMs::new);
    if let (Some(from), Some(to)) = (from_ms, to_ms) {
        if from > to {
            return Err(AppError::BadRequest("fromMs must be <= toMs".to_string()));
        }
    }
    Ok((from_ms, to_ms))
}

/// Stored snapshots for an account within an optional time range.
pub async fn get_history(
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, AppError> {
    let account = parse_account(&params.account)?;
    let (from_ms, to_ms) = validated_range(params.from_ms, params.to_ms)?;

    let snapshots = state.repo.query_snapshots(&account, from_ms, to_ms).await?;

    Ok(Json(HistoryResponse {
        snapshots: snapshots.iter().map(SnapshotDto::from).collect(),
    }))
}

/// CSV export of the same history rows.
pub async fn export_history(
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let account = parse_account(&params.account)?;
    let (from_ms, to_ms) = validated_range(params.from_ms, params.to_ms)?;

    let snapshots = state.repo.query_snapshots(&account, from_ms, to_ms).await?;
    let body = snapshots_to_csv(&snapshots)
        .map_err(|e| AppError::Internal(format!("CSV encoding failed: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, "text/csv")], body))
}

fn snapshots_to_csv(snapshots: &[PositionSnapshot]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "account",
        "time_ms",
        "run_id",
        "net_delta",
        "lp_fee_apr",
        "funding_apr",
        "net_apr",
        "needs_rebalance",
    ])?;

    for snapshot in snapshots {
        let time_ms = snapshot.time_ms.as_ms().to_string();
        let net_delta = snapshot.net_delta().to_canonical_string();
        let lp_fee_apr = snapshot.lp_fee_apr.to_canonical_string();
        let funding_apr = snapshot.funding_apr.to_canonical_string();
        let net_apr = snapshot.net_apr.to_canonical_string();
        writer.write_record([
            snapshot.account.as_str(),
            time_ms.as_str(),
            snapshot.run_id.as_str(),
            net_delta.as_str(),
            lp_fee_apr.as_str(),
            funding_apr.as_str(),
            net_apr.as_str(),
            if snapshot.needs_rebalance { "true" } else { "false" },
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Trigger one collection pass over all configured accounts.
pub async fn post_refresh(State(state): State<AppState>) -> Json<CollectStats> {
    Json(state.collector.collect_all().await)
}
