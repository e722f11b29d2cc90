//! Loyalty points: balance, ledger, redemption preview and admin tools.

use axum::extract::State;
use chrono::Utc;

use crate::db::PageRequest;
use crate::error::{Message, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::loyalty::{
    AdjustPointsInput, ExpirySweepReport, LoyaltySummary, LoyaltyTransaction,
    RedemptionPreview, RedemptionPreviewInput, TransactionFilter,
};
use crate::services::loyalty::LoyaltyService;
use crate::state::AppState;

use super::ApiResponse;
use super::extract::{JsonBody, QueryParams};

fn loyalty(state: &AppState) -> LoyaltyService<'_> {
    LoyaltyService::new(state.pool(), &state.config().loyalty)
}

/// GET /loyalty/summary
#[utoipa::path(
    get,
    path = "/loyalty/summary",
    tag = "loyalty",
    security(("bearer" = [])),
    responses((status = 200, description = "Balance, tier and expiring points", body = ApiResponse<LoyaltySummary>))
)]
pub async fn summary(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<LoyaltySummary>> {
    let summary = loyalty(&state).summary(user.id).await?;
    Ok(ApiResponse::ok(summary))
}

/// GET /loyalty/transactions
#[utoipa::path(
    get,
    path = "/loyalty/transactions",
    tag = "loyalty",
    security(("bearer" = [])),
    params(TransactionFilter),
    responses((status = 200, description = "Ledger, newest first", body = ApiResponse<Vec<LoyaltyTransaction>>))
)]
pub async fn transactions(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    QueryParams(filter): QueryParams<TransactionFilter>,
) -> Result<ApiResponse<Vec<LoyaltyTransaction>>> {
    let page = loyalty(&state)
        .transactions(
            user.id,
            filter.kind,
            PageRequest::new(filter.page, filter.limit),
        )
        .await?;
    Ok(ApiResponse::paged(page))
}

/// POST /loyalty/preview
#[utoipa::path(
    post,
    path = "/loyalty/preview",
    tag = "loyalty",
    security(("bearer" = [])),
    request_body = RedemptionPreviewInput,
    responses(
        (status = 200, description = "Allowed points and discount", body = ApiResponse<RedemptionPreview>),
        (status = 400, description = "Negative subtotal or points")
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(input): JsonBody<RedemptionPreviewInput>,
) -> Result<ApiResponse<RedemptionPreview>> {
    let preview = loyalty(&state).preview(user.id, input).await?;
    Ok(ApiResponse::ok(preview))
}

/// POST /loyalty/adjust (admin)
///
/// # Errors
///
/// Returns 400 for zero points, a blank reason or a debit beyond the balance.
#[utoipa::path(
    post,
    path = "/loyalty/adjust",
    tag = "loyalty",
    security(("bearer" = [])),
    request_body = AdjustPointsInput,
    responses(
        (status = 200, description = "Ledger entry recorded", body = ApiResponse<LoyaltyTransaction>),
        (status = 400, description = "Invalid adjustment"),
        (status = 404, description = "User not found")
    )
)]
pub async fn adjust(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(input): JsonBody<AdjustPointsInput>,
) -> Result<ApiResponse<LoyaltyTransaction>> {
    let entry = loyalty(&state).adjust(&input).await?;
    tracing::info!(admin_id = %admin.id, user_id = %input.user_id, points = input.points, "Points adjusted");
    Ok(ApiResponse::ok(entry).with_message(Message::new(
        "Points adjusted",
        "Đã điều chỉnh điểm",
    )))
}

/// POST /loyalty/expire (admin)
///
/// Runs the expiry sweep immediately.
#[utoipa::path(
    post,
    path = "/loyalty/expire",
    tag = "loyalty",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Sweep result", body = ApiResponse<ExpirySweepReport>),
        (status = 403, description = "Admins only")
    )
)]
pub async fn expire(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<ExpirySweepReport>> {
    let report = loyalty(&state).sweep(Utc::now()).await?;
    Ok(ApiResponse::ok(report).with_message(Message::new(
        "Expired points swept",
        "Đã xử lý điểm hết hạn",
    )))
}
