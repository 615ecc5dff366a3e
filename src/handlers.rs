/// HTTP 핸들러
/// 커맨드는 AuctionService 로, 조회는 query 모듈로 위임한다.
/// 타입화된 거부/상태 오류는 {"error", "code"} JSON 으로, 재시도 가능한 Busy 는 503 으로 매핑한다.
// region:    --- Imports
use crate::auction::state_machine::StateError;
use crate::bidding::commands::{
    AuctionService, CancelAuctionCommand, CreateAuctionCommand, CreateAutoBidCommand,
    PlaceBidCommand, ScheduleAuctionCommand, ServiceError,
};
use crate::bidding::validator::BidRejection;
use crate::database::DatabaseManager;
use crate::query;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

// endregion: --- Imports

/// 핸들러 공유 상태
pub type AppState = (Arc<DatabaseManager>, Arc<AuctionService>);

// region:    --- Error Mapping

fn state_error_code(e: &StateError) -> &'static str {
    match e {
        StateError::IllegalStateTransition { .. } => "ILLEGAL_STATE_TRANSITION",
        StateError::InvalidScheduleWindow => "INVALID_SCHEDULE_WINDOW",
        StateError::CannotCancelWithBids => "CANNOT_CANCEL_WITH_BIDS",
    }
}

/// 서비스 오류를 HTTP 응답으로 변환
fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Rejected(rejection) => {
            let mut body = serde_json::json!({
                "error": rejection.to_string(),
                "code": rejection.code(),
            });
            // 금액 미달 거부는 최소 수락 금액을 함께 내려 재시도를 돕는다
            if let BidRejection::BidTooLow { minimum_acceptable }
            | BidRejection::AutoBidMaxTooLow { minimum_acceptable } = &rejection
            {
                body["minimum_acceptable"] = serde_json::json!(minimum_acceptable);
            }
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        ServiceError::State(e) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": e.to_string(),
                "code": state_error_code(&e),
            })),
        )
            .into_response(),
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "경매를 찾을 수 없습니다.",
                "code": "NOT_FOUND",
            })),
        )
            .into_response(),
        ServiceError::Busy | ServiceError::VersionConflict => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": "처리 중인 요청이 많습니다. 잠시 후 다시 시도하세요.",
                "code": "BUSY",
            })),
        )
            .into_response(),
        ServiceError::Money(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": e.to_string(),
                "code": "INVALID_AMOUNT",
            })),
        )
            .into_response(),
        ServiceError::Store(e) => {
            error!("{:<12} --> 저장소 오류: {:?}", "Handler", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "내부 오류가 발생했습니다.",
                    "code": "INTERNAL",
                })),
            )
                .into_response()
        }
    }
}

// endregion: --- Error Mapping

// region:    --- Command Handlers

/// 경매 생성 요청 처리
pub async fn handle_create_auction(
    State((_, service)): State<AppState>,
    Json(cmd): Json<CreateAuctionCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 생성 요청: {:?}", "Handler", cmd);
    match service.create_auction(cmd, Utc::now()).await {
        Ok(auction) => (StatusCode::CREATED, Json(auction)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 일정 확정 요청 본문
#[derive(Debug, Deserialize)]
pub struct ScheduleWindowBody {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// 경매 일정 확정 요청 처리
pub async fn handle_schedule_auction(
    State((_, service)): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<ScheduleWindowBody>,
) -> impl IntoResponse {
    let cmd = ScheduleAuctionCommand {
        auction_id,
        start_at: body.start_at,
        end_at: body.end_at,
    };
    match service.schedule_auction(cmd, Utc::now()).await {
        Ok(auction) => Json(auction).into_response(),
        Err(e) => error_response(e),
    }
}

/// 입찰 요청 처리
pub async fn handle_bid(
    State((_, service)): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Handler", cmd);
    match service.place_bid(cmd, Utc::now()).await {
        Ok(placement) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰이 성공적으로 처리되었습니다.",
                "bid": placement.bid,
                "auto_bids": placement.auto_bids,
                "leading_bid": placement.leading_bid,
                "current_bid": placement.current_bid,
                "extended_to": placement.extended_to,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// 자동 입찰 위임 요청 처리
pub async fn handle_auto_bid(
    State((_, service)): State<AppState>,
    Json(cmd): Json<CreateAutoBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 자동 입찰 위임 요청: {:?}", "Handler", cmd);
    match service.create_auto_bid(cmd, Utc::now()).await {
        Ok(placement) => (StatusCode::CREATED, Json(placement)).into_response(),
        Err(e) => error_response(e),
    }
}

/// 경매 수동 종료 요청 처리 (운영 도구)
pub async fn handle_close_auction(
    State((_, service)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 종료 요청: id={}", "Handler", auction_id);
    match service.close_auction(auction_id, Utc::now()).await {
        Ok(outcome) => Json(serde_json::json!({
            "message": "경매가 종료되었습니다.",
            "outcome": format!("{:?}", outcome),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// 취소 요청 본문
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
    #[serde(default)]
    pub admin_override: bool,
}

/// 경매 취소 요청 처리
pub async fn handle_cancel_auction(
    State((_, service)): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> impl IntoResponse {
    let cmd = CancelAuctionCommand {
        auction_id,
        reason: body.reason,
        admin_override: body.admin_override,
    };
    info!("{:<12} --> 경매 취소 요청: {:?}", "Handler", cmd);
    match service.cancel_auction(cmd, Utc::now()).await {
        Ok(auction) => Json(auction).into_response(),
        Err(e) => error_response(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 스냅샷 조회 (상태 + 남은 시간, 리저브는 충족 여부만)
pub async fn handle_get_auction(
    State((db_manager, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 스냅샷 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_auction_snapshot(&db_manager, auction_id, Utc::now()).await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "경매를 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 모든 경매 조회
pub async fn handle_get_auctions(
    State((db_manager, _)): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 모든 경매 조회", "HandlerQuery");
    match query::handlers::get_all_auctions(&db_manager).await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State((db_manager, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 최고 입찰가 조회 id: {}",
        "HandlerQuery", auction_id
    );
    match query::handlers::get_highest_bid(&db_manager, auction_id).await {
        Ok(bid) => Json(bid).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State((db_manager, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_bid_history(&db_manager, auction_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 입찰자 통지함 조회
pub async fn handle_get_notifications(
    State((db_manager, _)): State<AppState>,
    Path(bidder_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 통지함 조회 bidder: {}", "HandlerQuery", bidder_id);
    match query::handlers::get_notifications(&db_manager, bidder_id).await {
        Ok(notifications) => Json(notifications).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// endregion: --- Query Handlers
