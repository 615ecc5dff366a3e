/// 읽기 전용 조회
/// 조회 경로는 경매 행 잠금을 잡지 않는다. 권위 있는 값은 쓰기 경로가 소유한다.
// region:    --- Imports
use super::queries;
use crate::auction::model::{Auction, Bid};
use crate::database::DatabaseManager;
use crate::money::Money;
use crate::notifications::Notification;
use crate::store::{AuctionRow, BidRow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::info;

// endregion: --- Imports

// region:    --- Snapshot

/// 경매 스냅샷 (UI 투영)
/// 리저브 금액은 절대 노출하지 않고 존재 여부와 충족 여부만 내보낸다.
#[derive(Debug, Serialize)]
pub struct AuctionSnapshot {
    pub auction_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub state: String,
    pub starting_price: Money,
    pub current_bid: Money,
    pub minimum_next_bid: Option<Money>,
    pub bid_count: i64,
    pub leading_bidder_id: Option<i64>,
    pub winner_id: Option<i64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub time_remaining_secs: i64,
    pub has_reserve: bool,
    pub reserve_met: bool,
    pub extension_count: i32,
}

impl AuctionSnapshot {
    pub fn from_auction(auction: &Auction, now: DateTime<Utc>) -> Self {
        Self {
            auction_id: auction.id,
            product_id: auction.product_id,
            seller_id: auction.seller_id,
            state: auction.state.as_str().to_string(),
            starting_price: auction.starting_price,
            current_bid: auction.current_bid,
            minimum_next_bid: auction.minimum_acceptable().ok(),
            bid_count: auction.bid_count,
            leading_bidder_id: auction.leading_bidder_id,
            winner_id: auction.winner_id,
            start_at: auction.start_at,
            end_at: auction.end_at,
            time_remaining_secs: auction.time_remaining(now).num_seconds(),
            has_reserve: auction.reserve_price.is_some(),
            reserve_met: auction.reserve_met(),
            extension_count: auction.extension_count,
        }
    }
}

// endregion: --- Snapshot

// region:    --- Query Handlers

/// 경매 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let row = sqlx::query_as::<_, AuctionRow>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                row.map(AuctionRow::into_auction).transpose()
            })
        })
        .await
}

/// 경매 스냅샷 조회 (상태 + 남은 시간)
pub async fn get_auction_snapshot(
    db_manager: &DatabaseManager,
    auction_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<AuctionSnapshot>, SqlxError> {
    info!("{:<12} --> 경매 스냅샷 조회 id: {}", "Query", auction_id);
    let auction = get_auction(db_manager, auction_id).await?;
    Ok(auction.map(|a| AuctionSnapshot::from_auction(&a, now)))
}

/// 모든 경매 조회
pub async fn get_all_auctions(db_manager: &DatabaseManager) -> Result<Vec<Auction>, SqlxError> {
    info!("{:<12} --> 모든 경매 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let rows = sqlx::query_as::<_, AuctionRow>(queries::GET_ALL_AUCTIONS)
                    .fetch_all(&mut **tx)
                    .await?;
                rows.into_iter().map(AuctionRow::into_auction).collect()
            })
        })
        .await
}

/// 최고 입찰가 조회
pub async fn get_highest_bid(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<i64>, SqlxError> {
    info!("{:<12} --> 최고 입찰가 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_HIGHEST_BID)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("highest_bid"))
            })
        })
        .await
}

/// 입찰 이력 조회
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let rows = sqlx::query_as::<_, BidRow>(queries::GET_BID_HISTORY)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await?;
                rows.into_iter().map(BidRow::into_bid).collect()
            })
        })
        .await
}

/// 입찰자 통지함 조회
pub async fn get_notifications(
    db_manager: &DatabaseManager,
    bidder_id: i64,
) -> Result<Vec<Notification>, SqlxError> {
    info!("{:<12} --> 통지함 조회 bidder: {}", "Query", bidder_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Notification>(queries::GET_NOTIFICATIONS)
                    .bind(bidder_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

// endregion: --- Query Handlers
