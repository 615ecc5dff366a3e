/// 쓰기 경로 저장 함수
/// 경매 하나에 대한 모든 변경은 같은 트랜잭션 안에서 행 잠금(FOR UPDATE)을 잡고 수행된다.
/// 버전 컬럼은 잠금이 깨지는 경우를 대비한 낙관적 2차 방어선이다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionState, AutoBidMandate, Bid};
use crate::money::{Currency, Money};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, Postgres, Transaction};

// endregion: --- Imports

// region:    --- Row Models

/// auctions 테이블 행
#[derive(Debug, FromRow)]
pub(crate) struct AuctionRow {
    id: i64,
    product_id: i64,
    seller_id: i64,
    currency: String,
    starting_price: i64,
    reserve_price: Option<i64>,
    current_bid: i64,
    min_increment: i64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    state: String,
    bid_count: i64,
    leading_bidder_id: Option<i64>,
    winner_id: Option<i64>,
    anti_sniping_window_secs: Option<i64>,
    anti_sniping_extension_secs: Option<i64>,
    extension_count: i32,
    last_extension_bid_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
}

/// bids 테이블 행
#[derive(Debug, FromRow)]
pub(crate) struct BidRow {
    id: i64,
    auction_id: i64,
    bidder_id: i64,
    amount: i64,
    currency: String,
    placed_at: DateTime<Utc>,
    is_automatic: bool,
    proxy_max_amount: Option<i64>,
}

/// auto_bid_mandates 테이블 행
#[derive(Debug, FromRow)]
struct MandateRow {
    id: i64,
    auction_id: i64,
    bidder_id: i64,
    max_amount: i64,
    increment: i64,
    currency: String,
    active: bool,
    created_at: DateTime<Utc>,
}

fn decode_err<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}

impl AuctionRow {
    pub(crate) fn into_auction(self) -> Result<Auction, sqlx::Error> {
        let currency = Currency::from_str(&self.currency).map_err(decode_err)?;
        let state = AuctionState::from_str(&self.state)
            .ok_or_else(|| sqlx::Error::Protocol(format!("알 수 없는 경매 상태: {}", self.state)))?;
        let money = |amount: i64| Money::new(amount, currency).map_err(decode_err);
        Ok(Auction {
            id: self.id,
            product_id: self.product_id,
            seller_id: self.seller_id,
            starting_price: money(self.starting_price)?,
            reserve_price: self.reserve_price.map(money).transpose()?,
            current_bid: money(self.current_bid)?,
            min_increment: money(self.min_increment)?,
            start_at: self.start_at,
            end_at: self.end_at,
            state,
            bid_count: self.bid_count,
            leading_bidder_id: self.leading_bidder_id,
            winner_id: self.winner_id,
            anti_sniping_window: self.anti_sniping_window_secs.map(Duration::seconds),
            anti_sniping_extension: self.anti_sniping_extension_secs.map(Duration::seconds),
            extension_count: self.extension_count,
            last_extension_bid_at: self.last_extension_bid_at,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

impl BidRow {
    pub(crate) fn into_bid(self) -> Result<Bid, sqlx::Error> {
        let currency = Currency::from_str(&self.currency).map_err(decode_err)?;
        Ok(Bid {
            id: self.id,
            auction_id: self.auction_id,
            bidder_id: self.bidder_id,
            amount: Money::new(self.amount, currency).map_err(decode_err)?,
            placed_at: self.placed_at,
            is_automatic: self.is_automatic,
            proxy_max_amount: self
                .proxy_max_amount
                .map(|a| Money::new(a, currency))
                .transpose()
                .map_err(decode_err)?,
        })
    }
}

impl MandateRow {
    fn into_mandate(self) -> Result<AutoBidMandate, sqlx::Error> {
        let currency = Currency::from_str(&self.currency).map_err(decode_err)?;
        Ok(AutoBidMandate {
            id: self.id,
            auction_id: self.auction_id,
            bidder_id: self.bidder_id,
            max_amount: Money::new(self.max_amount, currency).map_err(decode_err)?,
            increment: Money::new(self.increment, currency).map_err(decode_err)?,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

// endregion: --- Row Models

// region:    --- Auction Store

pub(crate) const AUCTION_COLUMNS: &str = "id, product_id, seller_id, currency, starting_price, reserve_price, \
     current_bid, min_increment, start_at, end_at, state, bid_count, leading_bidder_id, winner_id, \
     anti_sniping_window_secs, anti_sniping_extension_secs, extension_count, last_extension_bid_at, \
     version, created_at";

/// 경매 행 잠금 조회 (직렬화 단위 획득)
pub async fn load_auction_for_update(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: i64,
) -> Result<Option<Auction>, sqlx::Error> {
    let row = sqlx::query_as::<_, AuctionRow>(&format!(
        "SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = $1 FOR UPDATE"
    ))
    .bind(auction_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(AuctionRow::into_auction).transpose()
}

/// DRAFT 경매 생성
#[allow(clippy::too_many_arguments)]
pub async fn insert_auction(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    seller_id: i64,
    starting_price: &Money,
    reserve_price: Option<&Money>,
    min_increment: &Money,
    anti_sniping_window: Option<Duration>,
    anti_sniping_extension: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<Auction, sqlx::Error> {
    // DRAFT 단계의 start_at/end_at 은 일정 확정 전 자리 표시 값
    let row = sqlx::query_as::<_, AuctionRow>(&format!(
        "INSERT INTO auctions (product_id, seller_id, currency, starting_price, reserve_price, \
         current_bid, min_increment, start_at, end_at, state, \
         anti_sniping_window_secs, anti_sniping_extension_secs, created_at)
         VALUES ($1, $2, $3, $4, $5, $4, $6, $7, $8, 'DRAFT', $9, $10, $7)
         RETURNING {AUCTION_COLUMNS}"
    ))
    .bind(product_id)
    .bind(seller_id)
    .bind(starting_price.currency().as_str())
    .bind(starting_price.amount())
    .bind(reserve_price.map(Money::amount))
    .bind(min_increment.amount())
    .bind(now)
    .bind(now + Duration::days(7))
    .bind(anti_sniping_window.map(|d| d.num_seconds()))
    .bind(anti_sniping_extension.map(|d| d.num_seconds()))
    .fetch_one(&mut **tx)
    .await?;

    row.into_auction()
}

/// 애그리거트 저장 (버전 증가, 불일치 시 false)
pub async fn save_auction(
    tx: &mut Transaction<'_, Postgres>,
    auction: &mut Auction,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE auctions SET current_bid = $1, bid_count = $2, leading_bidder_id = $3, \
         winner_id = $4, state = $5, start_at = $6, end_at = $7, extension_count = $8, \
         last_extension_bid_at = $9, version = version + 1
         WHERE id = $10 AND version = $11",
    )
    .bind(auction.current_bid.amount())
    .bind(auction.bid_count)
    .bind(auction.leading_bidder_id)
    .bind(auction.winner_id)
    .bind(auction.state.as_str())
    .bind(auction.start_at)
    .bind(auction.end_at)
    .bind(auction.extension_count)
    .bind(auction.last_extension_bid_at)
    .bind(auction.id)
    .bind(auction.version)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }
    auction.version += 1;
    Ok(true)
}

// endregion: --- Auction Store

// region:    --- Bid Store

/// 입찰 저장 (저장 후에는 불변)
pub async fn insert_bid(
    tx: &mut Transaction<'_, Postgres>,
    bid: &Bid,
) -> Result<Bid, sqlx::Error> {
    let row = sqlx::query_as::<_, BidRow>(
        "INSERT INTO bids (auction_id, bidder_id, amount, currency, placed_at, is_automatic, \
         proxy_max_amount)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id, auction_id, bidder_id, amount, currency, placed_at, is_automatic, \
         proxy_max_amount",
    )
    .bind(bid.auction_id)
    .bind(bid.bidder_id)
    .bind(bid.amount.amount())
    .bind(bid.amount.currency().as_str())
    .bind(bid.placed_at)
    .bind(bid.is_automatic)
    .bind(bid.proxy_max_amount.as_ref().map(Money::amount))
    .fetch_one(&mut **tx)
    .await?;

    row.into_bid()
}

// endregion: --- Bid Store

// region:    --- Mandate Store

/// 활성 위임 잠금 조회 (자동 입찰 해소는 입찰과 같은 직렬화 단위에서 실행)
pub async fn load_active_mandates(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: i64,
) -> Result<Vec<AutoBidMandate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MandateRow>(
        "SELECT id, auction_id, bidder_id, max_amount, increment, currency, active, created_at
         FROM auto_bid_mandates
         WHERE auction_id = $1 AND active
         ORDER BY created_at, id
         FOR UPDATE",
    )
    .bind(auction_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(MandateRow::into_mandate).collect()
}

/// (경매, 입찰자) 쌍의 기존 활성 위임 비활성화
pub async fn deactivate_mandate_for_bidder(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: i64,
    bidder_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE auto_bid_mandates SET active = FALSE WHERE auction_id = $1 AND bidder_id = $2",
    )
    .bind(auction_id)
    .bind(bidder_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// 새 위임 저장
pub async fn insert_mandate(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: i64,
    bidder_id: i64,
    max_amount: &Money,
    increment: &Money,
    now: DateTime<Utc>,
) -> Result<AutoBidMandate, sqlx::Error> {
    let row = sqlx::query_as::<_, MandateRow>(
        "INSERT INTO auto_bid_mandates (auction_id, bidder_id, max_amount, increment, currency, \
         active, created_at)
         VALUES ($1, $2, $3, $4, $5, TRUE, $6)
         RETURNING id, auction_id, bidder_id, max_amount, increment, currency, active, created_at",
    )
    .bind(auction_id)
    .bind(bidder_id)
    .bind(max_amount.amount())
    .bind(increment.amount())
    .bind(max_amount.currency().as_str())
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    row.into_mandate()
}

/// 해소 후 위임 활성 플래그 반영
pub async fn save_mandate(
    tx: &mut Transaction<'_, Postgres>,
    mandate: &AutoBidMandate,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE auto_bid_mandates SET active = $1 WHERE id = $2")
        .bind(mandate.active)
        .bind(mandate.id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// endregion: --- Mandate Store
