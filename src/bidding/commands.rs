/// 경매 커맨드 처리
/// 1. 입찰 (자동 입찰 해소 및 스나이핑 방지 연장 포함)
/// 2. 자동 입찰 위임 등록
/// 3. 경매 생성/일정 확정/시작/종료 임박/종료/취소
///
/// 모든 변경 커맨드는 경매 행 잠금(FOR UPDATE) 하나의 트랜잭션으로 실행되고,
/// 잠금/버전 충돌은 재시도 후 한도를 넘으면 Busy 로 반환된다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, AutoBidMandate, Bid};
use crate::auction::state_machine::{
    AuctionStateMachine, EndOutcome, ExtensionOutcome, StateError,
};
use crate::bidding::auto_bid;
use crate::bidding::validator::{self, BidRejection};
use crate::database::DatabaseManager;
use crate::event_store::{self, AppendError, Event};
use crate::money::{Money, MoneyError};
use crate::ports::{NotificationPort, OrderPort};
use crate::store;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Service Error

/// 커맨드 결과 오류
/// 검증 거부(Rejected)와 상태 오류(State)는 호출자가 그대로 사용자에게 보여줄 수 있는
/// 타입화된 결과이고, Busy 는 재시도 가능한 인프라 상황이므로 항상 구분해 전달한다.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Rejected(#[from] BidRejection),
    #[error("{0}")]
    State(#[from] StateError),
    #[error("경매를 찾을 수 없습니다")]
    NotFound,
    #[error("처리 중인 요청이 많습니다. 잠시 후 다시 시도하세요")]
    Busy,
    #[error("버전 충돌")]
    VersionConflict,
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl From<AppendError> for ServiceError {
    fn from(e: AppendError) -> Self {
        match e {
            AppendError::VersionConflict => ServiceError::VersionConflict,
            AppendError::Store(e) => ServiceError::Store(e),
        }
    }
}

/// 재시도 가능한 오류인지 (버전 충돌, 직렬화 실패, 잠금 타임아웃/교착)
fn is_retryable(err: &ServiceError) -> bool {
    match err {
        ServiceError::VersionConflict => true,
        ServiceError::Store(sqlx::Error::Database(db)) => matches!(
            db.code().as_deref(),
            Some("40001") | Some("40P01") | Some("55P03")
        ),
        _ => false,
    }
}

// endregion: --- Service Error

// region:    --- Commands

/// 경매 생성 명령 (DRAFT)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAuctionCommand {
    pub product_id: i64,
    pub seller_id: i64,
    pub starting_price: Money,
    pub reserve_price: Option<Money>,
    pub min_increment: Money,
    pub anti_sniping_window_secs: Option<i64>,
    pub anti_sniping_extension_secs: Option<i64>,
}

/// 경매 일정 확정 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleAuctionCommand {
    pub auction_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: Money,
}

/// 자동 입찰 위임 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAutoBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub max_amount: Money,
    pub increment: Money,
}

/// 경매 취소 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CancelAuctionCommand {
    pub auction_id: i64,
    pub reason: String,
    #[serde(default)]
    pub admin_override: bool,
}

// endregion: --- Commands

// region:    --- Results

/// 입찰 처리 결과
/// 최종 선두 입찰은 자동 입찰 해소에 따라 입찰자 본인의 입찰이 아닐 수 있다.
#[derive(Debug, Serialize)]
pub struct BidPlacement {
    pub bid: Bid,
    pub auto_bids: Vec<Bid>,
    pub leading_bid: Bid,
    pub current_bid: Money,
    pub extended_to: Option<DateTime<Utc>>,
}

/// 위임 등록 결과 (등록 즉시 해소가 실행된 뒤의 상태)
#[derive(Debug, Serialize)]
pub struct MandatePlacement {
    pub mandate: AutoBidMandate,
    pub auto_bids: Vec<Bid>,
    pub current_bid: Money,
}

// endregion: --- Results

// 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

// region:    --- Auction Service

/// 경매 도메인 서비스 (애그리거트 단위 직렬화의 단일 진입점)
pub struct AuctionService {
    db: Arc<DatabaseManager>,
    state_machine: AuctionStateMachine,
    orders: Arc<dyn OrderPort>,
    notifier: Arc<dyn NotificationPort>,
}

impl AuctionService {
    pub fn new(
        db: Arc<DatabaseManager>,
        state_machine: AuctionStateMachine,
        orders: Arc<dyn OrderPort>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            db,
            state_machine,
            orders,
            notifier,
        }
    }

    /// 트랜잭션 시작 + 잠금 대기 한도 설정
    /// 잠금 타임아웃(55P03)은 재시도를 거쳐 Busy 로 표면화된다.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// 커밋된 이벤트 발행 (실패는 로그만, 커밋된 변경은 유지)
    async fn publish(&self, events: &[Event]) {
        for event in events {
            if let Err(e) = self.notifier.notify(event).await {
                warn!("{:<12} --> 이벤트 발행 실패 (무시): {}", "Command", e);
            }
        }
    }

    // -- 1. 입찰

    /// 입찰 처리
    pub async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<BidPlacement, ServiceError> {
        info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);
        let mut retries = 0;

        while retries < MAX_RETRIES {
            match self.try_place_bid(&cmd, now).await {
                Err(e) if is_retryable(&e) => {
                    warn!("{:<12} --> 동시 쓰기 충돌: 재시도", "Command");
                    retries += 1;
                    continue;
                }
                Err(e) => return Err(e),
                Ok((placement, events)) => {
                    self.publish(&events).await;
                    return Ok(placement);
                }
            }
        }

        Err(ServiceError::Busy)
    }

    async fn try_place_bid(
        &self,
        cmd: &PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<(BidPlacement, Vec<Event>), ServiceError> {
        let mut tx = self.begin().await?;
        let mut auction = store::load_auction_for_update(&mut tx, cmd.auction_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Err(rejection) = validator::validate(&auction, &cmd.amount, cmd.bidder_id, now) {
            tx.rollback().await?;
            return Err(ServiceError::Rejected(rejection));
        }

        let prev_leader = auction.leading_bidder_id;

        // 입찰 반영 및 저장
        let bid = Bid {
            id: 0,
            auction_id: cmd.auction_id,
            bidder_id: cmd.bidder_id,
            amount: cmd.amount,
            placed_at: now,
            is_automatic: false,
            proxy_max_amount: None,
        };
        auction.apply_bid(&bid);
        let bid = store::insert_bid(&mut tx, &bid).await?;

        // 자동 입찰 해소는 반드시 같은 트랜잭션에서 실행
        let mut mandates = store::load_active_mandates(&mut tx, cmd.auction_id).await?;
        let generated = auto_bid::resolve(&mut auction, &mut mandates, now);
        let mut auto_bids = Vec::with_capacity(generated.len());
        for generated_bid in &generated {
            auto_bids.push(store::insert_bid(&mut tx, generated_bid).await?);
        }
        for mandate in &mandates {
            store::save_mandate(&mut tx, mandate).await?;
        }

        // 스나이핑 방지 연장: 결과는 입찰 수락과 독립
        let extension = self.state_machine.extend(&mut auction, now, now)?;

        if !store::save_auction(&mut tx, &mut auction).await? {
            tx.rollback().await?;
            return Err(ServiceError::VersionConflict);
        }

        // 이벤트 구성: 입찰/자동 입찰/선두 상실/연장
        let mut events = vec![AuctionEvent::BidPlaced {
            auction_id: auction.id,
            bidder_id: bid.bidder_id,
            amount: bid.amount,
            timestamp: now,
        }];
        for auto in &auto_bids {
            events.push(AuctionEvent::AutoBidPlaced {
                auction_id: auction.id,
                bidder_id: auto.bidder_id,
                amount: auto.amount,
                timestamp: now,
            });
        }
        for loser in outbid_bidders(prev_leader, &bid, &auto_bids, auction.leading_bidder_id) {
            events.push(AuctionEvent::Outbid {
                auction_id: auction.id,
                outbid_bidder_id: loser,
                new_amount: auction.current_bid,
                timestamp: now,
            });
        }
        let extended_to = match extension {
            ExtensionOutcome::Applied { new_end_at } => {
                events.push(AuctionEvent::AuctionExtended {
                    auction_id: auction.id,
                    new_end_at,
                    extension_count: auction.extension_count,
                });
                Some(new_end_at)
            }
            _ => None,
        };

        let stored = match event_store::append_events_tx(&mut tx, auction.id, &events, now).await {
            Ok(stored) => stored,
            Err(AppendError::VersionConflict) => {
                tx.rollback().await?;
                return Err(ServiceError::VersionConflict);
            }
            Err(AppendError::Store(e)) => return Err(e.into()),
        };

        tx.commit().await?;

        let leading_bid = auto_bids.last().cloned().unwrap_or_else(|| bid.clone());
        Ok((
            BidPlacement {
                bid,
                auto_bids,
                leading_bid,
                current_bid: auction.current_bid,
                extended_to,
            },
            stored,
        ))
    }

    // -- 2. 자동 입찰 위임

    /// 자동 입찰 위임 등록
    /// 같은 (경매, 입찰자) 쌍의 기존 위임은 비활성화되고, 등록 직후 해소를 한 번 실행한다.
    pub async fn create_auto_bid(
        &self,
        cmd: CreateAutoBidCommand,
        now: DateTime<Utc>,
    ) -> Result<MandatePlacement, ServiceError> {
        info!("{:<12} --> 자동 입찰 위임 등록: {:?}", "Command", cmd);
        let mut retries = 0;

        while retries < MAX_RETRIES {
            match self.try_create_auto_bid(&cmd, now).await {
                Err(e) if is_retryable(&e) => {
                    retries += 1;
                    continue;
                }
                Err(e) => return Err(e),
                Ok((placement, events)) => {
                    self.publish(&events).await;
                    return Ok(placement);
                }
            }
        }

        Err(ServiceError::Busy)
    }

    async fn try_create_auto_bid(
        &self,
        cmd: &CreateAutoBidCommand,
        now: DateTime<Utc>,
    ) -> Result<(MandatePlacement, Vec<Event>), ServiceError> {
        let mut tx = self.begin().await?;
        let mut auction = store::load_auction_for_update(&mut tx, cmd.auction_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Err(rejection) = validate_mandate(&auction, cmd, now) {
            tx.rollback().await?;
            return Err(ServiceError::Rejected(rejection));
        }

        store::deactivate_mandate_for_bidder(&mut tx, cmd.auction_id, cmd.bidder_id).await?;
        let mandate = store::insert_mandate(
            &mut tx,
            cmd.auction_id,
            cmd.bidder_id,
            &cmd.max_amount,
            &cmd.increment,
            now,
        )
        .await?;

        // 새 위임이 이미 밀리는 경우를 포함해 해소를 즉시 실행
        let prev_leader = auction.leading_bidder_id;
        let mut mandates = store::load_active_mandates(&mut tx, cmd.auction_id).await?;
        let generated = auto_bid::resolve(&mut auction, &mut mandates, now);
        let mut auto_bids = Vec::with_capacity(generated.len());
        for generated_bid in &generated {
            auto_bids.push(store::insert_bid(&mut tx, generated_bid).await?);
        }
        for resolved in &mandates {
            store::save_mandate(&mut tx, resolved).await?;
        }

        let mut events = Vec::new();
        if !auto_bids.is_empty() {
            for auto in &auto_bids {
                events.push(AuctionEvent::AutoBidPlaced {
                    auction_id: auction.id,
                    bidder_id: auto.bidder_id,
                    amount: auto.amount,
                    timestamp: now,
                });
            }
            for loser in outbid_bidders(
                prev_leader,
                &auto_bids[0],
                &auto_bids[1..],
                auction.leading_bidder_id,
            ) {
                events.push(AuctionEvent::Outbid {
                    auction_id: auction.id,
                    outbid_bidder_id: loser,
                    new_amount: auction.current_bid,
                    timestamp: now,
                });
            }

            if !store::save_auction(&mut tx, &mut auction).await? {
                tx.rollback().await?;
                return Err(ServiceError::VersionConflict);
            }
        }

        let stored = if events.is_empty() {
            Vec::new()
        } else {
            match event_store::append_events_tx(&mut tx, auction.id, &events, now).await {
                Ok(stored) => stored,
                Err(AppendError::VersionConflict) => {
                    tx.rollback().await?;
                    return Err(ServiceError::VersionConflict);
                }
                Err(AppendError::Store(e)) => return Err(e.into()),
            }
        };

        tx.commit().await?;

        // 등록한 위임의 해소 후 상태 반환 (즉시 밀려 비활성화됐을 수 있음)
        let mandate = mandates
            .into_iter()
            .find(|m| m.id == mandate.id)
            .unwrap_or(mandate);
        Ok((
            MandatePlacement {
                mandate,
                auto_bids,
                current_bid: auction.current_bid,
            },
            stored,
        ))
    }

    // -- 3. 수명 주기 커맨드

    /// DRAFT 경매 생성 (판매자 액션)
    pub async fn create_auction(
        &self,
        cmd: CreateAuctionCommand,
        now: DateTime<Utc>,
    ) -> Result<Auction, ServiceError> {
        info!("{:<12} --> 경매 생성: {:?}", "Command", cmd);

        if cmd.min_increment.is_zero() {
            return Err(ServiceError::Rejected(BidRejection::InvalidIncrement));
        }
        // 모든 금액의 통화 일치 검증
        cmd.starting_price.compare(&cmd.min_increment)?;
        if let Some(reserve) = &cmd.reserve_price {
            cmd.starting_price.compare(reserve)?;
        }

        let mut tx = self.begin().await?;
        let auction = store::insert_auction(
            &mut tx,
            cmd.product_id,
            cmd.seller_id,
            &cmd.starting_price,
            cmd.reserve_price.as_ref(),
            &cmd.min_increment,
            cmd.anti_sniping_window_secs.map(Duration::seconds),
            cmd.anti_sniping_extension_secs.map(Duration::seconds),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(auction)
    }

    /// DRAFT -> SCHEDULED
    pub async fn schedule_auction(
        &self,
        cmd: ScheduleAuctionCommand,
        now: DateTime<Utc>,
    ) -> Result<Auction, ServiceError> {
        info!("{:<12} --> 경매 일정 확정: {:?}", "Command", cmd);
        self.transition(cmd.auction_id, now, move |sm, auction, now| {
            sm.schedule(auction, cmd.start_at, cmd.end_at, now)?;
            Ok(vec![AuctionEvent::AuctionScheduled {
                auction_id: auction.id,
                start_at: auction.start_at,
                end_at: auction.end_at,
            }])
        })
        .await
    }

    /// SCHEDULED -> ACTIVE (스케줄러 호출)
    pub async fn activate_auction(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Auction, ServiceError> {
        self.transition(auction_id, now, |sm, auction, now| {
            sm.activate(auction, now)?;
            Ok(vec![AuctionEvent::AuctionActivated {
                auction_id: auction.id,
                timestamp: now,
            }])
        })
        .await
    }

    /// ACTIVE -> ENDING_SOON (스케줄러 호출)
    pub async fn mark_ending_soon(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Auction, ServiceError> {
        self.transition(auction_id, now, |sm, auction, now| {
            sm.tick_to_ending_soon(auction, now)?;
            Ok(vec![AuctionEvent::AuctionEndingSoon {
                auction_id: auction.id,
                end_at: auction.end_at,
            }])
        })
        .await
    }

    /// 경매 종료. 낙찰이면 주문 포트로 대기 주문 생성 후 낙찰 통지, 아니면 유찰 통지.
    /// 주문/통지 실패는 로그만 남기고 이미 커밋된 종료는 유지된다.
    pub async fn close_auction(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
    ) -> Result<EndOutcome, ServiceError> {
        info!("{:<12} --> 경매 종료 처리: id={}", "Command", auction_id);
        let auction = self
            .transition(auction_id, now, |sm, auction, now| {
                let outcome = sm.end(auction, now)?;
                let event = match outcome {
                    EndOutcome::Won { winner_id, amount } => AuctionEvent::AuctionWon {
                        auction_id: auction.id,
                        winner_id,
                        amount,
                        timestamp: now,
                    },
                    EndOutcome::Passed => AuctionEvent::AuctionPassed {
                        auction_id: auction.id,
                        timestamp: now,
                    },
                };
                Ok(vec![event])
            })
            .await?;

        // 종료된 애그리거트에서 결과 복원: winner_id 는 낙찰 시에만 설정된다
        let outcome = match auction.winner_id {
            Some(winner_id) => EndOutcome::Won {
                winner_id,
                amount: auction.current_bid,
            },
            None => EndOutcome::Passed,
        };
        if let EndOutcome::Won { winner_id, amount } = &outcome {
            if let Err(e) = self
                .orders
                .create_pending_order(auction.id, *winner_id, amount)
                .await
            {
                warn!("{:<12} --> 대기 주문 생성 실패 (무시): {}", "Command", e);
            }
        }
        Ok(outcome)
    }

    /// 경매 취소. 입찰이 있으면 관리자 승인 없이는 거부된다.
    pub async fn cancel_auction(
        &self,
        cmd: CancelAuctionCommand,
        now: DateTime<Utc>,
    ) -> Result<Auction, ServiceError> {
        info!("{:<12} --> 경매 취소 처리: {:?}", "Command", cmd);
        let reason = cmd.reason.clone();
        self.transition(cmd.auction_id, now, move |sm, auction, now| {
            sm.cancel(auction, cmd.admin_override)?;
            Ok(vec![AuctionEvent::AuctionCancelled {
                auction_id: auction.id,
                reason: reason.clone(),
                timestamp: now,
            }])
        })
        .await
    }

    /// 상태 전이 공통 경로: 잠금 조회 -> 전이 -> 저장 -> 이벤트 -> 커밋 -> 발행
    async fn transition<F>(
        &self,
        auction_id: i64,
        now: DateTime<Utc>,
        mut apply: F,
    ) -> Result<Auction, ServiceError>
    where
        F: FnMut(
            &AuctionStateMachine,
            &mut Auction,
            DateTime<Utc>,
        ) -> Result<Vec<AuctionEvent>, StateError>,
    {
        let mut retries = 0;
        while retries < MAX_RETRIES {
            let mut tx = self.begin().await?;
            let mut auction = store::load_auction_for_update(&mut tx, auction_id)
                .await?
                .ok_or(ServiceError::NotFound)?;

            let events = match apply(&self.state_machine, &mut auction, now) {
                Ok(events) => events,
                Err(state_error) => {
                    tx.rollback().await?;
                    warn!(
                        "{:<12} --> 상태 전이 거부: id={}, {:?}",
                        "Command", auction_id, state_error
                    );
                    return Err(ServiceError::State(state_error));
                }
            };

            if !store::save_auction(&mut tx, &mut auction).await? {
                tx.rollback().await?;
                retries += 1;
                continue;
            }

            match event_store::append_events_tx(&mut tx, auction.id, &events, now).await {
                Ok(stored) => {
                    tx.commit().await?;
                    self.publish(&stored).await;
                    return Ok(auction);
                }
                Err(AppendError::VersionConflict) => {
                    tx.rollback().await?;
                    retries += 1;
                    continue;
                }
                Err(AppendError::Store(e)) => return Err(e.into()),
            }
        }

        Err(ServiceError::Busy)
    }
}

// endregion: --- Auction Service

// region:    --- Helpers

/// 위임 등록 검증: 경매가 열려 있고, 통화가 일치하며, 상한이 최소 입찰가 이상이고,
/// 호가 단위가 0 이 아니어야 한다.
fn validate_mandate(
    auction: &Auction,
    cmd: &CreateAutoBidCommand,
    now: DateTime<Utc>,
) -> Result<(), BidRejection> {
    if !auction.state.is_open_for_bids() {
        return Err(BidRejection::AuctionNotOpen);
    }
    if now >= auction.end_at {
        return Err(BidRejection::AuctionAlreadyEnded);
    }
    if cmd.increment.is_zero() {
        return Err(BidRejection::InvalidIncrement);
    }
    if cmd.increment.currency() != auction.currency() {
        return Err(BidRejection::CurrencyMismatch);
    }
    let minimum = validator::minimum_acceptable(auction)?;
    match cmd.max_amount.compare(&minimum) {
        Err(_) => Err(BidRejection::CurrencyMismatch),
        Ok(Ordering::Less) => Err(BidRejection::AutoBidMaxTooLow {
            minimum_acceptable: minimum,
        }),
        Ok(_) => Ok(()),
    }
}

/// 선두를 내준 입찰자 목록 (중복 제거, 최종 선두 제외)
fn outbid_bidders(
    prev_leader: Option<i64>,
    first_bid: &Bid,
    later_bids: &[Bid],
    final_leader: Option<i64>,
) -> Vec<i64> {
    let mut losers = Vec::new();
    let chain = prev_leader
        .into_iter()
        .chain(std::iter::once(first_bid.bidder_id))
        .chain(later_bids.iter().map(|b| b.bidder_id));
    for bidder in chain {
        if Some(bidder) != final_leader && !losers.contains(&bidder) {
            losers.push(bidder);
        }
    }
    losers
}

// endregion: --- Helpers

// region:    --- Tests


// endregion: --- Tests
