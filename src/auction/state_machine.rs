/// 경매 상태 전이 규칙
/// 모든 전이는 명시적 now 인자를 받으며, 가드에 걸리면 애그리거트를 변경하지 않는다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionState};
use crate::money::Money;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

// endregion: --- Imports

// region:    --- State Error

/// 상태 전이 오류 (운영/호출자 실수, 경고 로그 대상)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("허용되지 않는 상태 전이: {from:?} 에서 {attempted}")]
    IllegalStateTransition {
        from: AuctionState,
        attempted: &'static str,
    },
    #[error("잘못된 경매 기간: 시작/종료 시각을 확인하세요")]
    InvalidScheduleWindow,
    #[error("입찰이 있는 경매는 관리자 승인 없이 취소할 수 없습니다")]
    CannotCancelWithBids,
}

// endregion: --- State Error

// region:    --- Outcomes

/// 스나이핑 방지 연장 결과
/// 연장 실패는 입찰 수락과 독립적인 결과이며 오류가 아니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOutcome {
    /// 연장 적용됨
    Applied { new_end_at: DateTime<Utc> },
    /// 같은 입찰에 대해 이미 연장됨 (멱등 no-op)
    AlreadyApplied,
    /// 연장 미설정 또는 입찰이 감지 창 밖
    NotEligible,
    /// 연장 횟수 상한 도달 (입찰 자체는 유효)
    CapReached,
}

/// 경매 종료 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// 낙찰
    Won { winner_id: i64, amount: Money },
    /// 유찰 (입찰 없음 또는 리저브 미달)
    Passed,
}

// endregion: --- Outcomes

// region:    --- Auction State Machine

/// 상태 전이 규칙과 타이밍 설정
#[derive(Debug, Clone)]
pub struct AuctionStateMachine {
    /// ACTIVE -> ENDING_SOON 전환 기준 (종료까지 남은 시간)
    pub ending_soon_threshold: Duration,
    /// 과거 시작 시각 허용 오차
    pub schedule_grace: Duration,
    /// 스나이핑 방지 연장 횟수 상한 (무제한은 허용되지 않는다)
    pub max_extensions: u32,
}

impl Default for AuctionStateMachine {
    fn default() -> Self {
        Self {
            ending_soon_threshold: Duration::hours(1),
            schedule_grace: Duration::seconds(30),
            max_extensions: 10,
        }
    }
}

impl AuctionStateMachine {
    pub fn new(
        ending_soon_threshold: Duration,
        schedule_grace: Duration,
        max_extensions: u32,
    ) -> Self {
        Self {
            ending_soon_threshold,
            schedule_grace,
            max_extensions,
        }
    }

    /// DRAFT -> SCHEDULED: 판매자가 경매 기간을 확정
    pub fn schedule(
        &self,
        auction: &mut Auction,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        if auction.state != AuctionState::Draft {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "schedule",
            });
        }
        if end_at <= start_at || start_at < now - self.schedule_grace {
            return Err(StateError::InvalidScheduleWindow);
        }
        auction.start_at = start_at;
        auction.end_at = end_at;
        auction.state = AuctionState::Scheduled;
        Ok(())
    }

    /// SCHEDULED -> ACTIVE: 시작 시각 도달 (스케줄러가 호출)
    pub fn activate(&self, auction: &mut Auction, now: DateTime<Utc>) -> Result<(), StateError> {
        if auction.state != AuctionState::Scheduled || now < auction.start_at {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "activate",
            });
        }
        auction.state = AuctionState::Active;
        Ok(())
    }

    /// ACTIVE -> ENDING_SOON: 종료 임박 표시 (입찰 규칙에는 영향 없음)
    pub fn tick_to_ending_soon(
        &self,
        auction: &mut Auction,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        if auction.state != AuctionState::Active
            || auction.end_at - now > self.ending_soon_threshold
        {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "tick_to_ending_soon",
            });
        }
        auction.state = AuctionState::EndingSoon;
        Ok(())
    }

    /// 스나이핑 방지 연장
    /// 같은 입찰 시각에 대해서는 멱등. 상한 도달 시 입찰은 유효하되 연장만 생략된다.
    pub fn extend(
        &self,
        auction: &mut Auction,
        _now: DateTime<Utc>,
        bid_placed_at: DateTime<Utc>,
    ) -> Result<ExtensionOutcome, StateError> {
        if !auction.state.is_open_for_bids() {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "extend",
            });
        }

        let (window, extension) = match (auction.anti_sniping_window, auction.anti_sniping_extension)
        {
            (Some(w), Some(e)) => (w, e),
            _ => return Ok(ExtensionOutcome::NotEligible),
        };

        // 감지 창: (end_at - window, end_at]
        if bid_placed_at > auction.end_at || auction.end_at - bid_placed_at > window {
            return Ok(ExtensionOutcome::NotEligible);
        }

        // 동일 입찰에 대한 중복 연장 방지
        if auction.last_extension_bid_at == Some(bid_placed_at) {
            return Ok(ExtensionOutcome::AlreadyApplied);
        }

        if auction.extension_count >= self.max_extensions as i32 {
            return Ok(ExtensionOutcome::CapReached);
        }

        auction.end_at = auction.end_at + extension;
        auction.extension_count += 1;
        auction.last_extension_bid_at = Some(bid_placed_at);
        Ok(ExtensionOutcome::Applied {
            new_end_at: auction.end_at,
        })
    }

    /// ACTIVE/ENDING_SOON -> ENDED: 종료 시각 도달
    /// 낙찰자는 입찰이 있고 리저브를 충족한 경우에만 기록된다.
    pub fn end(&self, auction: &mut Auction, now: DateTime<Utc>) -> Result<EndOutcome, StateError> {
        if !auction.state.is_open_for_bids() || now < auction.end_at {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "end",
            });
        }

        auction.state = AuctionState::Ended;
        if auction.bid_count > 0 && auction.reserve_met() {
            if let Some(winner_id) = auction.leading_bidder_id {
                auction.winner_id = Some(winner_id);
                return Ok(EndOutcome::Won {
                    winner_id,
                    amount: auction.current_bid,
                });
            }
        }
        auction.winner_id = None;
        Ok(EndOutcome::Passed)
    }

    /// SCHEDULED/ACTIVE/ENDING_SOON -> CANCELLED
    /// 입찰이 있으면 관리자 승인(admin_override) 없이는 거부
    pub fn cancel(
        &self,
        auction: &mut Auction,
        admin_override: bool,
    ) -> Result<(), StateError> {
        if auction.state.is_terminal() || auction.state == AuctionState::Draft {
            return Err(StateError::IllegalStateTransition {
                from: auction.state,
                attempted: "cancel",
            });
        }
        if auction.bid_count > 0 && !admin_override {
            return Err(StateError::CannotCancelWithBids);
        }
        auction.state = AuctionState::Cancelled;
        Ok(())
    }
}

// endregion: --- Auction State Machine

// region:    --- Tests


// endregion: --- Tests
