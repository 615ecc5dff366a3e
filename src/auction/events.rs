use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 도메인 이벤트
/// 쓰기 트랜잭션 안에서 events 테이블에 기록되고, 커밋 후 Kafka로 발행된다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 경매 일정 확정
    AuctionScheduled {
        auction_id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },
    // 경매 시작
    AuctionActivated {
        auction_id: i64,
        timestamp: DateTime<Utc>,
    },
    // 종료 임박 구간 진입
    AuctionEndingSoon {
        auction_id: i64,
        end_at: DateTime<Utc>,
    },
    // 입찰 수락
    BidPlaced {
        auction_id: i64,
        bidder_id: i64,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    // 프록시 엔진이 생성한 자동 입찰
    AutoBidPlaced {
        auction_id: i64,
        bidder_id: i64,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    // 선두 상실 (이전 선두 입찰자에게 통지)
    Outbid {
        auction_id: i64,
        outbid_bidder_id: i64,
        new_amount: Money,
        timestamp: DateTime<Utc>,
    },
    // 스나이핑 방지 연장
    AuctionExtended {
        auction_id: i64,
        new_end_at: DateTime<Utc>,
        extension_count: i32,
    },
    // 낙찰 종료
    AuctionWon {
        auction_id: i64,
        winner_id: i64,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    // 유찰 종료 (입찰 없음 또는 리저브 미달)
    AuctionPassed {
        auction_id: i64,
        timestamp: DateTime<Utc>,
    },
    // 경매 취소
    AuctionCancelled {
        auction_id: i64,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    /// events 테이블의 event_type 컬럼 값
    pub fn event_type(&self) -> &'static str {
        match self {
            AuctionEvent::AuctionScheduled { .. } => "AuctionScheduled",
            AuctionEvent::AuctionActivated { .. } => "AuctionActivated",
            AuctionEvent::AuctionEndingSoon { .. } => "AuctionEndingSoon",
            AuctionEvent::BidPlaced { .. } => "BidPlaced",
            AuctionEvent::AutoBidPlaced { .. } => "AutoBidPlaced",
            AuctionEvent::Outbid { .. } => "Outbid",
            AuctionEvent::AuctionExtended { .. } => "AuctionExtended",
            AuctionEvent::AuctionWon { .. } => "AuctionWon",
            AuctionEvent::AuctionPassed { .. } => "AuctionPassed",
            AuctionEvent::AuctionCancelled { .. } => "AuctionCancelled",
        }
    }

    /// 이벤트가 속한 경매 id
    pub fn auction_id(&self) -> i64 {
        match self {
            AuctionEvent::AuctionScheduled { auction_id, .. }
            | AuctionEvent::AuctionActivated { auction_id, .. }
            | AuctionEvent::AuctionEndingSoon { auction_id, .. }
            | AuctionEvent::BidPlaced { auction_id, .. }
            | AuctionEvent::AutoBidPlaced { auction_id, .. }
            | AuctionEvent::Outbid { auction_id, .. }
            | AuctionEvent::AuctionExtended { auction_id, .. }
            | AuctionEvent::AuctionWon { auction_id, .. }
            | AuctionEvent::AuctionPassed { auction_id, .. }
            | AuctionEvent::AuctionCancelled { auction_id, .. } => *auction_id,
        }
    }
}
