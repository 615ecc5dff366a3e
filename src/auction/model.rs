/// 경매 애그리거트 모델
/// 경매 하나에 대한 모든 변경(현재가, 입찰 수, 낙찰자)은 이 애그리거트를 통해서만 일어난다.
// region:    --- Imports
use crate::money::{Currency, Money, MoneyError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Auction State

/// 경매 상태
/// DRAFT -> SCHEDULED -> ACTIVE -> ENDING_SOON -> ENDED
/// CANCELLED은 SCHEDULED/ACTIVE/ENDING_SOON에서 도달 가능
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionState {
    Draft,
    Scheduled,
    Active,
    EndingSoon,
    Ended,
    Cancelled,
}

impl AuctionState {
    /// DB TEXT 컬럼 값
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionState::Draft => "DRAFT",
            AuctionState::Scheduled => "SCHEDULED",
            AuctionState::Active => "ACTIVE",
            AuctionState::EndingSoon => "ENDING_SOON",
            AuctionState::Ended => "ENDED",
            AuctionState::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(AuctionState::Draft),
            "SCHEDULED" => Some(AuctionState::Scheduled),
            "ACTIVE" => Some(AuctionState::Active),
            "ENDING_SOON" => Some(AuctionState::EndingSoon),
            "ENDED" => Some(AuctionState::Ended),
            "CANCELLED" => Some(AuctionState::Cancelled),
            _ => None,
        }
    }

    /// 종료 상태 여부 (종료 상태에서는 어떤 전이도 불가)
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionState::Ended | AuctionState::Cancelled)
    }

    /// 입찰 가능 상태 여부
    pub fn is_open_for_bids(&self) -> bool {
        matches!(self, AuctionState::Active | AuctionState::EndingSoon)
    }
}

// endregion: --- Auction State

// region:    --- Duration Serde

/// Option<Duration> 을 초 단위 정수로 직렬화 (chrono Duration 은 serde 미지원)
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<i64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::seconds))
    }
}

// endregion: --- Duration Serde

// region:    --- Auction

/// 경매 애그리거트 루트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub starting_price: Money,
    pub reserve_price: Option<Money>,
    pub current_bid: Money,
    pub min_increment: Money,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub state: AuctionState,
    pub bid_count: i64,
    pub leading_bidder_id: Option<i64>,
    pub winner_id: Option<i64>,
    /// 스나이핑 방지 구간 (종료 임박 입찰 감지 창)
    #[serde(with = "duration_secs", default)]
    pub anti_sniping_window: Option<Duration>,
    /// 스나이핑 방지 연장 폭
    #[serde(with = "duration_secs", default)]
    pub anti_sniping_extension: Option<Duration>,
    /// 지금까지 적용된 연장 횟수
    pub extension_count: i32,
    /// 마지막 연장을 유발한 입찰 시각 (동일 입찰에 대한 중복 연장 방지)
    pub last_extension_bid_at: Option<DateTime<Utc>>,
    /// 낙관적 동시성 제어용 버전
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn currency(&self) -> Currency {
        self.current_bid.currency()
    }

    /// 다음 입찰이 수락되기 위한 최소 금액
    /// 첫 입찰은 시작가 자체가 최소이며, 이후에는 현재가 + 최소 호가 단위
    pub fn minimum_acceptable(&self) -> Result<Money, MoneyError> {
        if self.bid_count == 0 {
            Ok(self.starting_price)
        } else {
            self.current_bid.add(&self.min_increment)
        }
    }

    /// 최저 낙찰가(리저브) 충족 여부. 리저브가 없으면 항상 충족.
    pub fn reserve_met(&self) -> bool {
        match &self.reserve_price {
            None => true,
            Some(reserve) => match self.current_bid.compare(reserve) {
                Ok(ord) => ord != std::cmp::Ordering::Less,
                Err(_) => false,
            },
        }
    }

    /// 남은 시간 (종료 후에는 0)
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        if now >= self.end_at {
            Duration::zero()
        } else {
            self.end_at - now
        }
    }

    /// 수락된 입찰을 애그리거트에 반영
    pub fn apply_bid(&mut self, bid: &Bid) {
        self.current_bid = bid.amount;
        self.leading_bidder_id = Some(bid.bidder_id);
        self.bid_count += 1;
    }
}

// endregion: --- Auction

// region:    --- Bid

/// 입찰 모델. 저장된 뒤에는 불변이며, 이후 입찰로만 대체된다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: Money,
    pub placed_at: DateTime<Utc>,
    /// 프록시 입찰 엔진이 생성한 자동 입찰 여부
    pub is_automatic: bool,
    pub proxy_max_amount: Option<Money>,
}

// endregion: --- Bid

// region:    --- Auto Bid Mandate

/// 자동 입찰 위임 (프록시 입찰 상한)
/// (경매, 입찰자) 쌍당 활성 위임은 최대 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBidMandate {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub max_amount: Money,
    pub increment: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl AutoBidMandate {
    /// 위임이 주어진 금액을 초과하여 대응할 수 있는지
    pub fn can_beat(&self, amount: &Money) -> bool {
        self.active
            && matches!(
                self.max_amount.compare(amount),
                Ok(std::cmp::Ordering::Greater)
            )
    }
}

// endregion: --- Auto Bid Mandate
