/// 입찰 검증
/// 부수 효과 없는 순수 검사만 수행하며, 수락과 상태 변경은 커맨드 계층에서 일어난다.
/// 검사는 명세된 순서대로 진행되고 첫 번째 실패가 결과가 된다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Bid Rejection

/// 입찰 거부 사유 (예상 가능한 검증 결과, 실패 로그 대상 아님)
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum BidRejection {
    #[error("경매가 입찰 가능 상태가 아닙니다")]
    AuctionNotOpen,
    #[error("경매가 이미 종료되었습니다")]
    AuctionAlreadyEnded,
    #[error("입찰 금액이 최소 입찰가보다 낮습니다")]
    BidTooLow { minimum_acceptable: Money },
    #[error("이미 최고 입찰자입니다")]
    AlreadyHighestBidder,
    #[error("경매 통화와 입찰 통화가 다릅니다")]
    CurrencyMismatch,
    #[error("자동 입찰 상한이 최소 입찰가보다 낮습니다")]
    AutoBidMaxTooLow { minimum_acceptable: Money },
    #[error("호가 단위가 올바르지 않습니다")]
    InvalidIncrement,
}

impl BidRejection {
    /// API 응답의 code 필드 값
    pub fn code(&self) -> &'static str {
        match self {
            BidRejection::AuctionNotOpen => "AUCTION_NOT_OPEN",
            BidRejection::AuctionAlreadyEnded => "ALREADY_ENDED",
            BidRejection::BidTooLow { .. } => "LOW_BID",
            BidRejection::AlreadyHighestBidder => "ALREADY_HIGHEST_BIDDER",
            BidRejection::CurrencyMismatch => "CURRENCY_MISMATCH",
            BidRejection::AutoBidMaxTooLow { .. } => "AUTO_BID_MAX_TOO_LOW",
            BidRejection::InvalidIncrement => "INVALID_INCREMENT",
        }
    }
}

// endregion: --- Bid Rejection

// region:    --- Validator

/// 입찰 검증 (순서 고정)
/// 1. 경매 상태가 ACTIVE/ENDING_SOON 인지
/// 2. 종료 시각 전인지 (타이머 종료와 늦은 입찰 사이의 경합 방어)
/// 3. 현재가 + 최소 호가 이상인지 (거부 시 최소 수락 금액 포함)
/// 4. 이미 최고 입찰자가 아닌지
pub fn validate(
    auction: &Auction,
    proposed_amount: &Money,
    bidder_id: i64,
    now: DateTime<Utc>,
) -> Result<(), BidRejection> {
    if !auction.state.is_open_for_bids() {
        return Err(BidRejection::AuctionNotOpen);
    }

    if now >= auction.end_at {
        return Err(BidRejection::AuctionAlreadyEnded);
    }

    let minimum = minimum_acceptable(auction)?;
    match proposed_amount.compare(&minimum) {
        Err(_) => return Err(BidRejection::CurrencyMismatch),
        Ok(Ordering::Less) => {
            return Err(BidRejection::BidTooLow {
                minimum_acceptable: minimum,
            })
        }
        Ok(_) => {}
    }

    if auction.leading_bidder_id == Some(bidder_id) {
        return Err(BidRejection::AlreadyHighestBidder);
    }

    Ok(())
}

/// 다음 입찰의 최소 수락 금액
pub fn minimum_acceptable(auction: &Auction) -> Result<Money, BidRejection> {
    auction
        .minimum_acceptable()
        .map_err(|_| BidRejection::CurrencyMismatch)
}

// endregion: --- Validator

// region:    --- Tests


// endregion: --- Tests
