/// 프록시(자동) 입찰 해소 엔진
/// 수동 입찰이 수락된 직후, 같은 경매의 활성 위임들을 상대로 자동 반격 입찰을 생성한다.
/// 순수 함수: 애그리거트와 위임 목록을 메모리에서 변경하고 생성된 입찰을 반환하며,
/// 저장은 호출자(커맨드 계층)가 같은 트랜잭션 안에서 수행한다.
// region:    --- Imports
use crate::auction::model::{Auction, AutoBidMandate, Bid};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

// endregion: --- Imports

// region:    --- Resolution

/// 자동 입찰 해소
/// - 현재 선두가 아닌 활성 위임 중 상한이 가장 높은 것이 반격한다
///   (상한 동률이면 먼저 생성된 위임이 이기고, 금액은 동률 상한 그대로)
/// - 반격 금액은 min(상한, 현재가 + 위임 호가)
/// - 반격이 또 다른 위임의 반격을 부를 수 있으므로 반복하되,
///   매 반복마다 현재가가 엄격히 오르거나 위임 상한이 소진되므로 반드시 종료한다
/// - 해소가 끝나면 더 이상 대응할 수 없는 위임을 비활성화한다
pub fn resolve(
    auction: &mut Auction,
    mandates: &mut [AutoBidMandate],
    now: DateTime<Utc>,
) -> Vec<Bid> {
    let mut generated = Vec::new();

    loop {
        let top_idx = match top_competing_mandate(auction, mandates) {
            Some(idx) => idx,
            None => break,
        };

        // 동률 상한이 있으면 동률 금액 그대로, 아니면 현재가 + 호가 (상한 한도)
        let tied = has_tied_competitor(auction, mandates, top_idx);
        let mandate = &mandates[top_idx];
        let counter = if tied {
            mandate.max_amount
        } else {
            match auction.current_bid.add(&mandate.increment) {
                Ok(stepped)
                    if matches!(stepped.compare(&mandate.max_amount), Ok(Ordering::Less)) =>
                {
                    stepped
                }
                _ => mandate.max_amount,
            }
        };

        // 반격이 현재가를 넘지 못하면 위임 소진으로 간주
        if !matches!(counter.compare(&auction.current_bid), Ok(Ordering::Greater)) {
            break;
        }

        let bid = Bid {
            id: 0,
            auction_id: auction.id,
            bidder_id: mandate.bidder_id,
            amount: counter,
            placed_at: now,
            is_automatic: true,
            proxy_max_amount: Some(mandate.max_amount),
        };
        auction.apply_bid(&bid);
        generated.push(bid);
    }

    deactivate_beaten(auction, mandates);
    generated
}

/// 선두가 아닌 활성 위임 중 최고 상한 위임의 인덱스
/// 동률은 생성 시각이 빠른 쪽, 그다음 id가 작은 쪽
fn top_competing_mandate(auction: &Auction, mandates: &[AutoBidMandate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, mandate) in mandates.iter().enumerate() {
        if Some(mandate.bidder_id) == auction.leading_bidder_id {
            continue;
        }
        if !mandate.can_beat(&auction.current_bid) {
            continue;
        }
        best = match best {
            None => Some(idx),
            Some(cur_idx) => {
                let cur = &mandates[cur_idx];
                match mandate.max_amount.compare(&cur.max_amount) {
                    Ok(Ordering::Greater) => Some(idx),
                    Ok(Ordering::Equal)
                        if (mandate.created_at, mandate.id) < (cur.created_at, cur.id) =>
                    {
                        Some(idx)
                    }
                    _ => Some(cur_idx),
                }
            }
        };
    }
    best
}

/// top 위임과 같은 상한을 가진 다른 경쟁 위임이 있는지
fn has_tied_competitor(auction: &Auction, mandates: &[AutoBidMandate], top_idx: usize) -> bool {
    let top = &mandates[top_idx];
    mandates.iter().enumerate().any(|(idx, mandate)| {
        idx != top_idx
            && mandate.active
            && Some(mandate.bidder_id) != auction.leading_bidder_id
            && matches!(
                mandate.max_amount.compare(&top.max_amount),
                Ok(Ordering::Equal)
            )
    })
}

/// 현재가에 더 이상 대응할 수 없는 비선두 위임을 비활성화
fn deactivate_beaten(auction: &Auction, mandates: &mut [AutoBidMandate]) {
    for mandate in mandates.iter_mut() {
        if !mandate.active {
            continue;
        }
        if Some(mandate.bidder_id) == auction.leading_bidder_id {
            continue;
        }
        if !mandate.can_beat(&auction.current_bid) {
            mandate.active = false;
        }
    }
}

// endregion: --- Resolution

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::AuctionState;
    use crate::money::{Currency, Money};
    use chrono::{Duration, TimeZone};

    fn tnd(amount: i64) -> Money {
        Money::new(amount, Currency::TND).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    /// 수동 입찰 직후 상태의 경매 (입찰자 99가 선두)
    fn auction_after_manual_bid(current: i64) -> Auction {
        Auction {
            id: 1,
            product_id: 10,
            seller_id: 100,
            starting_price: tnd(100),
            reserve_price: None,
            current_bid: tnd(current),
            min_increment: tnd(10),
            start_at: t0() - Duration::hours(1),
            end_at: t0() + Duration::hours(1),
            state: AuctionState::Active,
            bid_count: 1,
            leading_bidder_id: Some(99),
            winner_id: None,
            anti_sniping_window: None,
            anti_sniping_extension: None,
            extension_count: 0,
            last_extension_bid_at: None,
            version: 1,
            created_at: t0() - Duration::days(1),
        }
    }

    fn mandate(id: i64, bidder_id: i64, max: i64, inc: i64, created_offset_secs: i64) -> AutoBidMandate {
        AutoBidMandate {
            id,
            auction_id: 1,
            bidder_id,
            max_amount: tnd(max),
            increment: tnd(inc),
            active: true,
            created_at: t0() - Duration::hours(1) + Duration::seconds(created_offset_secs),
        }
    }

    /// 명세 시나리오: 수동 310, 위임 A(max 500), B(max 300)
    /// -> A가 320으로 반격, B는 비활성화
    #[test]
    fn test_single_counter_bid() {
        let mut auction = auction_after_manual_bid(310);
        let mut mandates = vec![mandate(1, 1, 500, 10, 0), mandate(2, 2, 300, 10, 1)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].bidder_id, 1);
        assert_eq!(bids[0].amount, tnd(320));
        assert!(bids[0].is_automatic);
        assert_eq!(auction.current_bid, tnd(320));
        assert_eq!(auction.leading_bidder_id, Some(1));
        // B(max 300)는 320에 대응 불가 -> 비활성화
        assert!(!mandates[1].active);
        // A는 선두 위임으로 유지
        assert!(mandates[0].active);
    }

    /// 동률 상한 시나리오: A(max 400, 먼저 생성), B(max 400), 수동 350
    /// -> 먼저 생성된 A가 정확히 400으로 낙찰권, B 비활성화
    #[test]
    fn test_tie_break_earliest_mandate_wins() {
        let mut auction = auction_after_manual_bid(350);
        let mut mandates = vec![mandate(1, 1, 400, 10, 0), mandate(2, 2, 400, 10, 5)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].bidder_id, 1);
        assert_eq!(bids[0].amount, tnd(400));
        assert_eq!(auction.current_bid, tnd(400));
        assert_eq!(auction.leading_bidder_id, Some(1));
        assert!(!mandates[1].active);
    }

    /// 두 위임의 호가 경쟁: 높은 상한이 결국 승리하고 현재가는 엄격히 단조 증가
    #[test]
    fn test_escalation_between_two_mandates() {
        let mut auction = auction_after_manual_bid(310);
        let mut mandates = vec![mandate(1, 1, 500, 10, 0), mandate(2, 2, 400, 10, 1)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        // 호가 경쟁 수순: 320A, 330B, ... 390B, 400A
        // B(max 400)는 400을 엄격히 넘지 못하므로 A가 정확히 400에서 선두로 남는다
        assert_eq!(auction.leading_bidder_id, Some(1));
        assert!(!mandates[1].active);
        assert_eq!(auction.current_bid, tnd(400));
        assert_eq!(bids.len(), 9);

        // 수락된 자동 입찰 금액은 엄격히 단조 증가
        let mut prev = tnd(310);
        for bid in &bids {
            assert!(matches!(
                bid.amount.compare(&prev),
                Ok(std::cmp::Ordering::Greater)
            ));
            prev = bid.amount;
        }
        assert_eq!(auction.bid_count, 1 + bids.len() as i64);
    }

    /// 대응 가능한 위임이 없으면 아무 일도 없음
    #[test]
    fn test_no_competing_mandates() {
        let mut auction = auction_after_manual_bid(310);
        let mut mandates = vec![mandate(1, 1, 300, 10, 0)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        assert!(bids.is_empty());
        assert_eq!(auction.current_bid, tnd(310));
        assert_eq!(auction.leading_bidder_id, Some(99));
        assert!(!mandates[0].active);
    }

    /// 선두 입찰자 자신의 위임은 자기 입찰에 반격하지 않음
    #[test]
    fn test_leader_own_mandate_does_not_counter() {
        let mut auction = auction_after_manual_bid(310);
        let mut mandates = vec![mandate(1, 99, 500, 10, 0)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        assert!(bids.is_empty());
        assert_eq!(auction.leading_bidder_id, Some(99));
        assert!(mandates[0].active);
    }

    /// 상한이 현재가 + 호가보다 작으면 상한 전액으로 반격
    #[test]
    fn test_counter_capped_at_max() {
        let mut auction = auction_after_manual_bid(310);
        let mut mandates = vec![mandate(1, 1, 315, 10, 0)];

        let bids = resolve(&mut auction, &mut mandates, t0());

        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].amount, tnd(315));
        assert_eq!(auction.leading_bidder_id, Some(1));
    }
}

// endregion: --- Tests
