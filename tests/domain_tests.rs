/// 도메인 규칙 시나리오 테스트
/// 데이터베이스 없이 순수 도메인 계층(검증기, 상태 머신, 자동 입찰 엔진)만으로
/// 경매 수명 주기 전체를 검증한다. 모든 시간은 명시적 now 인자로 주입한다.
use bidinsouk_auction_service::auction::model::{Auction, AuctionState, AutoBidMandate, Bid};
use bidinsouk_auction_service::auction::state_machine::{
    AuctionStateMachine, EndOutcome, ExtensionOutcome, StateError,
};
use bidinsouk_auction_service::bidding::auto_bid;
use bidinsouk_auction_service::bidding::validator::{self, BidRejection};
use bidinsouk_auction_service::money::{Currency, Money};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn tnd(amount: i64) -> Money {
    Money::new(amount, Currency::TND).unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// 테스트용 DRAFT 경매
fn draft_auction() -> Auction {
    Auction {
        id: 1,
        product_id: 10,
        seller_id: 100,
        starting_price: tnd(10_000),
        reserve_price: None,
        current_bid: tnd(10_000),
        min_increment: tnd(1_000),
        start_at: t0(),
        end_at: t0() + Duration::hours(2),
        state: AuctionState::Draft,
        bid_count: 0,
        leading_bidder_id: None,
        winner_id: None,
        anti_sniping_window: Some(Duration::minutes(2)),
        anti_sniping_extension: Some(Duration::minutes(5)),
        extension_count: 0,
        last_extension_bid_at: None,
        version: 0,
        created_at: t0() - Duration::days(1),
    }
}

/// 검증 통과한 입찰을 애그리거트에 반영 (서비스 쓰기 경로의 도메인 부분)
fn accept_bid(auction: &mut Auction, bidder_id: i64, amount: Money, now: DateTime<Utc>) -> Bid {
    validator::validate(auction, &amount, bidder_id, now).unwrap();
    let bid = Bid {
        id: 0,
        auction_id: auction.id,
        bidder_id,
        amount,
        placed_at: now,
        is_automatic: false,
        proxy_max_amount: None,
    };
    auction.apply_bid(&bid);
    bid
}

/// 수락된 입찰 수열에 대해 현재가는 단조 비감소이며
/// 모든 입찰은 직전 현재가 + 최소 호가 이상이다
#[test]
fn test_current_bid_monotonic_over_accepted_bids() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    sm.activate(&mut auction, t0()).unwrap();

    let amounts = [10_000, 11_000, 15_000, 16_000, 30_000];
    let mut prev = auction.current_bid;
    for (i, amount) in amounts.iter().enumerate() {
        let now = t0() + Duration::minutes(i as i64);
        let before = auction.current_bid;
        accept_bid(&mut auction, i as i64 + 1, tnd(*amount), now);

        // 단조 비감소
        assert!(auction.current_bid.compare(&prev).unwrap() != std::cmp::Ordering::Less);
        // 첫 입찰 이후에는 직전 현재가 + 최소 호가 이상
        if i > 0 {
            let floor = before.add(&auction.min_increment).unwrap();
            assert!(
                auction.current_bid.compare(&floor).unwrap() != std::cmp::Ordering::Less
            );
        }
        prev = auction.current_bid;
    }
    assert_eq!(auction.bid_count, amounts.len() as i64);
}

/// 최소 호가 미달 입찰은 LOW_BID 로 거부되고 상태를 전혀 바꾸지 않는다
#[test]
fn test_too_low_bid_never_mutates() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    sm.activate(&mut auction, t0()).unwrap();
    accept_bid(&mut auction, 1, tnd(20_000), t0());

    let snapshot = auction.clone();
    let result = validator::validate(&auction, &tnd(20_500), 2, t0() + Duration::minutes(1));
    assert_eq!(
        result,
        Err(BidRejection::BidTooLow {
            minimum_acceptable: tnd(21_000)
        })
    );
    // 거부는 부수 효과가 없다
    assert_eq!(auction.current_bid, snapshot.current_bid);
    assert_eq!(auction.bid_count, snapshot.bid_count);
    assert_eq!(auction.leading_bidder_id, snapshot.leading_bidder_id);
}

/// 스나이핑 방지 시나리오: 종료 90초 전 입찰 -> 5분 연장,
/// 새 종료 기준 90초 전 입찰 -> 상한 내 재연장,
/// 상한 도달 후에는 입찰은 수락되되 연장만 생략된다
#[test]
fn test_anti_snipe_extension_with_cap() {
    let sm = AuctionStateMachine::new(Duration::hours(1), Duration::seconds(30), 2);
    let mut auction = draft_auction();
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    sm.activate(&mut auction, t0()).unwrap();
    let original_end = auction.end_at;

    // 1차: 종료 90초 전 입찰
    let first_bid_at = original_end - Duration::seconds(90);
    accept_bid(&mut auction, 1, tnd(11_000), first_bid_at);
    assert_eq!(
        sm.extend(&mut auction, first_bid_at, first_bid_at).unwrap(),
        ExtensionOutcome::Applied {
            new_end_at: original_end + Duration::minutes(5)
        }
    );

    // 2차: 새 종료 기준 90초 전 입찰
    let second_bid_at = auction.end_at - Duration::seconds(90);
    accept_bid(&mut auction, 2, tnd(12_000), second_bid_at);
    assert!(matches!(
        sm.extend(&mut auction, second_bid_at, second_bid_at).unwrap(),
        ExtensionOutcome::Applied { .. }
    ));
    assert_eq!(auction.extension_count, 2);

    // 3차: 상한 도달, 입찰은 유효하되 연장은 생략
    let third_bid_at = auction.end_at - Duration::seconds(60);
    let bid_count_before = auction.bid_count;
    accept_bid(&mut auction, 3, tnd(13_000), third_bid_at);
    assert_eq!(
        sm.extend(&mut auction, third_bid_at, third_bid_at).unwrap(),
        ExtensionOutcome::CapReached
    );
    assert_eq!(auction.bid_count, bid_count_before + 1);
    assert_eq!(auction.extension_count, 2);
}

/// 수동 입찰 + 프록시 해소 전체 흐름 (명세 수치 시나리오)
#[test]
fn test_manual_bid_then_proxy_resolution() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    auction.starting_price = tnd(100);
    auction.current_bid = tnd(100);
    auction.min_increment = tnd(10);
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    sm.activate(&mut auction, t0()).unwrap();

    let mut mandates = vec![
        AutoBidMandate {
            id: 1,
            auction_id: 1,
            bidder_id: 1,
            max_amount: tnd(500),
            increment: tnd(10),
            active: true,
            created_at: t0(),
        },
        AutoBidMandate {
            id: 2,
            auction_id: 1,
            bidder_id: 2,
            max_amount: tnd(300),
            increment: tnd(10),
            active: true,
            created_at: t0() + Duration::seconds(1),
        },
    ];

    // 입찰자 99가 310 수동 입찰
    let now = t0() + Duration::minutes(5);
    accept_bid(&mut auction, 99, tnd(310), now);
    let auto_bids = auto_bid::resolve(&mut auction, &mut mandates, now);

    // A(max 500)가 320으로 반격, B(max 300)는 비활성화
    assert_eq!(auto_bids.len(), 1);
    assert_eq!(auction.current_bid, tnd(320));
    assert_eq!(auction.leading_bidder_id, Some(1));
    assert!(!mandates[1].active);
}

/// 경매 수명 주기 전체: 일정 확정 -> 시작 -> 입찰 -> 종료 임박 -> 종료(낙찰)
#[test]
fn test_full_lifecycle_with_winner() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    auction.reserve_price = Some(tnd(15_000));

    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    assert_eq!(auction.state, AuctionState::Scheduled);

    sm.activate(&mut auction, t0()).unwrap();
    assert_eq!(auction.state, AuctionState::Active);

    accept_bid(&mut auction, 7, tnd(20_000), t0() + Duration::minutes(10));
    assert!(auction.reserve_met());

    // 종료 1시간 전 -> 종료 임박
    let ending_soon_at = auction.end_at - Duration::minutes(30);
    sm.tick_to_ending_soon(&mut auction, ending_soon_at)
        .unwrap();
    assert_eq!(auction.state, AuctionState::EndingSoon);
    // 종료 임박은 입찰 규칙을 바꾸지 않는다
    let late_bid_at = auction.end_at - Duration::minutes(20);
    accept_bid(&mut auction, 8, tnd(25_000), late_bid_at);

    let end_at = auction.end_at;
    let outcome = sm.end(&mut auction, end_at).unwrap();
    assert_eq!(
        outcome,
        EndOutcome::Won {
            winner_id: 8,
            amount: tnd(25_000)
        }
    );
    assert_eq!(auction.state, AuctionState::Ended);
    assert_eq!(auction.winner_id, Some(8));
}

/// 종료된 경매에는 어떤 입찰도 수락되지 않는다 (타이머 경합 방어)
#[test]
fn test_late_bid_rejected_after_deadline() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();
    sm.activate(&mut auction, t0()).unwrap();

    // 상태가 아직 ACTIVE 여도 종료 시각 이후의 입찰은 거부
    assert_eq!(
        validator::validate(&auction, &tnd(20_000), 7, auction.end_at),
        Err(BidRejection::AuctionAlreadyEnded)
    );

    let end_at = auction.end_at;
    let outcome = sm.end(&mut auction, end_at).unwrap();
    assert_eq!(outcome, EndOutcome::Passed);
    assert_eq!(
        validator::validate(&auction, &tnd(20_000), 7, auction.end_at),
        Err(BidRejection::AuctionNotOpen)
    );
}

/// 취소 규칙: 입찰이 있으면 관리자 승인 필요, 취소 후에는 종료 상태
#[test]
fn test_cancel_rules() {
    let sm = AuctionStateMachine::default();
    let mut auction = draft_auction();
    sm.schedule(&mut auction, t0(), t0() + Duration::hours(2), t0())
        .unwrap();

    // 입찰 없는 SCHEDULED 경매는 바로 취소 가능
    let mut no_bid_auction = auction.clone();
    sm.cancel(&mut no_bid_auction, false).unwrap();
    assert_eq!(no_bid_auction.state, AuctionState::Cancelled);

    // 입찰이 생기면 승인 없이는 거부
    sm.activate(&mut auction, t0()).unwrap();
    accept_bid(&mut auction, 7, tnd(11_000), t0() + Duration::minutes(1));
    assert_eq!(
        sm.cancel(&mut auction, false),
        Err(StateError::CannotCancelWithBids)
    );
    assert_eq!(auction.state, AuctionState::Active);

    sm.cancel(&mut auction, true).unwrap();
    assert_eq!(auction.state, AuctionState::Cancelled);
}
