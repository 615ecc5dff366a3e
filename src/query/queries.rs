/// 경매 조회
pub const GET_AUCTION: &str = "SELECT id, product_id, seller_id, currency, starting_price, reserve_price, current_bid, min_increment, start_at, end_at, state, bid_count, leading_bidder_id, winner_id, anti_sniping_window_secs, anti_sniping_extension_secs, extension_count, last_extension_bid_at, version, created_at FROM auctions WHERE id = $1";

/// 모든 경매 조회
pub const GET_ALL_AUCTIONS: &str = "SELECT id, product_id, seller_id, currency, starting_price, reserve_price, current_bid, min_increment, start_at, end_at, state, bid_count, leading_bidder_id, winner_id, anti_sniping_window_secs, anti_sniping_extension_secs, extension_count, last_extension_bid_at, version, created_at FROM auctions ORDER BY created_at DESC";

/// 최고 입찰 조회
pub const GET_HIGHEST_BID: &str =
    "SELECT MAX(amount) as highest_bid FROM bids WHERE auction_id = $1";

/// 입찰 이력 조회 (최신순)
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, bidder_id, amount, currency, placed_at, is_automatic, proxy_max_amount
    FROM bids
    WHERE auction_id = $1
    ORDER BY placed_at DESC, id DESC
"#;

/// 입찰자 통지함 조회 (최신순)
pub const GET_NOTIFICATIONS: &str = r#"
    SELECT id, bidder_id, auction_id, kind, payload, is_read, created_at
    FROM notifications
    WHERE bidder_id = $1
    ORDER BY created_at DESC, id DESC
"#;
