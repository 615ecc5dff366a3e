// region:    --- Imports
use crate::bidding::commands::AuctionService;
use crate::config::EngineConfig;
use crate::database::DatabaseManager;
use crate::notifications::NotificationConsumer;
use crate::ports::{HttpOrderService, KafkaNotificationPort};
use crate::scheduler::AuctionScheduler;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use message_broker::KafkaManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod config;
mod database;
mod event_store;
mod handlers;
mod message_broker;
mod money;
mod notifications;
mod ports;
mod query;
mod scheduler;
mod store;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 엔진 설정 로드
    let engine_config = EngineConfig::from_env();

    // DatabaseManager 생성
    let db_manager = match DatabaseManager::new().await {
        Ok(db_manager) => Arc::new(db_manager),
        Err(e) => {
            error!("{:<12} --> 데이터베이스 연결 실패: {:?}", "Main", e);
            return Err(e.into());
        }
    };

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 초기화
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.initialize().await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 도메인 이벤트 토픽 생성
    kafka_manager
        .create_topic(&engine_config.events_topic, 5, 1)
        .await?;

    // 통지 투영 시작 (이벤트 -> 입찰자별 통지함)
    let notification_consumer = NotificationConsumer::new(
        db_manager.get_pool(),
        kafka_manager.get_consumer(),
        engine_config.events_topic.clone(),
    );
    tokio::spawn(async move {
        notification_consumer.start().await;
    });

    // 경매 도메인 서비스 구성
    let order_port = Arc::new(HttpOrderService::new(engine_config.order_service_url.clone()));
    let notification_port = Arc::new(KafkaNotificationPort::new(
        kafka_manager.get_producer(),
        engine_config.events_topic.clone(),
    ));
    let service = Arc::new(AuctionService::new(
        Arc::clone(&db_manager),
        engine_config.state_machine(),
        order_port,
        notification_port,
    ));

    // 수명 주기 스케줄러 시작 (시작/종료 임박/종료 전이)
    let auction_scheduler = AuctionScheduler::new(
        db_manager.get_pool(),
        Arc::clone(&service),
        engine_config.ending_soon_threshold,
    );
    auction_scheduler.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route(
            "/auctions",
            post(handlers::handle_create_auction).get(handlers::handle_get_auctions),
        )
        .route(
            "/auctions/:id/schedule",
            post(handlers::handle_schedule_auction),
        )
        .route("/bid", post(handlers::handle_bid))
        .route("/auto-bid", post(handlers::handle_auto_bid))
        .route("/auctions/:id/close", post(handlers::handle_close_auction))
        .route(
            "/auctions/:id/cancel",
            post(handlers::handle_cancel_auction),
        )
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route(
            "/auctions/:id/highest-bid",
            get(handlers::handle_get_highest_bid),
        )
        .route("/auctions/:id/bids", get(handlers::handle_get_bid_history))
        .route(
            "/bidders/:id/notifications",
            get(handlers::handle_get_notifications),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20)) // 동시성을 위한 바디 사이즈 10배 증가(20MB)
        .with_state((db_manager, service));

    // 리스너 생성
    let listener = TcpListener::bind(&engine_config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
