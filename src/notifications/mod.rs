/// 통지 투영 컨슈머
/// 커밋 후 발행된 도메인 이벤트를 소비하여 입찰자별 통지함(notifications)에 전개한다.
/// 전달은 at-least-once 이며 중복 통지는 허용된다. 경매 원장이 항상 진실의 원천이다.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::event_store::Event;
use crate::message_broker::KafkaConsumer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Notification Model

/// 통지함 행
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Notification {
    pub id: i64,
    pub bidder_id: i64,
    pub auction_id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// endregion: --- Notification Model

// region:    --- Notification Consumer

/// 통지 투영 구현체
pub struct NotificationConsumer {
    pool: Arc<PgPool>,
    kafka_consumer: Arc<KafkaConsumer>,
    topic: String,
}

impl NotificationConsumer {
    pub fn new(pool: Arc<PgPool>, kafka_consumer: Arc<KafkaConsumer>, topic: String) -> Self {
        NotificationConsumer {
            pool,
            kafka_consumer,
            topic,
        }
    }

    /// 통지 투영 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        if let Err(e) = self
            .kafka_consumer
            .consume_events(&self.topic, move |event| {
                let pool = Arc::clone(&pool);
                Box::pin(async move {
                    if let Err(e) = Self::process_event(&pool, event).await {
                        error!("{:<12} --> 이벤트 처리 오류: {:?}", "Notify", e);
                    }
                    Ok(())
                })
            })
            .await
        {
            error!("{:<12} --> 이벤트 소비 오류: {:?}", "Notify", e);
        }
    }

    /// 이벤트를 통지 대상별 행으로 전개
    async fn process_event(pool: &PgPool, event: Event) -> Result<(), Box<dyn std::error::Error>> {
        let domain_event: AuctionEvent = match serde_json::from_value(event.data.clone()) {
            Ok(e) => e,
            Err(_) => {
                warn!(
                    "{:<12} --> 알 수 없는 이벤트 타입: {}",
                    "Notify", event.event_type
                );
                return Ok(());
            }
        };

        let recipients = Self::recipients(pool, &domain_event).await?;
        if recipients.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for bidder_id in &recipients {
            sqlx::query(
                "INSERT INTO notifications (bidder_id, auction_id, kind, payload, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(*bidder_id)
            .bind(domain_event.auction_id())
            .bind(&event.event_type)
            .bind(&event.data)
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            "{:<12} --> 통지 {}건 전개: {}",
            "Notify",
            recipients.len(),
            event.event_type
        );
        Ok(())
    }

    /// 이벤트별 통지 대상
    async fn recipients(pool: &PgPool, event: &AuctionEvent) -> Result<Vec<i64>, sqlx::Error> {
        let recipients = match event {
            AuctionEvent::BidPlaced { bidder_id, .. }
            | AuctionEvent::AutoBidPlaced { bidder_id, .. } => vec![*bidder_id],
            AuctionEvent::Outbid {
                outbid_bidder_id, ..
            } => vec![*outbid_bidder_id],
            AuctionEvent::AuctionExtended { auction_id, .. }
            | AuctionEvent::AuctionEndingSoon { auction_id, .. }
            | AuctionEvent::AuctionCancelled { auction_id, .. } => {
                Self::distinct_bidders(pool, *auction_id).await?
            }
            AuctionEvent::AuctionWon {
                auction_id,
                winner_id,
                ..
            } => {
                let mut ids = vec![*winner_id];
                ids.extend(Self::seller_of(pool, *auction_id).await?);
                ids
            }
            AuctionEvent::AuctionPassed { auction_id, .. }
            | AuctionEvent::AuctionActivated { auction_id, .. } => {
                Self::seller_of(pool, *auction_id).await?.into_iter().collect()
            }
            AuctionEvent::AuctionScheduled { .. } => Vec::new(),
        };
        Ok(recipients)
    }

    /// 경매의 모든 입찰자 (중복 제거)
    async fn distinct_bidders(pool: &PgPool, auction_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT DISTINCT bidder_id FROM bids WHERE auction_id = $1")
            .bind(auction_id)
            .fetch_all(pool)
            .await
    }

    /// 경매 판매자
    async fn seller_of(pool: &PgPool, auction_id: i64) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT seller_id FROM auctions WHERE id = $1")
            .bind(auction_id)
            .fetch_optional(pool)
            .await
    }
}

// endregion: --- Notification Consumer
