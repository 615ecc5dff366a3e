/// 경매 수명 주기 스케줄러
/// 벽시계 기반 전이(시작, 종료 임박, 종료)를 주기적으로 감지한다.
/// 대상 id 만 조회하고 실제 전이는 반드시 AuctionService 를 거쳐
/// 입찰과 같은 행 잠금 경로에서 직렬화된다. (직접 UPDATE 금지)
// region:    --- Imports
use crate::auction::state_machine::StateError;
use crate::bidding::commands::{AuctionService, ServiceError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler

/// 경매 수명 주기 스케줄러
pub struct AuctionScheduler {
    pool: Arc<PgPool>,
    service: Arc<AuctionService>,
    ending_soon_threshold: chrono::Duration,
}

impl AuctionScheduler {
    pub fn new(
        pool: Arc<PgPool>,
        service: Arc<AuctionService>,
        ending_soon_threshold: chrono::Duration,
    ) -> Self {
        Self {
            pool,
            service,
            ending_soon_threshold,
        }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        let service = Arc::clone(&self.service);
        let threshold = self.ending_soon_threshold;
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                if let Err(e) = Self::sweep(&pool, &service, threshold).await {
                    error!(
                        "{:<12} --> 경매 상태 스윕 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 전이 대상 감지 및 서비스 호출
    async fn sweep(
        pool: &PgPool,
        service: &AuctionService,
        threshold: chrono::Duration,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        // 종료 시각 도달 경매 종료
        let due_close = Self::due_ids(
            pool,
            "SELECT id FROM auctions WHERE state IN ('ACTIVE', 'ENDING_SOON') AND end_at <= $1",
            now,
        )
        .await?;
        for auction_id in due_close {
            Self::log_outcome(
                "종료",
                auction_id,
                service.close_auction(auction_id, now).await.map(|_| ()),
            );
        }

        // SCHEDULED -> ACTIVE
        let due_activation = Self::due_ids(
            pool,
            "SELECT id FROM auctions WHERE state = 'SCHEDULED' AND start_at <= $1",
            now,
        )
        .await?;
        for auction_id in due_activation {
            Self::log_outcome(
                "시작",
                auction_id,
                service.activate_auction(auction_id, now).await.map(|_| ()),
            );
        }

        // ACTIVE -> ENDING_SOON (종료 임박 구간 진입)
        let due_ending_soon = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM auctions WHERE state = 'ACTIVE' AND end_at > $1 AND end_at <= $2",
        )
        .bind(now)
        .bind(now + threshold)
        .fetch_all(pool)
        .await?;
        for auction_id in due_ending_soon {
            Self::log_outcome(
                "종료 임박",
                auction_id,
                service.mark_ending_soon(auction_id, now).await.map(|_| ()),
            );
        }

        Ok(())
    }

    async fn due_ids(
        pool: &PgPool,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// 전이 결과 로그
    /// 잠금 경합 중 다른 쓰기(입찰의 스나이핑 연장 등)가 전이 조건을 무효화하면
    /// IllegalStateTransition 으로 돌아오며, 이는 정상적인 경합 결과다.
    fn log_outcome(action: &str, auction_id: i64, result: Result<(), ServiceError>) {
        match result {
            Ok(()) => debug!(
                "{:<12} --> 경매 {} 처리 완료: id={}",
                "Scheduler", action, auction_id
            ),
            Err(ServiceError::State(StateError::IllegalStateTransition { .. })) => debug!(
                "{:<12} --> 경매 {} 경합으로 건너뜀: id={}",
                "Scheduler", action, auction_id
            ),
            Err(e) => error!(
                "{:<12} --> 경매 {} 처리 실패: id={}, {:?}",
                "Scheduler", action, auction_id, e
            ),
        }
    }
}

// endregion: --- Auction Scheduler
