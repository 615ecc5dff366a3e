// region:    --- Imports
use crate::auction::events::AuctionEvent;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};

// endregion: --- Imports

// region:    --- Event Model

/// 이벤트 저장소에 저장되는 이벤트 모델
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Event {
    pub id: i64,
    pub aggregate_id: i64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}

// endregion: --- Event Model

// region:    --- Append Error

/// 이벤트 추가 결과
#[derive(Debug)]
pub enum AppendError {
    /// 같은 애그리거트에 대한 동시 쓰기 감지 (호출자가 재시도)
    VersionConflict,
    Store(sqlx::Error),
}

impl From<sqlx::Error> for AppendError {
    fn from(e: sqlx::Error) -> Self {
        AppendError::Store(e)
    }
}

// endregion: --- Append Error

// region:    --- Event Store

/// 도메인 이벤트들을 변경 트랜잭션 안에서 events 테이블에 추가
/// 버전은 애그리거트별로 연속 증가하며, (aggregate_id, version) 충돌은
/// 동시 쓰기의 신호이므로 VersionConflict 로 돌려 재시도하게 한다.
pub async fn append_events_tx(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: i64,
    events: &[AuctionEvent],
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<Event>, AppendError> {
    // 현재 버전 조회
    let current_version = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1",
    )
    .bind(aggregate_id)
    .fetch_one(&mut **tx)
    .await?;

    let mut stored = Vec::with_capacity(events.len());
    for (offset, event) in events.iter().enumerate() {
        let version = current_version + 1 + offset as i64;
        let data = serde_json::to_value(event)
            .map_err(|e| AppendError::Store(sqlx::Error::Decode(Box::new(e))))?;

        let event_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (aggregate_id, event_type, data, timestamp, version)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id, version) DO NOTHING
            RETURNING id",
        )
        .bind(aggregate_id)
        .bind(event.event_type())
        .bind(&data)
        .bind(timestamp)
        .bind(version)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppendError::VersionConflict)?;

        stored.push(Event {
            id: event_id,
            aggregate_id,
            event_type: event.event_type().to_string(),
            data,
            timestamp,
            version,
        });
    }

    Ok(stored)
}

// endregion: --- Event Store
