/// 외부 협력자 포트
/// 주문 생성과 통지는 코어 바깥의 마이크로서비스가 담당한다.
/// 두 포트 모두 fire-and-forget: 실패는 로그만 남기고 이미 커밋된 경매 변경은 되돌리지 않는다.
// region:    --- Imports
use crate::event_store::Event;
use crate::message_broker::KafkaProducer;
use crate::money::Money;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Order Port

/// 낙찰 시 대기 주문을 생성하는 포트
#[async_trait]
pub trait OrderPort: Send + Sync {
    async fn create_pending_order(
        &self,
        auction_id: i64,
        winner_id: i64,
        amount: &Money,
    ) -> Result<(), String>;
}

/// 주문 마이크로서비스 HTTP 어댑터
pub struct HttpOrderService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl OrderPort for HttpOrderService {
    async fn create_pending_order(
        &self,
        auction_id: i64,
        winner_id: i64,
        amount: &Money,
    ) -> Result<(), String> {
        info!(
            "{:<12} --> 대기 주문 생성 요청: auction={}, winner={}",
            "OrderPort", auction_id, winner_id
        );
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .json(&serde_json::json!({
                "auction_id": auction_id,
                "winner_id": winner_id,
                "amount": amount,
                "status": "PENDING"
            }))
            .send()
            .await
            .map_err(|e| format!("주문 서비스 요청 실패: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("주문 서비스 응답 오류: {}", response.status()));
        }
        Ok(())
    }
}

// endregion: --- Order Port

// region:    --- Notification Port

/// 커밋된 도메인 이벤트를 통지 파이프라인으로 내보내는 포트
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), String>;
}

/// Kafka 통지 어댑터 (events 토픽으로 발행, 컨슈머가 입찰자별 통지로 전개)
pub struct KafkaNotificationPort {
    producer: Arc<KafkaProducer>,
    topic: String,
}

impl KafkaNotificationPort {
    pub fn new(producer: Arc<KafkaProducer>, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl NotificationPort for KafkaNotificationPort {
    async fn notify(&self, event: &Event) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        self.producer
            .send_message(&self.topic, &event.id.to_string(), &payload)
            .await
    }
}

// endregion: --- Notification Port
