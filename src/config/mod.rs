/// 환경 변수 기반 엔진 설정
/// 모든 값은 기본값이 있어 로컬 실행 시 별도 설정 없이 기동된다.
// region:    --- Imports
use crate::auction::state_machine::AuctionStateMachine;
use chrono::Duration;

// endregion: --- Imports

// region:    --- Engine Config

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 웹 서버 바인드 주소
    pub bind_addr: String,
    /// 주문 마이크로서비스 주소
    pub order_service_url: String,
    /// 도메인 이벤트 토픽
    pub events_topic: String,
    /// ACTIVE -> ENDING_SOON 전환 기준 (초)
    pub ending_soon_threshold: Duration,
    /// 과거 시작 시각 허용 오차 (초)
    pub schedule_grace: Duration,
    /// 스나이핑 방지 연장 횟수 상한
    pub max_extensions: u32,
}

impl EngineConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            order_service_url: env_or("ORDER_SERVICE_URL", "http://localhost:4000"),
            events_topic: env_or("EVENTS_TOPIC", "auction-events"),
            ending_soon_threshold: Duration::seconds(env_parsed(
                "ENDING_SOON_THRESHOLD_SECS",
                3600,
            )),
            schedule_grace: Duration::seconds(env_parsed("SCHEDULE_GRACE_SECS", 30)),
            max_extensions: env_parsed("MAX_SNIPE_EXTENSIONS", 10u32),
        }
    }

    /// 설정으로 상태 머신 구성
    pub fn state_machine(&self) -> AuctionStateMachine {
        AuctionStateMachine::new(
            self.ending_soon_threshold,
            self.schedule_grace,
            self.max_extensions,
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// endregion: --- Engine Config
