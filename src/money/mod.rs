/// 고정 소수점 통화 금액 타입
/// 모든 금액은 최소 단위(밀림/센트)의 정수로 저장하며 부동 소수점 변환은 없다.
// region:    --- Imports
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Currency

/// 지원 통화 (비딘숙은 TND 기본, 해외 출품용 EUR/USD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    TND,
    EUR,
    USD,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::TND => "TND",
            Currency::EUR => "EUR",
            Currency::USD => "USD",
        }
    }

    /// DB TEXT 컬럼에서 통화 복원
    pub fn from_str(s: &str) -> Result<Self, MoneyError> {
        match s {
            "TND" => Ok(Currency::TND),
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }

    /// 주 단위당 최소 단위 수 (TND는 밀림 1000, EUR/USD는 센트 100)
    pub fn minor_per_major(&self) -> i64 {
        match self {
            Currency::TND => 1000,
            Currency::EUR | Currency::USD => 100,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// endregion: --- Currency

// region:    --- Money Error

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("통화가 일치하지 않습니다: {0} != {1}")]
    CurrencyMismatch(Currency, Currency),
    #[error("음수 금액은 허용되지 않습니다")]
    NegativeAmount,
    #[error("금액 연산 오버플로우")]
    Overflow,
    #[error("알 수 없는 통화: {0}")]
    UnknownCurrency(String),
}

// endregion: --- Money Error

// region:    --- Money

/// 최소 단위 정수 금액 + 통화 코드. 음수 불변식을 생성 시점에 강제한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// 금액 생성 (음수 거부)
    pub fn new(amount: i64, currency: Currency) -> Result<Self, MoneyError> {
        if amount < 0 {
            return Err(MoneyError::NegativeAmount);
        }
        Ok(Money { amount, currency })
    }

    pub fn zero(currency: Currency) -> Self {
        Money {
            amount: 0,
            currency,
        }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// 통화 일치 확인
    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(self.currency, other.currency));
        }
        Ok(())
    }

    /// 더하기 (오버플로우 거부)
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Money::new(amount, self.currency)
    }

    /// 빼기 (결과가 음수면 거부)
    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MoneyError::Overflow)?;
        if amount < 0 {
            return Err(MoneyError::NegativeAmount);
        }
        Money::new(amount, self.currency)
    }

    /// 비교 (통화가 다르면 순서가 아니라 오류)
    pub fn compare(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// 정수 비율 곱 (호가 단위 제안용, num/den)
    pub fn multiply_by_ratio(&self, num: u32, den: u32) -> Result<Money, MoneyError> {
        if den == 0 {
            return Err(MoneyError::Overflow);
        }
        let amount = self
            .amount
            .checked_mul(i64::from(num))
            .ok_or(MoneyError::Overflow)?
            / i64::from(den);
        Money::new(amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.currency.minor_per_major();
        write!(
            f,
            "{}.{:0width$} {}",
            self.amount / scale,
            self.amount % scale,
            self.currency,
            width = if scale == 1000 { 3 } else { 2 }
        )
    }
}

// endregion: --- Money

// region:    --- Tests


// endregion: --- Tests
