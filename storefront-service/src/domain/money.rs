use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    // 以最小单位存储，例如美分
    pub amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CNY,
    JPY,
}

impl Currency {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "CNY" => Some(Currency::CNY),
            "JPY" => Some(Currency::JPY),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CNY => "CNY",
            Currency::JPY => "JPY",
        }
    }
}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn usd(amount: i64) -> Self {
        Self { amount, currency: Currency::USD }
    }

    pub fn zero(currency: Currency) -> Self {
        Self { amount: 0, currency }
    }

    pub fn add(&self, other: &Self) -> Result<Self, &'static str> {
        if self.currency != other.currency {
            return Err("Cannot add different currencies");
        }

        Ok(Self {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// 行项目小计: 单价 x 数量
    pub fn multiply(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * quantity as i64,
            currency: self.currency,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.currency {
            Currency::USD => write!(f, "${:.2}", self.amount as f64 / 100.0),
            Currency::EUR => write!(f, "€{:.2}", self.amount as f64 / 100.0),
            Currency::GBP => write!(f, "£{:.2}", self.amount as f64 / 100.0),
            Currency::CNY => write!(f, "¥{:.2}", self.amount as f64 / 100.0),
            Currency::JPY => write!(f, "¥{}", self.amount), // JPY没有小数点
        }
    }
}
