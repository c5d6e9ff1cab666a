use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::market_data::series::round2;
use crate::types::Stock;

/// Display currencies. Prices arrive from the backend in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Gbp,
    Eur,
}

impl Default for Currency {
    fn default() -> Self {
        Self::Usd
    }
}

impl Currency {
    /// Static multiplier from USD.
    pub fn rate(self) -> f64 {
        match self {
            Self::Usd => 1.0,
            Self::Gbp => 0.77,
            Self::Eur => 0.9,
        }
    }

    /// Convert a USD price. USD is returned untouched; other currencies are
    /// rounded to cents.
    pub fn convert(self, usd_price: f64) -> f64 {
        match self {
            Self::Usd => usd_price,
            other => round2(usd_price * other.rate()),
        }
    }

    /// Copy of `stocks` with `price` converted. Other fields stay in USD.
    pub fn convert_stocks(self, stocks: &[Stock]) -> Vec<Stock> {
        stocks
            .iter()
            .map(|s| Stock {
                price: self.convert(s.price),
                ..s.clone()
            })
            .collect()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Gbp => write!(f, "GBP"),
            Self::Eur => write!(f, "EUR"),
        }
    }
}

impl FromStr for Currency {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "GBP" => Ok(Self::Gbp),
            "EUR" => Ok(Self::Eur),
            _ => Err(DeskError::invalid(format!(
                "unsupported currency '{s}'. Use USD, GBP or EUR."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbp_converts_to_cents() {
        assert_eq!(Currency::Gbp.convert(100.0), 77.0);
        assert_eq!(Currency::Eur.convert(100.0), 90.0);
        assert_eq!(Currency::Gbp.convert(123.456), 95.06);
    }

    #[test]
    fn usd_is_exact_identity() {
        let price = 187.456_789;
        assert_eq!(Currency::Usd.convert(price).to_bits(), price.to_bits());
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!("gbp".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!(" EUR ".parse::<Currency>().unwrap(), Currency::Eur);
        assert!(matches!(
            "JPY".parse::<Currency>(),
            Err(DeskError::InvalidArgument(_))
        ));
    }

    #[test]
    fn serde_uses_iso_codes() {
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
        let c: Currency = serde_json::from_str("\"EUR\"").unwrap();
        assert_eq!(c, Currency::Eur);
    }
}
