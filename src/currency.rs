use thiserror::Error;

// Static conversion factors relative to one US dollar. The engine itself is
// currency-agnostic; these rates only ever touch displayed aggregates.
const BUILTIN_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("JPY", 147.0),
    ("KES", 129.0),
    ("INR", 83.0),
    ("CAD", 1.36),
    ("AUD", 1.52),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("unknown currency code `{0}`")]
    UnknownCurrency(String),
}

/// A fixed table of per-base conversion factors.
///
/// Converting from `a` to `b` is `amount * rate[b] / rate[a]`, so any column
/// can serve as the unit of account.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    rates: Vec<(String, f64)>,
}

impl CurrencyTable {
    pub fn builtin() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }

    pub fn from_rates(rates: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }

    pub fn rate(&self, code: &str) -> Result<f64, CurrencyError> {
        self.rates
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(code))
            .map(|(_, rate)| *rate)
            .ok_or_else(|| CurrencyError::UnknownCurrency(code.to_string()))
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, CurrencyError> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        Ok(amount * (to_rate / from_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn identity_conversion_returns_the_amount() {
        let table = CurrencyTable::builtin();
        assert_approx(table.convert(123.45, "USD", "USD").expect("known"), 123.45);
        assert_approx(table.convert(123.45, "KES", "KES").expect("known"), 123.45);
    }

    #[test]
    fn conversion_scales_by_the_rate_ratio() {
        let table = CurrencyTable::from_rates([("USD".to_string(), 1.0), ("KES".to_string(), 130.0)]);
        assert_approx(table.convert(100.0, "USD", "KES").expect("known"), 13_000.0);
        assert_approx(table.convert(13_000.0, "KES", "USD").expect("known"), 100.0);
    }

    #[test]
    fn codes_match_case_insensitively() {
        let table = CurrencyTable::builtin();
        assert_approx(
            table.convert(50.0, "usd", "Usd").expect("known"),
            50.0,
        );
    }

    #[test]
    fn unknown_code_is_rejected() {
        let table = CurrencyTable::builtin();
        let err = table.convert(1.0, "USD", "XXX").expect_err("must reject");
        assert_eq!(err, CurrencyError::UnknownCurrency("XXX".to_string()));
    }
}
