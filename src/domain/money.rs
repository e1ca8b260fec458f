use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Money is represented as integer cents so every stored or returned value
/// carries exactly two fractional digits.
/// For EUR/USD, 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Round a decimal amount to the currency minor unit and express it in cents.
///
/// Midpoints round away from zero, so `10.005` becomes `1001`.
/// Returns `None` when the value does not fit in an `i64` number of cents.
pub fn round_to_cents(amount: Decimal) -> Option<Cents> {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

/// Express cents as a two-digit decimal (e.g. 1234 -> 12.34).
pub fn cents_to_decimal(cents: Cents) -> Decimal {
    Decimal::new(cents, 2)
}

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into cents, rounding to the minor unit.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let amount: Decimal = input
        .trim()
        .parse()
        .map_err(|_| ParseCentsError::InvalidFormat)?;
    round_to_cents(amount).ok_or(ParseCentsError::OutOfRange)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCentsError {
    #[error("invalid money format")]
    InvalidFormat,
    #[error("amount out of range")]
    OutOfRange,
}
