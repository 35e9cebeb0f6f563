//! Human-readable formatting for report amounts.

/// Format an amount as a whole number with thousands separators.
///
/// The fractional part is truncated. Non-finite input formats as "0".
///
/// # Example
///
/// ```rust
/// use dca_core::format_amount;
///
/// assert_eq!(format_amount(1_234_567.89), "1,234,567");
/// assert_eq!(format_amount(-48_000.0), "-48,000");
/// ```
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "0".to_string();
    }

    let whole = amount.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    grouped
}
