use chrono::NaiveDate;

/// Currency used when none is chosen.
pub const DEFAULT_CURRENCY: &str = "ILS";

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Two decimals with thousands separators: `1234.5` -> `1,234.50`
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "ILS" => Some("₪"),
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        _ => None,
    }
}

/// Amount with a currency symbol, or the ISO code for unknown currencies
pub fn format_currency(amount: f64, code: &str) -> String {
    let formatted = format_amount(amount);
    match currency_symbol(code) {
        Some(symbol) => match formatted.strip_prefix('-') {
            Some(positive) => format!("-{}{}", symbol, positive),
            None => format!("{}{}", symbol, formatted),
        },
        None => format!("{} {}", formatted, code.to_ascii_uppercase()),
    }
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if let Some(day) = date
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    {
        day.format("%b %d, %Y").to_string()
    } else {
        date.to_string()
    }
}

/// `2025-03` -> `Mar 2025`. Anything else is returned unchanged.
pub fn format_period(period: &str) -> String {
    NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d")
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|_| period.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("שלום עולם", 7), "שלום...");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(12.5), "12.50");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-980.0), "-980.00");
        assert_eq!(format_amount(-0.001), "0.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1500.0, DEFAULT_CURRENCY), "₪1,500.00");
        assert_eq!(format_currency(-20.0, "usd"), "-$20.00");
        assert_eq!(format_currency(3.0, "CHF"), "3.00 CHF");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-03-14"), "Mar 14, 2025");
        assert_eq!(format_date("2025-03-14T08:00:00Z"), "Mar 14, 2025");
        assert_eq!(format_date("soon"), "soon");
    }

    #[test]
    fn test_format_period() {
        assert_eq!(format_period("2025-03"), "Mar 2025");
        assert_eq!(format_period("2025"), "2025");
    }
}
