/// Parses a locale formatted decimal such as `1.234,56` into an `f64`.
///
/// `decimal_separator` is `,` or `.`, the other one is treated as the thousands separator
/// and removed. Null, empty or unparsable input yields `0.0`.
pub fn parse_locale_decimal(value: Option<&str>, decimal_separator: char) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };

    let thousands_separator = if decimal_separator == ',' { '.' } else { ',' };
    let normalized: String = value
        .trim()
        .chars()
        .filter(|c| *c != thousands_separator)
        .map(|c| if c == decimal_separator { '.' } else { c })
        .collect();

    match normalized.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brazilian_currency() {
        assert_eq!(parse_locale_decimal(Some("1.234,56"), ','), 1234.56);
        assert_eq!(parse_locale_decimal(Some("5000,00"), ','), 5000.0);
    }

    #[test]
    fn parses_dot_decimal_locale() {
        assert_eq!(parse_locale_decimal(Some("1,234.56"), '.'), 1234.56);
    }

    #[test]
    fn unparsable_values_default_to_zero() {
        assert_eq!(parse_locale_decimal(Some("abc"), ','), 0.0);
        assert_eq!(parse_locale_decimal(Some(""), ','), 0.0);
        assert_eq!(parse_locale_decimal(Some("1,2,3"), ','), 0.0);
        assert_eq!(parse_locale_decimal(Some("inf"), ','), 0.0);
        assert_eq!(parse_locale_decimal(None, ','), 0.0);
    }
}
