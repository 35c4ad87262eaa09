use std::borrow::Cow;

/// Left pads `code` with zeros up to `width` characters. Longer codes are returned as is.
pub fn pad_code(code: &str, width: usize) -> Cow<'_, str> {
    let length = code.chars().count();
    if length >= width {
        return Cow::Borrowed(code);
    }

    let mut padded = String::with_capacity(width);
    padded.extend(std::iter::repeat_n('0', width - length));
    padded.push_str(code);
    Cow::Owned(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_codes() {
        assert_eq!(pad_code("5", 2), "05");
        assert_eq!(pad_code("206", 4), "0206");
    }

    #[test]
    fn keeps_codes_at_or_above_width() {
        assert_eq!(pad_code("2062", 4), "2062");
        assert_eq!(pad_code("12345", 4), "12345");
        assert!(matches!(pad_code("49", 2), Cow::Borrowed(_)));
    }
}
