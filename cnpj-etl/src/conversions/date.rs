/// Values meaning "no date" in the registry extracts.
const DATE_SENTINELS: &[&str] = &["00000000", "0"];

/// Formats a `YYYYMMDD` registry date as `YYYY-MM-DD`.
///
/// Null, blank and sentinel values yield `None`, padding included. Values that are not eight characters long
/// are returned trimmed but otherwise unchanged.
pub fn parse_registry_date(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || DATE_SENTINELS.contains(&value) {
        return None;
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() != 8 {
        return Some(value.to_string());
    }

    let year: String = chars[..4].iter().collect();
    let month: String = chars[4..6].iter().collect();
    let day: String = chars[6..].iter().collect();

    Some(format!("{year}-{month}-{day}"))
}
