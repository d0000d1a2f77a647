use chrono_tz::Tz;

pub const FALLBACK_TIMEZONE: &str = "Etc/UTC";

/// Offset codes in quarter hours, paired with a representative IANA zone.
const OFFSET_TABLE: &[(i32, &str)] = &[
    (-48, "Etc/GMT+12"),
    (-44, "Pacific/Pago_Pago"),
    (-40, "Pacific/Honolulu"),
    (-38, "Pacific/Marquesas"),
    (-36, "America/Anchorage"),
    (-32, "America/Los_Angeles"),
    (-28, "America/Denver"),
    (-24, "America/Chicago"),
    (-20, "America/New_York"),
    (-16, "America/Halifax"),
    (-14, "America/St_Johns"),
    (-12, "America/Sao_Paulo"),
    (-8, "America/Noronha"),
    (-4, "Atlantic/Azores"),
    (0, "Etc/UTC"),
    (4, "Europe/Berlin"),
    (8, "Europe/Athens"),
    (12, "Europe/Moscow"),
    (14, "Asia/Tehran"),
    (16, "Asia/Dubai"),
    (18, "Asia/Kabul"),
    (20, "Asia/Karachi"),
    (22, "Asia/Kolkata"),
    (23, "Asia/Kathmandu"),
    (24, "Asia/Dhaka"),
    (26, "Asia/Yangon"),
    (28, "Asia/Bangkok"),
    (32, "Asia/Shanghai"),
    (35, "Australia/Eucla"),
    (36, "Asia/Tokyo"),
    (38, "Australia/Adelaide"),
    (40, "Australia/Sydney"),
    (42, "Australia/Lord_Howe"),
    (44, "Pacific/Noumea"),
    (48, "Pacific/Auckland"),
    (51, "Pacific/Chatham"),
];

/// Maps a UTC-offset code in hours ("3.5", "-9.5", "+5.75") to an IANA
/// timezone. Unparseable or unmapped codes resolve to `Etc/UTC`.
pub fn offset_to_timezone(code: &str) -> &'static str {
    let Some(quarters) = parse_quarter_hours(code) else {
        tracing::debug!(code, "timezone offset is not numeric, using UTC");
        return FALLBACK_TIMEZONE;
    };
    match OFFSET_TABLE.binary_search_by_key(&quarters, |(key, _)| *key) {
        Ok(idx) => OFFSET_TABLE[idx].1,
        Err(_) => {
            tracing::debug!(code, "timezone offset is not mapped, using UTC");
            FALLBACK_TIMEZONE
        }
    }
}

/// Resolves an offset code straight to a `chrono_tz` zone.
pub fn resolve(code: &str) -> Tz {
    offset_to_timezone(code).parse().unwrap_or(Tz::UTC)
}

/// All offset codes the table knows about, formatted the way the edit form
/// offers them.
pub fn known_offsets() -> Vec<(String, &'static str)> {
    OFFSET_TABLE
        .iter()
        .map(|(quarters, zone)| (format_offset(*quarters), *zone))
        .collect()
}

fn parse_quarter_hours(code: &str) -> Option<i32> {
    let hours: f64 = code.trim().trim_start_matches('+').parse().ok()?;
    if !hours.is_finite() {
        return None;
    }
    let quarters = hours * 4.0;
    if (quarters - quarters.round()).abs() > f64::EPSILON * 64.0 {
        return None;
    }
    Some(quarters.round() as i32)
}

fn format_offset(quarters: i32) -> String {
    let hours = quarters as f64 / 4.0;
    if quarters % 4 == 0 {
        format!("{}", quarters / 4)
    } else {
        format!("{hours}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_fractional_offsets() {
        assert_eq!(offset_to_timezone("3.5"), "Asia/Tehran");
        assert_eq!(offset_to_timezone("4.5"), "Asia/Kabul");
        assert_eq!(offset_to_timezone("5.75"), "Asia/Kathmandu");
        assert_eq!(offset_to_timezone("-9.5"), "Pacific/Marquesas");
        assert_eq!(offset_to_timezone("8.75"), "Australia/Eucla");
        assert_eq!(offset_to_timezone("12.75"), "Pacific/Chatham");
    }

    #[test]
    fn normalizes_code_spelling() {
        assert_eq!(offset_to_timezone("+3.50"), "Asia/Tehran");
        assert_eq!(offset_to_timezone(" 0 "), "Etc/UTC");
        assert_eq!(offset_to_timezone("-5"), "America/New_York");
    }

    #[test]
    fn unmapped_and_garbage_fall_back_to_utc() {
        assert_eq!(offset_to_timezone("99"), "Etc/UTC");
        assert_eq!(offset_to_timezone("1.1"), "Etc/UTC");
        assert_eq!(offset_to_timezone("abc"), "Etc/UTC");
        assert_eq!(offset_to_timezone(""), "Etc/UTC");
    }

    #[test]
    fn every_table_zone_parses() {
        for (code, zone) in known_offsets() {
            assert!(zone.parse::<Tz>().is_ok(), "{code} -> {zone} must be a valid zone");
            assert_eq!(offset_to_timezone(&code), zone);
        }
    }

    #[test]
    fn table_is_sorted_for_binary_search() {
        assert!(OFFSET_TABLE.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }
}
