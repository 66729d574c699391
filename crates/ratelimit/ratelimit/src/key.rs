use chrono::{DateTime, Utc};

/// Render the UTC calendar day containing `at` as zero-padded `YYYYMMDD`.
pub fn day_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// Build the composite `<YYYYMMDD>:<client>` counter key.
///
/// A new day yields a new key, so counters from previous days are never
/// consulted again.
pub fn quota_key(at: DateTime<Utc>, client: &str) -> String {
    format!("{}:{client}", day_stamp(at))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn day_stamp_is_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(day_stamp(at), "20240203");
    }

    #[test]
    fn quota_key_combines_day_and_client() {
        let at = Utc.with_ymd_and_hms(2023, 11, 30, 23, 59, 59).unwrap();
        assert_eq!(quota_key(at, "203.0.113.7"), "20231130:203.0.113.7");
    }

    #[test]
    fn quota_key_rolls_over_at_utc_midnight() {
        let before = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(quota_key(before, "a"), quota_key(after, "a"));
        assert_eq!(quota_key(after, "a"), "20240101:a");
    }

    #[test]
    fn ipv6_clients_keep_their_colons() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(quota_key(at, "::1"), "20240601:::1");
    }
}
