use chrono::{DateTime, Utc};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Timestamp stamped on reports, e.g. `2024-05-01 13:37:00 UTC`.
pub fn report_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn report_stamp_is_utc() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap();
        assert_eq!(report_stamp(at), "2024-05-01 13:37:00 UTC");
    }
}
