//! 通用工具函数

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 急诊号前缀
pub const CASE_REFERENCE_PREFIX: &str = "URG";

/// 生成急诊号，格式 URG-YYYYMMDD-XXXXXX
pub fn generate_case_reference(arrival_time: DateTime<Utc>, id: &Uuid) -> String {
    let suffix: String = id.simple().to_string().chars().take(6).collect();
    format!(
        "{}-{}-{}",
        CASE_REFERENCE_PREFIX,
        arrival_time.format("%Y%m%d"),
        suffix.to_uppercase()
    )
}

/// 超出阈值的分钟数，向上取整
///
/// 按完整精度比较，超出不足一分钟（含亚秒）也计为 1
pub fn minutes_over(elapsed: chrono::Duration, threshold_minutes: u32) -> i64 {
    let over = elapsed - chrono::Duration::minutes(i64::from(threshold_minutes));
    if over <= chrono::Duration::zero() {
        return 0;
    }

    let whole = over.num_minutes();
    if over > chrono::Duration::minutes(whole) {
        whole + 1
    } else {
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_generate_case_reference() {
        let arrival = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let reference = generate_case_reference(arrival, &Uuid::new_v4());
        assert!(reference.starts_with("URG-20261019-"));
        assert_eq!(reference.len(), "URG-20261019-".len() + 6);
        assert!(reference
            .rsplit('-')
            .next()
            .unwrap()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_minutes_over_rounds_up() {
        assert_eq!(minutes_over(Duration::minutes(9), 10), 0);
        assert_eq!(minutes_over(Duration::minutes(10), 10), 0);
        assert_eq!(minutes_over(Duration::seconds(10 * 60 + 1), 10), 1);
        assert_eq!(minutes_over(Duration::minutes(11), 10), 1);
        assert_eq!(minutes_over(Duration::seconds(12 * 60 + 30), 10), 3);
    }

    #[test]
    fn test_minutes_over_counts_sub_second_excess() {
        let just_past = Duration::minutes(10) + Duration::milliseconds(500);
        assert_eq!(minutes_over(just_past, 10), 1);
        assert_eq!(minutes_over(Duration::minutes(10) + Duration::nanoseconds(1), 10), 1);
        assert_eq!(minutes_over(Duration::minutes(12), 10), 2);
    }
}
