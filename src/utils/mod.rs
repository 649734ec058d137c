//! 工具函数模块
//!
//! 提供时间戳转换与服务启动辅助函数

pub mod helpers;

pub use helpers::ServiceHelper;

use chrono::{DateTime, Utc};
use prost_types::Timestamp;

/// DateTime 转换为 protobuf 时间戳
pub fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_conversion_preserves_instant() {
        let now = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        let ts = datetime_to_timestamp(now);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_000_000);
    }
}
