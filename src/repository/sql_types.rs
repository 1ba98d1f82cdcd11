// ==========================================
// 农场区块生命周期 - 行映射公共转换
// ==========================================
// 日期: "%Y-%m-%d"; 时间: "%Y-%m-%d %H:%M:%S"
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use std::str::FromStr;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

pub fn parse_date(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FMT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

/// 解析字符串枚举列 (BlockState / AlertSeverity)
pub fn parse_enum<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    T::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// 解析 JSON 列
pub fn parse_json<T>(idx: usize, s: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BlockState;

    #[test]
    fn test_parse_helpers() {
        let d = parse_date(0, Some("2024-04-01".to_string())).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert_eq!(parse_date(0, None).unwrap(), None);
        assert!(parse_date(0, Some("04/01/2024".to_string())).is_err());

        let ts = parse_ts(1, "2024-04-01 08:30:00").unwrap();
        assert_eq!(fmt_ts(ts), "2024-04-01 08:30:00");

        let s: BlockState = parse_enum(2, "fruiting").unwrap();
        assert_eq!(s, BlockState::Fruiting);
        assert!(parse_enum::<BlockState>(2, "dormant").is_err());
    }
}
