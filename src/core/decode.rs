//! 儲存格解碼：日期、金額，以及兩種列的欄位配置。

use crate::core::extract::Row;
use crate::domain::model::{ProductKey, SaleEvent, WithdrawalRecord};
use crate::utils::error::{Result, StatsError};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static WITHDRAW_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"withdraw_stat/\w+").expect("withdraw anchor pattern"));

/// `dd.mm.yyyy` → 當天 12:00 (UTC) 的 epoch ms
pub fn parse_date(cell: &str) -> Result<i64> {
    let text = cell.trim();
    let mut parts = text.split('.');
    let (Some(day), Some(month), Some(year), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(StatsError::parse(format!("'{}' is not a dd.mm.yyyy date", text)));
    };

    let number = |part: &str| -> Result<u32> {
        part.trim()
            .parse()
            .map_err(|_| StatsError::parse(format!("'{}' is not a dd.mm.yyyy date", text)))
    };

    let (day, month, year) = (number(day)?, number(month)?, number(year)?);
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .map(|noon| noon.and_utc().timestamp_millis())
        .ok_or_else(|| StatsError::parse(format!("'{}' is not a valid date", text)))
}

/// 去掉千分位空白後取開頭的數字部分，例如 `1 234.50 руб.` → 1234.5
pub fn parse_amount(cell: &str) -> Result<f64> {
    let compact: String = cell
        .replace("&nbsp;", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let numeric: String = compact
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(_, c)| c)
        .collect();

    numeric
        .parse()
        .map_err(|_| StatsError::parse(format!("'{}' is not an amount", cell.trim())))
}

/// 提領列：`[日期, 連結, _, 金額]`
pub fn withdrawal_from_row(row: &Row<'_>) -> Result<WithdrawalRecord> {
    let [date, anchor, _, amount] = row.take::<4>()?;
    let identity = WITHDRAW_ANCHOR
        .find(anchor)
        .ok_or_else(|| StatsError::parse(format!("no withdraw_stat link in '{}'", anchor)))?;

    Ok(WithdrawalRecord::new(
        identity.as_str(),
        parse_date(date)?,
        parse_amount(amount)?,
    ))
}

/// 收入列：`[日期, 商品連結, 金額]`
pub fn sale_from_row(row: &Row<'_>) -> Result<(ProductKey, SaleEvent)> {
    let [date, anchor, amount] = row.take::<3>()?;
    Ok((
        anchor.to_string(),
        SaleEvent {
            time: parse_date(date)?,
            amount: parse_amount(amount)?,
        },
    ))
}
