//! 表格列擷取：固定兩層樣式（列邊界、儲存格邊界），不做一般的 HTML 解析。

use crate::utils::error::{Result, StatsError};
use regex::Regex;
use std::sync::LazyLock;

// 從 <td> 到下一個 /tr> 為一列，可跨行
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<td>.*?/tr>").expect("row pattern"));
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<td>(.*?)</td>").expect("cell pattern"));

/// 擷取 `html` 中的所有列。惰性、有限、可重新開始（`Clone`）。
pub fn extract_rows(html: &str) -> Rows<'_> {
    Rows { html, pos: 0 }
}

#[derive(Debug, Clone)]
pub struct Rows<'a> {
    html: &'a str,
    pos: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Row<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = ROW.find_at(self.html, self.pos)?;
        self.pos = found.end();

        let cells = CELL
            .captures_iter(found.as_str())
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        Some(Row { cells })
    }
}

/// 一列的儲存格文字（原樣，未解碼）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    cells: Vec<&'a str>,
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[&'a str] {
        &self.cells
    }

    /// 取前 `N` 個儲存格；不足時回傳 `Parse` 錯誤，不讓欄位位移
    pub fn take<const N: usize>(&self) -> Result<[&'a str; N]> {
        if self.cells.len() < N {
            return Err(StatsError::parse(format!(
                "row has {} cells, expected {}",
                self.cells.len(),
                N
            )));
        }
        Ok(std::array::from_fn(|i| self.cells[i]))
    }
}
