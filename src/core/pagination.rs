//! 分頁展開：由已取得的第一頁推算其餘頁面的 URL。

use crate::domain::model::FetchedPage;
use crate::utils::error::{Result, StatsError};
use regex::Regex;
use url::Url;

const PAGE_PARAM: &str = "page";

/// 依頁面自己的 URL 與內容，產生所有「之後」頁面的 URL
pub fn resolve_pages(page: &FetchedPage) -> Result<PageSet> {
    let base = Url::parse(&page.final_url).map_err(|e| {
        StatsError::parse(format!("invalid page URL '{}': {}", page.final_url, e))
    })?;

    let current = current_page(&base);
    let last = last_page(&base, &page.body)?.unwrap_or(current);

    tracing::debug!(
        "📄 {}: page {} of {}",
        base.path(),
        current,
        last.max(current)
    );

    Ok(PageSet {
        base,
        next: current.saturating_add(1),
        last,
    })
}

fn current_page(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

// 同一資源的分頁連結中最大的頁碼
fn last_page(url: &Url, body: &str) -> Result<Option<u32>> {
    let resource = url.path().trim_start_matches('/');
    let pattern = format!(r"{}\?{}=([0-9]+)", regex::escape(resource), PAGE_PARAM);
    let links = Regex::new(&pattern)
        .map_err(|e| StatsError::parse(format!("pagination pattern for '{}': {}", resource, e)))?;

    Ok(links
        .captures_iter(body)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max())
}

/// 惰性的兄弟頁面 URL 序列，頁碼遞增
#[derive(Debug, Clone)]
pub struct PageSet {
    base: Url,
    next: u32,
    last: u32,
}

impl PageSet {
    pub fn remaining(&self) -> usize {
        if self.next > self.last {
            0
        } else {
            (self.last - self.next) as usize + 1
        }
    }

    fn page_url(&self, number: u32) -> String {
        let mut url = self.base.clone();
        let others: Vec<(String, String)> = self
            .base
            .query_pairs()
            .filter(|(key, _)| key != PAGE_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(others)
            .append_pair(PAGE_PARAM, &number.to_string());
        url.set_fragment(None);
        url.into()
    }
}

impl Iterator for PageSet {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.last {
            return None;
        }
        let url = self.page_url(self.next);
        self.next += 1;
        Some(url)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
