//! FOMC statement ingestion: a two-phase scrape of the press-release index,
//! statement text extraction, and a unified diff against the prior statement.

pub mod diff;

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};

use http_fetcher::Fetcher;
use meridian_core::{CentralBankComm, MeridianError};
use meridian_store::Store;

pub use diff::change_vs_previous;

pub const FED_BANK: &str = "federal_reserve";
pub const FED_COMM_TYPE_STATEMENT: &str = "statement";
pub const FED_BASE_URL: &str = "https://www.federalreserve.gov";
pub const FED_PRESS_RELEASES_INDEX_URL: &str =
    "https://www.federalreserve.gov/newsevents/pressreleases.htm";

fn year_page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/newsevents/pressreleases/\d{4}-press-fomc\.htm").expect("valid pattern")
    })
}

fn statement_url_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"monetary(\d{8})[a-z]?\.(htm|html)$").expect("valid pattern")
    })
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("static selector"))
}

/// A discovered monetary-policy statement link.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementLink {
    pub url: String,
    pub published_at: DateTime<Utc>,
}

pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

/// Phase 1: year-index pages matching `/newsevents/pressreleases/<YYYY>-press-fomc.htm`.
pub fn parse_fomc_year_pages(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for anchor in document.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if year_page_pattern().is_match(href) {
            let url = absolutize(base_url, href);
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Phase 2: monetary-policy statement links on a year page. The publication
/// date comes from the human text, or failing that from the embedded
/// `YYYYMMDD` path segment; "minutes" links without "statement" are rejected.
pub fn parse_statement_index(html: &str, base_url: &str) -> Vec<StatementLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for anchor in document.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains("pressreleases/monetary") {
            continue;
        }
        let text = normalize_whitespace(&anchor.text().collect::<String>());

        let published_at = match parse_statement_date(&text) {
            Some(date) => date,
            None => {
                if !looks_like_statement_title(&text) {
                    continue;
                }
                match parse_statement_date_from_url(href) {
                    Some(date) => date,
                    None => continue,
                }
            }
        };
        links.push(StatementLink {
            url: absolutize(base_url, href),
            published_at,
        });
    }
    links
}

fn parse_statement_date(text: &str) -> Option<DateTime<Utc>> {
    let cleaned = text.split('(').next().unwrap_or("").trim();
    for format in ["%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            return Some(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
        }
    }
    None
}

fn parse_statement_date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let lowered = url.to_lowercase();
    let captures = statement_url_date_pattern().captures(&lowered)?;
    let date = NaiveDate::parse_from_str(captures.get(1)?.as_str(), "%Y%m%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

fn looks_like_statement_title(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("statement") && !lowered.contains("minutes")
}

/// Statement full text: paragraphs and list items in the `article`
/// container, falling back to every paragraph when the container is absent.
pub fn parse_statement_text(html: &str) -> String {
    static ARTICLE: OnceLock<Selector> = OnceLock::new();
    static ANY: OnceLock<Selector> = OnceLock::new();
    let article = ARTICLE.get_or_init(|| {
        Selector::parse("#article p, #article li").expect("static selector")
    });
    let any = ANY.get_or_init(|| Selector::parse("p, li").expect("static selector"));

    let document = Html::parse_document(html);
    let mut paragraphs = collect_paragraphs(&document, article);
    if paragraphs.is_empty() {
        paragraphs = collect_paragraphs(&document, any);
    }
    paragraphs.join("\n").trim().to_string()
}

fn collect_paragraphs(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Fetch statement bodies for every discovered link.
pub async fn fetch_statement_entries(
    fetcher: &Fetcher,
    index_html: &str,
    base_url: &str,
) -> Vec<CentralBankComm> {
    let mut entries = Vec::new();
    for link in parse_statement_index(index_html, base_url) {
        let statement_html = match fetcher.get_text(&link.url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(url = %link.url, error = %err, "statement fetch failed");
                continue;
            }
        };
        let full_text = parse_statement_text(&statement_html);
        if full_text.is_empty() {
            continue;
        }
        entries.push(CentralBankComm {
            bank: FED_BANK.to_string(),
            comm_type: FED_COMM_TYPE_STATEMENT.to_string(),
            published_at: link.published_at,
            full_text,
        });
    }
    entries
}

/// Insert new statements oldest first so each diff sees its predecessor.
/// Already-stored statements are skipped.
pub async fn insert_comms(
    store: &Store,
    entries: Vec<CentralBankComm>,
) -> Result<u64, MeridianError> {
    let mut sorted = entries;
    sorted.sort_by_key(|entry| entry.published_at);

    let mut inserted = 0u64;
    for entry in sorted {
        if store
            .comm_exists(&entry.bank, &entry.comm_type, entry.published_at)
            .await?
        {
            continue;
        }
        let previous = store
            .previous_comm_text(&entry.bank, &entry.comm_type, entry.published_at)
            .await?;
        let change = change_vs_previous(previous.as_deref(), &entry.full_text);
        inserted += store.insert_comm(&entry, change.as_deref()).await?;
    }
    Ok(inserted)
}

/// Full two-phase ingestion from the press-release index.
pub async fn ingest_fomc_statements(
    fetcher: &Fetcher,
    store: &Store,
    index_url: Option<&str>,
) -> Result<u64, MeridianError> {
    let index_html = fetcher
        .get_text(index_url.unwrap_or(FED_PRESS_RELEASES_INDEX_URL))
        .await
        .map_err(|err| MeridianError::Fetch(err.to_string()))?;

    let mut year_pages = parse_fomc_year_pages(&index_html, FED_BASE_URL);
    if year_pages.is_empty() {
        match index_url {
            // The override may itself be a year page.
            Some(url) => year_pages.push(url.to_string()),
            None => {
                return Err(MeridianError::Parse(
                    "No FOMC year pages found on the press releases index.".into(),
                ))
            }
        }
    }

    let mut inserted = 0u64;
    for page_url in year_pages {
        let page_html = match fetcher.get_text(&page_url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(url = %page_url, error = %err, "year page fetch failed");
                continue;
            }
        };
        let entries = fetch_statement_entries(fetcher, &page_html, FED_BASE_URL).await;
        if entries.is_empty() {
            continue;
        }
        inserted += insert_comms(store, entries).await?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"
        <html><body>
          <a href="/newsevents/pressreleases/2024-press-fomc.htm">2024 FOMC</a>
          <a href="/newsevents/pressreleases/2023-press-fomc.htm">2023 FOMC</a>
          <a href="/newsevents/pressreleases/2024-press-fomc.htm">2024 again</a>
          <a href="/newsevents/pressreleases/2024-press-other.htm">Other</a>
        </body></html>
    "#;

    const YEAR_PAGE_HTML: &str = r#"
        <html><body>
          <a href="/newsevents/pressreleases/monetary20240320a.htm">March 20, 2024</a>
          <a href="/newsevents/pressreleases/monetary20240131a.htm">FOMC statement</a>
          <a href="/newsevents/pressreleases/monetary20231213a.htm">Minutes of the FOMC</a>
          <a href="/newsevents/pressreleases/other20240115a.htm">January 15, 2024</a>
        </body></html>
    "#;

    #[test]
    fn year_pages_are_discovered_and_deduped() {
        let pages = parse_fomc_year_pages(INDEX_HTML, FED_BASE_URL);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].ends_with("/newsevents/pressreleases/2024-press-fomc.htm"));
        assert!(pages[0].starts_with(FED_BASE_URL));
    }

    #[test]
    fn statement_links_parse_dates_from_text_or_url() {
        let links = parse_statement_index(YEAR_PAGE_HTML, FED_BASE_URL);
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].published_at,
            Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()
        );
        // "FOMC statement" has no date text, so the URL segment is used.
        assert_eq!(
            links[1].published_at,
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn minutes_links_are_rejected() {
        let links = parse_statement_index(YEAR_PAGE_HTML, FED_BASE_URL);
        assert!(links.iter().all(|l| !l.url.contains("20231213")));
    }

    #[test]
    fn non_monetary_links_are_ignored() {
        let links = parse_statement_index(YEAR_PAGE_HTML, FED_BASE_URL);
        assert!(links.iter().all(|l| l.url.contains("monetary")));
    }

    #[test]
    fn statement_text_prefers_article_container() {
        let html = r#"
            <html><body>
              <p>Navigation junk</p>
              <div id="article">
                <p>The Committee decided to maintain the target range.</p>
                <ul><li>Vote was unanimous.</li></ul>
              </div>
            </body></html>
        "#;
        let text = parse_statement_text(html);
        assert_eq!(
            text,
            "The Committee decided to maintain the target range.\nVote was unanimous."
        );
    }

    #[test]
    fn statement_text_falls_back_to_all_paragraphs() {
        let html = "<html><body><p>First.</p><p>  Second   line. </p></body></html>";
        assert_eq!(parse_statement_text(html), "First.\nSecond line.");
    }

    #[test]
    fn empty_pages_produce_no_text() {
        assert_eq!(parse_statement_text("<html><body><div/></body></html>"), "");
    }
}
