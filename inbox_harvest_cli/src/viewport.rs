use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use crate::{HarvestError, RawItem, Result};

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[role='option']").expect("valid selector"));
static LIST_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[aria-label='郵件清單'], div[aria-label='Message list'], div[role='list']")
        .expect("valid selector")
});

/// A lazily rendered list: only the rows currently on screen can be read,
/// and more appear some time after `reveal_more`.
#[async_trait]
pub trait Viewport: Send + Sync {
    /// Whether the list has rendered at all.
    async fn is_ready(&self) -> Result<bool>;

    async fn read_visible_items(&mut self) -> Result<Vec<RawItem>>;

    /// Scroll one step. A no-op once the end of the list is on screen.
    async fn reveal_more(&mut self) -> Result<()>;
}

/// Polls `is_ready` with exponential backoff until it answers true or
/// `timeout` elapses.
pub async fn wait_until_ready<V: Viewport + ?Sized>(viewport: &V, timeout: Duration) -> Result<()> {
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(timeout),
        ..ExponentialBackoff::default()
    };

    retry(policy, move || async move {
        match viewport.is_ready().await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!("inbox list not rendered yet");
                Err(backoff::Error::transient(HarvestError::SourceUnavailable(
                    format!("no message list within {}s", timeout.as_secs()),
                )))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await?;

    info!("inbox list is ready");
    Ok(())
}

/// Viewport over a saved inbox page. Rows are `div[role='option']`
/// elements identified by their `aria-label`; a window of `page_size`
/// rows is visible and each reveal scrolls it by `step` rows.
#[derive(Debug, Clone)]
pub struct HtmlViewport {
    rows: Vec<RawItem>,
    list_present: bool,
    page_size: usize,
    step: usize,
    offset: usize,
}

impl HtmlViewport {
    pub fn new(rows: Vec<RawItem>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            list_present: !rows.is_empty(),
            rows,
            page_size,
            step: page_size,
            offset: 0,
        }
    }

    /// Rows without a non-empty `aria-label` are skipped.
    pub fn from_html(html: &str, page_size: usize) -> Self {
        let doc = Html::parse_document(html);

        let rows = doc
            .select(&ROW_SELECTOR)
            .filter_map(|el| el.value().attr("aria-label"))
            .filter(|label| !label.is_empty())
            .map(RawItem::new)
            .collect();

        let mut viewport = Self::new(rows, page_size);
        viewport.list_present |= doc.select(&LIST_SELECTOR).next().is_some();
        viewport
    }

    /// Scroll distance per reveal. Smaller than the page size means
    /// consecutive reads overlap.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step.max(1);
        self
    }

    /// A saved page never changes, so there is nothing to wait for: it
    /// either has a message list or the source is unavailable.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.list_present {
            Ok(())
        } else {
            Err(HarvestError::SourceUnavailable(
                "page has no message list".into(),
            ))
        }
    }

    /// Every row in the page, regardless of scroll position.
    pub fn rows(&self) -> &[RawItem] {
        &self.rows
    }

    fn window_end(&self) -> usize {
        (self.offset + self.page_size).min(self.rows.len())
    }
}

#[async_trait]
impl Viewport for HtmlViewport {
    async fn is_ready(&self) -> Result<bool> {
        Ok(self.list_present)
    }

    async fn read_visible_items(&mut self) -> Result<Vec<RawItem>> {
        Ok(self.rows[self.offset..self.window_end()].to_vec())
    }

    async fn reveal_more(&mut self) -> Result<()> {
        if self.window_end() < self.rows.len() {
            self.offset = (self.offset + self.step).min(self.rows.len() - 1);
        }
        Ok(())
    }
}
