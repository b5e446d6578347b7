use super::{EngineType, PageLayout, PageRange, PrintDocument, PrintOptions, RenderEngine};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Oldest browser major version whose printToPDF honours paper size and margins
const MIN_MAJOR_VERSION: u32 = 64;

struct LaunchedBrowser {
    browser: Browser,
    major_version: Option<u32>,
}

pub struct ChromiumEngine {
    chrome_path: String,
    /// Persistent browser instance shared by every conversion
    browser: Arc<Mutex<Option<LaunchedBrowser>>>,
}

impl ChromiumEngine {
    pub fn new(chrome_path: impl Into<String>) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Launch the persistent browser instance
    pub async fn init(&self) -> std::result::Result<(), String> {
        let config = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--disable-default-apps")
            .arg("--headless")
            .build()
            .map_err(|e| format!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| format!("Failed to launch browser: {}", e))?;

        tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let major_version = match browser.version().await {
            Ok(version) => parse_major_version(&version.product),
            Err(e) => {
                warn!("Could not query browser version: {}", e);
                None
            }
        };

        info!(?major_version, "Persistent Chromium browser launched via CDP");

        let mut guard = self.browser.lock().await;
        *guard = Some(LaunchedBrowser {
            browser,
            major_version,
        });
        Ok(())
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Chromium
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.chrome_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn load(&self, html: &str, base_url: Option<&str>) -> Result<Box<dyn PrintDocument>> {
        let guard = self.browser.lock().await;
        let launched = guard.as_ref().ok_or_else(|| {
            AppError::EngineNotAvailable("Chromium browser not initialized".to_string())
        })?;

        check_version(launched.major_version)?;

        let page = launched.browser.new_page("about:blank").await.map_err(|e| {
            AppError::ConversionFailed(format!("Failed to create new tab: {}", e))
        })?;
        drop(guard);

        let content = match base_url {
            Some(url) => inject_base_href(html, url),
            None => html.to_string(),
        };

        // set_content returns once the document finished loading
        if let Err(e) = page.set_content(content).await {
            let _ = page.close().await;
            return Err(AppError::ConversionFailed(format!(
                "Failed to load content: {}",
                e
            )));
        }

        debug!("Content ready");
        Ok(Box::new(ChromiumDocument { page, params: None }))
    }
}

struct ChromiumDocument {
    page: Page,
    params: Option<PrintToPdfParams>,
}

#[async_trait]
impl PrintDocument for ChromiumDocument {
    async fn layout(&mut self, options: &PrintOptions) -> Result<PageLayout> {
        let layout = PageLayout {
            width_inches: options.media_size.width_inches(),
            height_inches: options.media_size.height_inches(),
        };
        self.params = Some(pdf_params(options));
        debug!(
            page_size = options.media_size.id(),
            dpi_x = options.resolution.horizontal_dpi,
            dpi_y = options.resolution.vertical_dpi,
            "Print parameters prepared"
        );
        Ok(layout)
    }

    async fn write(&mut self, pages: &[PageRange], mut output: File) -> Result<Vec<PageRange>> {
        let mut params = self.params.take().ok_or_else(|| {
            AppError::Internal("write requested before layout".to_string())
        })?;
        params.page_ranges = page_ranges_param(pages);

        let data = self.page.pdf(params).await.map_err(|e| {
            AppError::ConversionFailed(format!("PDF generation failed: {}", e))
        })?;

        output.write_all(&data).await?;
        output.flush().await?;
        debug!(bytes = data.len(), "PDF written");

        Ok(pages.to_vec())
    }

    async fn close(self: Box<Self>) {
        let document = *self;
        if let Err(e) = document.page.close().await {
            warn!("Failed to close tab: {}", e);
        }
    }
}

/// Browsers of unknown version are given the benefit of the doubt.
fn check_version(major_version: Option<u32>) -> Result<()> {
    match major_version {
        Some(major) if major < MIN_MAJOR_VERSION => Err(AppError::UnsupportedPlatform(format!(
            "Chromium {} is too old, {} or newer is required",
            major, MIN_MAJOR_VERSION
        ))),
        _ => Ok(()),
    }
}

fn pdf_params(options: &PrintOptions) -> PrintToPdfParams {
    let margins = options.min_margins;
    PrintToPdfParams::builder()
        .paper_width(options.media_size.width_inches())
        .paper_height(options.media_size.height_inches())
        .margin_top(mils_to_inches(margins.top))
        .margin_right(mils_to_inches(margins.right))
        .margin_bottom(mils_to_inches(margins.bottom))
        .margin_left(mils_to_inches(margins.left))
        .landscape(false)
        .print_background(true)
        .prefer_css_page_size(false)
        .build()
}

fn mils_to_inches(mils: u32) -> f64 {
    f64::from(mils) / 1000.0
}

/// CDP page-range string, one-based. `None` prints everything.
fn page_ranges_param(pages: &[PageRange]) -> Option<String> {
    if pages.is_empty() || pages.contains(&PageRange::ALL_PAGES) {
        return None;
    }
    let ranges = pages
        .iter()
        .map(|r| {
            if r.start == r.end {
                format!("{}", r.start + 1)
            } else {
                format!("{}-{}", r.start + 1, r.end.saturating_add(1))
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    Some(ranges)
}

/// Put a `<base>` element in front of the document so relative URLs resolve
/// against `base_url`.
fn inject_base_href(html: &str, base_url: &str) -> String {
    let base = format!("<base href=\"{}\">", base_url.replace('"', "&quot;"));

    let lower = html.to_ascii_lowercase();
    let insert_at = lower
        .match_indices("<head")
        .map(|(start, tag)| start + tag.len())
        .find(|&after| {
            lower[after..]
                .chars()
                .next()
                .is_some_and(|c| c == '>' || c.is_ascii_whitespace())
        })
        .and_then(|after| lower[after..].find('>').map(|end| after + end + 1));

    match insert_at {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + base.len());
            result.push_str(&html[..pos]);
            result.push_str(&base);
            result.push_str(&html[pos..]);
            result
        }
        None => format!("{}{}", base, html),
    }
}

/// Extract the major version from a product string such as
/// `HeadlessChrome/120.0.6099.109`.
fn parse_major_version(product: &str) -> Option<u32> {
    product
        .rsplit('/')
        .next()?
        .split('.')
        .next()?
        .parse()
        .ok()
}
