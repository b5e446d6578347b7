mod chromium;
#[cfg(test)]
pub mod fake;

pub use chromium::ChromiumEngine;

use crate::error::Result;
use crate::page_size::MediaSize;
use async_trait::async_trait;
use tokio::fs::File;

/// Printer resolution in dots per inch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub horizontal_dpi: u32,
    pub vertical_dpi: u32,
}

/// Page margins in mils
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Margins {
    pub const NONE: Margins = Margins {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
}

/// Print attributes handed to the layout phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
    pub media_size: MediaSize,
    pub resolution: Resolution,
    pub min_margins: Margins,
}

impl PrintOptions {
    pub const RESOLUTION: Resolution = Resolution {
        horizontal_dpi: 600,
        vertical_dpi: 600,
    };

    pub fn new(media_size: MediaSize) -> Self {
        Self {
            media_size,
            resolution: Self::RESOLUTION,
            min_margins: Margins::NONE,
        }
    }
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self::new(MediaSize::DEFAULT)
    }
}

/// Inclusive, zero-based range of pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub const ALL_PAGES: PageRange = PageRange {
        start: 0,
        end: u32::MAX,
    };
}

/// Page geometry produced by the layout phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_inches: f64,
    pub height_inches: f64,
}

/// Engine identity, used for logging and `/info`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineType {
    Chromium,
    #[cfg(test)]
    Fake,
}

/// Off-screen HTML rendering surface
#[async_trait]
pub trait RenderEngine: Send + Sync {
    fn engine_type(&self) -> EngineType;

    /// Check if the engine is available (dependencies installed)
    async fn is_available(&self) -> bool;

    /// Load `html`, resolving relative resources against `base_url`.
    ///
    /// Resolves once the content reports ready; the returned document is
    /// what the print pipeline operates on.
    async fn load(&self, html: &str, base_url: Option<&str>) -> Result<Box<dyn PrintDocument>>;
}

/// Two-phase print pipeline over rendered content
#[async_trait]
pub trait PrintDocument: Send {
    /// Compute page geometry for the given attributes.
    async fn layout(&mut self, options: &PrintOptions) -> Result<PageLayout>;

    /// Write the requested pages into `output`. Must follow [`layout`].
    /// Resolves with the pages actually written once the write finished.
    ///
    /// [`layout`]: PrintDocument::layout
    async fn write(&mut self, pages: &[PageRange], output: File) -> Result<Vec<PageRange>>;

    /// Release whatever the engine holds for this document. Called once the
    /// job is done with it, whether printing succeeded or not.
    async fn close(self: Box<Self>);
}
