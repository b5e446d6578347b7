//! Scripted engine that produces the ready and write-finished signals on
//! demand, for tests that must not depend on a real browser.

use super::{EngineType, PageLayout, PageRange, PrintDocument, PrintOptions, RenderEngine};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Load { html: String, base_url: Option<String> },
    Layout(PrintOptions),
    Write,
    Close,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub events: Arc<Mutex<Vec<Event>>>,
    /// When set, `load` waits for a permit before reporting ready
    pub ready_gate: Option<Arc<Notify>>,
    pub output: Vec<u8>,
    pub fail_write: bool,
    pub panic_on_load: bool,
    /// Deleted right after writing, to make the follow-up read fail
    pub remove_after_write: Option<PathBuf>,
}

impl FakeEngine {
    pub fn new(output: &[u8]) -> Self {
        Self {
            output: output.to_vec(),
            ..Default::default()
        }
    }

    pub fn gated(output: &[u8]) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let engine = Self {
            ready_gate: Some(gate.clone()),
            ..Self::new(output)
        };
        (engine, gate)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Load { .. }))
            .count()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Fake
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn load(&self, html: &str, base_url: Option<&str>) -> Result<Box<dyn PrintDocument>> {
        self.record(Event::Load {
            html: html.to_string(),
            base_url: base_url.map(str::to_string),
        });
        if self.panic_on_load {
            panic!("renderer crashed");
        }
        if let Some(gate) = &self.ready_gate {
            gate.notified().await;
        }
        Ok(Box::new(FakeDocument {
            engine: self.clone(),
            laid_out: false,
        }))
    }
}

struct FakeDocument {
    engine: FakeEngine,
    laid_out: bool,
}

#[async_trait]
impl PrintDocument for FakeDocument {
    async fn layout(&mut self, options: &PrintOptions) -> Result<PageLayout> {
        self.engine.record(Event::Layout(*options));
        self.laid_out = true;
        Ok(PageLayout {
            width_inches: options.media_size.width_inches(),
            height_inches: options.media_size.height_inches(),
        })
    }

    async fn write(&mut self, pages: &[PageRange], mut output: File) -> Result<Vec<PageRange>> {
        assert!(self.laid_out, "write before layout");
        self.engine.record(Event::Write);
        if self.engine.fail_write {
            return Err(AppError::ConversionFailed("printer on fire".to_string()));
        }
        output.write_all(&self.engine.output).await?;
        output.flush().await?;
        drop(output);
        if let Some(path) = &self.engine.remove_after_write {
            tokio::fs::remove_file(path).await?;
        }
        Ok(pages.to_vec())
    }

    async fn close(self: Box<Self>) {
        self.engine.record(Event::Close);
    }
}
