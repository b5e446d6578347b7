//! One-at-a-time HTML to PDF conversion.
//!
//! A request is accepted only while the job slot is empty; anything arriving
//! while a job runs is dropped without a trace to the caller. An accepted job
//! runs on the designated [`ExecutionContext`] as
//! load (wait for ready) -> layout -> write (wait for finish) -> encode,
//! and the slot is emptied before the caller hears back.

mod slot;

pub use slot::{JobPhase, JobSnapshot};

use crate::context::ExecutionContext;
use crate::engines::{PageRange, PrintDocument, PrintOptions, RenderEngine};
use crate::error::{AppError, Result};
use crate::page_size;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use slot::{JobSlot, SlotGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Arguments of one conversion
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub html: Option<String>,
    pub output_file: Option<PathBuf>,
    pub encode_base64: bool,
    /// Base for relative resources referenced by the HTML
    pub base_url: Option<String>,
    /// Page-size identifier such as `ISO_A4`
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub file_path: String,
    /// Empty unless encoding was requested
    pub base64: String,
}

pub type Completion = oneshot::Receiver<Result<ConversionResult>>;

/// What `convert` did with a well-formed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Scheduled; the completion handle will be settled
    Accepted,
    /// Another job held the slot; the completion handle was dropped
    Dropped,
}

/// Sink for the eventual outcome of a conversion
#[derive(Debug)]
pub struct CompletionHandle {
    sender: oneshot::Sender<Result<ConversionResult>>,
}

impl CompletionHandle {
    pub fn channel() -> (Self, Completion) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn resolve(self, result: ConversionResult) {
        self.settle(Ok(result));
    }

    pub fn reject(self, error: AppError) {
        self.settle(Err(error));
    }

    fn settle(self, outcome: Result<ConversionResult>) {
        if self.sender.send(outcome).is_err() {
            debug!("Caller stopped waiting for the conversion result");
        }
    }
}

struct Job {
    html: String,
    base_url: Option<String>,
    output_file: PathBuf,
    options: PrintOptions,
    encode_base64: bool,
}

#[derive(Clone)]
pub struct PdfConverter {
    engine: Arc<dyn RenderEngine>,
    slot: Arc<JobSlot>,
}

impl PdfConverter {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            engine,
            slot: Arc::new(JobSlot::default()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// The job currently holding the slot, if any.
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.slot.snapshot()
    }

    /// Accept a conversion and schedule it on `context`.
    ///
    /// Fails with [`AppError::InvalidArgument`] when the context, the HTML or
    /// the output file is missing. Returns [`Acceptance::Dropped`] without
    /// doing anything else when a conversion is already running; `completion`
    /// is then dropped unresolved.
    pub fn convert(
        &self,
        context: Option<&ExecutionContext>,
        request: ConversionRequest,
        completion: CompletionHandle,
    ) -> Result<Acceptance> {
        let context = context
            .ok_or_else(|| AppError::InvalidArgument("context can't be missing".to_string()))?;
        let html = request
            .html
            .ok_or_else(|| AppError::InvalidArgument("html can't be missing".to_string()))?;
        let output_file = request
            .output_file
            .ok_or_else(|| AppError::InvalidArgument("file can't be missing".to_string()))?;

        let media_size = page_size::resolve(request.page_size.as_deref());
        let snapshot = JobSnapshot {
            id: Uuid::new_v4(),
            output_file: output_file.clone(),
            media_size,
            encode_base64: request.encode_base64,
            phase: JobPhase::Rendering,
        };
        let id = snapshot.id;

        let Some(guard) = self.slot.try_acquire(snapshot) else {
            debug!("Conversion already in progress, request ignored");
            return Ok(Acceptance::Dropped);
        };

        let job = Job {
            html,
            base_url: request.base_url,
            output_file,
            options: PrintOptions::new(media_size),
            encode_base64: request.encode_base64,
        };

        let engine = Arc::clone(&self.engine);
        let span = info_span!("job", %id);
        context.post(
            async move {
                let outcome = run(&*engine, &guard, job).await;
                drop(guard);
                match outcome {
                    Ok(result) => {
                        info!(file = %result.file_path, "Conversion finished");
                        completion.resolve(result);
                    }
                    Err(e) => {
                        error!("Conversion failed: {}", e);
                        completion.reject(e);
                    }
                }
            }
            .instrument(span),
        );

        Ok(Acceptance::Accepted)
    }
}

async fn run(engine: &dyn RenderEngine, guard: &SlotGuard, job: Job) -> Result<ConversionResult> {
    info!(
        page_size = job.options.media_size.id(),
        engine = ?engine.engine_type(),
        "Rendering HTML ({} bytes)",
        job.html.len()
    );
    let mut document = engine.load(&job.html, job.base_url.as_deref()).await?;

    guard.set_phase(JobPhase::Writing);
    let printed = print(&mut *document, &job).await;
    document.close().await;
    let pages = printed?;
    debug!(?pages, "Write finished");

    let base64 = if job.encode_base64 {
        encode_file(&job.output_file).await?
    } else {
        String::new()
    };

    Ok(ConversionResult {
        file_path: std::path::absolute(&job.output_file)?
            .display()
            .to_string(),
        base64,
    })
}

async fn print(document: &mut dyn PrintDocument, job: &Job) -> Result<Vec<PageRange>> {
    let layout = document.layout(&job.options).await?;
    debug!(
        width = layout.width_inches,
        height = layout.height_inches,
        "Layout done"
    );

    let output = open_output(&job.output_file).await?;
    document.write(&[PageRange::ALL_PAGES], output).await
}

/// Open `path` read-write, creating it if absent and truncating it otherwise.
async fn open_output(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    Ok(file)
}

async fn encode_file(path: &Path) -> Result<String> {
    let data = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderThread;
    use crate::engines::fake::{Event, FakeEngine};
    use crate::page_size::MediaSize;
    use std::time::Duration;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    fn request(dir: &TempDir, name: &str) -> ConversionRequest {
        ConversionRequest {
            html: Some("<h1>Hello</h1>".to_string()),
            output_file: Some(dir.path().join(name)),
            ..Default::default()
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..400 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never became true");
    }

    async fn convert_and_wait(
        converter: &PdfConverter,
        request: ConversionRequest,
    ) -> Result<ConversionResult> {
        let (handle, completion) = CompletionHandle::channel();
        converter
            .convert(Some(&ExecutionContext::current()), request, handle)
            .unwrap();
        completion.await.expect("completion dropped")
    }

    #[tokio::test]
    async fn test_converts_without_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let converter = PdfConverter::new(Arc::new(FakeEngine::new(PDF)));

        let result = convert_and_wait(&converter, request(&dir, "out.pdf"))
            .await
            .unwrap();

        assert_eq!(result.base64, "");
        assert!(Path::new(&result.file_path).is_absolute());
        assert!(result.file_path.ends_with("out.pdf"));
        assert_eq!(std::fs::read(dir.path().join("out.pdf")).unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_base64_round_trips_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let converter = PdfConverter::new(Arc::new(FakeEngine::new(PDF)));

        let result = convert_and_wait(
            &converter,
            ConversionRequest {
                encode_base64: true,
                ..request(&dir, "out.pdf")
            },
        )
        .await
        .unwrap();

        assert!(!result.base64.contains('\n'));
        assert_eq!(STANDARD.decode(&result.base64).unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_pipeline_order_and_options() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(PDF);
        let converter = PdfConverter::new(Arc::new(engine.clone()));

        convert_and_wait(
            &converter,
            ConversionRequest {
                base_url: Some("file:///assets/".to_string()),
                page_size: Some("ISO_A4".to_string()),
                ..request(&dir, "out.pdf")
            },
        )
        .await
        .unwrap();

        assert_eq!(
            engine.events(),
            vec![
                Event::Load {
                    html: "<h1>Hello</h1>".to_string(),
                    base_url: Some("file:///assets/".to_string()),
                },
                Event::Layout(PrintOptions::new(MediaSize::IsoA4)),
                Event::Write,
                Event::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_page_size_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(PDF);
        let converter = PdfConverter::new(Arc::new(engine.clone()));

        convert_and_wait(
            &converter,
            ConversionRequest {
                page_size: Some("iso_a4".to_string()),
                ..request(&dir, "out.pdf")
            },
        )
        .await
        .unwrap();

        assert!(engine
            .events()
            .contains(&Event::Layout(PrintOptions::new(MediaSize::NaGovtLetter))));
    }

    #[tokio::test]
    async fn test_concurrent_request_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, gate) = FakeEngine::gated(PDF);
        let converter = PdfConverter::new(Arc::new(engine.clone()));
        let context = ExecutionContext::current();

        let (first, first_done) = CompletionHandle::channel();
        let accepted = converter
            .convert(Some(&context), request(&dir, "first.pdf"), first)
            .unwrap();
        assert_eq!(accepted, Acceptance::Accepted);
        wait_until(|| engine.load_count() == 1).await;

        let before = converter.snapshot();
        assert_eq!(before.as_ref().unwrap().phase, JobPhase::Rendering);

        let (second, second_done) = CompletionHandle::channel();
        let dropped = converter
            .convert(Some(&context), request(&dir, "second.pdf"), second)
            .unwrap();
        assert_eq!(dropped, Acceptance::Dropped);

        // dropped unresolved, nothing else changed
        assert!(second_done.await.is_err());
        assert_eq!(converter.snapshot(), before);
        assert_eq!(engine.load_count(), 1);

        gate.notify_one();
        let result = first_done.await.unwrap().unwrap();
        assert!(result.file_path.ends_with("first.pdf"));
        assert!(!dir.path().join("second.pdf").exists());
    }

    #[tokio::test]
    async fn test_slot_reopens_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let converter = PdfConverter::new(Arc::new(FakeEngine::new(PDF)));

        convert_and_wait(&converter, request(&dir, "a.pdf"))
            .await
            .unwrap();
        assert!(!converter.is_busy());
        assert_eq!(converter.snapshot(), None);

        let result = convert_and_wait(&converter, request(&dir, "b.pdf"))
            .await
            .unwrap();
        assert!(result.file_path.ends_with("b.pdf"));
    }

    #[tokio::test]
    async fn test_write_failure_rejects_and_reopens_slot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            fail_write: true,
            ..FakeEngine::new(PDF)
        };
        let converter = PdfConverter::new(Arc::new(engine.clone()));

        let err = convert_and_wait(&converter, request(&dir, "a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConversionFailed(_)));
        assert!(!converter.is_busy());

        // accepted again, so it reaches the engine a second time
        let err = convert_and_wait(&converter, request(&dir, "b.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConversionFailed(_)));
        assert_eq!(engine.load_count(), 2);
    }

    #[tokio::test]
    async fn test_read_failure_rejects_with_io_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");
        let engine = FakeEngine {
            remove_after_write: Some(path.clone()),
            ..FakeEngine::new(PDF)
        };
        let converter = PdfConverter::new(Arc::new(engine));

        let err = convert_and_wait(
            &converter,
            ConversionRequest {
                encode_base64: true,
                ..request(&dir, "gone.pdf")
            },
        )
        .await
        .unwrap_err();

        match err {
            AppError::IoError(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!converter.is_busy());
    }

    #[tokio::test]
    async fn test_open_failure_rejects_and_closes_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("taken.pdf")).unwrap();
        let engine = FakeEngine::new(PDF);
        let converter = PdfConverter::new(Arc::new(engine.clone()));

        let err = convert_and_wait(&converter, request(&dir, "taken.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::IoError(_)));
        let events = engine.events();
        assert!(!events.contains(&Event::Write));
        assert_eq!(events.last(), Some(&Event::Close));
        assert!(!converter.is_busy());
    }

    #[tokio::test]
    async fn test_write_failure_closes_document() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            fail_write: true,
            ..FakeEngine::new(PDF)
        };
        let converter = PdfConverter::new(Arc::new(engine.clone()));

        assert!(convert_and_wait(&converter, request(&dir, "a.pdf"))
            .await
            .is_err());
        assert_eq!(engine.events().last(), Some(&Event::Close));
    }

    #[tokio::test]
    async fn test_existing_output_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, vec![b'x'; PDF.len() * 4]).unwrap();
        let converter = PdfConverter::new(Arc::new(FakeEngine::new(PDF)));

        convert_and_wait(&converter, request(&dir, "out.pdf"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_missing_arguments_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(PDF);
        let converter = PdfConverter::new(Arc::new(engine.clone()));
        let context = ExecutionContext::current();

        let (handle, _) = CompletionHandle::channel();
        let err = converter
            .convert(None, request(&dir, "a.pdf"), handle)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let (handle, _) = CompletionHandle::channel();
        let missing_html = ConversionRequest {
            html: None,
            ..request(&dir, "a.pdf")
        };
        let err = converter
            .convert(Some(&context), missing_html, handle)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let (handle, _) = CompletionHandle::channel();
        let missing_file = ConversionRequest {
            output_file: None,
            ..request(&dir, "a.pdf")
        };
        let err = converter
            .convert(Some(&context), missing_file, handle)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        tokio::task::yield_now().await;
        assert_eq!(engine.load_count(), 0);
        assert!(!converter.is_busy());
    }

    #[tokio::test]
    async fn test_runs_on_render_thread() {
        let dir = tempfile::tempdir().unwrap();
        let render = RenderThread::spawn().unwrap();
        let converter = PdfConverter::new(Arc::new(FakeEngine::new(PDF)));

        let (handle, completion) = CompletionHandle::channel();
        converter
            .convert(Some(&render.context()), request(&dir, "out.pdf"), handle)
            .unwrap();

        let result = completion.await.unwrap().unwrap();
        assert!(result.file_path.ends_with("out.pdf"));
        assert!(!converter.is_busy());
    }
}
