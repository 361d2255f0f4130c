//! Integration tests for page-translator-core
//!
//! These tests drive whole sessions the way a viewer loop does:
//! - repeated driver invocations with and without a translate request
//! - translator failures and retries
//! - cost totals over the translated prefix
//! - resuming a session from the store
//! - page extraction from a PDF fixture
//! - the OpenAI translator against a local event-stream server

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use page_translator_core::{
    CostSummary, Document, Error, ExtractionConfig, ExtractionMode, FragmentSink, Lang,
    OpenAiTranslator, PdfDocument, PdfPageSource, PricingConfig, Result, Session, SessionKey,
    SessionStore, Step, TitleStyle, TranslationDriver, TranslationLog, Translator,
    TranslatorConfig, TranslatorInfo,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =============================================================================
// Mock Translator for Testing
// =============================================================================

/// Looks translations up in a fixed table, optionally failing on given inputs.
struct MockTranslator {
    table: HashMap<String, String>,
    /// Inputs that fail until `heal` is called
    failing: std::sync::Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockTranslator {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            table: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            failing: std::sync::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(self, input: &str) -> Self {
        self.failing.lock().unwrap().push(input.to_string());
        self
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "mock",
            requires_api_key: false,
            supports_streaming: true,
        }
    }

    async fn translate(
        &self,
        text: &str,
        _source: &Lang,
        _target: &Lang,
        sink: Option<&mut dyn FragmentSink>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().iter().any(|f| f == text) {
            return Err(Error::TranslationRequest("Mock translation failure".to_string()));
        }

        let translated = self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[TRANSLATED] {text}"));

        if let Some(sink) = sink {
            let (head, tail) = translated.split_at(translated.len() / 2);
            sink.on_fragment(head);
            sink.on_fragment(tail);
        }
        Ok(translated)
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

fn hello_world() -> (Arc<MockTranslator>, TranslationDriver, Session) {
    let translator = Arc::new(MockTranslator::new(&[("Hello", "Bonjour"), ("World", "Monde")]));
    let driver = TranslationDriver::new(
        Arc::clone(&translator) as Arc<dyn Translator>,
        Lang::new("en"),
        Lang::new("fr"),
    );
    let session = Session::new(Document::from_pages(["Hello", "World"]));
    (translator, driver, session)
}

fn entries(log: &TranslationLog) -> Vec<&str> {
    log.iter().collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// =============================================================================
// Driver Tests
// =============================================================================

#[tokio::test]
async fn test_hello_world_scenario() {
    let (translator, driver, mut session) = hello_world();

    let step = session.advance(&driver, true, None).await.unwrap();
    assert_eq!(step, Step::Translated { page: 0 });
    assert_eq!(entries(session.log()), vec!["Bonjour"]);

    let step = session.advance(&driver, true, None).await.unwrap();
    assert_eq!(step, Step::Translated { page: 1 });
    assert_eq!(entries(session.log()), vec!["Bonjour", "Monde"]);

    let step = session.advance(&driver, true, None).await.unwrap();
    assert_eq!(step, Step::Finished);
    assert_eq!(entries(session.log()), vec!["Bonjour", "Monde"]);

    assert_eq!(translator.calls(), 2, "no page is translated twice");
}

#[tokio::test]
async fn test_without_request_nothing_changes() {
    let (translator, driver, mut session) = hello_world();
    session.advance(&driver, true, None).await.unwrap();
    let before = session.log().clone();

    for _ in 0..3 {
        let step = session.advance(&driver, false, None).await.unwrap();
        assert_eq!(step, Step::Waiting { cursor: 1 });
    }

    assert_eq!(session.log(), &before);
    assert_eq!(translator.calls(), 1);
}

#[tokio::test]
async fn test_finished_session_ignores_trigger() {
    let (translator, driver, mut session) = hello_world();
    while session.advance(&driver, true, None).await.unwrap() != Step::Finished {}

    for requested in [true, false] {
        assert_eq!(session.advance(&driver, requested, None).await.unwrap(), Step::Finished);
    }
    assert_eq!(session.log().len(), 2);
    assert_eq!(translator.calls(), 2);
}

#[tokio::test]
async fn test_log_grows_monotonically_and_in_order() {
    let translator = Arc::new(MockTranslator::new(&[]));
    let driver = TranslationDriver::new(translator, Lang::new("en"), Lang::new("ja"));
    let pages = ["p0", "p1", "p2", "p3"];
    let mut session = Session::new(Document::from_pages(pages));

    let mut previous = 0;
    for requested in [false, true, true, false, true, true, true, false, true] {
        session.advance(&driver, requested, None).await.unwrap();
        let len = session.log().len();
        assert!(len >= previous && len <= pages.len());
        previous = len;
    }

    let expected: Vec<String> = pages.iter().map(|p| format!("[TRANSLATED] {p}")).collect();
    assert_eq!(session.log().as_slice(), expected.as_slice());
}

#[tokio::test]
async fn test_failure_on_page_two_then_retry() {
    let translator = Arc::new(
        MockTranslator::new(&[("s0", "t0"), ("s1", "t1"), ("s2", "t2")]).failing_on("s2"),
    );
    let driver = TranslationDriver::new(
        Arc::clone(&translator) as Arc<dyn Translator>,
        Lang::new("en"),
        Lang::new("ja"),
    );
    let mut session = Session::new(Document::from_pages(["s0", "s1", "s2"]));

    session.advance(&driver, true, None).await.unwrap();
    session.advance(&driver, true, None).await.unwrap();
    let err = session.advance(&driver, true, None).await.unwrap_err();

    assert!(err.is_translation_error());
    assert_eq!(entries(session.log()), vec!["t0", "t1"]);
    assert_eq!(session.cursor(), 2);

    translator.heal();
    let step = session.advance(&driver, true, None).await.unwrap();
    assert_eq!(step, Step::Translated { page: 2 });
    assert_eq!(entries(session.log()), vec!["t0", "t1", "t2"]);
}

#[tokio::test]
async fn test_failed_streaming_page_commits_nothing() {
    let translator = Arc::new(MockTranslator::new(&[]).failing_on("broken"));
    let driver = TranslationDriver::new(translator, Lang::new("en"), Lang::new("ja"));
    let mut session = Session::new(Document::from_pages(["broken"]));
    let mut fragments = Vec::new();
    let mut sink = |f: &str| fragments.push(f.to_string());

    assert!(session.advance(&driver, true, Some(&mut sink)).await.is_err());
    assert!(session.log().is_empty());
    assert!(fragments.is_empty());
}

#[tokio::test]
async fn test_streamed_fragments_match_committed_text() {
    let (_, driver, mut session) = hello_world();
    let mut fragments = Vec::new();
    let mut sink = |f: &str| fragments.push(f.to_string());

    session.advance(&driver, true, Some(&mut sink)).await.unwrap();

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments.concat(), "Bonjour");
    assert_eq!(session.log().get(0), Some("Bonjour"));
}

// =============================================================================
// Cost Tests
// =============================================================================

#[tokio::test]
async fn test_cost_of_hello_world() {
    let (_, driver, mut session) = hello_world();
    session.advance(&driver, true, None).await.unwrap();
    session.advance(&driver, true, None).await.unwrap();

    let pricing = PricingConfig::new(1.5, 2.0, 140.0);
    let summary = session.cost(&word_count, &pricing).unwrap();

    // 2 input words, 2 output words
    // 2 * 1.5 / 1000 + 2 * 2.0 / 1000 = 0.007, * 140 = 0.98
    assert_eq!(summary.input_tokens, 2);
    assert_eq!(summary.output_tokens, 2);
    assert!((summary.estimated_cost - 0.007).abs() < 1e-12);
    assert!((summary.converted_cost - 0.98).abs() < 1e-9);
}

#[tokio::test]
async fn test_cost_is_deterministic_and_monotone() {
    let (_, driver, mut session) = hello_world();
    let pricing = PricingConfig::new(1.5, 2.0, 140.0);

    let mut previous = session.cost(&word_count, &pricing).unwrap();
    while session.advance(&driver, true, None).await.unwrap() != Step::Finished {
        let first = session.cost(&word_count, &pricing).unwrap();
        let again = session.cost(&word_count, &pricing).unwrap();
        assert_eq!(first, again);
        assert!(first.input_tokens >= previous.input_tokens);
        assert!(first.output_tokens >= previous.output_tokens);
        assert!(first.estimated_cost >= previous.estimated_cost);
        previous = first;
    }
}

#[test]
fn test_cost_ignores_untranslated_pages() {
    let pages = vec!["one two three".to_string(), "four".to_string()];
    let translated = vec!["uno dos tres".to_string()];
    let summary =
        CostSummary::compute(&pages, &translated, &word_count, &PricingConfig::new(1.0, 1.0, 1.0))
            .unwrap();
    assert_eq!(summary.input_tokens, 3);
    assert_eq!(summary.output_tokens, 3);
}

// =============================================================================
// Session Store Tests
// =============================================================================

#[tokio::test]
async fn test_resume_does_not_retranslate() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path().join("sessions")).unwrap();
    let (translator, driver, mut session) = hello_world();
    let key = SessionKey::new(session.document().id(), driver.source_lang(), driver.target_lang());

    session.advance(&driver, true, None).await.unwrap();
    store.save(&key, &session).unwrap();
    let document = session.document().clone();
    drop(session);

    // Next run of the viewer: same document, fresh process state
    let mut resumed = store.restore(&key, document);
    assert_eq!(resumed.cursor(), 1);

    resumed.advance(&driver, true, None).await.unwrap();
    assert_eq!(entries(resumed.log()), vec!["Bonjour", "Monde"]);
    assert_eq!(translator.calls(), 2);
}

#[tokio::test]
async fn test_new_document_gets_fresh_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path().join("sessions")).unwrap();
    let (_, driver, mut session) = hello_world();
    let key = SessionKey::new(session.document().id(), driver.source_lang(), driver.target_lang());
    session.advance(&driver, true, None).await.unwrap();
    store.save(&key, &session).unwrap();

    let other = Document::from_pages(["Goodbye", "World"]);
    let other_key = SessionKey::new(other.id(), driver.source_lang(), driver.target_lang());
    let fresh = store.restore(&other_key, other);
    assert!(fresh.log().is_empty());
}

// =============================================================================
// PDF Extraction Tests
// =============================================================================

/// Three pages: a title with two paragraphs, a blank page, one short line
fn load_test_pdf() -> PdfDocument {
    let pdf_bytes = include_bytes!("fixtures/three_pages.pdf");
    PdfDocument::from_bytes(pdf_bytes.to_vec()).expect("Failed to load test PDF")
}

fn extract(mode: ExtractionMode, title_style: TitleStyle) -> Document {
    let config = ExtractionConfig {
        mode,
        title_style,
        ..ExtractionConfig::default()
    };
    PdfPageSource::new(config).extract(&load_test_pdf()).unwrap()
}

#[test]
fn test_plain_extraction_one_string_per_page() {
    let pdf = load_test_pdf();
    let document = extract(ExtractionMode::Plain, TitleStyle::Heading);

    assert_eq!(pdf.page_count(), 3);
    assert_eq!(document.page_count(), 3);
    assert_eq!(document.id(), pdf.id());

    let first = document.page(0).unwrap();
    assert!(first.contains("Introduction"));
    assert!(first.contains("first paragraph of the test document."));
    assert_eq!(document.page(1), Some(""));
    assert_eq!(document.page(2), Some("Third page text."));
}

#[test]
fn test_elements_extraction_title_styles() {
    let heading = extract(ExtractionMode::Elements, TitleStyle::Heading);
    let merged = extract(ExtractionMode::Elements, TitleStyle::Merge);

    let first = heading.page(0).unwrap();
    assert!(first.starts_with("# Introduction"), "got {first:?}");
    assert!(first.contains("first paragraph of the test document."));

    let first = merged.page(0).unwrap();
    assert!(first.starts_with("Introduction"), "got {first:?}");
    assert!(!first.contains('#'));

    assert_eq!(heading.page(1), Some(""));
    assert_eq!(heading.page_count(), 3);
}

#[test]
fn test_extraction_settings_change_content_digest() {
    let plain = extract(ExtractionMode::Plain, TitleStyle::Heading);
    let elements = extract(ExtractionMode::Elements, TitleStyle::Heading);

    assert_eq!(plain.id(), elements.id());
    assert_ne!(plain.content_digest(), elements.content_digest());
}

// =============================================================================
// OpenAI Stream Tests
// =============================================================================

/// What the local server sends back on one connection
enum Reply {
    /// Plain error response with this status
    Status(u16, &'static str),
    /// 200 event stream of `data:` payloads
    Stream {
        events: Vec<String>,
        /// Announce more body than is sent, then hang up
        cut_short: bool,
    },
}

const DONE: &str = "[DONE]";

fn delta(content: &str) -> String {
    format!(r#"{{"choices":[{{"delta":{{"content":"{content}"}}}}]}}"#)
}

async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        request.extend_from_slice(&chunk[..n]);

        if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

fn response_bytes(reply: &Reply) -> Vec<u8> {
    match reply {
        Reply::Status(code, body) => format!(
            "HTTP/1.1 {code} Error\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_bytes(),
        Reply::Stream { events, cut_short } => {
            let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
            let announced = if *cut_short { body.len() + 100 } else { body.len() };
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {announced}\r\nConnection: close\r\n\r\n{body}"
            )
            .into_bytes()
        }
    }
}

/// Serve one reply per connection, in order. Returns the API base URL and
/// a count of requests received.
async fn serve(replies: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            seen.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            socket.write_all(&response_bytes(&reply)).await.ok();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}/v1"), hits)
}

fn stream_driver(api_base: &str) -> TranslationDriver {
    let mut config = TranslatorConfig::new(api_base, None, "test-model");
    config.retry_delay_ms = 1;
    let translator = OpenAiTranslator::new(&config).unwrap();
    TranslationDriver::new(Arc::new(translator), Lang::new("en"), Lang::new("fr"))
}

#[tokio::test]
async fn test_stream_commits_what_the_sink_saw() {
    let (api_base, hits) = serve(vec![Reply::Stream {
        events: vec![delta("Bon"), delta("jour "), DONE.to_string()],
        cut_short: false,
    }])
    .await;
    let driver = stream_driver(&api_base);
    let mut session = Session::new(Document::from_pages(["Hello"]));
    let mut fragments = Vec::new();
    let mut sink = |f: &str| fragments.push(f.to_string());

    let step = session.advance(&driver, true, Some(&mut sink)).await.unwrap();

    assert_eq!(step, Step::Translated { page: 0 });
    assert_eq!(fragments, vec!["Bon", "jour "]);
    assert_eq!(session.log().get(0), Some("Bonjour "));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_without_end_marker_is_incomplete() {
    let (api_base, hits) = serve(vec![Reply::Stream {
        events: vec![delta("Bon")],
        cut_short: false,
    }])
    .await;
    let driver = stream_driver(&api_base);
    let mut session = Session::new(Document::from_pages(["Hello"]));
    let mut sink = |_: &str| {};

    let err = session.advance(&driver, true, Some(&mut sink)).await.unwrap_err();

    assert!(matches!(err, Error::TranslationIncomplete { .. }), "got {err:?}");
    assert!(session.log().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interrupted_stream_is_not_retried_or_committed() {
    let (api_base, hits) = serve(vec![
        Reply::Stream {
            events: vec![delta("Bon")],
            cut_short: true,
        },
        Reply::Stream {
            events: vec![delta("Bonjour"), DONE.to_string()],
            cut_short: false,
        },
    ])
    .await;
    let driver = stream_driver(&api_base);
    let mut session = Session::new(Document::from_pages(["Hello"]));
    let mut fragments = Vec::new();
    let mut sink = |f: &str| fragments.push(f.to_string());

    let err = session.advance(&driver, true, Some(&mut sink)).await.unwrap_err();

    assert!(err.is_translation_error(), "got {err:?}");
    assert!(session.log().is_empty());
    assert_eq!(fragments, vec!["Bon"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The next trigger starts the page over
    fragments.clear();
    let mut sink = |f: &str| fragments.push(f.to_string());
    session.advance(&driver, true, Some(&mut sink)).await.unwrap();
    assert_eq!(session.log().get(0), Some("Bonjour"));
    assert_eq!(fragments, vec!["Bonjour"]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_server_error_retried_before_first_fragment() {
    let (api_base, hits) = serve(vec![
        Reply::Status(500, "overloaded"),
        Reply::Stream {
            events: vec![delta("Monde"), DONE.to_string()],
            cut_short: false,
        },
    ])
    .await;
    let driver = stream_driver(&api_base);
    let mut session = Session::new(Document::from_pages(["World"]));
    let mut fragments = Vec::new();
    let mut sink = |f: &str| fragments.push(f.to_string());

    session.advance(&driver, true, Some(&mut sink)).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(fragments, vec!["Monde"]);
    assert_eq!(session.log().get(0), Some("Monde"));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (api_base, hits) = serve(vec![Reply::Status(400, "bad request")]).await;
    let driver = stream_driver(&api_base);
    let mut session = Session::new(Document::from_pages(["World"]));

    let err = session.advance(&driver, true, None).await.unwrap_err();

    assert!(matches!(err, Error::TranslationRequest(ref msg) if msg.contains("400")));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(session.log().is_empty());
}
