//! Page Translator CLI - translate a PDF one page at a time.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use page_translator_core::{
    AppConfig, ExtractionMode, FragmentSink, Lang, PageSource, PdfPageSource, Session, SessionKey,
    SessionStore, Step, TitleStyle, TokenCounter, TranslationDriver, counter_for_model,
    open_session_store,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeOption {
    Plain,
    Elements,
}

impl From<ModeOption> for ExtractionMode {
    fn from(opt: ModeOption) -> Self {
        match opt {
            ModeOption::Plain => Self::Plain,
            ModeOption::Elements => Self::Elements,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TitleOption {
    Heading,
    Merge,
}

impl From<TitleOption> for TitleStyle {
    fn from(opt: TitleOption) -> Self {
        match opt {
            TitleOption::Heading => Self::Heading,
            TitleOption::Merge => Self::Merge,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "page-translate")]
#[command(author, version, about = "Translate a PDF page by page", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Source language code (default: en)
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language code (default: ja)
    #[arg(short = 't', long)]
    target: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Page text extraction mode
    #[arg(long, value_enum)]
    mode: Option<ModeOption>,

    /// How titles are rendered in elements mode
    #[arg(long, value_enum)]
    title_style: Option<TitleOption>,

    /// Translate every remaining page without prompting
    #[arg(long)]
    all: bool,

    /// Print each translation once it is complete instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Discard translations saved by an earlier run
    #[arg(long)]
    fresh: bool,

    /// Do not save translations between runs
    #[arg(long)]
    no_persist: bool,

    /// Write the translated pages to a Markdown file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Stored session for the loaded document, saved after every page
struct Persistence {
    store: SessionStore,
    key: SessionKey,
}

impl Persistence {
    fn save(&self, session: &Session) {
        if let Err(e) = self.store.save(&self.key, session) {
            warn!("Failed to save session {}: {}", self.key, e);
        }
    }
}

fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(source) = &args.source {
        config.source_lang = Lang::new(source);
    }
    if let Some(target) = &args.target {
        config.target_lang = Lang::new(target);
    }

    if let Some(api_base) = &args.api_base {
        config.translator.api_base.clone_from(api_base);
    }
    if args.api_key.is_some() {
        config.translator.api_key.clone_from(&args.api_key);
    }
    if let Some(model) = &args.model {
        config.translator.model.clone_from(model);
    }
    if let Some(mode) = args.mode {
        config.extraction.mode = mode.into();
    }
    if let Some(style) = args.title_style {
        config.extraction.title_style = style.into();
    }
    if args.no_persist {
        config.session.persist = false;
    }

    Ok(config)
}

fn print_fragment(fragment: &str) {
    #[allow(clippy::print_stdout)]
    {
        print!("{fragment}");
    }
    std::io::stdout().flush().ok();
}

#[allow(clippy::print_stdout)]
fn print_cost(session: &Session, counter: &dyn TokenCounter, config: &AppConfig) -> Result<()> {
    let summary = session
        .cost(counter, &config.pricing)
        .context("Failed to compute cost")?;
    println!("Cost so far: {summary}");
    Ok(())
}

/// Prompt for each page in turn until the user quits or nothing is left
#[allow(clippy::print_stdout)]
async fn run_interactive(
    session: &mut Session,
    driver: &TranslationDriver,
    persistence: Option<&Persistence>,
    counter: &dyn TokenCounter,
    config: &AppConfig,
    stream: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let total = session.document().page_count();

    loop {
        let cursor = session.cursor();
        let Some(source) = session.document().page(cursor) else {
            println!("All {total} pages translated.");
            return Ok(());
        };

        println!("\n=== Page {}/{} ({}) ===\n{}\n", cursor + 1, total, driver.source_lang(), source);
        print!("[Enter] translate · q quit ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            return Ok(());
        };
        if line.trim().eq_ignore_ascii_case("q") {
            return Ok(());
        }

        println!("\n--- Page {}/{} ({}) ---", cursor + 1, total, driver.target_lang());

        let mut printer = print_fragment;
        let sink: Option<&mut dyn FragmentSink> = if stream { Some(&mut printer) } else { None };

        match session.advance(driver, true, sink).await {
            Ok(Step::Translated { page }) => {
                if stream {
                    println!();
                } else if let Some(translated) = session.log().get(page) {
                    println!("{translated}");
                }
                if let Some(persistence) = persistence {
                    persistence.save(session);
                }
                print_cost(session, counter, config)?;
            }
            Ok(Step::Waiting { .. } | Step::Finished) => {}
            Err(e) if e.is_translation_error() => {
                println!("\nTranslation failed: {e}");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to translate page {}", cursor + 1));
            }
        }
    }
}

/// Translate every remaining page behind a progress bar
async fn run_all(
    session: &mut Session,
    driver: &TranslationDriver,
    persistence: Option<&Persistence>,
) -> Result<()> {
    let remaining = session.document().page_count() - session.cursor();
    let pb = ProgressBar::new(u64::try_from(remaining).unwrap_or(u64::MAX));
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    loop {
        let page = session.cursor() + 1;
        pb.set_message(format!("Page {page}"));

        let step = match session.advance(driver, true, None).await {
            Ok(step) => step,
            Err(e) => {
                pb.abandon_with_message(format!("Stopped at page {page}"));
                return Err(e).with_context(|| format!("Failed to translate page {page}"));
            }
        };

        match step {
            Step::Translated { .. } => {
                if let Some(persistence) = persistence {
                    persistence.save(session);
                }
                pb.inc(1);
            }
            Step::Waiting { .. } | Step::Finished => break,
        }
    }

    pb.finish_with_message("Translation complete");
    Ok(())
}

/// Translated pages as Markdown, one section per page
fn write_markdown(session: &Session, path: &Path) -> Result<()> {
    let markdown = session
        .views(false)
        .iter()
        .map_while(|view| {
            view.translated
                .map(|translated| format!("## Page {}\n\n{}\n", view.index + 1, translated))
        })
        .collect::<Vec<_>>()
        .join("\n");

    std::fs::write(path, markdown)
        .with_context(|| format!("Failed to write output: {}", path.display()))
}

/// Run the requested mode, then report on whatever was translated.
///
/// Pages translated before a failure still get their cost printed and are
/// written to `--output`.
async fn translate_and_report(
    session: &mut Session,
    driver: &TranslationDriver,
    persistence: Option<&Persistence>,
    counter: &dyn TokenCounter,
    config: &AppConfig,
    args: &Args,
) -> Result<()> {
    let outcome = if args.all {
        let outcome = run_all(session, driver, persistence).await;
        print_cost(session, counter, config)?;
        outcome
    } else {
        let stream = !args.no_stream && driver.translator_info().supports_streaming;
        run_interactive(session, driver, persistence, counter, config, stream).await
    };

    if let Some(output_path) = &args.output {
        write_markdown(session, output_path)?;

        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            println!("Translations saved to: {}", output_path.display());
        }
    }

    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = build_config(&args)?;

    // A document that cannot be read never reaches the driver
    let document = match PdfPageSource::new(config.extraction.clone()).load(&args.input) {
        Ok(document) => document,
        Err(e) if e.is_load_error() => {
            anyhow::bail!("Cannot read {} as a PDF: {}", args.input.display(), e)
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load PDF: {}", args.input.display()));
        }
    };

    let driver = TranslationDriver::from_config(&config).context("Failed to initialize translator")?;
    let info = driver.translator_info();
    info!("Using translator: {}", info.name);

    if info.requires_api_key && !driver.is_available() {
        anyhow::bail!("{} requires an API key: set OPENAI_API_KEY or --api-key", info.name);
    }

    let counter = counter_for_model(&config.translator.model);

    let key = SessionKey::new(document.id(), driver.source_lang(), driver.target_lang());
    let store = open_session_store(&config.session).context("Failed to open session store")?;

    if args.fresh
        && let Some(store) = &store
    {
        store
            .remove(&key)
            .context("Failed to discard stored session")?;
    }

    let mut session = match &store {
        Some(store) => store.restore(&key, document),
        None => Session::new(document),
    };
    let persistence = store.map(|store| Persistence { store, key });

    if session.cursor() > 0 {
        info!(
            "Resuming at page {}/{}",
            session.cursor() + 1,
            session.document().page_count()
        );
    }

    translate_and_report(
        &mut session,
        &driver,
        persistence.as_ref(),
        counter.as_ref(),
        &config,
        &args,
    )
    .await
}
