use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use translators::{Backend, Config, Language, Payload, Registry, SourceLanguage, TranslateError};

#[derive(Parser)]
#[command(name = "translators")]
#[command(version, about = "Translate text through interchangeable translation backends")]
#[command(long_about = "Translate one or more texts with Google Translate, DeepL or LibreTranslate. \
Texts are merged into as few requests as the backend's size limit allows.")]
struct Cli {
    /// Texts to translate
    texts: Vec<String>,

    /// Backend: google, deepl, libre (defaults to the configured backend)
    #[arg(short, long)]
    backend: Option<String>,

    /// Source language code, or "auto"
    #[arg(short, long, default_value = "auto")]
    from: String,

    /// Target language code (e.g., en, ru, ja)
    #[arg(short, long, required_unless_present = "list")]
    to: Option<String>,

    /// Number of concurrent requests
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Send texts that exceed the backend limit instead of rejecting them
    #[arg(long)]
    send_oversized: bool,

    /// Report how far the texts exceed the backend limit instead of translating
    #[arg(long)]
    check: bool,

    /// List available backends and exit
    #[arg(long)]
    list: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn print_backends(registry: &Registry) {
    for backend in registry.backends() {
        println!(
            "{:<8} {:<18} key: {:<8} auto: {:<4} languages: {}",
            backend.name(),
            backend.display_name(),
            if backend.is_required_key() { "required" } else { "optional" },
            if backend.is_supported_auto_from() { "yes" } else { "no" },
            backend.supported_languages().join(",")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let registry = Registry::new();
    if cli.list {
        print_backends(&registry);
        return Ok(());
    }

    if cli.texts.is_empty() {
        anyhow::bail!("Nothing to translate: pass at least one text");
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.send_oversized |= cli.send_oversized;

    let backend: Backend = match cli.backend {
        Some(ref name) => name.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.default_backend,
    };
    config
        .validate(backend)
        .context("Configuration validation failed")?;

    let from: SourceLanguage = cli.from.parse()?;
    let to: Language = cli
        .to
        .as_deref()
        .context("Target language is required")?
        .parse()?;

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            cancelled.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let policy = config
        .policy()
        .with_cancel_flag(cancelled)
        .with_progress(!cli.verbose);
    let translator = registry.create(backend.name(), config.adapter_options(backend), policy)?;

    let texts: Vec<&str> = cli.texts.iter().map(String::as_str).collect();

    if cli.check {
        for (i, text) in texts.iter().enumerate() {
            println!("[{}] {}", i, translator.check_limit_exceeding(Payload::Text(text)));
        }
        println!("batch {}", translator.check_limit_exceeding(Payload::Batch(&texts)));
        return Ok(());
    }

    info!("Backend:  {}", translator.name());
    info!("Direction: {} -> {}", from, to);

    let results = match translator.translate_batch(&texts, from, to).await {
        Ok(results) => results,
        Err(TranslateError::Partial { results, source, .. }) => {
            warn!("Translation stopped early: {}", source);
            results
        }
        Err(e) => return Err(e.into()),
    };

    let mut missing = 0;
    for (i, result) in results.iter().enumerate() {
        match result {
            Some(text) => println!("{}", text),
            None => {
                missing += 1;
                warn!("No translation for text {}", i);
                println!();
            }
        }
    }

    if missing > 0 {
        anyhow::bail!("{} of {} text(s) could not be translated", missing, results.len());
    }

    Ok(())
}
