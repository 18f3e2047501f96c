use clap::{Parser, Subcommand};
use quran_reader::notifications::{LogSink, NotificationScheduler};
use quran_reader::translation::{MockMode, MockSource, TranslationSource, TranslationState};
use quran_reader::{
    Corpus, DailyVerseTracker, KeyValueStore, ReaderConfig, ReadingProgressStore,
    TranslationService, VerseKey,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quran-reader", version, about = "Read verses with lazily fetched Urdu translations")]
struct Cli {
    /// JSON configuration file
    #[arg(long, short, env = "QURAN_READER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory for cached translations and progress
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Translation edition, e.g. ur.jalandhry
    #[arg(long, global = true)]
    edition: Option<String>,

    /// Use the mock translation source instead of the remote API
    #[arg(long, short, global = true)]
    mock: bool,

    /// Show debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List chapters, optionally filtered
    Chapters {
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Print a chapter, optionally with translations
    Chapter {
        id: u32,
        #[arg(long, short)]
        translate: bool,
    },
    /// Print one verse with its translation and record it as read
    Verse { chapter: u32, verse: u32 },
    /// Today's verse
    Daily,
    /// Translate verses given as <chapter>:<verse>
    Translate {
        #[arg(required = true)]
        keys: Vec<VerseKey>,
    },
    /// Fetch and cache every translation of a chapter
    Preload { chapter: u32 },
    #[command(subcommand)]
    Cache(CacheCommand),
    #[command(subcommand)]
    Bookmark(BookmarkCommand),
    /// Reading statistics and recent sessions
    Progress {
        /// Print the progress as JSON
        #[arg(long, conflicts_with_all = ["import", "reset"])]
        export: bool,
        /// Restore progress from an exported JSON file
        #[arg(long)]
        import: Option<PathBuf>,
        #[arg(long)]
        reset: bool,
    },
    #[command(subcommand)]
    Notify(NotifyCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    Stats,
    Clear,
}

#[derive(Subcommand)]
enum BookmarkCommand {
    Add {
        chapter: u32,
        verse: u32,
        #[arg(long, short)]
        note: Option<String>,
    },
    List,
    Remove { id: String },
}

#[derive(Subcommand)]
enum NotifyCommand {
    Enable,
    Disable,
    Test,
    /// Keep running and deliver the daily reminder until interrupted
    Run,
}

struct App {
    config: ReaderConfig,
    corpus: Corpus,
    store: Arc<dyn KeyValueStore>,
    mock: bool,
}

impl App {
    fn translations(&self) -> Result<TranslationService, Box<dyn std::error::Error>> {
        let source: Arc<dyn TranslationSource> = if self.mock {
            Arc::new(MockSource::with_delay(MockMode::Echo, 150))
        } else {
            Arc::new(self.config.translation_source()?)
        };
        Ok(TranslationService::with_options(
            source,
            self.store.clone(),
            self.config.cache_options()?,
        ))
    }

    fn scheduler(&self) -> Result<NotificationScheduler, Box<dyn std::error::Error>> {
        Ok(NotificationScheduler::new(
            Arc::new(LogSink),
            self.store.clone(),
            self.config.notification_time()?,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ReaderConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(edition) = cli.edition {
        config.translation_edition = edition;
    }

    let app = App {
        corpus: config.load_corpus()?,
        store: Arc::new(config.open_store()?),
        config,
        mock: cli.mock,
    };

    match cli.command {
        Command::Chapters { search } => list_chapters(&app, search.as_deref()),
        Command::Chapter { id, translate } => show_chapter(&app, id, translate).await?,
        Command::Verse { chapter, verse } => show_verse(&app, chapter, verse).await?,
        Command::Daily => show_daily(&app).await?,
        Command::Translate { keys } => translate(&app, &keys).await?,
        Command::Preload { chapter } => preload(&app, chapter).await?,
        Command::Cache(command) => cache(&app, command)?,
        Command::Bookmark(command) => bookmark(&app, command)?,
        Command::Progress {
            export,
            import,
            reset,
        } => progress(&app, export, import, reset)?,
        Command::Notify(command) => notify(&app, command).await?,
    }

    Ok(())
}

fn list_chapters(app: &App, search: Option<&str>) {
    let chapters: Vec<_> = match search {
        Some(query) => app.corpus.search_chapters(query),
        None => app.corpus.all_chapters().iter().collect(),
    };
    if chapters.is_empty() {
        println!("No chapters found");
        return;
    }
    for chapter in chapters {
        println!(
            "{:>3}. {} ({}) - {}, {} verses",
            chapter.id, chapter.transliteration, chapter.name, chapter.translation, chapter.total_verses
        );
    }
}

fn unknown_chapter(id: u32) -> Box<dyn std::error::Error> {
    format!("Unknown chapter {}", id).into()
}

async fn show_chapter(
    app: &App,
    id: u32,
    translate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let chapter = app.corpus.chapter_by_id(id).ok_or_else(|| unknown_chapter(id))?;
    println!("📖 {} - {}", chapter.transliteration, chapter.name);
    println!();

    let service = if translate {
        let service = app.translations()?;
        service.preload_translations(&app.corpus.chapter_keys(id)).await;
        Some(service)
    } else {
        None
    };

    for (number, text) in app.corpus.chapter_verses(id) {
        println!("[{}] {}", number, text);
        if let Some(service) = &service {
            let key = VerseKey::new(id, number)?;
            println!("    {}", service.get_state(key).text());
        }
    }
    Ok(())
}

async fn show_verse(app: &App, chapter: u32, verse: u32) -> Result<(), Box<dyn std::error::Error>> {
    let data = app
        .corpus
        .verse(chapter, verse)
        .ok_or_else(|| format!("Unknown verse {}:{}", chapter, verse))?;
    let key = data.key()?;

    let service = app.translations()?;
    let _updates = service.subscribe(key, move |state| {
        if let TranslationState::Failed { reason, .. } = state {
            eprintln!("⚠️  {}: {}", key, reason);
        }
    });
    let translation = service.load_translation(key).await;

    println!("📖 {} ({}) {}", data.chapter_name, data.chapter_name_original, key);
    println!("{}", data.text);
    println!("{}", translation);

    let progress = ReadingProgressStore::new(app.store.clone());
    progress.update_reading_position(chapter, verse);
    if app.corpus.chapter_by_id(chapter).map(|c| c.total_verses) == Some(verse) {
        progress.mark_chapter_completed(chapter);
    }
    progress.end_current_session();
    Ok(())
}

async fn show_daily(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let daily = DailyVerseTracker::new(app.store.clone()).todays_verse(&app.corpus)?;
    let key = daily.verse.key()?;
    let translation = app.translations()?.load_translation(key).await;

    println!(
        "🌟 Verse {} - {} ({}) {}",
        daily.number, daily.verse.chapter_name, daily.verse.chapter_name_original, key
    );
    println!("{}", daily.verse.text);
    println!("{}", translation);
    Ok(())
}

async fn translate(app: &App, keys: &[VerseKey]) -> Result<(), Box<dyn std::error::Error>> {
    let service = app.translations()?;
    for &key in keys {
        let text = service.load_translation(key).await;
        match service.get_state(key).error() {
            Some(reason) => println!("{} ❌ {} ({})", key, text, reason),
            None => println!("{} {}", key, text),
        }
    }
    Ok(())
}

async fn preload(app: &App, chapter: u32) -> Result<(), Box<dyn std::error::Error>> {
    let keys = app.corpus.chapter_keys(chapter);
    if keys.is_empty() {
        return Err(unknown_chapter(chapter));
    }
    let service = app.translations()?;
    service.preload_translations(&keys).await;

    let failed = keys
        .iter()
        .filter(|&&key| service.get_state(key).error().is_some())
        .count();
    println!(
        "✅ Preloaded {} verses of chapter {} ({} failed)",
        keys.len() - failed,
        chapter,
        failed
    );
    Ok(())
}

fn cache(app: &App, command: CacheCommand) -> Result<(), Box<dyn std::error::Error>> {
    let service = app.translations()?;
    match command {
        CacheCommand::Stats => {
            let stats = service.cache_stats();
            println!("Cached translations: {}", stats.total_cached);
            println!("Cache size: {} bytes", stats.cache_size);
            println!("Source: {}", service.source_name());
        }
        CacheCommand::Clear => {
            service.clear_cache();
            println!("🗑️  Translation cache cleared");
        }
    }
    Ok(())
}

fn bookmark(app: &App, command: BookmarkCommand) -> Result<(), Box<dyn std::error::Error>> {
    let progress = ReadingProgressStore::new(app.store.clone());
    match command {
        BookmarkCommand::Add {
            chapter,
            verse,
            note,
        } => {
            let data = app
                .corpus
                .verse(chapter, verse)
                .ok_or_else(|| format!("Unknown verse {}:{}", chapter, verse))?;
            let bookmark = progress.add_bookmark(
                chapter,
                verse,
                &data.chapter_name,
                &data.text,
                note.as_deref(),
            );
            println!("🔖 Added bookmark {}", bookmark.id);
        }
        BookmarkCommand::List => {
            let bookmarks = progress.get_bookmarks();
            if bookmarks.is_empty() {
                println!("No bookmarks");
            }
            for bookmark in bookmarks {
                println!(
                    "{}  {}:{} {}{}",
                    bookmark.id,
                    bookmark.chapter_id,
                    bookmark.verse_id,
                    bookmark.chapter_name,
                    bookmark
                        .note
                        .map(|note| format!(" - {}", note))
                        .unwrap_or_default()
                );
            }
        }
        BookmarkCommand::Remove { id } => {
            if progress.remove_bookmark(&id) {
                println!("Removed bookmark {}", id);
            } else {
                return Err(format!("No bookmark with id {}", id).into());
            }
        }
    }
    Ok(())
}

fn progress(
    app: &App,
    export: bool,
    import: Option<PathBuf>,
    reset: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = ReadingProgressStore::new(app.store.clone());

    if export {
        println!("{}", progress.export_progress());
        return Ok(());
    }
    if let Some(path) = import {
        let data = std::fs::read_to_string(&path)?;
        if !progress.import_progress(&data) {
            return Err(format!("Could not import progress from {}", path.display()).into());
        }
        println!("✅ Imported progress from {}", path.display());
    }
    if reset {
        progress.reset_progress();
        println!("Progress reset");
        return Ok(());
    }

    let stats = progress.get_reading_stats();
    if let Some(current) = progress.get_progress() {
        println!(
            "Current position: {}:{}",
            current.current_chapter, current.current_verse
        );
    }
    println!("Verses read: {}", stats.total_verses_read);
    println!("Completed chapters: {}", stats.completed_chapters);
    println!("Daily streak: {}", stats.daily_streak);
    println!("Complete: {:.2}%", stats.percentage_complete);
    println!("Average verses per day: {:.1}", stats.average_verses_per_day);
    println!("Reading time: {} min", stats.total_reading_time);

    let recent = progress.recent_sessions(5);
    if !recent.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in recent {
            println!(
                "  {} chapter {}, {} verses, {} min",
                session.start_time.format("%Y-%m-%d %H:%M"),
                session.chapter_id,
                session.verses_read.len(),
                session.duration_minutes
            );
        }
    }
    Ok(())
}

async fn notify(app: &App, command: NotifyCommand) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = app.scheduler()?;
    match command {
        NotifyCommand::Enable => {
            if scheduler.enable_notifications().await {
                println!(
                    "🔔 Daily reminders enabled at {}",
                    scheduler.notification_time().format("%H:%M")
                );
            } else {
                return Err("Notification permission was not granted".into());
            }
        }
        NotifyCommand::Disable => {
            scheduler.disable_notifications();
            println!("🔕 Daily reminders disabled");
        }
        NotifyCommand::Test => {
            if !scheduler.test_notification().await {
                return Err("Notifications are not available".into());
            }
        }
        NotifyCommand::Run => {
            if !scheduler.restore()? {
                return Err("Daily reminders are not enabled; run `notify enable` first".into());
            }
            println!(
                "⏰ Waiting for {} every day, press Ctrl-C to stop",
                scheduler.notification_time().format("%H:%M")
            );
            tokio::signal::ctrl_c().await?;
        }
    }
    Ok(())
}
