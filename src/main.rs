use glance::{
    cli::Cli,
    clock::{Clock, SystemClock},
    config::Config,
    logging,
    segmenter,
    session::ReadingSession,
    source::FsSource,
    statistics::format_reading_time,
    store::{Persistence, SharedPersistence, SqliteStore},
    ui::overlay::Overlay,
};

use clap::Parser;
use eyre::Result;
use std::path::Path;
use std::rc::Rc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::new(cli.config.clone())?;

    let level = logging::level_from_flags(cli.verbose, cli.debug);
    if let Err(err) = logging::init(level, &config.log_path()) {
        eprintln!("Warning: Could not open log file: {}", err);
    }

    if cli.dump {
        return match cli.file.as_deref() {
            Some(path) => dump_chapters(path),
            None => Err(eyre::eyre!("--dump needs a FILE")),
        };
    }

    let store = SqliteStore::open(config.store_path())?;
    let persistence = Persistence::new(Box::new(store)).shared();
    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());

    if cli.history {
        print_history(clock, persistence);
    } else if cli.stats {
        print_stats(clock, persistence);
    } else {
        run_overlay(cli.file.as_deref(), config, clock, persistence)?;
    }

    Ok(())
}

fn dump_chapters(path: &Path) -> Result<()> {
    let file = FsSource::read(path)?;
    let chapters = segmenter::segment(&file.content);

    if chapters.is_empty() {
        println!("No chapters found in {}", file.display_name);
        return Ok(());
    }
    for chapter in chapters {
        println!("{:>6}  {}", chapter.line_index + 1, chapter.title);
    }
    Ok(())
}

fn print_history(clock: Rc<dyn Clock>, persistence: SharedPersistence) {
    let mut session = ReadingSession::new(clock, persistence);
    session.load();

    if session.books().is_empty() {
        println!("No books in history");
        return;
    }
    for (i, book) in session.books().iter().enumerate() {
        let progress = match session.progress_for(&book.id) {
            Some(entry) => format!(
                "line {}, last read {}",
                entry.line + 1,
                entry.last_read.format("%Y-%m-%d %H:%M")
            ),
            None => "not started".to_string(),
        };
        println!("{:>3}. {}  ({})  {}", i + 1, book.display_name, progress, book.path);
    }
}

fn print_stats(clock: Rc<dyn Clock>, persistence: SharedPersistence) {
    let mut session = ReadingSession::new(clock, persistence);
    session.load();
    let stats = session.statistics();

    println!("Today: {}", format_reading_time(stats.today_seconds));
    println!("Total: {}", format_reading_time(stats.total_seconds));
    for book in session.books() {
        let seconds = stats.book_seconds(&book.id);
        if seconds > 0 {
            println!("  {}: {}", book.display_name, format_reading_time(seconds));
        }
    }
}

fn run_overlay(
    file: Option<&Path>,
    config: Config,
    clock: Rc<dyn Clock>,
    persistence: SharedPersistence,
) -> Result<()> {
    let mut overlay = Overlay::new(config, persistence, clock);
    match file {
        Some(path) => {
            overlay.open_path(path)?;
        }
        None => {
            overlay.open_last_read()?;
        }
    }
    overlay.run()
}
