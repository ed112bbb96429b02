use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use recall_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Spaced-repetition flashcard scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learner whose cards are scheduled
    #[arg(long, global = true, default_value = "default")]
    user: String,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a card (due immediately)
    Add {
        card: String,

        #[arg(long)]
        deck: Option<String>,
    },

    /// Stop tracking a card
    Remove { card: String },

    /// Record a rating (again, hard, good, easy or 0-3) for a card
    Review { card: String, rating: String },

    /// List cards due now, learning cards first
    Due {
        #[arg(long)]
        deck: Option<String>,

        /// Show at most this many cards
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show new / learning / review / due counts
    Stats {
        #[arg(long)]
        deck: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show when each rating would schedule a card next
    Preview { card: String },

    /// Import a card's legacy 0-5 progress score
    Migrate {
        card: String,
        score: u8,

        #[arg(long)]
        deck: Option<String>,
    },

    /// Show the current review streak and recent daily activity
    Streak {
        /// Days of activity to list (the streak always uses full history)
        #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },

    /// Roll up the review log into the CSV archive
    Rollup {
        /// Delete processed logs after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// File locations inside a data directory
struct DataPaths {
    cards: PathBuf,
    log_dir: PathBuf,
    log: PathBuf,
    archive: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let log_dir = data_dir.join("log");
        Self {
            cards: data_dir.join("cards.json"),
            log: log_dir.join("reviews.jsonl"),
            log_dir,
            archive: data_dir.join("reviews.csv"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    recall_core::logging::init_with_level(recall_core::logging::level_for_verbosity(cli.verbose));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data.data_dir.clone());
    tracing::info!("Using data directory {:?}", data_dir);
    let paths = DataPaths::new(&data_dir);
    let scheduler = Scheduler::new(config.scheduler.clone())?;
    let user = cli.user.as_str();

    // The only place the clock is read
    let now = Utc::now();

    match cli.command {
        Commands::Add { card, deck } => cmd_add(&paths, &scheduler, user, card, deck, now),
        Commands::Remove { card } => cmd_remove(&paths, user, card),
        Commands::Review { card, rating } => {
            let rating: Rating = rating.parse()?;
            cmd_review(&paths, &scheduler, user, card, rating, now)
        }
        Commands::Due { deck, limit } => cmd_due(&paths, user, deck, limit, now),
        Commands::Stats { deck, json } => cmd_stats(&paths, user, deck, json, now),
        Commands::Preview { card } => cmd_preview(&paths, &scheduler, user, card, now),
        Commands::Migrate { card, score, deck } => {
            cmd_migrate(&paths, &scheduler, user, card, score, deck, now)
        }
        Commands::Streak { days } => cmd_streak(&paths, user, days, now),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

fn cmd_add(
    paths: &DataPaths,
    scheduler: &Scheduler,
    user: &str,
    card: String,
    deck: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut store = JsonCardStore::new(&paths.cards);
    let record = CardRecord {
        key: CardKey::new(user, card),
        deck_id: deck,
        state: scheduler.new_card(now),
    };
    let key = record.key.clone();

    if store.insert(record)? {
        println!("✓ Added {}", key.card_id);
    } else {
        println!("{} is already tracked", key.card_id);
    }
    Ok(())
}

fn cmd_remove(paths: &DataPaths, user: &str, card: String) -> Result<()> {
    let mut store = JsonCardStore::new(&paths.cards);
    let key = CardKey::new(user, card);

    if store.remove(&key)? {
        println!("✓ Removed {}", key.card_id);
        Ok(())
    } else {
        Err(Error::CardNotFound {
            user_id: key.user_id,
            card_id: key.card_id,
        })
    }
}

fn cmd_review(
    paths: &DataPaths,
    scheduler: &Scheduler,
    user: &str,
    card: String,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut store = JsonCardStore::new(&paths.cards);
    let key = CardKey::new(user, card);

    // First exposure: start tracking before applying the rating
    store.insert(CardRecord {
        key: key.clone(),
        deck_id: None,
        state: scheduler.new_card(now),
    })?;

    let mut before = None;
    let record = store.update(&key, |current| {
        before = Some(current.state.clone());
        scheduler.transition(&current.state, rating, now)
    })?;

    if let Some(before) = before {
        let entry = ReviewEntry::new(&key, rating, &before, &record.state, now);
        JsonlReviewLog::new(&paths.log).append(&entry)?;
    }

    let state = &record.state;
    let phase = if state.is_learning { "learning" } else { "review" };
    println!(
        "✓ {} rated {}: next review in {} ({}, ease {:.2})",
        key.card_id,
        rating,
        format_interval(state.due_at - now),
        phase,
        state.ease_factor
    );
    Ok(())
}

fn cmd_due(
    paths: &DataPaths,
    user: &str,
    deck: Option<String>,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<()> {
    let store = JsonCardStore::new(&paths.cards);
    let records = store.cards_for(user, deck.as_deref())?;

    let due: Vec<&CardKey> = select_due(records.iter().map(|r| (&r.key, &r.state)), now)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if due.is_empty() {
        println!("Nothing due. 🎉");
        return Ok(());
    }

    for key in due {
        println!("{}", key.card_id);
    }
    Ok(())
}

fn cmd_stats(
    paths: &DataPaths,
    user: &str,
    deck: Option<String>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let store = JsonCardStore::new(&paths.cards);
    let records = store.cards_for(user, deck.as_deref())?;
    let stats = statistics(records.iter().map(|r| &r.state), &now.with_timezone(&Local));

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("New:       {}", stats.new);
    println!("Learning:  {}", stats.learning);
    println!("Review:    {}", stats.review);
    println!("Due today: {}", stats.due_today);
    println!("Overdue:   {}", stats.overdue);
    println!("Total:     {}", stats.total);
    Ok(())
}

fn cmd_preview(
    paths: &DataPaths,
    scheduler: &Scheduler,
    user: &str,
    card: String,
    now: DateTime<Utc>,
) -> Result<()> {
    let store = JsonCardStore::new(&paths.cards);
    let key = CardKey::new(user, card);
    let state = match store.get(&key)? {
        Some(record) => record.state,
        None => scheduler.new_card(now),
    };

    let labels: Vec<String> = scheduler
        .preview(&state, now)?
        .iter()
        .map(|p| format!("{} {}", p.rating, format_interval(p.delay)))
        .collect();
    println!("{}", labels.join(" | "));
    Ok(())
}

fn cmd_migrate(
    paths: &DataPaths,
    scheduler: &Scheduler,
    user: &str,
    card: String,
    score: u8,
    deck: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut store = JsonCardStore::new(&paths.cards);
    let key = CardKey::new(user, card);
    let previous = store.get(&key)?;

    let last_reviewed_at = previous.as_ref().and_then(|r| r.state.last_reviewed_at);
    let state = CardState::from_legacy_score(score, last_reviewed_at, scheduler.config(), now)?;
    let deck_id = deck.or_else(|| previous.and_then(|r| r.deck_id));

    store.put(CardRecord {
        key: key.clone(),
        deck_id,
        state: state.clone(),
    })?;

    println!(
        "✓ Migrated {} (score {}): {} interval {}d, ease {:.2}",
        key.card_id,
        score,
        if state.is_learning { "learning," } else { "review," },
        state.interval,
        state.ease_factor
    );
    Ok(())
}

fn cmd_streak(paths: &DataPaths, user: &str, days: u32, now: DateTime<Utc>) -> Result<()> {
    let entries = load_entries(&paths.log, &paths.archive, user)?;
    let local_now = now.with_timezone(&Local);

    let streak = current_streak(&entries, &local_now);
    println!("🔥 Streak: {} day{}", streak, if streak == 1 { "" } else { "s" });

    for day in recent_activity(&entries, &local_now, days) {
        println!(
            "  {}  {:>3} reviewed, {} lapsed",
            day.date, day.cards_reviewed, day.lapses
        );
    }
    Ok(())
}

fn cmd_rollup(paths: &DataPaths, cleanup: bool) -> Result<()> {
    if !paths.log.exists() {
        println!("No review log found - nothing to roll up.");
        return Ok(());
    }

    let count = recall_core::rollup::log_to_csv_and_archive(&paths.log, &paths.archive)?;
    println!("✓ Rolled up {} reviews to CSV", count);
    println!("  CSV: {}", paths.archive.display());

    if cleanup {
        let cleaned = recall_core::rollup::cleanup_processed_logs(&paths.log_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed review logs", cleaned);
        }
    }
    Ok(())
}
