use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use threadsync::cache::{CacheLayer, NoopStorage, SnapshotStorage, SqliteStorage};
use threadsync::config::Config;
use threadsync::forum::cache::CollectionKey;
use threadsync::forum::client::ForumClient;
use threadsync::forum::transport::ReqwestTransport;
use threadsync::forum::types::{Forest, Thread, ThreadId};
use threadsync::store::ThreadStore;

#[derive(Parser, Debug)]
#[command(name = "threadsync")]
#[command(about = "Browse a discussion board from the terminal, with an offline cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/threadsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List threads, newest pages first
  List {
    /// Number of pages to show
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Show the comment tree of a thread
  Comments { thread_id: u64 },
  /// Upvote (or downvote) a thread
  Vote {
    thread_id: u64,
    #[arg(long)]
    down: bool,
  },
  /// Fetch the first page again, ignoring the cache
  Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = threadsync::logging::init(&config.log_level)?;

  if config.cache.enabled {
    let storage = match &config.cache.path {
      Some(path) => SqliteStorage::open_at(path)?,
      None => SqliteStorage::open()?,
    };
    run(&config, storage, args.command).await
  } else {
    run(&config, NoopStorage, args.command).await
  }
}

async fn run<S: SnapshotStorage>(config: &Config, storage: S, command: Command) -> Result<()> {
  let transport = ReqwestTransport::new(&config.api, Config::get_api_token())?;
  let key = CollectionKey::new(config.api.url.as_str(), config.store.page_size);
  tracing::info!(collection = %key.description(), "opening thread store");

  let store = ThreadStore::new(
    ForumClient::new(transport),
    CacheLayer::new(storage, key.cache_hash()),
    &config.store,
  );

  if !matches!(command, Command::Refresh) {
    let outcome = store.initialize().await;
    if outcome.is_best_effort() {
      eprintln!(
        "offline: showing {} cached threads{}",
        outcome.threads,
        outcome
          .cached_at
          .map(|at| format!(" from {}", at.format("%Y-%m-%d %H:%M")))
          .unwrap_or_default()
      );
    }
  }

  match command {
    Command::List { pages } => {
      for _ in 1..pages {
        if !store.load_more().await? {
          break;
        }
      }
      for thread in store.threads() {
        print_thread(&thread);
      }
    }
    Command::Comments { thread_id } => {
      let forest = store.comments(ThreadId(thread_id)).await?;
      print_forest(&forest, 0);
    }
    Command::Vote { thread_id, down } => {
      let counts = store.vote_thread(ThreadId(thread_id), !down).await?;
      println!("#{}  +{} -{}", thread_id, counts.upvotes, counts.downvotes);
    }
    Command::Refresh => {
      let count = store.refresh().await?;
      println!("fetched {} threads", count);
    }
  }

  store.flush()?;
  store.dispose();
  Ok(())
}

fn print_thread(thread: &Thread) {
  let marker = if thread.solved { "✓" } else { " " };
  println!(
    "{} #{:<6} +{:<4} -{:<4} {}",
    marker, thread.id.0, thread.upvotes, thread.downvotes, thread.title
  );
}

fn print_forest(forest: &Forest, depth: usize) {
  for node in forest {
    let comment = &node.comment;
    let best = if comment.best_answer { " [best]" } else { "" };
    println!(
      "{}#{} {} (+{} -{}){}: {}",
      "  ".repeat(depth),
      comment.id,
      comment.author,
      comment.upvotes,
      comment.downvotes,
      best,
      comment.content
    );
    print_forest(&node.replies, depth + 1);
  }
}
