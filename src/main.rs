use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

use dealdeck::cache::{CacheError, CacheStore, PageSource, Pager, PagingOutcome, RefreshOutcome};
use dealdeck::catalog::cache::ReleaseWindow;
use dealdeck::catalog::cached_client::CatalogService;
use dealdeck::{config, logging, output};

#[derive(Parser, Debug)]
#[command(name = "dealdeck")]
#[command(about = "Offline-tolerant browser for game deals, giveaways and release calendars")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dealdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse a store's deals
  Deals {
    /// Store id (CheapShark numbering, 1 = Steam)
    #[arg(short, long, default_value = "1")]
    store: String,
    /// Number of pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
    /// Reload from the first page even if the cache is fresh
    #[arg(long)]
    force: bool,
  },
  /// Browse the release calendar for a date window
  Releases {
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to: NaiveDate,
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
  },
  /// Show running giveaways
  Giveaways {
    /// Platform filter, repeatable (e.g. pc, steam, epic-games-store)
    #[arg(short, long)]
    platform: Vec<String>,
    /// Refetch even if the cache is fresh
    #[arg(long)]
    force: bool,
  },
  /// Show what is cached for an owner
  Status {
    #[command(subcommand)]
    target: StatusTarget,
  },
}

#[derive(Subcommand, Debug)]
enum StatusTarget {
  Deals { store: String },
  Giveaways { platform: Option<String> },
  Releases { from: NaiveDate, to: NaiveDate },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init_logging(config.log_level)?;

  let service = CatalogService::new(&config)?;

  match args.command {
    Command::Deals {
      store,
      pages,
      force,
    } => {
      let status = service.deals_status(&store)?;
      let cached_enough = status.cursor.is_some_and(|c| c >= pages);
      if force || status.stale || !cached_enough {
        let mut pager = service.deals_pager(&store);
        load_pages(&mut pager, pages).await?;
        print_rows(&pager, output::deal_line)?;
      } else {
        info!(store = %store, "serving deals from cache");
        let pager = service.deals_pager(&store);
        print_rows(&pager, output::deal_line)?;
      }
    }
    Command::Releases { from, to, pages } => {
      let mut pager = service.releases_pager(ReleaseWindow::new(from, to));
      load_pages(&mut pager, pages).await?;
      print_rows(&pager, output::release_line)?;
    }
    Command::Giveaways { platform, force } => {
      if platform.is_empty() {
        let result = service.spawn_refresh_giveaways(None, force).await?;
        warn_or_fail(result, "all platforms")?;
        for giveaway in service.giveaways(None)? {
          println!("{}", output::giveaway_line(&giveaway));
        }
      } else {
        for (name, result) in service.refresh_many_giveaways(&platform, force).await {
          warn_or_fail(result, &name)?;
          println!("== {}", name);
          for giveaway in service.giveaways(Some(&name))? {
            println!("{}", output::giveaway_line(&giveaway));
          }
        }
      }
    }
    Command::Status { target } => {
      let line = match target {
        StatusTarget::Deals { store } => {
          output::status_line(&format!("deals for store {}", store), &service.deals_status(&store)?)
        }
        StatusTarget::Giveaways { platform } => output::status_line(
          &format!("giveaways on {}", platform.as_deref().unwrap_or("all platforms")),
          &service.giveaways_status(platform.as_deref())?,
        ),
        StatusTarget::Releases { from, to } => {
          let window = ReleaseWindow::new(from, to);
          output::status_line(
            &format!("releases {}", window.dates_param()),
            &service.releases_status(window)?,
          )
        }
      };
      println!("{}", line);
    }
  }

  Ok(())
}

/// Pull up to `pages` pages. A fetch failure keeps whatever is cached.
async fn load_pages<P: PageSource, S: CacheStore>(pager: &mut Pager<P, S>, pages: u32) -> Result<()> {
  for _ in 0..pages {
    match pager.request().await {
      PagingOutcome::Success { end_reached: true } => break,
      PagingOutcome::Success { end_reached: false } => {}
      PagingOutcome::Error(e) if e.is_fetch() => {
        eprintln!("warning: {} (showing cached rows)", e);
        break;
      }
      PagingOutcome::Error(e) => return Err(e.into()),
    }
  }
  Ok(())
}

fn print_rows<P: PageSource, S: CacheStore>(
  pager: &Pager<P, S>,
  line: fn(&P::Item) -> String,
) -> Result<()> {
  for item in pager.rows()? {
    println!("{}", line(&item));
  }
  Ok(())
}

/// Fetch failures fall back to cached rows; store failures abort.
fn warn_or_fail(result: Result<RefreshOutcome, CacheError>, label: &str) -> Result<()> {
  match result {
    Ok(_) => Ok(()),
    Err(e) if e.is_fetch() => {
      eprintln!("warning: {}: {} (showing cached giveaways)", label, e);
      Ok(())
    }
    Err(e) => Err(e.into()),
  }
}
