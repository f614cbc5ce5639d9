//! Command-line surface (spec.md §6).
//!
//! `<cmd> ROOT_ID [--max=N] [--ignore=A,B,...] [--cache=all|complete|none]
//! [--oldest=YEAR|YEAR BC] [--tsv]`. Exit codes: 0 on completion or clean interrupt
//! (checkpointed), 1 on usage error, 2 on fatal fetch/store error.

use crate::codec::parse_year;
use crate::context::AppContext;
use crate::crawler::{CacheMode, CrawlConfig, Crawler, HttpFetcher};
use crate::jobs::JobKind;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::collections::HashSet;
use tracing::error;

#[derive(Parser)]
#[command(name = "kinmap", about = "Genealogical knowledge graph crawler and query tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override the data directory (default: platform data dir / "kinmap").
    #[arg(long, global = true, env = "KINMAP_DATA_DIR")]
    pub data_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Crawl a provider starting from ROOT_ID.
    Crawl {
        root_id: String,
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "http://localhost:8089/providers")]
        fetcher_url: String,
        #[arg(long)]
        max: Option<u32>,
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
        #[arg(long, default_value = "all")]
        cache: String,
        #[arg(long)]
        oldest: Option<String>,
        #[arg(long)]
        tsv: bool,
        #[arg(long, default_value = "default")]
        db: String,
    },
    /// Look up a person by canonical or external ID.
    Lookup { id: String, #[arg(long)] tsv: bool },
    /// Full-text search over person names/bio/occupations.
    Search { query: String, #[arg(long, default_value_t = 20)] limit: u64, #[arg(long)] tsv: bool },
    /// Find a path between two persons via a common ancestor.
    Path {
        a: String,
        b: String,
        #[arg(long, default_value = "shortest")]
        policy: String,
    },
    /// Reset all `not_found` geocode rows back to `pending`.
    GeocodeReset,
    /// Batch-geocode every place text referenced by stored vital events.
    Geocode,
    /// Print the sparse tree over a database's favorites as an indented listing.
    Tree { db_id: String },
    /// Scan a database for cross-provider linkage gaps and resolve them by scraping.
    Discover {
        db_id: String,
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "http://localhost:8089/providers")]
        fetcher_url: String,
    },
}

fn parse_cache_mode(s: &str) -> Result<CacheMode, String> {
    match s {
        "all" => Ok(CacheMode::All),
        "none" => Ok(CacheMode::None),
        "complete" => Ok(CacheMode::Complete),
        other => Err(format!("invalid --cache value: {other}")),
    }
}

/// Runs the CLI, returning the process exit code (spec.md §6: 0/1/2).
pub async fn run(cli: Cli, ctx: &AppContext) -> i32 {
    match run_inner(cli, ctx).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "fatal error");
            2
        }
    }
}

async fn run_inner(cli: Cli, ctx: &AppContext) -> anyhow::Result<i32> {
    match cli.command {
        Command::Crawl {
            root_id,
            provider,
            fetcher_url,
            max,
            ignore,
            cache,
            oldest,
            tsv: _,
            db,
        } => {
            let cache_mode = match parse_cache_mode(&cache) {
                Ok(m) => m,
                Err(msg) => {
                    eprintln!("{msg}");
                    return Ok(1);
                }
            };
            let oldest_year = oldest.as_deref().and_then(parse_year);

            let config = CrawlConfig {
                root_external_id: root_id,
                provider: provider.clone(),
                max_generations: max,
                ignore: ignore.into_iter().collect::<HashSet<_>>(),
                cache_mode,
                oldest_year,
                db_id: db.clone(),
                db_name: db,
            };

            let delay = ctx.config.providers.delay_for(&provider);
            let fetcher = HttpFetcher::new(fetcher_url);
            let crawler = Crawler::new(ctx.store.clone(), fetcher, ctx.config.provider_cache_dir(), delay);

            let jobs = ctx.jobs.clone();
            let result = jobs
                .start(JobKind::Crawl, move |emitter, token| async move {
                    let outcome = crawler
                        .run(
                            &config,
                            |current, item| emitter.progress(current, None, item, Default::default()),
                            || token.is_cancelled(),
                        )
                        .await;
                    match outcome {
                        Ok(stats) => emitter.completed(stats.stored, None),
                        Err(e) => emitter.error(0, e.to_string()),
                    }
                })
                .await;

            match result {
                Ok(mut handle) => {
                    let mut terminal_phase = None;
                    while let Ok(event) = handle.subscriber.recv().await {
                        if matches!(event.phase, crate::jobs::Phase::Completed | crate::jobs::Phase::Cancelled | crate::jobs::Phase::Error) {
                            terminal_phase = Some(event.phase);
                            break;
                        }
                    }
                    if matches!(terminal_phase, Some(crate::jobs::Phase::Error)) {
                        Ok(2)
                    } else {
                        Ok(0)
                    }
                }
                Err(_) => {
                    eprintln!("a crawl is already running");
                    Ok(1)
                }
            }
        }

        Command::Lookup { id, tsv } => {
            use crate::identity::IdentityMap;
            use crate::store::entities::person;
            use sea_orm::EntityTrait;

            let internal_id = IdentityMap::resolve(ctx.store.conn(), &id, None).await?;
            let Some(row) = person::Entity::find_by_id(internal_id).one(ctx.store.conn()).await? else {
                eprintln!("not found: {id}");
                return Ok(1);
            };
            if tsv {
                println!("{}\t{}\t{:?}", row.person_id, row.display_name, row.gender);
            } else {
                let mut table = Table::new();
                table.set_header(vec!["field", "value"]);
                table.add_row(vec!["person_id", &row.person_id]);
                table.add_row(vec!["display_name", &row.display_name]);
                println!("{table}");
            }
            Ok(0)
        }

        Command::Search { query, limit, tsv } => {
            let hits = crate::store::fts::search(ctx.store.conn(), &query, limit).await?;
            if tsv {
                for id in hits {
                    println!("{id}");
                }
            } else {
                let mut table = Table::new();
                table.set_header(vec!["person_id"]);
                for id in hits {
                    table.add_row(vec![id]);
                }
                println!("{table}");
            }
            Ok(0)
        }

        Command::Path { a, b, policy } => {
            let policy = match policy.as_str() {
                "shortest" => crate::graph::PathPolicy::Shortest,
                "longest" => crate::graph::PathPolicy::Longest,
                "random" => crate::graph::PathPolicy::Random,
                other => {
                    eprintln!("invalid --policy value: {other}");
                    return Ok(1);
                }
            };
            match crate::graph::find_path(ctx.store.conn(), &a, &b, policy).await? {
                Some(result) => {
                    println!("{}", result.path.join(" -> "));
                    Ok(0)
                }
                None => {
                    eprintln!("no common ancestor found");
                    Ok(1)
                }
            }
        }

        Command::GeocodeReset => {
            let n = crate::geocoder::reset_not_found(ctx.store.conn()).await?;
            println!("reset {n} not_found rows to pending");
            Ok(0)
        }

        Command::Geocode => {
            let geocoder = ctx.geocoder.clone();
            let jobs = ctx.jobs.clone();
            let conn = ctx.store.conn().clone();
            let result = jobs
                .start(JobKind::Geocode, move |emitter, token| async move {
                    let pending = match crate::geocoder::enqueue_places_from_events(&conn).await {
                        Ok(p) => p,
                        Err(e) => {
                            emitter.error(0, e.to_string());
                            return;
                        }
                    };
                    let outcome = crate::geocoder::run_batch(
                        &geocoder,
                        &pending,
                        |current, total| emitter.progress(current, Some(total), None, Default::default()),
                        || token.is_cancelled(),
                    )
                    .await;
                    match outcome {
                        Ok(done) => emitter.completed(done, Some(pending.len() as u64)),
                        Err(e) => emitter.error(0, e.to_string()),
                    }
                })
                .await;

            match result {
                Ok(mut handle) => {
                    let mut terminal_phase = None;
                    while let Ok(event) = handle.subscriber.recv().await {
                        if matches!(event.phase, crate::jobs::Phase::Completed | crate::jobs::Phase::Cancelled | crate::jobs::Phase::Error) {
                            terminal_phase = Some(event.phase);
                            break;
                        }
                    }
                    if matches!(terminal_phase, Some(crate::jobs::Phase::Error)) {
                        Ok(2)
                    } else {
                        Ok(0)
                    }
                }
                Err(_) => {
                    eprintln!("a geocode batch is already running");
                    Ok(1)
                }
            }
        }

        Command::Tree { db_id } => {
            use crate::store::entities::{database_info, favorite};
            use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

            let Some(db) = database_info::Entity::find_by_id(db_id.clone()).one(ctx.store.conn()).await? else {
                eprintln!("unknown database: {db_id}");
                return Ok(1);
            };
            let favorites: Vec<String> = favorite::Entity::find()
                .filter(favorite::Column::DbId.eq(db_id))
                .all(ctx.store.conn())
                .await?
                .into_iter()
                .map(|f| f.person_id)
                .collect();

            let tree = crate::graph::sparse_tree(ctx.store.conn(), &db.root_id, &favorites).await?;
            print_sparse_node(&tree, 0);
            Ok(0)
        }

        Command::Discover { db_id, provider, fetcher_url } => {
            let fetcher = crate::discovery::HttpParentLinkFetcher::new(fetcher_url);
            let delay = ctx.config.providers.delay_for(&provider);
            let jobs = ctx.jobs.clone();
            let conn = ctx.store.conn().clone();
            let result = jobs
                .start(JobKind::Discovery, move |emitter, token| async move {
                    let outcome = crate::discovery::run_bulk(
                        &conn,
                        &db_id,
                        &provider,
                        &fetcher,
                        delay,
                        |current, total| emitter.progress(current, Some(total), None, Default::default()),
                        || token.is_cancelled(),
                    )
                    .await;
                    match outcome {
                        Ok(stats) => emitter.completed(stats.resolved, Some(stats.gaps_found)),
                        Err(e) => emitter.error(0, e.to_string()),
                    }
                })
                .await;

            match result {
                Ok(mut handle) => {
                    let mut terminal_phase = None;
                    while let Ok(event) = handle.subscriber.recv().await {
                        if matches!(event.phase, crate::jobs::Phase::Completed | crate::jobs::Phase::Cancelled | crate::jobs::Phase::Error) {
                            terminal_phase = Some(event.phase);
                            break;
                        }
                    }
                    if matches!(terminal_phase, Some(crate::jobs::Phase::Error)) {
                        Ok(2)
                    } else {
                        Ok(0)
                    }
                }
                Err(_) => {
                    eprintln!("a discovery scan is already running");
                    Ok(1)
                }
            }
        }
    }
}

fn print_sparse_node(node: &crate::graph::SparseNode, indent: usize) {
    println!(
        "{}{} (gen {}, skipped {})",
        "  ".repeat(indent),
        node.person_id,
        node.generation_from_root,
        node.generations_skipped
    );
    for child in &node.children {
        print_sparse_node(child, indent + 1);
    }
}
