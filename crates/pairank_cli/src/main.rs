mod config;
mod output;
mod simulate;

use clap::{Parser, Subcommand};
use log::debug;
use pairank_core::{
    init_logging, open_db, Collection, CollectionService, CreateCollectionRequest, Glicko2Config,
    HistoryOrder, Item, RankingQuery, RankingService, RatingModelKind, ServiceError, SqliteStore,
    VoteHistoryQuery,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::{config_path, create_default_config, load_config};
use crate::simulate::{run_simulation, SimulationParams};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "pairank", version, about = "Rank media collections by pairwise votes")]
struct Cli {
    /// SQLite database file (default: config value, then ./pairank.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to config file (default: ~/.config/pairank/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage collections
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Manage items of a collection
    #[command(subcommand)]
    Item(ItemCommand),
    /// Record that WINNER beat LOSER
    Vote {
        collection: String,
        winner: String,
        loser: String,
    },
    /// Suggest the next pair to vote on
    Pair {
        collection: String,
        /// Seed the selection RNG for reproducible pairs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show items by rating, best first
    Ranking {
        collection: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show recorded votes
    History {
        collection: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// List oldest votes first
        #[arg(long)]
        oldest_first: bool,
        /// Only votes whose winner or loser label contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show reliability and votes still needed
    Stats {
        collection: String,
        /// Target reliability in percent (default: next tier)
        #[arg(long)]
        target: Option<f64>,
    },
    /// Delete votes by sequence number and recompute ratings
    DeleteVote {
        collection: String,
        #[arg(required = true)]
        seqs: Vec<i64>,
    },
    /// Rebuild every rating of a collection from its votes
    Recompute { collection: String },
    /// Check stored ratings against a replay of the votes
    Verify { collection: String },
    /// Simulate voting on items with a known order
    Simulate(SimulateArgs),
    /// Create a default config file at ~/.config/pairank/config.toml
    Init,
}

#[derive(Subcommand)]
enum CollectionCommand {
    /// Create a collection
    Create {
        name: String,
        /// Rating model: "elo" or "glicko2"
        #[arg(long, value_parser = parse_model)]
        model: Option<RatingModelKind>,
        #[arg(long)]
        k_factor: Option<i64>,
    },
    /// List collections
    List,
    /// Rename a collection
    Rename { collection: String, name: String },
    /// Delete a collection with its items and votes
    Delete { collection: String },
    /// Switch the rating model settings and recompute
    SetModel {
        collection: String,
        #[arg(value_parser = parse_model)]
        model: RatingModelKind,
        #[arg(long)]
        k_factor: Option<i64>,
        /// Glicko-2 volatility constraint (default: keep current)
        #[arg(long)]
        tau: Option<f64>,
        /// Glicko-2 convergence tolerance (default: keep current)
        #[arg(long)]
        epsilon: Option<f64>,
    },
}

#[derive(Subcommand)]
enum ItemCommand {
    /// Add one or more items
    Add {
        collection: String,
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// List items
    List { collection: String },
    /// Delete an item with its votes and recompute
    Delete { collection: String, item: String },
}

#[derive(Parser)]
struct SimulateArgs {
    /// Number of simulated items
    #[arg(long, default_value_t = 50)]
    items: usize,
    #[arg(long, value_parser = parse_model, default_value = "elo")]
    model: RatingModelKind,
    #[arg(long, default_value_t = 16)]
    k_factor: i64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Votes between samples
    #[arg(long, default_value_t = 10)]
    sample_every: usize,
    /// Stop once the estimated reliability reaches this value
    #[arg(long, default_value_t = 99.0)]
    stop_at: f64,
    #[arg(long, default_value_t = 100_000)]
    max_votes: usize,
}

fn parse_model(value: &str) -> Result<RatingModelKind, String> {
    RatingModelKind::parse(value)
        .ok_or_else(|| format!("unknown rating model `{value}`; expected elo or glicko2"))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        bail(e);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Commands::Init = cli.command {
        let path = create_default_config();
        println!("Created {}", path.display());
        return Ok(());
    }

    let config_file = cli.config.clone().unwrap_or_else(config_path);
    let config = load_config(&config_file);
    if let Some(logging) = config.logging() {
        init_logging(&logging)?;
    }

    if let Commands::Simulate(args) = &cli.command {
        let params = SimulationParams {
            items: args.items,
            model: args.model,
            k_factor: args.k_factor,
            seed: args.seed,
            sample_every: args.sample_every,
            stop_at: args.stop_at,
            max_votes: args.max_votes,
        };
        let report = run_simulation(&params, config.rating)?;
        if cli.json {
            output::print_json(&report);
        } else {
            output::print_simulation(&report);
        }
        return Ok(());
    }

    let db_path = config.database_path(cli.db.as_deref());
    let conn = open_db(&db_path)?;
    debug!(
        "event=cli_open module=cli status=ok db={} config={}",
        db_path.display(),
        config_file.display()
    );
    let store = SqliteStore::try_new(&conn)?;
    let collections = CollectionService::try_new(store, config.rating)?;
    let ranking = RankingService::try_new(store, config.rating)?;
    let ctx = Context {
        collections,
        ranking,
        json: cli.json,
    };

    match cli.command {
        Commands::Collection(command) => ctx.collection(command),
        Commands::Item(command) => ctx.item(command),
        Commands::Vote {
            collection,
            winner,
            loser,
        } => {
            let collection = ctx.resolve_collection(&collection)?;
            let winner = ctx.resolve_item(&collection, &winner)?;
            let loser = ctx.resolve_item(&collection, &loser)?;
            let recorded = ctx
                .ranking
                .record_vote(winner.uuid, loser.uuid, collection.uuid)?;
            if ctx.json {
                output::print_json(&recorded);
            } else {
                println!(
                    "Vote #{} recorded: {} > {}",
                    recorded.vote.seq, winner.label, loser.label
                );
            }
            Ok(())
        }
        Commands::Pair { collection, seed } => {
            let collection = ctx.resolve_collection(&collection)?;
            let pair = match seed {
                Some(seed) => ctx
                    .ranking
                    .next_pair_with_rng(collection.uuid, &mut StdRng::seed_from_u64(seed))?,
                None => ctx.ranking.next_pair(collection.uuid)?,
            };
            let Some((a, b)) = pair else {
                if ctx.json {
                    output::print_json(&Option::<(Item, Item)>::None);
                } else {
                    println!("Not enough items to form a pair.");
                }
                return Ok(());
            };
            let (a, b) = (ctx.ranking.get_item(a)?, ctx.ranking.get_item(b)?);
            if ctx.json {
                output::print_json(&(a, b));
            } else {
                let (p_a, p_b) = ctx.ranking.expected_score(&a, &b)?;
                println!("{}  ({:.0}% expected)", a.label, p_a * 100.0);
                println!("{}  ({:.0}% expected)", b.label, p_b * 100.0);
            }
            Ok(())
        }
        Commands::Ranking {
            collection,
            limit,
            offset,
        } => {
            let collection = ctx.resolve_collection(&collection)?;
            let page = ctx
                .ranking
                .ranking(collection.uuid, &RankingQuery { limit, offset })?;
            if ctx.json {
                output::print_json(&page);
            } else {
                output::print_ranking(&page);
            }
            Ok(())
        }
        Commands::History {
            collection,
            limit,
            offset,
            oldest_first,
            filter,
        } => {
            let collection = ctx.resolve_collection(&collection)?;
            let query = VoteHistoryQuery {
                limit,
                offset,
                order: if oldest_first {
                    HistoryOrder::OldestFirst
                } else {
                    HistoryOrder::NewestFirst
                },
                label_filter: filter,
            };
            let page = ctx.ranking.history(collection.uuid, &query)?;
            if ctx.json {
                output::print_json(&page);
            } else {
                output::print_history(&page);
            }
            Ok(())
        }
        Commands::Stats { collection, target } => {
            let collection = ctx.resolve_collection(&collection)?;
            let stats = ctx.ranking.stats(collection.uuid, target)?;
            if ctx.json {
                output::print_json(&stats);
            } else {
                output::print_stats(&stats);
            }
            Ok(())
        }
        Commands::DeleteVote { collection, seqs } => {
            let collection = ctx.resolve_collection(&collection)?;
            let ratings = ctx.ranking.delete_votes(collection.uuid, &seqs)?;
            ctx.print_ratings(&ratings);
            Ok(())
        }
        Commands::Recompute { collection } => {
            let collection = ctx.resolve_collection(&collection)?;
            let ratings = ctx.ranking.recompute(collection.uuid)?;
            ctx.print_ratings(&ratings);
            Ok(())
        }
        Commands::Verify { collection } => {
            let collection = ctx.resolve_collection(&collection)?;
            let report = ctx.ranking.verify(collection.uuid)?;
            if ctx.json {
                output::print_json(&report);
            } else {
                output::print_report(&report);
            }
            if !report.is_consistent() {
                return Err(format!(
                    "{} items differ from the vote ledger; run `pairank recompute`",
                    report.violations.len()
                )
                .into());
            }
            Ok(())
        }
        Commands::Simulate(_) | Commands::Init => Ok(()),
    }
}

struct Context<'conn> {
    collections: CollectionService<SqliteStore<'conn>>,
    ranking: RankingService<SqliteStore<'conn>>,
    json: bool,
}

impl Context<'_> {
    fn collection(&self, command: CollectionCommand) -> Result<(), Box<dyn Error>> {
        match command {
            CollectionCommand::Create {
                name,
                model,
                k_factor,
            } => {
                let collection = self.collections.create_collection(&CreateCollectionRequest {
                    name,
                    rating_model: model,
                    k_factor,
                })?;
                self.print_collection(&collection);
            }
            CollectionCommand::List => {
                let collections = self.collections.list_collections()?;
                if self.json {
                    output::print_json(&collections);
                } else {
                    output::print_collections(&collections);
                }
            }
            CollectionCommand::Rename { collection, name } => {
                let collection = self.resolve_collection(&collection)?;
                let renamed = self.collections.rename_collection(collection.uuid, &name)?;
                self.print_collection(&renamed);
            }
            CollectionCommand::Delete { collection } => {
                let collection = self.resolve_collection(&collection)?;
                self.collections.delete_collection(collection.uuid)?;
                if !self.json {
                    println!("Deleted collection {}", collection.name);
                }
            }
            CollectionCommand::SetModel {
                collection,
                model,
                k_factor,
                tau,
                epsilon,
            } => {
                let collection = self.resolve_collection(&collection)?;
                let glicko2 = Glicko2Config {
                    tau: tau.unwrap_or(collection.glicko2.tau),
                    epsilon: epsilon.unwrap_or(collection.glicko2.epsilon),
                };
                let ratings = self.collections.set_rating_model(
                    collection.uuid,
                    model,
                    k_factor,
                    Some(glicko2),
                )?;
                self.print_ratings(&ratings);
            }
        }
        Ok(())
    }

    fn item(&self, command: ItemCommand) -> Result<(), Box<dyn Error>> {
        match command {
            ItemCommand::Add { collection, labels } => {
                let collection = self.resolve_collection(&collection)?;
                let mut added = Vec::with_capacity(labels.len());
                for label in &labels {
                    added.push(self.ranking.add_item(collection.uuid, label)?);
                }
                if self.json {
                    output::print_json(&added);
                } else {
                    output::print_items(&added);
                }
            }
            ItemCommand::List { collection } => {
                let collection = self.resolve_collection(&collection)?;
                let items = self.ranking.list_items(collection.uuid)?;
                if self.json {
                    output::print_json(&items);
                } else {
                    output::print_items(&items);
                }
            }
            ItemCommand::Delete { collection, item } => {
                let collection = self.resolve_collection(&collection)?;
                let item = self.resolve_item(&collection, &item)?;
                let deleted = self.ranking.delete_item(item.uuid)?;
                if self.json {
                    output::print_json(&deleted);
                } else {
                    println!(
                        "Deleted {} and {} votes",
                        deleted.item.label, deleted.removed_votes
                    );
                }
            }
        }
        Ok(())
    }

    /// Accepts a collection UUID or its exact name.
    fn resolve_collection(&self, reference: &str) -> Result<Collection, ServiceError> {
        if let Ok(uuid) = Uuid::parse_str(reference.trim()) {
            return self.collections.get_collection(uuid);
        }
        self.collections.find_by_name(reference)?.ok_or_else(|| {
            ServiceError::InvalidInput(format!("no collection named `{}`", reference.trim()))
        })
    }

    /// Accepts an item UUID or its exact label within `collection`.
    fn resolve_item(&self, collection: &Collection, reference: &str) -> Result<Item, ServiceError> {
        if let Ok(uuid) = Uuid::parse_str(reference.trim()) {
            let item = self.ranking.get_item(uuid)?;
            if item.collection_uuid != collection.uuid {
                return Err(ServiceError::ItemNotInCollection {
                    item_uuid: uuid,
                    collection_uuid: collection.uuid,
                });
            }
            return Ok(item);
        }
        self.ranking
            .find_item_by_label(collection.uuid, reference)?
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "no item labelled `{}` in collection `{}`",
                    reference.trim(),
                    collection.name
                ))
            })
    }

    fn print_collection(&self, collection: &Collection) {
        if self.json {
            output::print_json(collection);
        } else {
            output::print_collections(std::slice::from_ref(collection));
        }
    }

    fn print_ratings(
        &self,
        ratings: &std::collections::BTreeMap<pairank_core::ItemId, pairank_core::RatingState>,
    ) {
        if self.json {
            output::print_json(ratings);
        } else {
            output::print_ratings(ratings);
        }
    }
}
