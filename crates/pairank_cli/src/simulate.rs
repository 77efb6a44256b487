//! Objective-order simulation.
//!
//! Items get a hidden strength (their index); every vote is won by the
//! stronger item. The run compares the estimated reliability against the
//! observed share of correctly ordered pairs in the current ranking.

use pairank_core::{
    calculate_reliability, open_db_in_memory, CollectionId, CollectionService,
    CreateCollectionRequest, ItemId,
    RankingService, RatingConfig, RatingModelKind, ServiceError, SqliteStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub items: usize,
    pub model: RatingModelKind,
    pub k_factor: i64,
    pub seed: u64,
    /// Votes between two samples.
    pub sample_every: usize,
    /// Stop once the estimate reaches this percentage.
    pub stop_at: f64,
    pub max_votes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub votes: usize,
    pub estimated: f64,
    pub observed: f64,
}

/// Point where the estimated and observed curves cross.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Crossing {
    pub votes: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub items: usize,
    pub model: RatingModelKind,
    pub total_votes: usize,
    pub samples: Vec<Sample>,
    pub crossings: Vec<Crossing>,
}

/// Runs the simulation against a private in-memory database.
pub fn run_simulation(
    params: &SimulationParams,
    rating: RatingConfig,
) -> Result<SimulationReport, Box<dyn Error>> {
    if params.items < 2 {
        return Err("simulation needs at least two items".into());
    }

    let conn = open_db_in_memory()?;
    let store = SqliteStore::try_new(&conn)?;
    let collections = CollectionService::try_new(store, rating)?;
    let ranking = RankingService::try_new(store, rating)?;

    let collection = collections.create_collection(&CreateCollectionRequest {
        name: "simulation".to_string(),
        rating_model: Some(params.model),
        k_factor: Some(params.k_factor),
    })?;

    let mut strength: HashMap<ItemId, usize> = HashMap::with_capacity(params.items);
    for index in 0..params.items {
        let item = ranking.add_item(collection.uuid, &format!("item-{index:05}"))?;
        strength.insert(item.uuid, index);
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut samples: Vec<Sample> = Vec::new();
    let mut total_votes = 0;
    let sample_every = params.sample_every.max(1);

    while total_votes < params.max_votes {
        let Some((a, b)) = ranking.next_pair_with_rng(collection.uuid, &mut rng)? else {
            break;
        };
        let (winner, loser) = if strength_of(&strength, a)? > strength_of(&strength, b)? {
            (a, b)
        } else {
            (b, a)
        };
        ranking.apply_vote(winner, loser, collection.uuid)?;
        total_votes += 1;

        if total_votes % sample_every == 0 {
            let order = ranking_order(&ranking, collection.uuid, &strength)?;
            let estimated = calculate_reliability(params.items as i64, total_votes as i64);
            samples.push(Sample {
                votes: total_votes,
                estimated,
                observed: observed_reliability(&order),
            });
            if estimated >= params.stop_at {
                break;
            }
        }
    }

    Ok(SimulationReport {
        items: params.items,
        model: params.model,
        total_votes,
        crossings: find_crossings(&samples),
        samples,
    })
}

fn strength_of(strength: &HashMap<ItemId, usize>, item: ItemId) -> Result<usize, ServiceError> {
    strength
        .get(&item)
        .copied()
        .ok_or(ServiceError::ItemNotFound(item))
}

/// Hidden strengths listed in current rating order, best first.
fn ranking_order(
    ranking: &RankingService<SqliteStore<'_>>,
    collection_uuid: CollectionId,
    strength: &HashMap<ItemId, usize>,
) -> Result<Vec<usize>, ServiceError> {
    let mut items = ranking.list_items(collection_uuid)?;
    items.sort_by(|a, b| b.state.rating().total_cmp(&a.state.rating()));
    items
        .iter()
        .map(|item| strength_of(strength, item.uuid))
        .collect()
}

/// Percentage of item pairs whose ranking order matches their strength.
pub fn observed_reliability(order: &[usize]) -> f64 {
    let mut correct = 0usize;
    let mut total = 0usize;
    for (i, higher) in order.iter().enumerate() {
        for lower in &order[i + 1..] {
            if higher > lower {
                correct += 1;
            }
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Linear interpolation of every sign change of `estimated - observed`.
pub fn find_crossings(samples: &[Sample]) -> Vec<Crossing> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            let prev_diff = prev.estimated - prev.observed;
            let next_diff = next.estimated - next.observed;
            let crossed = (prev_diff < 0.0 && next_diff >= 0.0) || (prev_diff > 0.0 && next_diff <= 0.0);
            if !crossed {
                return None;
            }
            let span = (next.votes - prev.votes) as f64;
            let slope_observed = (next.observed - prev.observed) / span;
            let slope_estimated = (next.estimated - prev.estimated) / span;
            let slope_gap = slope_observed - slope_estimated;
            if slope_gap == 0.0 {
                return None;
            }
            let offset = prev_diff / slope_gap;
            Some(Crossing {
                votes: prev.votes as f64 + offset,
                reliability: prev.observed + slope_observed * offset,
            })
        })
        .collect()
}
