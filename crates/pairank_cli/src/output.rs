//! Output formatting: terminal tables and JSON.

use pairank_core::{
    Collection, CollectionStats, ConsistencyReport, Item, ItemId, RankingPage, RatingState,
    VoteHistoryPage,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::bail;
use crate::simulate::SimulationReport;

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => bail(format!("Failed to serialize output: {e}")),
    }
}

fn describe_state(state: &RatingState) -> String {
    match state {
        RatingState::Elo { rating } => format!("{rating:.2}"),
        RatingState::Glicko2 { mu, phi, sigma } => {
            format!("{mu:.2} ± {phi:.2} (σ {sigma:.5})")
        }
    }
}

pub fn print_collections(collections: &[Collection]) {
    if collections.is_empty() {
        println!("No collections.");
        return;
    }
    let name_width = collections
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("{:<name_width$} | Model   |   K |  Tau | UUID", "Name");
    println!(
        "{}-|---------|-----|------|-------------------------------------",
        "-".repeat(name_width)
    );
    for c in collections {
        println!(
            "{:<name_width$} | {:<7} | {:>3} | {:>4.2} | {}",
            c.name,
            c.rating_model.as_str(),
            c.k_factor,
            c.glicko2.tau,
            c.uuid
        );
    }
}

pub fn print_items(items: &[Item]) {
    for item in items {
        println!(
            "{}  {:>5} votes  {}  {}",
            item.uuid,
            item.vote_count,
            describe_state(&item.state),
            item.label
        );
    }
    println!("\n{} items", items.len());
}

pub fn print_ranking(page: &RankingPage) {
    let label_width = page
        .items
        .iter()
        .map(|r| r.item.label.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("   # | {:<label_width$} | Votes | Rating", "Item");
    println!("-----|-{}-|-------|-------", "-".repeat(label_width));
    for ranked in &page.items {
        println!(
            "{:>4} | {:<label_width$} | {:>5} | {}",
            ranked.rank,
            ranked.item.label,
            ranked.item.vote_count,
            describe_state(&ranked.item.state)
        );
    }
    println!("\n{} of {} items shown", page.items.len(), page.total);
}

pub fn print_history(page: &VoteHistoryPage) {
    for entry in &page.entries {
        println!(
            "#{:<6} {}  {} > {}",
            entry.vote.seq, entry.vote.created_at, entry.winner_label, entry.loser_label
        );
    }
    println!("\n{} of {} votes shown", page.entries.len(), page.total);
}

pub fn print_stats(stats: &CollectionStats) {
    println!("Items:        {}", stats.item_count);
    println!("Votes:        {}", stats.vote_count);
    println!("Reliability:  {:.2}%", stats.reliability);
    println!(
        "Target:       {:.0}% ({} votes total, {} still needed)",
        stats.target, stats.required_votes, stats.votes_needed
    );
}

pub fn print_ratings(ratings: &BTreeMap<ItemId, RatingState>) {
    for (item_uuid, state) in ratings {
        println!("{item_uuid}  {}", describe_state(state));
    }
    println!("\n{} items recomputed", ratings.len());
}

pub fn print_report(report: &ConsistencyReport) {
    if report.is_consistent() {
        println!(
            "OK: {} items match a replay of {} votes",
            report.items_checked, report.votes_replayed
        );
        return;
    }
    println!("{} inconsistent items:", report.violations.len());
    for violation in &report.violations {
        println!(
            "{}  stored {} ({} votes)  replayed {} ({} votes)",
            violation.item_uuid,
            describe_state(&violation.stored.state),
            violation.stored.vote_count,
            describe_state(&violation.replayed.state),
            violation.replayed.vote_count
        );
    }
}

pub fn print_simulation(report: &SimulationReport) {
    println!(" Votes | Estimated | Observed");
    println!("-------|-----------|---------");
    for sample in &report.samples {
        println!(
            "{:>6} | {:>8.2}% | {:>7.2}%",
            sample.votes, sample.estimated, sample.observed
        );
    }
    println!(
        "\n{} items, {} model, {} votes",
        report.items,
        report.model.as_str(),
        report.total_votes
    );
    for crossing in &report.crossings {
        println!(
            "Curves cross near {:.1} votes at {:.2}%",
            crossing.votes, crossing.reliability
        );
    }
}
