//! Configurable analysis pipeline over a loaded result set.
//!
//! One pass produces an [`AnalysisReport`]: totals over the canonical profit
//! field, the top-N gains and losses, descriptive statistics of selected
//! fields inside those subsets, an optional filtered slice, an optional
//! per-strategy breakdown, and the full event list in export order. Nothing is
//! printed here; presentation belongs to the caller.

use crate::domain::aggregate::{partition, strategy_breakdown, AggregateTotals, StrategyTotals};
use crate::domain::describe::Description;
use crate::domain::event::{flatten, AnnotatedEvent, NumericFields, ResultSet, PROFIT_FIELD};
use crate::domain::filter::{filter, Predicate};
use crate::domain::ranking::{rank_and_prune, sort_by_field, SortDirection};

pub const DEFAULT_PRUNE: usize = 10;
pub const DEFAULT_DESCRIBE_FIELDS: [&str; 5] =
    ["goldenMACD", "deathMACD", "goldenRSI", "deathRSI", "profit"];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Field treated as the outcome of each event.
    pub profit_field: String,
    /// Size of the top gain/loss subsets; `None` keeps all.
    pub prune: Option<usize>,
    pub describe_fields: Vec<String>,
    pub filter: Option<Predicate>,
    pub strategy_keys: Vec<String>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            profit_field: PROFIT_FIELD.to_string(),
            prune: Some(DEFAULT_PRUNE),
            describe_fields: DEFAULT_DESCRIBE_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            filter: None,
            strategy_keys: Vec::new(),
            sort_field: PROFIT_FIELD.to_string(),
            sort_direction: SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    pub field: String,
    pub gains: Description,
    pub losses: Description,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSummary {
    pub predicate: Predicate,
    pub matched: usize,
    pub totals: AggregateTotals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub symbol_count: usize,
    pub event_count: usize,
    /// Totals over every event's profit field.
    pub totals: AggregateTotals,
    /// Totals over each symbol's record-level profit.
    pub symbol_totals: AggregateTotals,
    /// Distinct symbols with at least one gain / loss event.
    pub gain_symbols: usize,
    pub loss_symbols: usize,
    pub top_gains: Vec<AnnotatedEvent>,
    pub top_losses: Vec<AnnotatedEvent>,
    pub field_summaries: Vec<FieldSummary>,
    pub filter: Option<FilterSummary>,
    pub strategies: Vec<StrategyTotals>,
    /// All events, ordered by the configured sort field and direction.
    pub sorted_events: Vec<AnnotatedEvent>,
}

pub fn run_analysis(results: &ResultSet, options: &AnalysisOptions) -> AnalysisReport {
    let events = flatten(results);
    let field = options.profit_field.as_str();

    let totals = AggregateTotals::compute(&events, field);
    let symbol_totals = AggregateTotals::compute(results.values(), PROFIT_FIELD);

    let (gains, losses) = partition(&events, field);
    let gain_symbols = distinct_symbols(&gains);
    let loss_symbols = distinct_symbols(&losses);

    let top_gains = rank_and_prune(&gains, field, SortDirection::Descending, options.prune);
    let top_losses = rank_and_prune(&losses, field, SortDirection::Ascending, options.prune);

    let field_summaries = options
        .describe_fields
        .iter()
        .map(|name| FieldSummary {
            field: name.clone(),
            gains: Description::compute(&values_of(&top_gains, name)),
            losses: Description::compute(&values_of(&top_losses, name)),
        })
        .collect();

    let filter_summary = options.filter.as_ref().map(|predicate| {
        let matched = filter(&events, predicate);
        FilterSummary {
            predicate: predicate.clone(),
            matched: matched.len(),
            totals: AggregateTotals::compute(&matched, field),
        }
    });

    let strategies = strategy_breakdown(&events, &options.strategy_keys);

    let mut sorted_events = events;
    sort_by_field(
        &mut sorted_events,
        &options.sort_field,
        options.sort_direction,
    );

    AnalysisReport {
        symbol_count: results.len(),
        event_count: sorted_events.len(),
        totals,
        symbol_totals,
        gain_symbols,
        loss_symbols,
        top_gains,
        top_losses,
        field_summaries,
        filter: filter_summary,
        strategies,
        sorted_events,
    }
}

/// Values of `field` across `items`, skipping items that lack it.
pub fn values_of<T: NumericFields>(items: &[T], field: &str) -> Vec<f64> {
    items.iter().filter_map(|item| item.field(field)).collect()
}

fn distinct_symbols(events: &[AnnotatedEvent]) -> usize {
    let mut seen: Vec<&str> = events.iter().map(|e| e.symbol.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
