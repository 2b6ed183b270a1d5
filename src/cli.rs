//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_results_adapter::{
    load_dataset, load_price_cache, load_symbols, JsonResultsAdapter,
};
use crate::adapters::sqlite_store_adapter::SqliteStoreAdapter;
use crate::domain::aggregate::AggregateTotals;
use crate::domain::analysis::{
    run_analysis, AnalysisOptions, AnalysisReport, DEFAULT_DESCRIBE_FIELDS, DEFAULT_PRUNE,
};
use crate::domain::classifier::{train_and_evaluate, ClassifierConfig, TrainingReport};
use crate::domain::config_validation::{
    validate_analysis_config, validate_analysis_options, validate_classifier_config,
    validate_seed_config, validate_store_config,
};
use crate::domain::error::SigstatsError;
use crate::domain::event::PROFIT_FIELD;
use crate::domain::filter;
use crate::domain::ranking::SortDirection;
use crate::domain::seed::{
    seed_price_cache, seed_symbols, SeedOptions, SeedSummary, DEFAULT_EXCLUDE_CHARS,
    DEFAULT_LAST_UPDATED,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::document_store_port::DocumentStorePort;
use crate::ports::results_port::ResultsPort;

pub const DEFAULT_OUTPUT_PATH: &str = "sortedEvents.json";

#[derive(Parser, Debug)]
#[command(
    name = "sigstats",
    about = "Summary statistics over precomputed trading-signal results"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate a results file and export the sorted event list
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Seed skeleton price documents into the document store
    Seed {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        from_cache: bool,
    },
    /// Train and score the signal classifier
    Train {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        dataset: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            input,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, input.as_deref(), output.as_deref())
            } else {
                run_analyze(&config, input.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Seed { config, from_cache } => run_seed(&config, from_cache),
        Command::Train { config, dataset } => run_train(&config, dataset.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    tracing::info!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn fail(err: &SigstatsError) -> ExitCode {
    tracing::error!("{err}");
    ExitCode::from(err)
}

/// Like [`fail`], but shows where a filter expression stopped parsing.
fn fail_with_filter_context(config: &dyn ConfigPort, err: &SigstatsError) -> ExitCode {
    if let SigstatsError::FilterParse(parse_err) = err {
        if let Some(expr) = config.get_string("analysis", "filter") {
            tracing::error!(
                "failed to parse filter:\n{}",
                parse_err.display_with_context(&expr)
            );
            return ExitCode::from(err);
        }
    }
    fail(err)
}

pub fn build_analysis_options(config: &dyn ConfigPort) -> Result<AnalysisOptions, SigstatsError> {
    let prune = match config.get_int("analysis", "prune", DEFAULT_PRUNE as i64) {
        0 => None,
        n if n > 0 => Some(n as usize),
        _ => {
            return Err(SigstatsError::ConfigInvalid {
                section: "analysis".into(),
                key: "prune".into(),
                reason: "prune must be non-negative (0 keeps everything)".into(),
            });
        }
    };

    let sort_direction = match config.get_string("analysis", "sort_direction") {
        Some(raw) => {
            raw.parse::<SortDirection>()
                .map_err(|reason| SigstatsError::ConfigInvalid {
                    section: "analysis".into(),
                    key: "sort_direction".into(),
                    reason,
                })?
        }
        None => SortDirection::default(),
    };

    let filter = match config
        .get_string("analysis", "filter")
        .filter(|s| !s.trim().is_empty())
    {
        Some(expr) => Some(filter::parse(&expr)?),
        None => None,
    };

    Ok(AnalysisOptions {
        profit_field: config
            .get_string("analysis", "profit_field")
            .unwrap_or_else(|| PROFIT_FIELD.to_string()),
        prune,
        describe_fields: config
            .get_list("analysis", "describe_fields")
            .unwrap_or_else(|| {
                DEFAULT_DESCRIBE_FIELDS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
        filter,
        strategy_keys: config
            .get_list("analysis", "strategy_keys")
            .unwrap_or_default(),
        sort_field: config
            .get_string("analysis", "sort_field")
            .unwrap_or_else(|| PROFIT_FIELD.to_string()),
        sort_direction,
    })
}

pub fn build_seed_options(config: &dyn ConfigPort) -> SeedOptions {
    SeedOptions {
        exclude_chars: config
            .get_string("seed", "exclude_chars")
            .unwrap_or_else(|| DEFAULT_EXCLUDE_CHARS.to_string()),
        last_updated: config
            .get_string("seed", "last_updated")
            .unwrap_or_else(|| DEFAULT_LAST_UPDATED.to_string()),
    }
}

pub fn build_classifier_config(config: &dyn ConfigPort) -> ClassifierConfig {
    let defaults = ClassifierConfig::default();
    ClassifierConfig {
        test_size: config.get_double("classifier", "test_size", defaults.test_size),
        seed: config
            .get_int("classifier", "seed", defaults.seed as i64)
            .max(0) as u64,
        hidden_units: config
            .get_int("classifier", "hidden_units", defaults.hidden_units as i64)
            .max(1) as usize,
        epochs: config
            .get_int("classifier", "epochs", defaults.epochs as i64)
            .max(1) as usize,
        batch_size: config
            .get_int("classifier", "batch_size", defaults.batch_size as i64)
            .max(1) as usize,
        learning_rate: config.get_double("classifier", "learning_rate", defaults.learning_rate),
    }
}

/// Input path from the command line, falling back to `[analysis] input_path`.
fn resolve_input(
    input_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, SigstatsError> {
    match input_override {
        Some(p) => Ok(p.to_path_buf()),
        None => config
            .get_string("analysis", "input_path")
            .map(PathBuf::from)
            .ok_or_else(|| SigstatsError::ConfigMissing {
                section: "analysis".into(),
                key: "input_path".into(),
            }),
    }
}

fn resolve_output(output_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    output_override.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            config
                .get_string("analysis", "output_path")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
        )
    })
}

/// A validated analyze invocation: options plus resolved paths.
struct AnalyzePlan {
    options: AnalysisOptions,
    input: PathBuf,
    output: PathBuf,
    pretty: bool,
}

/// Validate `[analysis]` and resolve paths, applying command-line overrides.
/// An input override stands in for a missing `input_path`.
fn plan_analysis(
    adapter: &FileConfigAdapter,
    input_override: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<AnalyzePlan, ExitCode> {
    let validated = match input_override {
        Some(_) => validate_analysis_options(adapter),
        None => validate_analysis_config(adapter),
    };
    if let Err(e) = validated {
        return Err(fail_with_filter_context(adapter, &e));
    }
    let options =
        build_analysis_options(adapter).map_err(|e| fail_with_filter_context(adapter, &e))?;

    let input = resolve_input(input_override, adapter).map_err(|e| fail(&e))?;
    let output = resolve_output(output_override, adapter);
    Ok(AnalyzePlan {
        options,
        input,
        output,
        pretty: adapter.get_bool("analysis", "pretty", false),
    })
}

fn run_analyze(
    config_path: &Path,
    input_override: Option<&Path>,
    output_override: Option<&Path>,
) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stages 2-3: Validate, build options, resolve paths
    let plan = match plan_analysis(&adapter, input_override, output_override) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let results_port = JsonResultsAdapter::new(plan.pretty);
    run_analysis_pipeline(&results_port, &plan.input, &plan.output, &plan.options)
}

pub fn run_analysis_pipeline(
    results_port: &dyn ResultsPort,
    input: &Path,
    output: &Path,
    options: &AnalysisOptions,
) -> ExitCode {
    // Stage 4: Load results
    tracing::info!("Loading results from {}", input.display());
    let results = match results_port.load_results(input) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Aggregate
    let report = run_analysis(&results, options);
    tracing::info!(
        symbols = report.symbol_count,
        events = report.event_count,
        "analysis complete"
    );
    if report.totals.skipped > 0 {
        tracing::warn!(
            "{} events have no numeric '{}' and were skipped",
            report.totals.skipped,
            report.totals.field
        );
    }

    // Stage 6: Print summary
    print!("{}", render_report(&report, options));

    // Stage 7: Export
    match results_port.write_events(&report.sorted_events, output) {
        Ok(()) => {
            tracing::info!(
                "Wrote {} events to {}",
                report.sorted_events.len(),
                output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn ratio_text(totals: &AggregateTotals) -> String {
    match totals.ratio() {
        Ok(r) => format!("{:.4}", r),
        Err(e) => {
            tracing::warn!("{e}");
            "undefined".to_string()
        }
    }
}

fn write_totals(out: &mut String, totals: &AggregateTotals) -> std::fmt::Result {
    writeln!(out, "Gains:            {:.2} ({} events)", totals.gains, totals.gain_count)?;
    writeln!(out, "Losses:           {:.2} ({} events)", totals.losses, totals.loss_count)?;
    writeln!(out, "Net:              {:.2}", totals.net)?;
    writeln!(out, "Gain/Loss Ratio:  {}", ratio_text(totals))
}

pub fn render_report(report: &AnalysisReport, options: &AnalysisOptions) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report, options);
    out
}

fn write_report(
    out: &mut String,
    report: &AnalysisReport,
    options: &AnalysisOptions,
) -> std::fmt::Result {
    writeln!(out, "=== Totals ({}) ===", report.totals.field)?;
    writeln!(out, "Symbols:          {}", report.symbol_count)?;
    writeln!(out, "Events:           {}", report.event_count)?;
    write_totals(out, &report.totals)?;
    if report.totals.skipped > 0 {
        writeln!(out, "Skipped:          {}", report.totals.skipped)?;
    }
    writeln!(
        out,
        "Symbols w/ gains: {}, w/ losses: {}",
        report.gain_symbols, report.loss_symbols
    )?;
    writeln!(
        out,
        "Symbol-level net: {:.2}",
        report.symbol_totals.net
    )?;

    let label = match options.prune {
        Some(n) => format!("top {}", n),
        None => "all".to_string(),
    };
    for summary in &report.field_summaries {
        writeln!(out, "\n=== {} ({} gains) ===", summary.field, label)?;
        writeln!(out, "{}", summary.gains)?;
        writeln!(out, "\n=== {} ({} losses) ===", summary.field, label)?;
        writeln!(out, "{}", summary.losses)?;
    }

    if let Some(filtered) = &report.filter {
        writeln!(out, "\n=== Filter: {} ===", filtered.predicate)?;
        writeln!(out, "Matched:          {}", filtered.matched)?;
        write_totals(out, &filtered.totals)?;
    }

    if !report.strategies.is_empty() {
        writeln!(out, "\n=== Per-Strategy Summary ===")?;
        for strategy in &report.strategies {
            writeln!(
                out,
                "  {}:  gains {:.2} ({}), losses {:.2} ({}), net {:.2}, ratio {}",
                strategy.key,
                strategy.totals.gains,
                strategy.totals.gain_count,
                strategy.totals.losses,
                strategy.totals.loss_count,
                strategy.totals.net,
                ratio_text(&strategy.totals),
            )?;
        }
    }
    Ok(())
}

pub fn run_dry_run(
    config_path: &Path,
    input_override: Option<&Path>,
    output_override: Option<&Path>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let AnalyzePlan {
        options,
        input,
        output,
        pretty,
    } = match plan_analysis(&adapter, input_override, output_override) {
        Ok(p) => p,
        Err(code) => return code,
    };
    tracing::info!("Config validated successfully");

    println!("Input:            {}", input.display());
    println!("Output:           {}", output.display());
    println!("Pretty export:    {}", if pretty { "yes" } else { "no" });
    println!("Profit field:     {}", options.profit_field);
    match options.prune {
        Some(n) => println!("Prune:            {}", n),
        None => println!("Prune:            none"),
    }
    println!(
        "Sort:             {} {}",
        options.sort_field, options.sort_direction
    );
    println!("Describe fields:  {}", options.describe_fields.join(", "));
    if let Some(predicate) = &options.filter {
        println!("Filter (parsed):  {}", predicate);
    }
    if !options.strategy_keys.is_empty() {
        println!("Strategies:       {}", options.strategy_keys.join(", "));
    }

    tracing::info!("Dry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn section_present(config: &dyn ConfigPort, section: &str, keys: &[&str]) -> bool {
    keys.iter().any(|k| config.get_string(section, k).is_some())
}

/// Validate every section the file defines. A file with none of them is
/// treated as an analysis config missing its input.
pub fn validate_all(config: &dyn ConfigPort) -> Result<Vec<&'static str>, SigstatsError> {
    let mut checked = Vec::new();

    if section_present(
        config,
        "analysis",
        &[
            "input_path",
            "output_path",
            "profit_field",
            "prune",
            "sort_field",
            "sort_direction",
            "describe_fields",
            "filter",
            "strategy_keys",
            "pretty",
        ],
    ) {
        validate_analysis_config(config)?;
        checked.push("analysis");
    }
    if section_present(config, "store", &["path", "pool_size", "collection"]) {
        validate_store_config(config)?;
        checked.push("store");
    }
    if section_present(
        config,
        "seed",
        &["symbols_path", "price_cache_path", "exclude_chars", "last_updated"],
    ) {
        let from_cache = config.get_string("seed", "symbols_path").is_none();
        validate_seed_config(config, from_cache)?;
        checked.push("seed");
    }
    if section_present(
        config,
        "classifier",
        &[
            "dataset_path",
            "test_size",
            "seed",
            "hidden_units",
            "epochs",
            "batch_size",
            "learning_rate",
        ],
    ) {
        validate_classifier_config(config)?;
        checked.push("classifier");
    }

    if checked.is_empty() {
        return Err(SigstatsError::ConfigMissing {
            section: "analysis".into(),
            key: "input_path".into(),
        });
    }
    Ok(checked)
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checked = match validate_all(&adapter) {
        Ok(c) => c,
        Err(e) => return fail_with_filter_context(&adapter, &e),
    };

    for section in &checked {
        println!("[{}] ok", section);
    }
    if let Some(expr) = adapter
        .get_string("analysis", "filter")
        .filter(|s| !s.trim().is_empty())
    {
        // Already validated above, so this parse succeeds.
        if let Ok(predicate) = filter::parse(&expr) {
            println!("\nFilter:");
            println!("  Parsed: {}", predicate);
            println!("  Raw:    {}", expr);
        }
    }

    tracing::info!("Configuration is valid");
    ExitCode::SUCCESS
}

fn run_seed(config_path: &Path, from_cache: bool) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_store_config(&adapter)
        .and_then(|()| validate_seed_config(&adapter, from_cache))
    {
        return fail(&e);
    }

    let store = match SqliteStoreAdapter::from_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = store.initialize_schema() {
        return fail(&e);
    }
    tracing::info!("Seeding collection '{}'", store.collection());

    match run_seed_pipeline(&store, &adapter, from_cache) {
        Ok(summary) => {
            println!("Inserted:         {}", summary.inserted);
            println!("Already present:  {}", summary.existing);
            println!("Excluded:         {}", summary.excluded);
            if from_cache {
                println!("Empty in cache:   {}", summary.empty);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

/// Read the configured symbol source and seed `store` from it.
pub fn run_seed_pipeline(
    store: &dyn DocumentStorePort,
    config: &dyn ConfigPort,
    from_cache: bool,
) -> Result<SeedSummary, SigstatsError> {
    if from_cache {
        let path = required_path(config, "seed", "price_cache_path")?;
        tracing::info!("Loading price cache from {}", path.display());
        let cache = load_price_cache(&path)?;
        seed_price_cache(store, &cache)
    } else {
        let path = required_path(config, "seed", "symbols_path")?;
        tracing::info!("Loading symbols from {}", path.display());
        let symbols = load_symbols(&path)?;
        let options = build_seed_options(config);
        let summary = seed_symbols(store, &symbols, &options)?;
        if summary.excluded > 0 {
            tracing::warn!(
                "{} symbols excluded (containing any of '{}')",
                summary.excluded,
                options.exclude_chars
            );
        }
        Ok(summary)
    }
}

fn required_path(config: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, SigstatsError> {
    config
        .get_string(section, key)
        .map(PathBuf::from)
        .ok_or_else(|| SigstatsError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn run_train(config_path: &Path, dataset_override: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_classifier_config(&adapter) {
        return fail(&e);
    }
    let config = build_classifier_config(&adapter);

    let dataset_path = match dataset_override {
        Some(p) => p.to_path_buf(),
        None => match required_path(&adapter, "classifier", "dataset_path") {
            Ok(p) => p,
            Err(e) => return fail(&e),
        },
    };

    tracing::info!("Loading dataset from {}", dataset_path.display());
    let dataset = match load_dataset(&dataset_path) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    tracing::info!(
        samples = dataset.features.len(),
        epochs = config.epochs,
        "Training classifier"
    );
    match train_and_evaluate(&dataset, &config) {
        Ok((_, report)) => {
            print!("{}", render_training_report(&report));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn render_training_report(report: &TrainingReport) -> String {
    let mut out = String::new();
    let _ = write_training_report(&mut out, report);
    out
}

fn write_training_report(out: &mut String, report: &TrainingReport) -> std::fmt::Result {
    writeln!(out, "Train samples:    {}", report.train_size)?;
    writeln!(out, "Test samples:     {}", report.test_size)?;
    writeln!(out, "Classes:          {}", report.classes)?;
    if let Some(last) = report.epoch_losses.last() {
        writeln!(out, "Final train loss: {:.4}", last)?;
    }
    writeln!(out, "Test loss:        {:.4}", report.test_loss)?;
    writeln!(out, "Test accuracy:    {:.2}%", report.test_accuracy * 100.0)
}
