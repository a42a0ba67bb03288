mod timer;

use std::env;
use std::path::Path;
use std::process;

use chrono::Utc;
use serde::Serialize;

use subst_pipeline::loader::{load_csv_file, OfferRecord, SalesRecord};
use subst_pipeline::{
    BatchConfig, BatchOutput, CatalogEntry, GeoLevel, ItemCatalog, OutletRecord, RunSummary,
    SamplingStrategy, Substituter, SubstitutionInput, SubstitutionResult,
};

use timer::Stopwatch;

// ---------------------------------------------------------------------------
// JSON output contract
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunJson<'a> {
    generated_at: String,
    load_ms: u128,
    run_ms: u128,
    config: &'a BatchConfig,
    summary: &'a RunSummary,
    offers: Vec<OfferJson<'a>>,
}

#[derive(Serialize)]
struct OfferJson<'a> {
    offer_id: i64,
    commodity_id: i64,
    outlet_id: i64,
    status: &'a str,
    previous_item_id: i64,
    item_id: i64,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    word_similarity: Option<f64>,
}

fn build_json<'a>(
    output: &'a BatchOutput,
    config: &'a BatchConfig,
    load_ms: u128,
    run_ms: u128,
) -> RunJson<'a> {
    RunJson {
        generated_at: Utc::now().to_rfc3339(),
        load_ms,
        run_ms,
        config,
        summary: &output.summary,
        offers: output
            .matched
            .iter()
            .map(|r| OfferJson {
                offer_id: r.offer_id,
                commodity_id: r.commodity_id,
                outlet_id: r.outlet_id,
                status: r.status.as_str(),
                previous_item_id: r.previous_item_id,
                item_id: r.item_id,
                description: r.description.as_str(),
                word_similarity: r.is_assigned().then_some(r.word_similarity),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable output
// ---------------------------------------------------------------------------

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn print_human(output: &BatchOutput, config: &BatchConfig, watch: &Stopwatch) {
    let summary = &output.summary;
    let rule = "\u{2550}".repeat(62);
    println!();
    println!("  \u{2554}{}\u{2557}", rule);
    println!(
        "  \u{2551}{:^62}\u{2551}",
        format!("ITEM SUBSTITUTION \u{00b7} period {}", summary.period)
    );
    println!("  \u{255a}{}\u{255d}", rule);
    println!();
    println!(
        "  {} commodities  \u{00b7}  {} clusters  \u{00b7}  {} outlets  \u{00b7}  {} offers",
        summary.commodity_count, summary.cluster_count, summary.outlet_count, summary.offer_count
    );
    println!(
        "  {} assigned ({})  \u{00b7}  {} unclassified  \u{00b7}  strategy {}  \u{00b7}  level {}",
        summary.assigned_count,
        percent(summary.assigned_fraction),
        summary.unclassified_count,
        config.funnel.sampling_strategy,
        config.geo_level,
    );
    println!(
        "  mean word similarity {:.3}  \u{00b7}  brand match {}",
        summary.average_similarity,
        percent(summary.brand_match_rate)
    );
    println!();

    if output.matched.is_empty() {
        println!("  No unassigned offers in this period.");
    } else {
        println!("  {:\u{2500}<64}", "");
        for r in &output.matched {
            let marker = if r.is_assigned() { "+ " } else { "  " };
            println!(
                "  {}{:>8}  {:<14} {:>8} -> {:>8}  {}",
                marker, r.offer_id, r.status, r.previous_item_id, r.item_id, r.description
            );
        }
        println!("  {:\u{2500}<64}", "");
    }

    println!();
    println!(
        "  \u{23f1}  CSV loaded in {}ms \u{00b7} Funnel ran in {}ms \u{00b7} Total {}ms",
        watch.lap_ms("load"),
        watch.lap_ms("run"),
        watch.total_ms()
    );
    println!();
}

// ---------------------------------------------------------------------------
// CSV output
// ---------------------------------------------------------------------------

fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> SubstitutionResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("wrote {} rows to {}", rows.len(), path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Args {
    sales: String,
    catalog: String,
    outlets: String,
    offers: String,
    config: Option<String>,
    period: Option<i64>,
    geo_level: Option<GeoLevel>,
    seed: Option<u64>,
    strategy: Option<SamplingStrategy>,
    neighbours: Option<usize>,
    suggest: bool,
    json: bool,
    matched_out: Option<String>,
    suggestions_out: Option<String>,
    summary_out: Option<String>,
}

fn usage() -> ! {
    eprintln!("Usage: subst-runner <sales.csv> <catalog.csv> <outlets.csv> <offers.csv> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config PATH        JSON batch configuration (flags below override it)");
    eprintln!("  --period N           Period to resolve");
    eprintln!("  --geo-level LEVEL    province | city | outlet (default: city)");
    eprintln!("  --seed N             Base random seed (default: 42)");
    eprintln!("  --strategy NAME      cutoff | proportional | top_proportional | random");
    eprintln!("  --neighbours K       Neighbourhood size for description distances");
    eprintln!("  --suggest            Emit candidate rows for every substitution");
    eprintln!("  --matched PATH       Write matched offers as CSV");
    eprintln!("  --suggestions PATH   Write suggestion rows as CSV (implies --suggest)");
    eprintln!("  --summary PATH       Write the run summary as CSV");
    eprintln!("  --json               Output as JSON instead of formatted text");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  subst-runner sales.csv catalog.csv outlets.csv offers.csv --period 202406");
    eprintln!(
        "  subst-runner sales.csv catalog.csv outlets.csv offers.csv --period 202406 --geo-level outlet --json"
    );
    process::exit(1);
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v.as_str(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            process::exit(1);
        }
    }
}

fn number<T: std::str::FromStr>(raw: &str, flag: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: {} requires an integer, got '{}'", flag, raw);
        process::exit(1);
    })
}

fn parse_args(args: &[String]) -> Args {
    if args.len() < 5 {
        usage();
    }
    let mut parsed = Args {
        sales: args[1].clone(),
        catalog: args[2].clone(),
        outlets: args[3].clone(),
        offers: args[4].clone(),
        ..Args::default()
    };

    let mut i = 5;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => {
                parsed.config = Some(value(args, i, flag).to_string());
                i += 2;
            }
            "--period" => {
                parsed.period = Some(number(value(args, i, flag), flag));
                i += 2;
            }
            "--geo-level" => {
                let raw = value(args, i, flag);
                parsed.geo_level = Some(GeoLevel::parse(raw).unwrap_or_else(|| {
                    eprintln!("Error: unknown geography level '{}'", raw);
                    process::exit(1);
                }));
                i += 2;
            }
            "--seed" => {
                parsed.seed = Some(number(value(args, i, flag), flag));
                i += 2;
            }
            "--strategy" => {
                parsed.strategy = Some(SamplingStrategy::from(value(args, i, flag)));
                i += 2;
            }
            "--neighbours" => {
                parsed.neighbours = Some(number(value(args, i, flag), flag));
                i += 2;
            }
            "--suggest" => {
                parsed.suggest = true;
                i += 1;
            }
            "--matched" => {
                parsed.matched_out = Some(value(args, i, flag).to_string());
                i += 2;
            }
            "--suggestions" => {
                parsed.suggestions_out = Some(value(args, i, flag).to_string());
                parsed.suggest = true;
                i += 2;
            }
            "--summary" => {
                parsed.summary_out = Some(value(args, i, flag).to_string());
                i += 2;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            "-h" | "--help" => usage(),
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
    }
    parsed
}

fn resolve_config(args: &Args) -> SubstitutionResult<BatchConfig> {
    let mut config = match &args.config {
        Some(path) => BatchConfig::from_json_file(path)?,
        None => BatchConfig::default(),
    };
    if let Some(period) = args.period {
        config.current_period = period;
    }
    if let Some(level) = args.geo_level {
        config.geo_level = level;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(strategy) = args.strategy {
        config.funnel.sampling_strategy = strategy;
    }
    if args.neighbours.is_some() {
        config.funnel.neighbour_count = args.neighbours;
    }
    config.suggest |= args.suggest;
    config.validate()?;
    Ok(config)
}

fn load_input(args: &Args) -> SubstitutionResult<SubstitutionInput> {
    let sales: Vec<SalesRecord> = load_csv_file(&args.sales)?;
    let catalog: Vec<CatalogEntry> = load_csv_file(&args.catalog)?;
    let outlets: Vec<OutletRecord> = load_csv_file(&args.outlets)?;
    let offers: Vec<OfferRecord> = load_csv_file(&args.offers)?;
    log::info!(
        "loaded {} sales rows, {} catalog entries, {} outlets, {} offer rows",
        sales.len(),
        catalog.len(),
        outlets.len(),
        offers.len()
    );
    Ok(SubstitutionInput {
        sales,
        catalog: ItemCatalog::new(catalog),
        outlets,
        offers,
    })
}

fn write_outputs(args: &Args, output: &BatchOutput) -> SubstitutionResult<()> {
    if let Some(path) = &args.matched_out {
        write_csv(path, &output.matched)?;
    }
    if let Some(path) = &args.suggestions_out {
        write_csv(path, &output.suggestions)?;
    }
    if let Some(path) = &args.summary_out {
        write_csv(path, std::slice::from_ref(&output.summary))?;
    }
    Ok(())
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("Error {}: {}", context, err);
    process::exit(1);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw: Vec<String> = env::args().collect();
    let args = parse_args(&raw);

    for path in [&args.sales, &args.catalog, &args.outlets, &args.offers] {
        if !Path::new(path).exists() {
            fail("reading input", format!("{} does not exist", path));
        }
    }

    let config = resolve_config(&args).unwrap_or_else(|e| fail("in configuration", e));
    let substituter =
        Substituter::from_config(config).unwrap_or_else(|e| fail("in configuration", e));

    let mut watch = Stopwatch::start();
    let input = load_input(&args).unwrap_or_else(|e| fail("loading CSV", e));
    let load = watch.lap("load");

    let output = substituter
        .run(&input)
        .unwrap_or_else(|e| fail("running substitution", e));
    let run = watch.lap("run");

    write_outputs(&args, &output).unwrap_or_else(|e| fail("writing output", e));
    watch.lap("write");
    let timings: Vec<String> = watch
        .laps()
        .iter()
        .map(|(name, elapsed)| format!("{}={}ms", name, elapsed.as_millis()))
        .collect();
    log::debug!("timings: {}", timings.join(" "));

    if args.json {
        let report = build_json(&output, substituter.config(), load.as_millis(), run.as_millis());
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => fail("serializing JSON", e),
        }
    } else {
        print_human(&output, substituter.config(), &watch);
    }
}
