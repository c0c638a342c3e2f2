use std::path::PathBuf;

use clap::Args;

use crate::cli::{OutputFormat, SearchArgs};
use crate::database::ProfileDatabase;
use crate::matching::{AssignmentEngine, AssignmentOutcome, MatchResult};
use crate::parsing::query::parse_query_file;

#[derive(Args)]
pub struct AssignArgs {
    /// Query file: a JSON object, a JSON array, or JSON Lines (use - for stdin)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Database directory
    #[arg(short, long, default_value = "db")]
    pub database: PathBuf,

    #[command(flatten)]
    pub search: SearchArgs,

    /// Worker threads for batch assignment (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Execute the assign command
///
/// # Errors
///
/// Returns an error if the queries or the database cannot be read, output
/// cannot be serialized, or no query could be assigned.
pub fn run(args: AssignArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("Failed to configure {threads} worker threads: {e}"))?;
    }

    let entries = parse_query_file(&args.input)?;
    if verbose {
        eprintln!("Read {} queries from {}", entries.len(), args.input.display());
    }

    let database = ProfileDatabase::load(&args.database)?;
    if verbose {
        let metadata = database.metadata();
        eprintln!(
            "Loaded {} {} ({} references, {} loci)",
            metadata.scheme,
            metadata.version,
            database.len(),
            database.locus_count()
        );
    }

    let engine = AssignmentEngine::with_config(&database, args.search.to_config());
    let outcomes = engine.assign_entries(&entries);
    let labels = database.hiercc().labels();

    match format {
        OutputFormat::Text => print_text_results(&outcomes),
        OutputFormat::Json => print_json_results(&outcomes)?,
        OutputFormat::Tsv => print_tsv_results(&outcomes, &labels),
    }

    let assigned = outcomes.iter().filter(|o| o.is_success()).count();
    if verbose {
        eprintln!("Assigned {assigned} of {} queries", outcomes.len());
    }
    if assigned == 0 {
        anyhow::bail!("None of the {} queries could be assigned", outcomes.len());
    }

    Ok(())
}

fn query_name(index: usize, outcome: &AssignmentOutcome) -> String {
    outcome
        .id
        .clone()
        .unwrap_or_else(|| format!("query {}", index + 1))
}

fn format_hiercc(result: &MatchResult) -> String {
    result
        .hiercc
        .iter()
        .map(|slot| format!("{}={}", slot.label, slot.code.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_text_results(outcomes: &[AssignmentOutcome]) {
    for (i, outcome) in outcomes.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", query_name(i, outcome));

        let Some(result) = &outcome.result else {
            println!(
                "   Error: {} ({})",
                outcome.error.as_deref().unwrap_or("unknown"),
                outcome.error_type.as_deref().unwrap_or("unknown")
            );
            continue;
        };

        println!("   ST: {}", result.st);
        println!("   Distance: {}", result.distance);
        println!(
            "   Gaps: {} in query, {} in reference, {} in both",
            result.gaps_a, result.gaps_b, result.gaps_both
        );
        if outcome.unresolved_checksums > 0 {
            println!(
                "   Unresolved checksums: {}",
                outcome.unresolved_checksums
            );
        }
        if !result.hiercc.is_empty() {
            println!("   HierCC: {}", format_hiercc(result));
        }
    }
}

fn print_json_results(outcomes: &[AssignmentOutcome]) -> anyhow::Result<()> {
    let json = if let [single] = outcomes {
        serde_json::to_string_pretty(single)?
    } else {
        serde_json::to_string_pretty(outcomes)?
    };
    println!("{json}");
    Ok(())
}

fn print_tsv_results(outcomes: &[AssignmentOutcome], labels: &[String]) {
    let mut header = vec![
        "id",
        "st",
        "distance",
        "hierCC_distance",
        "gaps_both",
        "gaps_a",
        "gaps_b",
        "unresolved_checksums",
    ];
    header.extend(labels.iter().map(String::as_str));
    header.push("error");
    println!("{}", header.join("\t"));

    for (i, outcome) in outcomes.iter().enumerate() {
        let mut row = vec![outcome
            .id
            .clone()
            .unwrap_or_else(|| (i + 1).to_string())];

        if let Some(result) = &outcome.result {
            row.extend([
                result.st.to_string(),
                result.distance.to_string(),
                result.hiercc_distance.to_string(),
                result.gaps_both.to_string(),
                result.gaps_a.to_string(),
                result.gaps_b.to_string(),
                outcome.unresolved_checksums.to_string(),
            ]);
            row.extend(
                result
                    .hiercc
                    .iter()
                    .map(|slot| slot.code.clone().unwrap_or_default()),
            );
            row.push(String::new());
        } else {
            row.extend(std::iter::repeat(String::new()).take(7 + labels.len()));
            row.push(outcome.error_type.clone().unwrap_or_default());
        }

        println!("{}", row.join("\t"));
    }
}
