use std::path::{Path, PathBuf};

use clap::builder::RangedU64ValueParser;
use clap::{Args, Subcommand};

use crate::cli::{gap_limit, OutputFormat};
use crate::database::index::{IndexParams, DEFAULT_EF_CONSTRUCTION, DEFAULT_M, DEFAULT_SEED};
use crate::database::{BuildConfig, DatabaseBuilder, ProfileDatabase};
use crate::parsing::alleles::parse_checksum_file;
use crate::parsing::hiercc::parse_hiercc_file;
use crate::parsing::profiles::parse_profiles_file;
use crate::utils::validation::{DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH};

#[derive(Args)]
pub struct DatabaseArgs {
    #[command(subcommand)]
    pub command: DatabaseCommands,
}

#[derive(Subcommand)]
pub enum DatabaseCommands {
    /// Build a database from a profile table, HierCC codes and allele checksums
    Build {
        /// Profile table (TSV: ST followed by one column per locus; .gz accepted)
        #[arg(short, long)]
        profiles: PathBuf,

        /// HierCC codes (JSON, or TSV with .tsv/.txt extension)
        #[arg(long)]
        hiercc: Option<PathBuf>,

        /// Directory of per-locus allele FASTA files to hash
        #[arg(long)]
        alleles_dir: Option<PathBuf>,

        /// Precomputed checksums (TSV: locus, checksum, allele)
        #[arg(long)]
        checksums: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Scheme name recorded in the database
        #[arg(long, default_value = "cgmlst")]
        scheme: String,

        /// Snapshot version recorded in the database
        #[arg(long, default_value = "unversioned")]
        db_version: String,

        /// Leave out references with this many missing loci or more
        /// (default: a tenth of the scheme plus one)
        #[arg(long, conflicts_with = "no_reference_gap_limit")]
        max_reference_gaps: Option<usize>,

        /// Keep references however many loci they miss
        #[arg(long)]
        no_reference_gap_limit: bool,

        /// Hex characters kept per allele checksum
        #[arg(
            long,
            default_value_t = DEFAULT_HASH_LENGTH,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_HASH_LENGTH as u64)
        )]
        hash_length: usize,

        /// Similarity index links per node
        #[arg(long, default_value_t = DEFAULT_M)]
        m: usize,

        /// Similarity index construction breadth
        #[arg(long, default_value_t = DEFAULT_EF_CONSTRUCTION)]
        ef_construction: usize,

        /// Similarity index level seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Show metadata of a built database
    Info {
        /// Database directory
        #[arg(short, long, default_value = "db")]
        database: PathBuf,
    },
}

/// Execute a database subcommand
///
/// # Errors
///
/// Returns an error if inputs cannot be parsed, the database cannot be
/// built, or it cannot be read or written.
pub fn run(args: DatabaseArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        DatabaseCommands::Build {
            profiles,
            hiercc,
            alleles_dir,
            checksums,
            output,
            scheme,
            db_version,
            max_reference_gaps,
            no_reference_gap_limit,
            hash_length,
            m,
            ef_construction,
            seed,
            force,
        } => {
            let config = BuildConfig {
                scheme,
                version: db_version,
                index: IndexParams {
                    m,
                    ef_construction,
                    seed,
                },
                max_reference_gaps: gap_limit(max_reference_gaps, no_reference_gap_limit),
                hash_length,
            };
            let sources = BuildSources {
                profiles,
                hiercc,
                alleles_dir,
                checksums,
            };
            run_build(&sources, config, &output, force, verbose)
        }
        DatabaseCommands::Info { database } => run_info(&database, format),
    }
}

struct BuildSources {
    profiles: PathBuf,
    hiercc: Option<PathBuf>,
    alleles_dir: Option<PathBuf>,
    checksums: Option<PathBuf>,
}

fn run_build(
    sources: &BuildSources,
    config: BuildConfig,
    output: &Path,
    force: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    if output.join(crate::database::store::METADATA_FILE).exists() && !force {
        anyhow::bail!(
            "A database already exists in {}. Use --force to overwrite.",
            output.display()
        );
    }

    let table = parse_profiles_file(&sources.profiles)?;
    if verbose {
        eprintln!(
            "Read {} profiles over {} loci from {}",
            table.profiles.len(),
            table.loci.len(),
            sources.profiles.display()
        );
    }

    let mut builder = DatabaseBuilder::from_profile_table(table, config)?;

    if let Some(path) = &sources.hiercc {
        let hiercc = parse_hiercc_file(path)?;
        if verbose {
            eprintln!(
                "Read HierCC codes of {} STs at {} levels",
                hiercc.rows.len(),
                hiercc.thresholds.len()
            );
        }
        builder.set_hiercc(hiercc);
    }

    if let Some(path) = &sources.checksums {
        let checksums = parse_checksum_file(path, builder.loci())?;
        if verbose {
            eprintln!("Read {} allele checksums", checksums.len());
        }
        builder.add_checksums(&checksums)?;
    }

    if let Some(dir) = &sources.alleles_dir {
        let added = builder.add_allele_directory(dir)?;
        if verbose {
            eprintln!("Hashed {added} alleles from {}", dir.display());
        }
    }

    eprintln!("{}", builder.summary());

    let database = builder.build()?;
    database.save(output)?;

    eprintln!(
        "Wrote database with {} references to {}",
        database.len(),
        output.display()
    );
    Ok(())
}

fn run_info(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let database = ProfileDatabase::load(dir)?;
    let metadata = database.metadata();

    match format {
        OutputFormat::Text => {
            println!("Scheme: {}", metadata.scheme);
            println!("Version: {}", metadata.version);
            println!("Created: {}", metadata.created_at.to_rfc3339());
            println!("Format version: {}", metadata.format_version);
            println!("Loci: {}", metadata.locus_count());
            println!("References: {}", metadata.reference_count);
            let labels = metadata.hiercc_labels();
            if labels.is_empty() {
                println!("HierCC levels: none");
            } else {
                println!("HierCC levels: {}", labels.join(", "));
            }
            println!("Checksums: {}", database.checksums().len());
            if let Some(limit) = metadata.max_reference_gaps {
                println!("Reference gap limit: {limit}");
            }
            println!(
                "Index: m={} ef_construction={} seed={:#x} levels={}",
                metadata.index.m,
                metadata.index.ef_construction,
                metadata.index.seed,
                database.index().max_level() + 1
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(metadata)?);
        }
        OutputFormat::Tsv => {
            println!("scheme\tversion\tcreated_at\tloci\treferences\thiercc_levels\tchecksums");
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                metadata.scheme,
                metadata.version,
                metadata.created_at.to_rfc3339(),
                metadata.locus_count(),
                metadata.reference_count,
                metadata.hiercc_labels().join(","),
                database.checksums().len()
            );
        }
    }

    Ok(())
}
