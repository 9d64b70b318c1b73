//! apparatus CLI tool
//!
//! Command-line interface for placing comments, footnotes and critical-apparatus entries into a
//! TEI document.
//!
//! ## Commands
//!
//! - `place`: read a document and an annotation queue, write the annotated document
//! - `config`: print the edition configuration of a built-in document as TOML
//!
//! Annotations that could not be placed are written as markup fragments to the side-channel files
//! (`--comment-file`, `--apparatus-file`), one `Page N: <fragment>` line each, for manual merging.
//! Apparatus lines that could not be read at all go to `--problematic-file`.

use apparatus_core::{
    apparatus::Reconciler,
    audit::{failures_inside_markup, flag_suspicious},
    config::EditionConfig,
    placement::{AnnotationKind, AnnotationQueue, Placer, PlacementReport, QueueRecords},
    tree::DocumentTree,
    ApparatusError,
};
use clap::{Parser, Subcommand};
use std::{
    fs::{read_to_string, write, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(name = "apparatus")]
#[command(author, version, about = "Places annotations into a TEI critical edition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place queued annotations into a document
    Place {
        /// TEI document to annotate
        #[arg(short, long)]
        input: PathBuf,

        /// Annotation queue (.toml or .json)
        #[arg(short, long)]
        annotations: PathBuf,

        /// Edition configuration file
        #[arg(short, long, conflicts_with = "document")]
        config: Option<PathBuf>,

        /// Use the built-in configuration of this document number (e.g. 03)
        #[arg(short, long)]
        document: Option<String>,

        /// Where to write the annotated document (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Side-channel file for comments and footnotes that could not be placed
        #[arg(long, default_value = "comments.txt")]
        comment_file: PathBuf,

        /// Side-channel file for critical app entries that could not be placed
        #[arg(long, default_value = "apparatus.txt")]
        apparatus_file: PathBuf,

        /// File receiving apparatus lines that could not be read
        #[arg(long, default_value = "problematic.txt")]
        problematic_file: PathBuf,

        /// Skip the critical apparatus
        #[arg(long)]
        no_critical: bool,

        /// Apparatus lines are recorded once per witness group
        #[arg(long)]
        grouped: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the configuration of a built-in document
    Config {
        /// Document number; lists the available documents when omitted
        #[arg(short, long)]
        document: Option<String>,
    },
}

fn edition_config(
    config: Option<&Path>,
    document: Option<&str>,
) -> Result<EditionConfig, ApparatusError> {
    match (config, document) {
        (Some(path), _) => EditionConfig::from_path(path),
        (None, Some(document)) => EditionConfig::builtin(document),
        (None, None) => Ok(EditionConfig::default()),
    }
}

fn write_side_channel(
    path: &Path,
    report: &PlacementReport,
    kinds: &[AnnotationKind],
) -> Result<(), ApparatusError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for kind in kinds {
        report.write_failures(*kind, &mut writer)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Place { verbose: true, .. });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "info" })
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Place {
            input,
            annotations,
            config,
            document,
            output,
            comment_file,
            apparatus_file,
            problematic_file,
            no_critical,
            grouped,
            verbose,
        } => {
            let config = edition_config(config.as_deref(), document.as_deref())?;
            if verbose {
                eprintln!("Annotating: {input:?}");
                eprintln!("Annotations: {annotations:?}");
                if let Some(document) = &config.document {
                    eprintln!("Document: {document}");
                }
            }

            let mut tree = DocumentTree::from_xml(&read_to_string(&input)?)?;
            let mut records = QueueRecords::from_path(&annotations)?;
            if no_critical {
                records.apparatus.clear();
            }

            let reconciler = Reconciler::new(&config)?;
            let (queue, diagnostics) = AnnotationQueue::build(&records, &reconciler, grouped);
            let placer = Placer::new(&config);
            let mut report = PlacementReport::new();
            report.diagnostics.extend(diagnostics);
            report.merge(placer.place_all(&mut tree, &queue)?);

            if !no_critical {
                let flagged = flag_suspicious(&mut tree);
                let failed = report
                    .failures_of(AnnotationKind::CriticalReading)
                    .cloned()
                    .collect::<Vec<_>>();
                let inside = failures_inside_markup(&tree, &failed, &config);
                if verbose {
                    eprintln!("Suspicious entries: {flagged}");
                    eprintln!(
                        "Failed entries inside other markup: {} apparatus, {} anchors",
                        inside.inside_apparatus, inside.inside_anchors
                    );
                }
            }

            match &output {
                Some(path) => write(path, tree.to_xml()?)?,
                None => println!("{}", tree.to_xml()?),
            }
            write_side_channel(
                &comment_file,
                &report,
                &[AnnotationKind::Gloss, AnnotationKind::Commentary],
            )?;
            write_side_channel(
                &apparatus_file,
                &report,
                &[AnnotationKind::CriticalReading],
            )?;
            report.write_problematic(&mut BufWriter::new(File::create(&problematic_file)?))?;

            // keep stdout clean when it carries the document
            if let Some(path) = &output {
                println!("\n=== Placement Results ===");
                for line in report.summary() {
                    println!("{line}");
                }
                if verbose {
                    println!("\nWritten: {path:?}");
                }
            }
            Ok(())
        }

        Commands::Config { document } => {
            match document {
                Some(document) => print!("{}", EditionConfig::builtin(&document)?.to_toml_string()?),
                None => {
                    for document in EditionConfig::builtin_documents()? {
                        println!("{document}");
                    }
                }
            }
            Ok(())
        }
    }
}
