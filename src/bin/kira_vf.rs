use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_virulence::annotation::UniprotAnnotationClient;
use kira_virulence::app::{App, write_template};
use kira_virulence::config::ConfigLoader;
use kira_virulence::domain::GramStain;
use kira_virulence::error::KiraError;
use kira_virulence::output::{JsonOutput, OutputMode, TextOutput};

#[derive(Parser)]
#[command(name = "kira-vf")]
#[command(about = "Bacterial virulence-factor scoring against a reconciled reference table")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Rebuild the reference table from UniProt and the manual table")]
    Reconcile,
    #[command(about = "Classify a CSV of gene hits (gene, identity, coverage)")]
    Classify(ClassifyArgs),
    #[command(about = "Inspect or back up the reference table")]
    Reference(ReferenceArgs),
    #[command(about = "Write a model input CSV")]
    Template(TemplateArgs),
}

#[derive(Args)]
struct ClassifyArgs {
    input: PathBuf,

    #[arg(long, value_enum)]
    gram: GramStain,
}

#[derive(Args)]
struct ReferenceArgs {
    #[command(subcommand)]
    command: Option<ReferenceCommand>,
}

#[derive(Subcommand)]
enum ReferenceCommand {
    #[command(about = "Print the normalized reference table")]
    Show,
    #[command(about = "Copy the reference table to a timestamped backup")]
    Backup,
}

#[derive(Args)]
struct TemplateArgs {
    path: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::MissingColumn { .. }
        | KiraError::AmbiguousColumn { .. }
        | KiraError::ReferenceMissing(_)
        | KiraError::InputMissing(_) => 2,
        KiraError::AnnotationHttp(_)
        | KiraError::AnnotationStatus { .. }
        | KiraError::ReconcileInProgress(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    if let Commands::Template(args) = &cli.command {
        let result = write_template(args.path.as_deref())?;
        return match output_mode {
            OutputMode::NonInteractive => JsonOutput::print_template(&result),
            OutputMode::Interactive => TextOutput::print_template(&result),
        }
        .into_diagnostic();
    }

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let annotation = UniprotAnnotationClient::new(&config.base_url)?;
    let app = App::new(config, annotation);

    match cli.command {
        Commands::Reconcile => match output_mode {
            OutputMode::NonInteractive => {
                let summary = app.reconcile(&JsonOutput)?;
                JsonOutput::print_reconcile(&summary).into_diagnostic()
            }
            OutputMode::Interactive => {
                let summary = app.reconcile(&TextOutput)?;
                TextOutput::print_reconcile(&summary).into_diagnostic()
            }
        },
        Commands::Classify(args) => match output_mode {
            OutputMode::NonInteractive => {
                let report = app.classify(&args.input, args.gram, &JsonOutput)?;
                JsonOutput::print_classify(&report).into_diagnostic()
            }
            OutputMode::Interactive => {
                let report = app.classify(&args.input, args.gram, &TextOutput)?;
                TextOutput::print_classify(&report).into_diagnostic()
            }
        },
        Commands::Reference(args) => match args.command.unwrap_or(ReferenceCommand::Show) {
            ReferenceCommand::Show => match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.reference(&JsonOutput)?;
                    JsonOutput::print_reference(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.reference(&TextOutput)?;
                    TextOutput::print_reference(&result).into_diagnostic()
                }
            },
            ReferenceCommand::Backup => match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.backup(&JsonOutput)?;
                    JsonOutput::print_backup(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.backup(&TextOutput)?;
                    TextOutput::print_backup(&result).into_diagnostic()
                }
            },
        },
        Commands::Template(_) => Ok(()),
    }
}
