use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeduel_core::{
    CodeDuelConfig, EvaluationEvent, EvaluationReport, ExecutionRequest, Language, Submission,
    TestCase,
};
use codeduel_runner::{
    compare, extract_signature, wrap, DockerSandbox, Evaluator, HiddenTestGenerator, Sandbox,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codeduel")]
#[command(about = "Codeduel - sandboxed multi-language solution runner", long_about = None)]
struct Cli {
    /// JSON config file (sandbox, generator and evaluator sections)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the inferred parameter signature of a solution
    Signature {
        #[arg(short, long)]
        lang: Language,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the wrapped program for a solution
    Wrap {
        #[arg(short, long)]
        lang: Language,

        #[arg(short, long)]
        file: PathBuf,

        /// Reference solution supplying the signature
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },

    /// Wrap and execute a solution in the sandbox
    Run {
        #[arg(short, long)]
        lang: Language,

        #[arg(short, long)]
        file: PathBuf,

        /// Program input, one argument per line
        #[arg(short, long, default_value = "")]
        input: String,
    },

    /// Evaluate a candidate against a JSON file of test cases
    Evaluate {
        #[arg(short, long)]
        lang: Language,

        #[arg(short = 'C', long)]
        candidate: PathBuf,

        #[arg(short, long)]
        tests: PathBuf,

        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Generate hidden test cases from a reference solution
    Generate {
        #[arg(short, long)]
        lang: Language,

        #[arg(short, long)]
        reference: PathBuf,

        #[arg(short, long)]
        attempts: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Compare an expected and an actual output
    Compare { expected: String, actual: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = CodeDuelConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Signature { lang, file } => cmd_signature(lang, &file)?,
        Commands::Wrap { lang, file, reference } => cmd_wrap(lang, &file, reference.as_deref())?,
        Commands::Run { lang, file, input } => cmd_run(&config, lang, &file, input).await?,
        Commands::Evaluate {
            lang,
            candidate,
            tests,
            reference,
            output,
        } => cmd_evaluate(&config, lang, &candidate, &tests, reference.as_deref(), &output).await?,
        Commands::Generate {
            lang,
            reference,
            attempts,
            seed,
        } => cmd_generate(config, lang, &reference, attempts, seed).await?,
        Commands::Compare { expected, actual } => cmd_compare(&expected, &actual),
    }

    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))
}

fn sandbox(config: &CodeDuelConfig) -> Arc<dyn Sandbox> {
    Arc::new(DockerSandbox::new(config.sandbox.clone()))
}

fn cmd_signature(lang: Language, file: &Path) -> Result<()> {
    let source = read_source(file)?;
    let signature = extract_signature(lang, &source);
    println!("{}", serde_json::to_string(&signature)?);
    Ok(())
}

fn cmd_wrap(lang: Language, file: &Path, reference: Option<&Path>) -> Result<()> {
    let source = read_source(file)?;
    let signature = match reference {
        Some(path) => extract_signature(lang, &read_source(path)?),
        None => extract_signature(lang, &source),
    };
    let program = wrap(lang, &source, &signature)?;
    print!("{}", program.source);
    Ok(())
}

async fn cmd_run(config: &CodeDuelConfig, lang: Language, file: &Path, input: String) -> Result<()> {
    let source = read_source(file)?;
    let program = wrap(lang, &source, &extract_signature(lang, &source))?;
    let request = ExecutionRequest::new(lang, program, input, "cli");

    let result = sandbox(config).run(request).await?;
    let elapsed = result.wall_time_ms;
    match result.into_output() {
        Ok(output) => {
            println!("{}", output);
            eprintln!("({:.1} ms)", elapsed);
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.kind(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn cmd_evaluate(
    config: &CodeDuelConfig,
    lang: Language,
    candidate: &Path,
    tests: &Path,
    reference: Option<&Path>,
    output_format: &str,
) -> Result<()> {
    let candidate = read_source(candidate)?;
    let reference = reference.map(read_source).transpose()?;
    let tests: Vec<TestCase> = serde_json::from_str(&read_source(tests)?)
        .with_context(|| format!("Cannot parse test cases from {}", tests.display()))?;

    let submission = Submission::new(lang.tag(), candidate, reference, "cli")?;
    let evaluator = Evaluator::new(sandbox(config), config.evaluator.clone());

    if output_format == "json" {
        let report = evaluator.evaluate(&submission, &tests).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("Evaluating {} test case(s)...", tests.len());
    println!("{:-<60}", "");

    let (tx, mut rx) = mpsc::channel(32);
    let progress = async {
        while let Some(event) = rx.recv().await {
            if let EvaluationEvent::TestResult {
                test_num,
                test_total,
                report,
            } = event
            {
                let status = if report.passed { "PASS" } else { "FAIL" };
                println!(
                    "  [{}/{}] {}  {:.1} ms",
                    test_num, test_total, status, report.execution_time_ms
                );
                if !report.passed {
                    println!("      expected: {}", report.expected);
                    match (&report.actual, &report.error) {
                        (_, Some(error)) => println!("      error:    {}", error),
                        (Some(actual), None) => println!("      actual:   {}", actual),
                        (None, None) => {}
                    }
                }
            }
        }
    };
    let (report, ()) = tokio::join!(evaluator.evaluate_streaming(&submission, &tests, tx), progress);
    print_summary(&report?);

    Ok(())
}

fn print_summary(report: &EvaluationReport) {
    println!("{:-<60}", "");
    println!("  Passed:    {}/{}", report.passed, report.total);
    println!(
        "  Verified:  {}",
        if report.verified_solution { "yes" } else { "no" }
    );
    println!();
}

async fn cmd_generate(
    mut config: CodeDuelConfig,
    lang: Language,
    reference: &Path,
    attempts: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let reference = read_source(reference)?;
    if seed.is_some() {
        config.generator.seed = seed;
    }
    let attempts = attempts.unwrap_or(config.generator.attempts);

    let generator = HiddenTestGenerator::new(sandbox(&config), config.generator.clone());
    let tests: Vec<TestCase> = generator.generate(lang, reference, attempts).collect().await;

    println!("{}", serde_json::to_string_pretty(&tests)?);
    Ok(())
}

fn cmd_compare(expected: &str, actual: &str) {
    let outcome = compare(expected, actual);
    let verdict = if outcome.passed { "match" } else { "mismatch" };
    println!("{} ({:?})", verdict, outcome.strategy);
}
