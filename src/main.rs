use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use jacoco_report::action::{self, ActionOutput};
use jacoco_report::coverage::format_percentage;
use jacoco_report::git::LocalChanges;
use jacoco_report::github::{self, GitHubClient, PublishPolicy, PullRequestApi};
use jacoco_report::{
    CommentOptions, CommentRenderer, CoverageEvaluator, FileConfig, InputArgs, Inputs,
    JacocoParser, ReportFileCoverage, ReportScanner,
};

const LOG_ENV: &str = "JACOCO_REPORT_LOG";

#[derive(Parser)]
#[command(name = "jacoco-report")]
#[command(about = "Check JaCoCo coverage of a pull request against thresholds")]
#[command(version)]
struct Cli {
    /// Path to config file (default: jacoco-report.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Take changed files from the local repository since this reference
    /// and print the comment instead of posting it
    #[arg(long)]
    base_ref: Option<String>,

    #[command(flatten)]
    inputs: InputArgs,
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let inputs = match FileConfig::discover(cli.config.as_deref())
        .and_then(|file_config| Inputs::resolve(&cli.inputs, file_config))
    {
        Ok(inputs) => inputs,
        Err(e) => exit_with_error(e),
    };

    init_logging(inputs.debug);
    inputs.log();

    match run(&cli, &inputs) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => exit_with_error(e),
    }
}

fn exit_with_error(e: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), e);
    std::process::exit(1);
}

/// Pull request the comment goes to
struct PullRequest {
    client: GitHubClient,
    number: u64,
}

/// Returns whether the run passed
fn run(cli: &Cli, inputs: &Inputs) -> Result<bool> {
    let root_dir = std::env::current_dir().context("Failed to read the working directory")?;

    let (changed_files, pull_request) = match cli.base_ref.as_deref() {
        Some(base_ref) => (LocalChanges::open(&root_dir)?.changed_files(base_ref)?, None),
        None => {
            let pull_request = connect_pull_request(inputs)?;
            let files = pull_request.client.changed_files(pull_request.number)?;
            (files, Some(pull_request))
        }
    };
    info!("{} changed file(s)", changed_files.len());

    let report_paths = ReportScanner::new(&root_dir, &inputs.paths, &inputs.exclude_paths).scan()?;
    if report_paths.is_empty() {
        warn!("No JaCoCo reports found for {:?}", inputs.paths);
        println!("{} {}", "⚠".yellow(), "No JaCoCo reports found, nothing to evaluate.".yellow());
        return Ok(true);
    }
    info!("Found {} report(s)", report_paths.len());

    let parser = JacocoParser::new(&changed_files, &inputs.modules);

    let mut evaluator = CoverageEvaluator::new(
        parse_reports(&parser, &report_paths)?,
        inputs.global_thresholds,
        inputs.modules.clone(),
        inputs.metric,
        inputs.skip_unchanged,
    );
    evaluator.evaluate();

    let baseline = if inputs.baseline_paths.is_empty() {
        None
    } else {
        let paths =
            ReportScanner::new(&root_dir, &inputs.baseline_paths, &inputs.exclude_paths).scan()?;
        info!("Found {} baseline report(s)", paths.len());

        let mut baseline = CoverageEvaluator::new(
            parse_reports(&parser, &paths)?,
            inputs.global_thresholds,
            inputs.modules.clone(),
            inputs.metric,
            inputs.skip_unchanged,
        );
        baseline.evaluate();
        Some(baseline)
    };

    let options = CommentOptions {
        title: inputs.title.clone(),
        metric: inputs.metric,
        comment_level: inputs.comment_level,
        skip_unchanged: inputs.skip_unchanged,
        pass_symbol: inputs.pass_symbol.clone(),
        fail_symbol: inputs.fail_symbol.clone(),
        repository: pull_request
            .as_ref()
            .map(|pr| pr.client.repository().to_string())
            .or_else(github::repository)
            .unwrap_or_default(),
        pr_number: pull_request.as_ref().map(|pr| pr.number),
    };
    let renderer = CommentRenderer::new(&evaluator, baseline.as_ref(), &options);
    let body = renderer.render();

    match &pull_request {
        Some(pr) => {
            let policy = PublishPolicy {
                update_comment: inputs.update_comment,
                skip_unchanged: inputs.skip_unchanged,
            };
            let action = github::publish_comment(
                &pr.client,
                pr.number,
                &renderer.title(),
                &body,
                policy,
                evaluator.changed_files_count(),
            )?;
            info!("Comment: {:?}", action);
        }
        None => println!("{}\n", body),
    }

    let output = ActionOutput::from_env();
    output.write_evaluation(&evaluator)?;
    info!("Outputs written to {}", output.path().display());

    for line in action::error_annotations(&evaluator.violations) {
        println!("{}", line);
    }

    print_summary(&evaluator, inputs);

    Ok(!action::should_fail(&evaluator.reached, &inputs.fail_on_threshold))
}

fn connect_pull_request(inputs: &Inputs) -> Result<PullRequest> {
    let event = github::event_name().unwrap_or_default();
    if event != "pull_request" {
        anyhow::bail!(
            "Not a pull request event ('{}'). Use --base-ref to evaluate local changes.",
            event
        );
    }

    let token = inputs
        .token
        .clone()
        .context("'token' must be a non-empty string.")?;
    let repository = github::repository().context("GITHUB_REPOSITORY is not set")?;
    let number = github::detect_pr_number(inputs.pr_number)
        .context("Failed to detect the pull request number")?;
    info!("Pull request #{} in {}", number, repository);

    Ok(PullRequest {
        client: GitHubClient::new(token, repository)?,
        number,
    })
}

fn parse_reports(parser: &JacocoParser, paths: &[PathBuf]) -> Result<Vec<ReportFileCoverage>> {
    paths
        .iter()
        .map(|path| parser.parse(path))
        .collect()
}

fn print_summary(evaluator: &CoverageEvaluator, inputs: &Inputs) {
    let status = |passed: bool| {
        if passed {
            "passed".green()
        } else {
            "failed".red()
        }
    };

    println!("\n{} {}", "📊".cyan(), inputs.title.bold());
    println!(
        "  {} {}% (threshold {}%) {}",
        "Overall:".dimmed(),
        format_percentage(evaluator.total_coverage_overall),
        format_percentage(inputs.global_thresholds.overall),
        status(evaluator.total_coverage_overall_passed)
    );
    println!(
        "  {} {}% (threshold {}%) {}",
        "Changed files:".dimmed(),
        format_percentage(evaluator.total_coverage_changed_files),
        format_percentage(inputs.global_thresholds.changed_files_average),
        status(evaluator.total_coverage_changed_files_passed)
    );
    println!(
        "  {} {} report(s), {} module(s), {} changed file(s)",
        "Evaluated:".dimmed(),
        evaluator.evaluated_reports_coverage.len(),
        evaluator.evaluated_modules_coverage.len(),
        evaluator.changed_files_count()
    );

    if evaluator.violations.is_empty() {
        println!("\n{} {}", "✓".green(), "All thresholds reached".green());
    } else {
        let heading = format!("{} violation(s):", evaluator.violations.len());
        println!("\n{} {}", "✗".red(), heading.red());
        for violation in &evaluator.violations {
            println!("  {} {}", "•".red(), violation);
        }
    }
}
