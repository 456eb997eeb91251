mod adapters;
mod config;
mod core;
mod error;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pr-reviewer")]
#[command(about = "Reviews a pull request diff with an LLM and posts the feedback to the pull request", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true, help = "Ref to diff against (defaults to origin/master)")]
    base_ref: Option<String>,

    #[arg(long, global = true, help = "Path to a YAML config file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "markdown")]
    output_format: OutputFormat,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Review the pull request and publish the result")]
    Review {
        #[arg(long, help = "Pull request number (overrides the event payload)")]
        pr: Option<u64>,

        #[arg(long, help = "Repository as owner/name (overrides the event payload)")]
        repo: Option<String>,

        #[arg(long, help = "Print the review without publishing it")]
        dry_run: bool,

        #[arg(long, help = "Only request the overall review")]
        no_line_comments: bool,
    },
    #[command(about = "Print an overall review of the local diff")]
    Diff,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match cli.config.as_ref() {
        Some(path) => config::Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::Config::load().context("Failed to load config file")?,
    };
    config.apply_env();
    config.merge_with_cli(cli.model.clone(), cli.base_ref.clone());

    match cli.command {
        Commands::Review {
            pr,
            repo,
            dry_run,
            no_line_comments,
        } => {
            if no_line_comments {
                config.per_file_comments = false;
            }
            review_command(config, pr, repo, dry_run, cli.output_format).await?;
        }
        Commands::Diff => {
            config.per_file_comments = false;
            diff_command(config, cli.output_format).await?;
        }
    }

    Ok(())
}

async fn review_command(
    config: config::Config,
    pr_number: Option<u64>,
    repo: Option<String>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let overrides_given = pr_number.is_some() && repo.is_some();
    let run_config = config
        .resolve(!dry_run, !dry_run && !overrides_given)
        .context("Configuration is incomplete")?;

    let pr = resolve_pull_request(&run_config, pr_number, repo, dry_run)?;
    if let Some(pr) = pr.as_ref() {
        info!("Reviewing pull request {}", pr);
    }

    let git = core::GitCli::discover(".").context("Failed to open git repository")?;
    log_git_context(&git);

    let adapter = adapters::OpenAIAdapter::new(model_config(&config, &run_config))?;
    let host = match (&pr, dry_run) {
        (Some(_), false) => Some(adapters::GitHubClient::new(
            run_config.github_token.clone().unwrap_or_default(),
            config.github_api_url.clone(),
            config.request_timeout_secs,
        )?),
        _ => None,
    };

    let orchestrator =
        core::Orchestrator::new(run_config, &git, &adapter, prompt_builder(&config));
    let Some(result) = orchestrator.review().await.context("Review failed")? else {
        println!("No changes found");
        return Ok(());
    };

    print_result(&result, format)?;

    match (pr, host) {
        (Some(pr), Some(host)) => {
            let outcome = orchestrator
                .publish(&host, &pr, &result)
                .await
                .context("Failed to publish review")?;
            match outcome {
                core::PublishOutcome::Review { comments } => {
                    println!("Posted review with {} line comments to {}", comments, pr)
                }
                core::PublishOutcome::Comment => println!("Posted review comment to {}", pr),
                core::PublishOutcome::FallbackComment { reason } => println!(
                    "Inline review was rejected ({}); posted a single comment to {}",
                    reason, pr
                ),
            }
        }
        _ => info!("Dry run, nothing published"),
    }

    Ok(())
}

async fn diff_command(config: config::Config, format: OutputFormat) -> Result<()> {
    let run_config = config
        .resolve(false, false)
        .context("Configuration is incomplete")?;

    let git = core::GitCli::discover(".").context("Failed to open git repository")?;
    log_git_context(&git);

    let adapter = adapters::OpenAIAdapter::new(model_config(&config, &run_config))?;
    let orchestrator =
        core::Orchestrator::new(run_config, &git, &adapter, prompt_builder(&config));

    match orchestrator.review().await.context("Review failed")? {
        Some(result) => print_result(&result, format)?,
        None => println!("No changes found"),
    }

    Ok(())
}

fn resolve_pull_request(
    run_config: &config::RunConfig,
    pr_number: Option<u64>,
    repo: Option<String>,
    dry_run: bool,
) -> Result<Option<core::PullRequestRef>> {
    if let (Some(number), Some(repo)) = (pr_number, repo.as_ref()) {
        return Ok(Some(core::PullRequestRef::new(number, repo.clone())?));
    }

    let Some(path) = run_config.event_path.as_ref() else {
        return Ok(None);
    };

    match core::PullRequestRef::from_event_file(path) {
        Ok(mut pr) => {
            if let Some(number) = pr_number {
                pr.number = number;
            }
            if let Some(repo) = repo {
                pr = core::PullRequestRef::new(pr.number, repo)?;
            }
            Ok(Some(pr))
        }
        Err(err) if dry_run => {
            warn!("No pull request for dry run: {}", err);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn model_config(
    config: &config::Config,
    run_config: &config::RunConfig,
) -> adapters::llm::ModelConfig {
    adapters::llm::ModelConfig {
        model_name: config.model.clone(),
        api_key: Some(run_config.openai_api_key.clone()),
        base_url: config.openai_base_url.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout_secs: config.request_timeout_secs,
    }
}

fn prompt_builder(config: &config::Config) -> core::PromptBuilder {
    let mut prompt_config = core::PromptConfig::default();
    if let Some(system_prompt) = config.system_prompt.clone() {
        prompt_config.system_prompt = system_prompt;
    }
    core::PromptBuilder::new(prompt_config)
}

fn log_git_context(git: &core::GitCli) {
    info!("Repository: {}", git.workdir().display());
    if let Ok(branch) = git.current_branch() {
        info!("Current branch: {}", branch);
    }
    if let Ok(Some(remote)) = git.remote_url() {
        info!("Remote URL: {}", remote);
    }
}

fn print_result(result: &core::ReviewResult, format: OutputFormat) -> Result<()> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Markdown => result.to_markdown(),
    };
    println!("{}", output);
    Ok(())
}
