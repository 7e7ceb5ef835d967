//! Railcheck command line interface.
//!
//! `run` sends a rail's demo prompt to a live provider and validates the
//! response; `check` validates response text you already have, with no
//! network at all. The exit code encodes the verdict so scripts can branch
//! on it: 0 pass, 1 fail, 2 inconclusive.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use railcheck_core::{
    evaluate, validate_config_schema, DisplayRecord, ExpectedShape, HistoryEntry, ModelParams,
    Outcome, Rail, RailConfig, RawResponse, RequestContext, RequestOptions,
};
use railcheck_runtime::{
    prompts, Dispatcher, ModelCatalog, ProviderGateway, ProviderRegistry, RuntimeConfig,
};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Guardrail demos for model responses.
#[derive(Parser)]
#[command(name = "railcheck", version, about = "Guardrail demos for model responses")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a rail's demo prompt to a provider and validate the response
    Run {
        /// Rail to exercise (see `railcheck rails` for the list)
        rail: String,
        /// Provider id (gemini or openai)
        #[arg(long, default_value = "gemini")]
        provider: String,
        /// Model id; the provider's default model when omitted
        #[arg(long)]
        model: Option<String>,
        /// Prompt to send; the rail's demo prompt when omitted
        #[arg(long)]
        prompt: Option<String>,
        /// Combined configuration file (rail thresholds + runtime section)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Provider deadline override (e.g. "10s", "1m")
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
        /// Ask the provider to ground the response with web search
        #[arg(long)]
        web_search: bool,
        /// Sampling temperature
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        /// Response token cap
        #[arg(long, default_value_t = 1024)]
        max_tokens: u32,
    },

    /// Validate response text you already have, without any provider call
    Check {
        /// Rail to validate against
        rail: String,
        /// Response text to validate
        #[arg(long, conflicts_with = "response_file")]
        response: Option<String>,
        /// File holding the response text
        #[arg(long)]
        response_file: Option<PathBuf>,
        /// Treat the response as a provider timeout
        #[arg(long)]
        timed_out: bool,
        /// Prompt the response answered; the rail's demo prompt when omitted
        #[arg(long)]
        prompt: Option<String>,
        /// Combined configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the models each configured provider serves
    Models {
        /// Only this provider; all compiled-in providers when omitted
        #[arg(long)]
        provider: Option<String>,
        /// Combined configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the guardrails and the response shape each expects
    Rails,

    /// Validate a configuration file against the schema and semantic rules
    Validate {
        /// Path to the YAML configuration file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("railcheck=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            rail,
            provider,
            model,
            prompt,
            config,
            timeout,
            web_search,
            temperature,
            max_tokens,
        } => {
            cmd_run(
                RunOptions {
                    rail,
                    provider,
                    model,
                    prompt,
                    config,
                    timeout,
                    web_search,
                    temperature,
                    max_tokens,
                },
                cli.output,
            )
            .await
        }
        Commands::Check {
            rail,
            response,
            response_file,
            timed_out,
            prompt,
            config,
        } => cmd_check(
            &rail,
            response,
            response_file.as_deref(),
            timed_out,
            prompt,
            config.as_deref(),
            cli.output,
        ),
        Commands::Models { provider, config } => {
            cmd_models(provider, config.as_deref(), cli.output).await
        }
        Commands::Rails => cmd_rails(cli.output),
        Commands::Validate { file } => cmd_validate(&file, cli.output),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("error: {:#}", error);
            process::exit(1);
        }
    }
}

struct RunOptions {
    rail: String,
    provider: String,
    model: Option<String>,
    prompt: Option<String>,
    config: Option<PathBuf>,
    timeout: Option<Duration>,
    web_search: bool,
    temperature: f32,
    max_tokens: u32,
}

async fn cmd_run(opts: RunOptions, output: OutputFormat) -> Result<i32> {
    let rail = parse_rail(&opts.rail)?;
    let (rail_config, mut runtime_config) = load_configs(opts.config.as_deref())?;
    if let Some(timeout) = opts.timeout {
        runtime_config.provider_timeout = timeout;
    }

    let registry = ProviderRegistry::with_defaults();
    let gateway = build_gateway(&registry, &opts.provider, &runtime_config)?;

    let model = match opts.model {
        Some(model) => model,
        None => {
            let catalog = ModelCatalog::new(
                runtime_config.model_cache_capacity,
                runtime_config.model_cache_ttl,
            );
            catalog
                .list(&gateway)
                .await
                .with_context(|| format!("listing models for '{}'", opts.provider))?
                .default_model
        }
    };

    let ctx = RequestContext::new(
        rail,
        opts.prompt.as_deref().unwrap_or(""),
        &opts.provider,
        &model,
    )
    .with_options(RequestOptions {
        web_search: opts.web_search,
        structured_output: rail.expected_shape() == ExpectedShape::Json,
    })
    .with_params(ModelParams {
        temperature: opts.temperature,
        max_tokens: opts.max_tokens,
    });

    let dispatcher = Dispatcher::builder()
        .gateway(gateway)
        .rail_config(rail_config)
        .runtime_config(&runtime_config)
        .build()?;

    let entry = dispatcher.run_demo(&ctx).await;
    print_entry(&entry, output)?;
    Ok(exit_code(entry.verdict.outcome))
}

fn cmd_check(
    rail: &str,
    response: Option<String>,
    response_file: Option<&Path>,
    timed_out: bool,
    prompt: Option<String>,
    config: Option<&Path>,
    output: OutputFormat,
) -> Result<i32> {
    let rail = parse_rail(rail)?;
    let (rail_config, _) = load_configs(config)?;

    let raw = if timed_out {
        RawResponse::TimedOut
    } else if let Some(text) = response {
        RawResponse::text(text)
    } else if let Some(path) = response_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading '{}'", path.display()))?;
        RawResponse::text(contents)
    } else {
        bail!("provide --response, --response-file, or --timed-out");
    };

    let prompt = prompt.unwrap_or_else(|| prompts::default_prompt(rail).to_string());
    let ctx = RequestContext::new(rail, &prompt, "offline", "none").with_options(RequestOptions {
        web_search: false,
        structured_output: rail.expected_shape() == ExpectedShape::Json,
    });

    let verdict = evaluate(&raw, &ctx, &rail_config);
    let entry = HistoryEntry::new(rail, &prompt, verdict);
    print_entry(&entry, output)?;
    Ok(exit_code(entry.verdict.outcome))
}

async fn cmd_models(
    provider: Option<String>,
    config: Option<&Path>,
    output: OutputFormat,
) -> Result<i32> {
    let (_, runtime_config) = load_configs(config)?;
    let registry = ProviderRegistry::with_defaults();

    let providers: Vec<String> = match provider {
        Some(provider) => vec![provider],
        None => registry
            .available_types()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };
    if providers.is_empty() {
        bail!("no providers compiled in; enable the gemini and/or openai features");
    }

    let mut gateways: Vec<Arc<dyn ProviderGateway>> = Vec::new();
    for provider in &providers {
        gateways.push(build_gateway(&registry, provider, &runtime_config)?);
    }

    let catalog = ModelCatalog::new(
        runtime_config.model_cache_capacity,
        runtime_config.model_cache_ttl,
    );
    let results = catalog.refresh_all(&gateways).await;

    let mut failures = 0;
    match output {
        OutputFormat::Text => {
            for (provider, result) in &results {
                match result {
                    Ok(listing) => {
                        println!("{} (default: {})", provider, listing.default_model);
                        for model in &listing.models {
                            match &model.display_name {
                                Some(name) => println!("  {:<40} {}", model.id, name),
                                None => println!("  {}", model.id),
                            }
                        }
                    }
                    Err(error) => {
                        eprintln!("{}: {}", provider, error);
                        failures += 1;
                    }
                }
            }
        }
        OutputFormat::Json => {
            let mut map = serde_json::Map::new();
            for (provider, result) in &results {
                match result {
                    Ok(listing) => {
                        map.insert(provider.clone(), serde_json::to_value(listing)?);
                    }
                    Err(error) => {
                        map.insert(
                            provider.clone(),
                            serde_json::json!({ "error": error.to_string() }),
                        );
                        failures += 1;
                    }
                }
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(map))?
            );
        }
    }

    Ok(if failures == results.len() { 1 } else { 0 })
}

fn cmd_rails(output: OutputFormat) -> Result<i32> {
    match output {
        OutputFormat::Text => {
            for rail in Rail::ALL {
                println!(
                    "{:<22} {:<26} {}",
                    rail.id(),
                    rail.label(),
                    rail.expected_shape()
                );
            }
        }
        OutputFormat::Json => {
            let rails: Vec<serde_json::Value> = Rail::ALL
                .iter()
                .map(|rail| {
                    serde_json::json!({
                        "id": rail.id(),
                        "label": rail.label(),
                        "shape": rail.expected_shape(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rails)?);
        }
    }
    Ok(0)
}

fn cmd_validate(file: &Path, output: OutputFormat) -> Result<i32> {
    let contents =
        std::fs::read_to_string(file).with_context(|| format!("reading '{}'", file.display()))?;
    let value: serde_json::Value =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing '{}'", file.display()))?;

    // Structural pass against the schema first, then the semantic pass.
    let mut errors: Vec<String> = Vec::new();
    if let Err(schema_errors) = validate_config_schema(&value) {
        errors.extend(schema_errors);
    }
    if errors.is_empty() {
        if let Err(error) = RailConfig::from_yaml(&contents) {
            errors.push(error.to_string());
        }
        if let Err(error) = RuntimeConfig::from_yaml(&contents) {
            errors.push(error.to_string());
        }
    }

    if errors.is_empty() {
        match output {
            OutputFormat::Text => println!("valid"),
            OutputFormat::Json => println!("{}", serde_json::json!({ "valid": true })),
        }
        Ok(0)
    } else {
        match output {
            OutputFormat::Text => {
                for error in &errors {
                    eprintln!("{}", error);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &serde_json::json!({ "valid": false, "errors": errors })
                    )?
                );
            }
        }
        Ok(1)
    }
}

fn parse_rail(id: &str) -> Result<Rail> {
    id.parse::<Rail>().map_err(|message| anyhow::anyhow!(message))
}

fn load_configs(path: Option<&Path>) -> Result<(RailConfig, RuntimeConfig)> {
    match path {
        Some(path) => {
            let rail = RailConfig::from_yaml_file(path)
                .with_context(|| format!("loading rail config from '{}'", path.display()))?;
            let runtime = RuntimeConfig::from_yaml_file(path)
                .with_context(|| format!("loading runtime config from '{}'", path.display()))?;
            Ok((rail, runtime))
        }
        None => Ok((RailConfig::default(), RuntimeConfig::default())),
    }
}

/// Build a gateway from the config file's provider block, falling back to
/// the factory's defaults (API keys come from the environment either way).
fn build_gateway(
    registry: &ProviderRegistry,
    provider: &str,
    runtime: &RuntimeConfig,
) -> Result<Arc<dyn ProviderGateway>> {
    let config = runtime
        .provider_config(provider)
        .cloned()
        .or_else(|| registry.default_config(provider))
        .unwrap_or_else(|| serde_json::json!({}));
    let gateway = registry
        .create(provider, &config)
        .with_context(|| format!("building the '{}' gateway", provider))?;
    Ok(gateway)
}

fn print_entry(entry: &HistoryEntry, output: OutputFormat) -> Result<()> {
    let record = DisplayRecord::from(entry);
    match output {
        OutputFormat::Text => {
            println!("{}", record);
            for line in &record.evidence {
                println!("    {}", line);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
    }
    Ok(())
}

fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Pass => 0,
        Outcome::Fail => 1,
        Outcome::Inconclusive => 2,
    }
}
