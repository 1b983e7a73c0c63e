//! # vmpilot CLI
//!
//! Command-line interface for driving remote instances with a model.
//!
//! Usage:
//!   vmpilot chat [--instance-type ubuntu|browser] [--model <model>]
//!   vmpilot research [--max-companies N] [--parallel K] [--batch W25] [--follow-up <task>]
//!   vmpilot dungeon
//!   vmpilot market <company>
//!   vmpilot sales <company>... [--industry <industry>] [--notes <notes>]
//!
//! Examples:
//!   vmpilot chat --instance-type browser
//!   vmpilot research --max-companies 10 --parallel 2
//!   vmpilot sales "TechCorp Solutions" --industry "Enterprise Software"

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vmpilot_agent::settings::SCRAPYBARA_API_KEY;
use vmpilot_agent::{
    scenarios, Agent, ConsoleObserver, Conversation, InstanceGuard, ResearchConfig, SalesLead,
    SessionOutcome, Settings, SettingsError, StopReason, WideResearch,
};
use vmpilot_runtime::{InstanceApi, InstanceHandle, InstanceKind, ModelChoice, ToolSet};

const CHAT_MODELS: [&str; 2] = ["claude-3-7-sonnet-20250219", "claude-3-5-sonnet-20241022"];
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const ENRICH_MODEL: &str = "gpt-4o";

#[derive(Parser)]
#[command(name = "vmpilot")]
#[command(author, version, about = "vmpilot - let a model drive remote desktops and browsers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the model while it works on one instance
    Chat {
        #[arg(long, default_value = "ubuntu", value_parser = ["ubuntu", "browser"])]
        instance_type: String,

        #[arg(long, default_value = DEFAULT_MODEL, value_parser = CHAT_MODELS)]
        model: String,
    },
    /// Collect companies from the YC directory and find a contact for each
    Research {
        #[arg(long, default_value = "20")]
        max_companies: usize,

        /// Enrichment instances running at once
        #[arg(long, default_value = "4")]
        parallel: usize,

        #[arg(long, default_value = "W25")]
        batch: String,

        /// Task for one more desktop session over the results
        #[arg(long)]
        follow_up: Option<String>,

        /// Report directory (default: VMPILOT_OUTPUT_DIR or ./output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = DEFAULT_MODEL)]
        extract_model: String,

        #[arg(long, default_value = ENRICH_MODEL)]
        enrich_model: String,
    },
    /// Play Dungeon Crawl Stone Soup
    Dungeon {
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// Research a company into Writer and Calc documents
    Market {
        #[arg(required = true)]
        company: String,

        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// Prepare sales outreach material, one company at a time
    Sales {
        #[arg(required = true)]
        companies: Vec<String>,

        #[arg(long)]
        industry: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Load settings, asking for the instance key when it is not in the environment
fn load_settings(interactive: bool) -> Result<Settings> {
    match Settings::from_env() {
        Ok(settings) => Ok(settings),
        Err(SettingsError::MissingEnvVar(var)) if interactive && var == SCRAPYBARA_API_KEY => {
            let key = prompt_line("Enter your Scrapybara API key: ")?;
            let settings = Settings::from_lookup(|name| {
                if name == SCRAPYBARA_API_KEY {
                    Some(key.clone())
                } else {
                    std::env::var(name).ok()
                }
            })?;
            Ok(settings)
        }
        Err(e) => Err(e.into()),
    }
}

fn agent_for(settings: &Settings, model: &str) -> Result<Agent<ModelChoice>> {
    Ok(Agent::with_config(settings.provider(model)?, settings.agent_config(model)))
}

/// Run `body` on a fresh instance and stop the instance afterwards.
///
/// Ctrl+C abandons the body; the instance is still stopped and `None` returned.
async fn on_instance<A, F, Fut, T>(api: &A, kind: InstanceKind, body: F) -> Result<Option<T>>
where
    A: InstanceApi,
    F: FnOnce(InstanceHandle) -> Fut,
    Fut: Future<Output = T>,
{
    let guard = InstanceGuard::start(api, kind).await?;
    println!("Started {} instance {}", kind, guard.handle().id);
    if let Some(url) = guard.stream_url() {
        println!("Stream URL: {}", url);
    }

    let outcome = tokio::select! {
        value = body(guard.handle().clone()) => Some(value),
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted, stopping instance...");
            None
        }
    };

    let id = guard.handle().id.clone();
    if let Err(e) = guard.stop().await {
        eprintln!("Failed to stop instance {}: {}", id, e);
    }
    Ok(outcome)
}

/// Run each lead in turn and return how many ran to the end.
///
/// A lead whose instance fails to start is reported and skipped; `Ok(None)`
/// means Ctrl+C and ends the run.
async fn for_each_lead<F, Fut>(leads: Vec<SalesLead>, mut run: F) -> usize
where
    F: FnMut(SalesLead) -> Fut,
    Fut: Future<Output = Result<Option<()>>>,
{
    let mut finished = 0;
    for lead in leads {
        let name = lead.name.clone();
        match run(lead).await {
            Ok(Some(())) => finished += 1,
            Ok(None) => break,
            Err(e) => {
                warn!(lead = %name, error = %e, "skipping lead");
                eprintln!("Could not research {}: {}", name, e);
            }
        }
    }
    finished
}

fn print_outcome(outcome: &SessionOutcome) {
    match outcome.stop {
        StopReason::ModelError => {
            if let Some(e) = &outcome.error {
                eprintln!("Model error: {}", e);
            }
        }
        StopReason::RoundLimit => eprintln!("Stopped at the round limit"),
        StopReason::Completed | StopReason::StructuredOutput => {}
    }
    println!(
        "\nFinished after {} rounds ({} tokens)",
        outcome.rounds,
        outcome.usage.total_tokens()
    );
}

async fn chat(settings: &Settings, kind: InstanceKind, model: &str) -> Result<()> {
    let api = settings.instance_client()?;
    let agent = agent_for(settings, model)?;

    let guard = InstanceGuard::start(&api, kind).await?;
    println!("Started {} instance {}", kind, guard.handle().id);
    if let Some(url) = guard.stream_url() {
        println!("Stream URL: {}", url);
    }
    println!("Type a message, or 'exit' to quit.\n");

    let tools = ToolSet::for_instance(&api, guard.handle().clone());
    let mut conversation = Conversation::new(&agent, tools);
    let observer = ConsoleObserver::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        tokio::select! {
            result = conversation.send(line, &observer) => {
                if let Err(e) = result {
                    eprintln!("Error: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\nStopping instance...");
    guard.stop().await?;
    Ok(())
}

async fn research(settings: &Settings, config: ResearchConfig, extract_model: &str, enrich_model: &str) -> Result<()> {
    let api = settings.instance_client()?;
    let extractor = agent_for(settings, extract_model)?;
    let enricher = agent_for(settings, enrich_model)?;

    let pipeline = WideResearch::new(&api, extractor, enricher, config);
    let report = pipeline.run().await?;

    let found = report.contacts.iter().filter(|c| c.is_some()).count();
    println!("\nFound contact info for {} of {} companies", found, report.companies.len());
    if let Some(text) = report.follow_up.as_ref().and_then(SessionOutcome::final_text) {
        println!("\nFollow-up: {}", text);
    }
    println!("Report saved to {}", report.path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("vmpilot=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vmpilot=info"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match cli.command {
        Commands::Chat { instance_type, model } => {
            let kind: InstanceKind = instance_type.parse()?;
            let settings = load_settings(true)?;
            chat(&settings, kind, &model).await
        }

        Commands::Research {
            max_companies,
            parallel,
            batch,
            follow_up,
            output,
            extract_model,
            enrich_model,
        } => {
            let settings = load_settings(false)?;
            let config = ResearchConfig {
                max_companies,
                parallel,
                batch,
                follow_up,
                output_dir: output.unwrap_or_else(|| settings.output_dir.clone()),
            };
            info!(max_companies, parallel, "starting research");
            research(&settings, config, &extract_model, &enrich_model).await
        }

        Commands::Dungeon { model } => {
            let settings = load_settings(false)?;
            let api = settings.instance_client()?;
            let agent = agent_for(&settings, &model)?;
            let observer = ConsoleObserver::new();

            let outcome = on_instance(&api, InstanceKind::Ubuntu, |instance| {
                scenarios::dungeon(&api, instance, &agent, &observer)
            })
            .await?;
            if let Some(outcome) = outcome {
                print_outcome(&outcome?);
            }
            Ok(())
        }

        Commands::Market { company, model } => {
            let settings = load_settings(false)?;
            let api = settings.instance_client()?;
            let agent = agent_for(&settings, &model)?;
            let observer = ConsoleObserver::new();

            let outcome = on_instance(&api, InstanceKind::Ubuntu, |instance| {
                scenarios::market(&api, instance, &agent, &company, &observer)
            })
            .await?;
            if let Some(outcome) = outcome {
                print_outcome(&outcome);
            }
            Ok(())
        }

        Commands::Sales {
            companies,
            industry,
            notes,
            model,
        } => {
            let settings = load_settings(false)?;
            let api = settings.instance_client()?;
            let agent = agent_for(&settings, &model)?;

            let leads = companies
                .into_iter()
                .map(|name| SalesLead {
                    name,
                    industry: industry.clone(),
                    notes: notes.clone(),
                })
                .collect();

            let finished = for_each_lead(leads, |lead| {
                let (api, agent) = (&api, &agent);
                async move {
                    println!("\nResearching {}", lead.name);
                    let observer = ConsoleObserver::labeled(lead.name.clone());
                    let outcome = on_instance(api, InstanceKind::Ubuntu, |instance| {
                        scenarios::sales_lead(api, instance, agent, &lead, &observer)
                    })
                    .await?;
                    Ok::<_, anyhow::Error>(outcome.map(|outcome| {
                        print_outcome(&outcome);
                        println!("Materials saved in {}", lead.folder());
                    }))
                }
            })
            .await;
            info!(finished, "sales run finished");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vmpilot_runtime::{BashRequest, ComputerAction, EditCommand, Error, ToolOutput};

    /// Instances that start fine but refuse to stop
    #[derive(Default)]
    struct StuckInstances {
        stops: Mutex<Vec<String>>,
    }

    impl InstanceApi for StuckInstances {
        async fn start(&self, kind: InstanceKind) -> vmpilot_runtime::Result<InstanceHandle> {
            Ok(InstanceHandle::new("i-stuck", kind))
        }

        async fn stream_url(&self, _instance: &InstanceHandle) -> vmpilot_runtime::Result<String> {
            Ok("https://stream/i-stuck".into())
        }

        async fn computer(&self, _: &InstanceHandle, _: &ComputerAction) -> vmpilot_runtime::Result<ToolOutput> {
            Ok(ToolOutput::default())
        }

        async fn bash(&self, _: &InstanceHandle, _: &BashRequest) -> vmpilot_runtime::Result<ToolOutput> {
            Ok(ToolOutput::default())
        }

        async fn edit(&self, _: &InstanceHandle, _: &EditCommand) -> vmpilot_runtime::Result<ToolOutput> {
            Ok(ToolOutput::default())
        }

        async fn stop(&self, instance: &InstanceHandle) -> vmpilot_runtime::Result<()> {
            self.stops.lock().unwrap().push(instance.id.clone());
            Err(Error::instance_failed("stop returned 502"))
        }
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_the_outcome() {
        let api = StuckInstances::default();

        let outcome = on_instance(&api, InstanceKind::Browser, |handle| async move { handle.id })
            .await
            .unwrap();

        assert_eq!(outcome.as_deref(), Some("i-stuck"));
        assert_eq!(*api.stops.lock().unwrap(), vec!["i-stuck"]);
    }

    fn leads(names: &[&str]) -> Vec<SalesLead> {
        names.iter().map(|name| SalesLead::new(*name)).collect()
    }

    #[tokio::test]
    async fn test_failed_lead_is_skipped() {
        let seen = Mutex::new(Vec::new());
        let finished = for_each_lead(leads(&["Acme", "Globex", "Initech"]), |lead| {
            seen.lock().unwrap().push(lead.name.clone());
            async move {
                if lead.name == "Acme" {
                    anyhow::bail!("instance failed to start");
                }
                Ok(Some(()))
            }
        })
        .await;

        assert_eq!(finished, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["Acme", "Globex", "Initech"]);
    }

    #[tokio::test]
    async fn test_interrupt_ends_the_run() {
        let seen = Mutex::new(Vec::new());
        let finished = for_each_lead(leads(&["Acme", "Globex", "Initech"]), |lead| {
            seen.lock().unwrap().push(lead.name.clone());
            async move { Ok::<_, anyhow::Error>(if lead.name == "Globex" { None } else { Some(()) }) }
        })
        .await;

        assert_eq!(finished, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["Acme", "Globex"]);
    }
}
