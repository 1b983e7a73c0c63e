//! Wide research: extract companies, enrich each in parallel, report

use crate::agent::{Agent, ConsoleObserver, SessionOutcome};
use crate::fanout::FanOut;
use crate::report::ReportWriter;
use crate::session::with_instance;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{info, warn};
use vmpilot_error::Result;
use vmpilot_runtime::{prompt, InstanceApi, InstanceKind, LlmProvider, OutputSchema, ToolSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Companies {
    pub companies: Vec<Company>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_method: String,
    pub contact_details: String,
}

impl OutputSchema for Companies {
    fn description() -> &'static str {
        "The list of companies you gathered, in the order they appear on the page."
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "companies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["name", "description", "tags"]
                    }
                }
            },
            "required": ["companies"]
        })
    }
}

impl OutputSchema for ContactInfo {
    fn description() -> &'static str {
        "One way to reach the company, such as an email, a demo form or a Discord link."
    }

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "contact_method": { "type": "string", "description": "e.g. email, demo form, Discord" },
                "contact_details": { "type": "string", "description": "The address, URL or handle" }
            },
            "required": ["contact_method", "contact_details"]
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub max_companies: usize,
    /// Enrichment sessions (and instances) live at once
    pub parallel: usize,
    /// Batch filter on the directory, e.g. `W25`
    pub batch: String,
    /// Task for one more session over the aggregated results
    pub follow_up: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_companies: 20,
            parallel: 4,
            batch: "W25".to_string(),
            follow_up: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// What a full pipeline run produced
#[derive(Debug)]
pub struct ResearchReport {
    pub companies: Vec<Company>,
    pub contacts: Vec<Option<ContactInfo>>,
    pub follow_up: Option<SessionOutcome>,
    pub path: PathBuf,
}

pub struct WideResearch<A, P> {
    api: A,
    extractor: Agent<P>,
    enricher: Agent<P>,
    config: ResearchConfig,
}

impl<A: InstanceApi, P: LlmProvider> WideResearch<A, P> {
    pub fn new(api: A, extractor: Agent<P>, enricher: Agent<P>, config: ResearchConfig) -> Self {
        Self { api, extractor, enricher, config }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Extract, enrich, optionally follow up, then write the report.
    ///
    /// Only a bad fan-out limit or a failed report write makes this fail.
    pub async fn run(&self) -> Result<ResearchReport> {
        let fanout = FanOut::new(self.config.parallel)?;

        let companies = match self.extract_companies().await {
            Ok(companies) => companies,
            Err(e) => {
                warn!(error = %e, "company extraction failed");
                Vec::new()
            }
        };
        info!(count = companies.len(), batch = %self.config.batch, "companies extracted");

        let contacts = self.enrich(&fanout, &companies).await;

        let follow_up = match &self.config.follow_up {
            Some(task) => match self.follow_up(task, &companies, &contacts).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(error = %e, "follow-up session failed");
                    None
                }
            },
            None => None,
        };

        let writer = ReportWriter::new(&self.config.output_dir)
            .with_title(format!("YC {} Company Contact Information", self.config.batch));
        let path = writer.write(&companies, &contacts)?;

        Ok(ResearchReport { companies, contacts, follow_up, path })
    }

    /// One browser session that gathers up to `max_companies` companies
    pub async fn extract_companies(&self) -> Result<Vec<Company>> {
        let max = self.config.max_companies;
        let task = prompt::extract_companies_task(&self.config.batch, max);

        with_instance(&self.api, InstanceKind::Browser, |handle| async move {
            let observer = ConsoleObserver::labeled(handle.id.clone());
            let tools = ToolSet::for_instance(&self.api, handle);
            let system = prompt::system_prompt(InstanceKind::Browser);
            let extraction = self.extractor.extract::<Companies, _>(&tools, &system, &task, &observer).await;

            let mut companies = extraction.value.unwrap_or_empty().companies;
            if companies.len() > max {
                companies.truncate(max);
            }
            Ok(companies)
        })
        .await
    }

    /// One browser session looking for a way to contact `company`
    pub async fn find_contact(&self, company: &Company) -> Result<Option<ContactInfo>> {
        with_instance(&self.api, InstanceKind::Browser, |handle| async move {
            info!(instance = %handle.id, company = %company.name, "finding contact info");
            let observer = ConsoleObserver::labeled(handle.id.clone());
            let tools = ToolSet::for_instance(&self.api, handle);
            let system = prompt::contact_system_prompt(&self.config.batch, &company.name, &company.description);
            let task = prompt::contact_task(&company.name);

            let contact = self
                .enricher
                .extract::<ContactInfo, _>(&tools, &system, &task, &observer)
                .await
                .value
                .parsed();
            match &contact {
                Some(found) => info!(company = %company.name, method = %found.contact_method, "contact found"),
                None => warn!(company = %company.name, "no contact info returned"),
            }
            Ok(contact)
        })
        .await
    }

    /// Enrich every company, at most `parallel` at a time, keeping input order
    pub async fn enrich(&self, fanout: &FanOut, companies: &[Company]) -> Vec<Option<ContactInfo>> {
        fanout
            .run(companies.iter().collect(), |_, company| self.find_contact(company))
            .await
            .into_iter()
            .map(Option::flatten)
            .collect()
    }

    /// One Ubuntu session acting on the aggregated results, run by the extraction agent
    pub async fn follow_up(
        &self,
        task: &str,
        companies: &[Company],
        contacts: &[Option<ContactInfo>],
    ) -> Result<SessionOutcome> {
        let instruction = follow_up_prompt(task, companies, contacts);
        with_instance(&self.api, InstanceKind::Ubuntu, |handle| async move {
            let observer = ConsoleObserver::labeled(handle.id.clone());
            let tools = ToolSet::for_instance(&self.api, handle);
            let system = prompt::system_prompt(InstanceKind::Ubuntu);
            Ok(self.extractor.act(&tools, &system, &instruction, &observer).await)
        })
        .await
    }
}

fn follow_up_prompt(task: &str, companies: &[Company], contacts: &[Option<ContactInfo>]) -> String {
    let mut out = format!("{}\n\nHere is what was found:\n", task);
    for (i, company) in companies.iter().enumerate() {
        let contact = match contacts.get(i).and_then(Option::as_ref) {
            Some(c) => format!("{}: {}", c.contact_method, c.contact_details),
            None => "no contact found".to_string(),
        };
        let _ = writeln!(out, "- {} ({}) - {}", company.name, company.description, contact);
    }
    out
}
