//! Scripted sessions: the dungeon crawler, market and sales research, and
//! the interactive conversation behind `vmpilot chat`.

use crate::agent::{Agent, SessionOutcome, StepObserver, StopReason};
use crate::session::with_instance;
use tracing::{info, warn};
use vmpilot_error::Result;
use vmpilot_runtime::{
    prompt, InstanceApi, InstanceHandle, InstanceKind, LlmProvider, Message, ToolKind, ToolSet,
    Transcript,
};

/// Install and launch Dungeon Crawl Stone Soup on `instance`, then let the
/// model play.
///
/// The game is driven through the display only.
pub async fn dungeon<A: InstanceApi, P: LlmProvider>(
    api: &A,
    instance: InstanceHandle,
    agent: &Agent<P>,
    observer: &dyn StepObserver,
) -> Result<SessionOutcome> {
    run_setup(api, &instance, prompt::DUNGEON_INSTALL).await?;
    info!(instance = %instance.id, "game installed");
    run_setup(api, &instance, prompt::DUNGEON_LAUNCH).await?;
    info!(instance = %instance.id, "game started");

    let tools = ToolSet::new(api, instance, vec![ToolKind::Computer])?;
    let system = prompt::dungeon_system_prompt();
    Ok(agent.act(&tools, &system, prompt::DUNGEON_START, observer).await)
}

async fn run_setup<A: InstanceApi>(api: &A, instance: &InstanceHandle, command: &str) -> Result<()> {
    let output = api.execute_shell(instance, command).await?;
    if let Some(error) = output.error.as_deref().filter(|e| !e.is_empty()) {
        warn!(instance = %instance.id, command, error, "setup command reported an error");
    }
    Ok(())
}

/// Research one company on a desktop: notes in Writer, metrics in Calc
pub async fn market<A: InstanceApi, P: LlmProvider>(
    api: &A,
    instance: InstanceHandle,
    agent: &Agent<P>,
    company: &str,
    observer: &dyn StepObserver,
) -> SessionOutcome {
    let tools = ToolSet::for_instance(api, instance);
    let system = prompt::market_system_prompt();
    agent.act(&tools, &system, &prompt::market_task(company), observer).await
}

/// A company to prepare sales outreach for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesLead {
    pub name: String,
    pub industry: Option<String>,
    pub notes: Option<String>,
}

impl SalesLead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            industry: None,
            notes: None,
        }
    }

    /// Folder on the instance the materials end up in
    pub fn folder(&self) -> String {
        format!("Documents/sales_research/{}", self.name)
    }
}

/// Build outreach material for one lead
pub async fn sales_lead<A: InstanceApi, P: LlmProvider>(
    api: &A,
    instance: InstanceHandle,
    agent: &Agent<P>,
    lead: &SalesLead,
    observer: &dyn StepObserver,
) -> SessionOutcome {
    let tools = ToolSet::for_instance(api, instance);
    let system = prompt::sales_system_prompt();
    let task = prompt::sales_task(&lead.name, lead.industry.as_deref(), lead.notes.as_deref());
    agent.act(&tools, &system, &task, observer).await
}

/// Research leads one after another, each on a fresh instance.
///
/// A failed lead is logged and the next one still runs.
pub async fn sales<A: InstanceApi, P: LlmProvider>(
    api: &A,
    agent: &Agent<P>,
    leads: &[SalesLead],
    observer: &dyn StepObserver,
) -> Vec<Result<SessionOutcome>> {
    let mut outcomes = Vec::with_capacity(leads.len());
    for lead in leads {
        info!(company = %lead.name, "starting sales research");
        let outcome = with_instance(api, InstanceKind::Ubuntu, |instance| async move {
            Ok(sales_lead(api, instance, agent, lead, observer).await)
        })
        .await;

        match &outcome {
            Ok(_) => info!(company = %lead.name, folder = %lead.folder(), "sales research complete"),
            Err(e) => warn!(company = %lead.name, error = %e, "sales research failed"),
        }
        outcomes.push(outcome);
    }
    outcomes
}

/// A transcript that persists across user turns on one instance
pub struct Conversation<'a, A, P> {
    agent: &'a Agent<P>,
    tools: ToolSet<'a, A>,
    system: String,
    transcript: Transcript,
}

impl<'a, A: InstanceApi, P: LlmProvider> Conversation<'a, A, P> {
    pub fn new(agent: &'a Agent<P>, tools: ToolSet<'a, A>) -> Self {
        let system = prompt::system_prompt(tools.instance().kind);
        Self {
            agent,
            tools,
            system,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Append `line` as a user turn and run the loop.
    ///
    /// The transcript keeps everything the session produced even when the
    /// model call fails, so the next line continues from there.
    pub async fn send(&mut self, line: &str, observer: &dyn StepObserver) -> Result<StopReason> {
        let mut transcript = std::mem::take(&mut self.transcript);
        transcript.push(Message::user(line));

        let outcome = self.agent.run(&self.tools, &self.system, transcript, observer).await;
        self.transcript = outcome.transcript;

        match outcome.error {
            Some(e) => Err(e),
            None => Ok(outcome.stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{call, text_reply, tool_reply, FakeInstances, FakeProvider};
    use serde_json::json;
    use vmpilot_runtime::{ProviderError, Role};

    fn quiet() -> impl Fn(&crate::agent::Step) {
        |_: &crate::agent::Step| {}
    }

    #[tokio::test]
    async fn test_dungeon_installs_then_plays() {
        let api = FakeInstances::default();
        let agent = Agent::new(FakeProvider::scripted(vec![
            Ok(tool_reply("Creating character", vec![call("c1", "computer", json!({"action": "press_key", "keys": ["a"]}))])),
            Ok(text_reply("Exploring")),
        ]));

        let instance = api.start(InstanceKind::Ubuntu).await.unwrap();
        let outcome = dungeon(&api, instance, &agent, &quiet()).await.unwrap();

        assert_eq!(outcome.stop, StopReason::Completed);
        assert_eq!(
            api.actions(),
            vec![
                "$ sudo apt-get install -y crawl-tiles",
                "$ (DISPLAY=:1 /usr/games/crawl-tiles &)",
                "Pressing a",
            ]
        );
        let request = &agent.provider().requests()[0];
        assert_eq!(request.tools.len(), 1);
        assert!(request.system.as_deref().unwrap().contains("Dungeon Crawl Stone Soup"));
    }

    #[tokio::test]
    async fn test_market_uses_full_desktop_tools() {
        let api = FakeInstances::default();
        let agent = Agent::new(FakeProvider::scripted(vec![Ok(text_reply("Saved to Documents"))]));

        let instance = InstanceHandle::new("i-3", InstanceKind::Ubuntu);
        let outcome = market(&api, instance, &agent, "Anthropic", &quiet()).await;

        assert_eq!(outcome.final_text().as_deref(), Some("Saved to Documents"));

        let request = &agent.provider().requests()[0];
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["computer", "bash", "str_replace_editor"]);
        assert!(request.messages[0].text().unwrap().starts_with("Please help me research Anthropic."));
    }

    #[tokio::test]
    async fn test_sales_runs_each_lead_on_its_own_instance() {
        let api = FakeInstances::default();
        let agent = Agent::new(FakeProvider::scripted(vec![]));
        let leads = vec![
            SalesLead {
                name: "TechCorp Solutions".into(),
                industry: Some("Enterprise Software".into()),
                notes: Some("Recently raised Series B".into()),
            },
            SalesLead::new("DataFlow Analytics"),
        ];

        let outcomes = sales(&api, &agent, &leads, &quiet()).await;

        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(api.started().len(), 2);
        assert_eq!(api.stopped(), vec!["i-0".to_string(), "i-1".to_string()]);
        let first = agent.provider().requests()[0].messages[0].text().unwrap();
        assert!(first.contains("TechCorp Solutions in the Enterprise Software industry"));
    }

    #[tokio::test]
    async fn test_sales_continues_past_failed_start() {
        let api = FakeInstances::default();
        api.fail_start.store(true, std::sync::atomic::Ordering::SeqCst);
        let agent = Agent::new(FakeProvider::scripted(vec![]));

        let outcomes = sales(&api, &agent, &[SalesLead::new("A"), SalesLead::new("B")], &quiet()).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_err()));
        assert!(agent.provider().requests().is_empty());
    }

    #[test]
    fn test_lead_folder() {
        assert_eq!(SalesLead::new("Acme").folder(), "Documents/sales_research/Acme");
    }

    #[tokio::test]
    async fn test_conversation_keeps_history() {
        let api = FakeInstances::default();
        let agent = Agent::new(FakeProvider::scripted(vec![
            Ok(text_reply("Opened Firefox")),
            Err(ProviderError::Network("connection reset".into())),
            Ok(text_reply("Searched")),
        ]));
        let tools = ToolSet::for_instance(&api, InstanceHandle::new("i-9", InstanceKind::Browser));
        let mut conversation = Conversation::new(&agent, tools);

        assert_eq!(conversation.send("open firefox", &quiet()).await.unwrap(), StopReason::Completed);
        assert!(conversation.send("search for capybaras", &quiet()).await.is_err());
        assert_eq!(conversation.send("try again", &quiet()).await.unwrap(), StopReason::Completed);

        let roles: Vec<_> = conversation.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::User, Role::Assistant]
        );
        let last_request = agent.provider().requests().pop().unwrap();
        assert_eq!(last_request.messages.len(), 4);
    }
}
