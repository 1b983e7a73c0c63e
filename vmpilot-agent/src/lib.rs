//! # vmpilot agent
//!
//! The agent drives a remote instance through a model:
//! 1. A task arrives as a user message
//! 2. The model answers with text and tool calls
//! 3. Each call is executed on the instance and its result appended
//! 4. Repeat until the model stops calling tools, submits structured output,
//!    fails, or the round bound is hit
//!
//! On top of the loop sit instance scoping, a bounded fan-out for running
//! many sessions at once, the research pipeline with its markdown report, and
//! a few scripted scenarios.

mod agent;
pub mod fanout;
pub mod report;
pub mod research;
pub mod scenarios;
pub mod session;
pub mod settings;

#[cfg(test)]
mod testing;

pub use agent::{
    Agent, AgentConfig, ConsoleObserver, Extraction, SessionOutcome, Step, StepObserver,
    StopReason,
};
pub use fanout::FanOut;
pub use report::ReportWriter;
pub use research::{Companies, Company, ContactInfo, ResearchConfig, ResearchReport, WideResearch};
pub use scenarios::{Conversation, SalesLead};
pub use session::{with_instance, InstanceGuard};
pub use settings::{Settings, SettingsError};
