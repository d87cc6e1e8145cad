//! Prompt templates for the planner and critic
//!
//! Templates are Handlebars-rendered from a compact projection of the agent
//! state: goal, constraints, subgoals, the last observation summary, the
//! working-memory digest, and the tool catalog.

use handlebars::Handlebars;
use serde::Serialize;

use crate::core::contracts::AgentState;
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        // Prompts are plain text, not HTML.
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

/// Serializable projection of the state a planner prompt is built from
#[derive(Debug, Serialize)]
pub struct StateProjection {
    pub goal: String,
    pub constraints: Vec<String>,
    pub subgoals: Vec<String>,
    pub last_observation: Option<String>,
    pub affordances: Vec<String>,
    pub digest: Vec<DigestEntry>,
    pub tools: Vec<ToolSummary>,
    pub turn_index: u32,
}

#[derive(Debug, Serialize)]
pub struct DigestEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

impl StateProjection {
    /// Build a projection from the current state and tool catalog
    pub fn from_state(state: &AgentState, tools: &ToolRegistry) -> Self {
        StateProjection {
            goal: state.goal.user_goal.clone(),
            constraints: state.goal.constraints.clone(),
            subgoals: state.subgoals.clone(),
            last_observation: state.last_observation.as_ref().map(|o| o.summary.clone()),
            affordances: state
                .last_observation
                .as_ref()
                .map(|o| o.affordances.clone())
                .unwrap_or_default(),
            digest: state
                .working_memory_digest
                .iter()
                .map(|(key, value)| DigestEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            tools: tools
                .definitions()
                .into_iter()
                .map(|d| ToolSummary {
                    name: d.function.name,
                    description: d.function.description,
                })
                .collect(),
            turn_index: state.turn_index,
        }
    }
}

/// System prompt for the planner LLM call
pub const PLANNER_SYSTEM_TEMPLATE: &str = "\
You are the planning module of a tool-calling agent.

Goal: {{goal}}
{{#if constraints}}Constraints:
{{#each constraints}}- {{this}}
{{/each}}{{/if}}\
{{#if subgoals}}Current subgoals:
{{#each subgoals}}- {{this}}
{{/each}}{{/if}}\
{{#if last_observation}}Last observation: {{last_observation}}
{{#if affordances}}Possible next steps: {{#each affordances}}{{this}} {{/each}}
{{/if}}{{/if}}\
{{#if digest}}Known facts:
{{#each digest}}- {{key}}: {{value}}
{{/each}}{{/if}}\
Available tools:
{{#each tools}}- {{name}}: {{description}}
{{/each}}
Decide the single next step. Either call exactly one tool, or reply with one \
of the following:
- plain text: your final answer, which ends the run
- {\"action\": \"replan\", \"subgoals\": [\"...\"]} to replace your subgoals
- {\"action\": \"ask_user\", \"question\": \"...\", \"missing_fields\": [\"...\"]} \
when required information is missing
- {\"action\": \"stop\", \"reason\": \"...\"} to stop explicitly";

/// System prompt for the critic review call
pub const CRITIC_SYSTEM_TEMPLATE: &str = "\
You are reviewing a tool-calling agent mid-run.

Goal: {{goal}}
Turn: {{turn_index}}
{{#if last_observation}}Last observation: {{last_observation}}
{{/if}}\
The planner intends to proceed. If the run has clearly gone off track, reply \
REPLAN: <one subgoal per line>. If the run should end now, reply STOP: \
<reason>. Otherwise reply OK.";

/// Render the planner system prompt for a state
pub fn planner_system_prompt(state: &AgentState, tools: &ToolRegistry) -> Result<String> {
    let template = PromptTemplate::new("planner_system", PLANNER_SYSTEM_TEMPLATE)?;
    template.render(&StateProjection::from_state(state, tools))
}

/// Render the critic system prompt for a state
pub fn critic_system_prompt(state: &AgentState, tools: &ToolRegistry) -> Result<String> {
    let template = PromptTemplate::new("critic_system", CRITIC_SYSTEM_TEMPLATE)?;
    template.render(&StateProjection::from_state(state, tools))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::{AgentGoal, Budget};
    use crate::tools::filesystem_registry;
    use indexmap::IndexMap;

    fn state() -> AgentState {
        AgentState {
            goal: AgentGoal::new("Read the readme").with_constraint("stay in the workspace"),
            subgoals: vec!["locate readme".into()],
            last_action: None,
            last_observation: None,
            budget: Budget::default(),
            turn_index: 2,
            working_memory_digest: IndexMap::from([(
                "fact_size_bytes".to_string(),
                "28".to_string(),
            )]),
        }
    }

    #[test]
    fn planner_prompt_mentions_goal_tools_and_facts() {
        let tools = filesystem_registry().unwrap();
        let prompt = planner_system_prompt(&state(), &tools).unwrap();
        assert!(prompt.contains("Read the readme"));
        assert!(prompt.contains("stay in the workspace"));
        assert!(prompt.contains("locate readme"));
        assert!(prompt.contains("read_file"));
        assert!(prompt.contains("fact_size_bytes: 28"));
        assert!(prompt.contains("\"action\": \"replan\""));
    }

    #[test]
    fn planner_prompt_omits_empty_sections() {
        let tools = filesystem_registry().unwrap();
        let mut s = state();
        s.subgoals.clear();
        s.working_memory_digest.clear();
        s.goal.constraints.clear();
        let prompt = planner_system_prompt(&s, &tools).unwrap();
        assert!(!prompt.contains("Current subgoals"));
        assert!(!prompt.contains("Known facts"));
        assert!(!prompt.contains("Constraints"));
    }

    #[test]
    fn critic_prompt_mentions_goal_and_turn() {
        let tools = filesystem_registry().unwrap();
        let prompt = critic_system_prompt(&state(), &tools).unwrap();
        assert!(prompt.contains("Read the readme"));
        assert!(prompt.contains("Turn: 2"));
    }

    #[test]
    fn template_render_is_reusable() {
        let template = PromptTemplate::new("t", "Hello {{goal}}").unwrap();
        #[derive(Serialize)]
        struct Data {
            goal: String,
        }
        let one = template.render(&Data { goal: "a".into() }).unwrap();
        let two = template.render(&Data { goal: "b".into() }).unwrap();
        assert_eq!(one, "Hello a");
        assert_eq!(two, "Hello b");
    }
}
