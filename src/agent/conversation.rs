//! Conversation management
//!
//! History is kept turn-shaped: each [`Turn`] holds the triggering user (or
//! system) message, the intermediate tool traffic — assistant messages that
//! carry `tool_calls` *and* the tool-result messages answering them, in
//! strict chronological order — and the final assistant reply.
//!
//! Flattening reproduces exactly the message sequence an LLM request needs,
//! which is what makes follow-up questions work: the second user turn's
//! request still contains the first turn's assistant-with-tool-calls
//! messages, not just its final reply. Tool results are linked to calls by
//! `tool_call_id` text equality, never by reference identity.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::agent::types::{Message, Role};

/// One user-visible exchange: user message, tool traffic, final reply
#[derive(Debug, Clone)]
pub struct Turn {
    /// The message that started the turn (user or system)
    pub user_message: Message,
    /// Interleaved assistant-with-tool-calls and tool-result messages
    pub tool_messages: Vec<Message>,
    /// The final assistant reply, once the turn completes
    pub assistant_message: Option<Message>,
    /// When the turn started
    pub started_at: DateTime<Utc>,
    /// When the turn completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    /// Start a turn from its triggering message
    pub fn new(user_message: Message) -> Self {
        Turn {
            user_message,
            tool_messages: Vec::new(),
            assistant_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Append one round of tool traffic: the assistant message carrying the
    /// calls, then the result messages answering them.
    pub fn push_tool_round(&mut self, assistant: Message, results: Vec<Message>) {
        self.tool_messages.push(assistant);
        self.tool_messages.extend(results);
    }

    /// Finish the turn with the final assistant reply
    pub fn complete(&mut self, assistant_message: Message) {
        self.assistant_message = Some(assistant_message);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the turn finished without a reply (budget/cancel/ask-user exits)
    pub fn complete_without_reply(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Whether the turn has its final reply
    pub fn is_complete(&self) -> bool {
        self.assistant_message.is_some()
    }

    /// Wall-clock duration, when the turn has completed
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }

    /// The turn's messages in chronological order
    pub fn flatten(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(2 + self.tool_messages.len());
        out.push(self.user_message.clone());
        out.extend(self.tool_messages.iter().cloned());
        if let Some(ref reply) = self.assistant_message {
            out.push(reply.clone());
        }
        out
    }
}

/// A conversation session
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Unique session ID
    pub session_id: Uuid,
    /// Turns in chronological order
    pub turns: Vec<Turn>,
    /// When the conversation started
    pub started_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Conversation {
            session_id: Uuid::new_v4(),
            turns: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Verify the tool-linkage invariant: every tool-result message must be
    /// preceded by an assistant message whose `tool_calls` contain its id.
    pub fn tool_linkage_ok(&self) -> bool {
        let mut seen_call_ids: Vec<String> = Vec::new();
        for turn in &self.turns {
            for message in turn.flatten() {
                match message.role {
                    Role::Assistant => {
                        if let Some(calls) = &message.tool_calls {
                            seen_call_ids.extend(calls.iter().map(|c| c.id.clone()));
                        }
                    }
                    Role::Tool => {
                        let id = match &message.tool_call_id {
                            Some(id) => id,
                            None => return false,
                        };
                        if !seen_call_ids.iter().any(|seen| seen == id) {
                            return false;
                        }
                    }
                    _ => {}
                }
            }
        }
        true
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics over a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationStats {
    pub total_turns: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    /// Fraction of turns that reached a final assistant reply
    pub success_rate: f64,
    /// Mean duration of completed turns
    pub average_turn_duration: Duration,
}

/// Owns a conversation and produces the flat message view for LLM requests
pub struct ConversationManager {
    conversation: Conversation,
    /// When set, only the most recent N turns are kept
    max_history_turns: Option<usize>,
}

impl ConversationManager {
    /// Create a manager with unbounded history
    pub fn new() -> Self {
        ConversationManager {
            conversation: Conversation::new(),
            max_history_turns: None,
        }
    }

    /// Bound the history to the most recent N turns
    pub fn with_max_history_turns(mut self, max: usize) -> Self {
        self.max_history_turns = Some(max.max(1));
        self
    }

    /// The session id of the owned conversation
    pub fn session_id(&self) -> Uuid {
        self.conversation.session_id
    }

    /// Commit a finished turn, evicting the oldest turns past the bound
    pub fn add_turn(&mut self, turn: Turn) {
        self.conversation.turns.push(turn);
        if let Some(max) = self.max_history_turns {
            let overflow = self.conversation.turns.len().saturating_sub(max);
            if overflow > 0 {
                self.conversation.turns.drain(..overflow);
            }
        }
    }

    /// Flatten the whole history into the message sequence for the next
    /// LLM request, preserving every intermediate tool-calling assistant
    /// message in chronological order.
    pub fn get_history(&self) -> Vec<Message> {
        self.conversation
            .turns
            .iter()
            .flat_map(|turn| turn.flatten())
            .collect()
    }

    /// Read-only view of the owned conversation
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Number of committed turns
    pub fn turn_count(&self) -> usize {
        self.conversation.turns.len()
    }

    /// Aggregate statistics over the history
    pub fn get_statistics(&self) -> ConversationStats {
        let turns = &self.conversation.turns;
        let total_turns = turns.len();
        let user_messages = turns
            .iter()
            .filter(|t| t.user_message.role == Role::User)
            .count();
        let assistant_messages = turns
            .iter()
            .map(|t| {
                let intermediate = t
                    .tool_messages
                    .iter()
                    .filter(|m| m.role == Role::Assistant)
                    .count();
                intermediate + usize::from(t.assistant_message.is_some())
            })
            .sum();
        let completed = turns.iter().filter(|t| t.is_complete()).count();
        let durations: Vec<Duration> = turns.iter().filter_map(|t| t.duration()).collect();
        let average_turn_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / durations.len() as u32
        };

        ConversationStats {
            total_turns,
            user_messages,
            assistant_messages,
            success_rate: if total_turns == 0 {
                0.0
            } else {
                completed as f64 / total_turns as f64
            },
            average_turn_duration,
        }
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::AssistantToolCall;

    fn tool_round(call_id: &str) -> (Message, Vec<Message>) {
        let assistant = Message::assistant_with_tool_calls(
            "",
            vec![AssistantToolCall::function(call_id, "read_file", "{}")],
        );
        let result = Message::tool(call_id, "file contents");
        (assistant, vec![result])
    }

    fn completed_turn(user: &str, call_id: &str, reply: &str) -> Turn {
        let mut turn = Turn::new(Message::user(user));
        let (assistant, results) = tool_round(call_id);
        turn.push_tool_round(assistant, results);
        turn.complete(Message::assistant(reply));
        turn
    }

    #[test]
    fn flatten_preserves_chronological_order() {
        let turn = completed_turn("read it", "call_1", "here you go");
        let flat = turn.flatten();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0].role, Role::User);
        assert_eq!(flat[1].role, Role::Assistant);
        assert!(flat[1].has_tool_calls());
        assert_eq!(flat[2].role, Role::Tool);
        assert_eq!(flat[3].role, Role::Assistant);
        assert!(!flat[3].has_tool_calls());
    }

    #[test]
    fn history_includes_intermediate_tool_calls_across_turns() {
        let mut manager = ConversationManager::new();
        manager.add_turn(completed_turn("first", "call_1", "done"));

        // On the second user turn the request must contain the first turn's
        // assistant-with-tool-calls message, not just its final reply.
        let mut second = Turn::new(Message::user("follow-up"));
        second.complete(Message::assistant("sure"));
        manager.add_turn(second);

        let history = manager.get_history();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert!(history[1].has_tool_calls());
    }

    #[test]
    fn tool_linkage_invariant_holds_for_well_formed_history() {
        let mut manager = ConversationManager::new();
        manager.add_turn(completed_turn("a", "call_1", "r1"));
        manager.add_turn(completed_turn("b", "call_2", "r2"));
        assert!(manager.conversation().tool_linkage_ok());
    }

    #[test]
    fn tool_linkage_invariant_detects_orphan_results() {
        let mut turn = Turn::new(Message::user("x"));
        // Tool result with no assistant message carrying the call
        turn.tool_messages.push(Message::tool("call_unknown", "oops"));
        let mut manager = ConversationManager::new();
        manager.add_turn(turn);
        assert!(!manager.conversation().tool_linkage_ok());
    }

    #[test]
    fn linkage_allows_result_in_later_turn() {
        // A call made in turn 1 may be answered by a result recorded later in
        // the flattened order; ids match by text equality.
        let mut t1 = Turn::new(Message::user("a"));
        let (assistant, _) = tool_round("call_9");
        t1.push_tool_round(assistant, vec![]);
        t1.complete_without_reply();

        let mut t2 = Turn::new(Message::user("b"));
        t2.tool_messages.push(Message::tool("call_9", "late result"));

        let mut manager = ConversationManager::new();
        manager.add_turn(t1);
        manager.add_turn(t2);
        assert!(manager.conversation().tool_linkage_ok());
    }

    #[test]
    fn bounded_history_evicts_oldest_turns() {
        let mut manager = ConversationManager::new().with_max_history_turns(2);
        manager.add_turn(completed_turn("one", "call_1", "r"));
        manager.add_turn(completed_turn("two", "call_2", "r"));
        manager.add_turn(completed_turn("three", "call_3", "r"));

        assert_eq!(manager.turn_count(), 2);
        assert_eq!(manager.get_history()[0].content, "two");
    }

    #[test]
    fn statistics_count_messages_and_success() {
        let mut manager = ConversationManager::new();
        manager.add_turn(completed_turn("one", "call_1", "r"));

        let mut incomplete = Turn::new(Message::user("two"));
        incomplete.complete_without_reply();
        manager.add_turn(incomplete);

        let stats = manager.get_statistics();
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.user_messages, 2);
        // 1 intermediate + 1 final from the first turn
        assert_eq!(stats.assistant_messages, 2);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_conversation_statistics() {
        let stats = ConversationManager::new().get_statistics();
        assert_eq!(stats.total_turns, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_turn_duration, Duration::ZERO);
    }
}
