//! In-memory conversation trees: node id → (parent id, message).
//!
//! Each successful turn appends two nodes, the user prompt and the assistant answer; the
//! answer's id is the `parent_id` the next turn replies to. Asking with an older `parent_id`
//! branches the conversation (e.g. `/retry`).
//!
//! Memory is bounded two ways: a commit keeps only the path root → new answer (branches left by
//! a retry are dropped), and conversations not committed to for `idle_ttl` are evicted.

use dashmap::DashMap;
use prompt::ChatMessage;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Idle time after which a conversation is forgotten.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Node {
    parent: Option<String>,
    message: ChatMessage,
}

/// A turn that has been started but not yet committed to the tree.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub conversation_id: String,
    pub user_node_id: String,
    pub assistant_node_id: String,
    /// Node the user prompt replies to; `None` for the conversation root.
    pub parent_id: Option<String>,
    pub prompt: String,
    /// Messages on the path root → `parent_id`, oldest first.
    pub history: Vec<ChatMessage>,
}

struct Conversation {
    nodes: HashMap<String, Node>,
    last_used: Instant,
}

/// All conversations known to one backend instance.
pub struct ConversationTree {
    conversations: DashMap<String, Conversation>,
    idle_ttl: Duration,
}

impl Default for ConversationTree {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl ConversationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            conversations: DashMap::new(),
            idle_ttl,
        }
    }

    /// Allocates ids for a new turn and collects the history along the parent chain.
    ///
    /// Unknown conversation or parent ids (e.g. after a restart) start from an empty history
    /// under the same conversation id.
    pub fn begin_turn(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> PendingTurn {
        self.evict_idle();

        let conversation_id = conversation_id
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (history, parent_id) = match self.conversations.get(&conversation_id) {
            Some(conversation) => match parent_id {
                Some(pid) if conversation.nodes.contains_key(pid) => {
                    (Self::path_to(&conversation.nodes, pid), Some(pid.to_string()))
                }
                Some(pid) => {
                    warn!(
                        conversation_id = %conversation_id,
                        parent_id = %pid,
                        "Unknown parent id; continuing from conversation root"
                    );
                    (Vec::new(), None)
                }
                None => (Vec::new(), None),
            },
            None => {
                if parent_id.is_some() {
                    warn!(
                        conversation_id = %conversation_id,
                        "Unknown conversation id; starting a fresh conversation"
                    );
                }
                (Vec::new(), None)
            }
        };

        PendingTurn {
            conversation_id,
            user_node_id: Uuid::new_v4().to_string(),
            assistant_node_id: Uuid::new_v4().to_string(),
            parent_id,
            prompt: prompt.to_string(),
            history,
        }
    }

    /// Records the user prompt and the final answer of a finished turn, then drops every node
    /// that is not on the path root → answer.
    pub fn commit(&self, turn: &PendingTurn, answer: &str) {
        let mut conversation = self
            .conversations
            .entry(turn.conversation_id.clone())
            .or_insert_with(|| Conversation {
                nodes: HashMap::new(),
                last_used: Instant::now(),
            });
        let nodes = &mut conversation.nodes;
        nodes.insert(
            turn.user_node_id.clone(),
            Node {
                parent: turn.parent_id.clone(),
                message: ChatMessage::user(turn.prompt.clone()),
            },
        );
        nodes.insert(
            turn.assistant_node_id.clone(),
            Node {
                parent: Some(turn.user_node_id.clone()),
                message: ChatMessage::assistant(answer),
            },
        );

        let keep: HashSet<String> = Self::path_ids(nodes, &turn.assistant_node_id)
            .into_iter()
            .collect();
        nodes.retain(|id, _| keep.contains(id));
        conversation.last_used = Instant::now();
    }

    /// Forgets a conversation. Returns whether it existed.
    pub fn reset(&self, conversation_id: &str) -> bool {
        self.conversations.remove(conversation_id).is_some()
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.conversations.contains_key(conversation_id)
    }

    /// Number of conversations held in memory.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn evict_idle(&self) {
        let before = self.len();
        self.conversations
            .retain(|_, c| c.last_used.elapsed() <= self.idle_ttl);
        let evicted = before.saturating_sub(self.len());
        if evicted > 0 {
            debug!(evicted = evicted, remaining = self.len(), "Evicted idle conversations");
        }
    }

    fn path_to(nodes: &HashMap<String, Node>, leaf: &str) -> Vec<ChatMessage> {
        Self::path_ids(nodes, leaf)
            .iter()
            .filter_map(|id| nodes.get(id).map(|node| node.message.clone()))
            .collect()
    }

    /// Node ids from the root to `leaf`, oldest first.
    fn path_ids(nodes: &HashMap<String, Node>, leaf: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(leaf.to_string());
        // Stops after node-count steps even if parent links form a cycle.
        while let Some(id) = current {
            if path.len() > nodes.len() {
                break;
            }
            match nodes.get(&id) {
                Some(node) => {
                    current = node.parent.clone();
                    path.push(id);
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}
