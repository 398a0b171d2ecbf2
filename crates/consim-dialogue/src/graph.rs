use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Sentinel successor id marking the end of a script.
pub const END_NODE: &str = "END";

/// Goal text reported once traversal has left the script.
pub const ENDED_GOAL: &str = "dialogue ended";

/// Speaking role attached to a script node.
///
/// Graph resources are authored in more than one language; English and
/// Chinese labels both map onto the two known roles, and anything else is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Character {
    Counselor,
    Client,
    Other(String),
}

impl From<String> for Character {
    fn from(label: String) -> Self {
        match label.as_str() {
            "counselor" | "Counselor" | "咨询师" => Character::Counselor,
            "client" | "Client" | "咨询者" => Character::Client,
            _ => Character::Other(label),
        }
    }
}

impl From<Character> for String {
    fn from(character: Character) -> Self {
        match character {
            Character::Counselor => "counselor".to_string(),
            Character::Client => "client".to_string(),
            Character::Other(label) => label,
        }
    }
}

impl Default for Character {
    fn default() -> Self {
        Character::Other(String::new())
    }
}

/// A single outgoing edge. The script model is a linked list: at most one
/// choice per node, and a missing or empty target means the script ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "nextNode", default)]
    pub next_node: String,
}

/// One step of the fixed dialogue script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueNode {
    #[serde(default)]
    pub character: Character,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl DialogueNode {
    /// The node's single successor id, or [`END_NODE`] when the node has no
    /// usable outgoing choice. Never fails, even for malformed nodes.
    pub fn next_node_id(&self) -> &str {
        match self.choices.first() {
            Some(choice) if !choice.next_node.is_empty() => &choice.next_node,
            _ => END_NODE,
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read dialogue graph: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dialogue graph: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable mapping from node id to script node. Loaded once at startup,
/// shared read-only for the life of the process.
#[derive(Debug, Clone)]
pub struct DialogueGraph {
    nodes: HashMap<String, DialogueNode>,
}

impl DialogueGraph {
    pub fn from_nodes(nodes: HashMap<String, DialogueNode>) -> Self {
        Self { nodes }
    }

    /// Parse a graph from the JSON resource at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let raw = std::fs::read_to_string(path)?;
        let nodes: HashMap<String, DialogueNode> = serde_json::from_str(&raw)?;
        Ok(Self { nodes })
    }

    /// Load from `path`, falling back to the built-in seed graph when the
    /// resource is missing or malformed. The simulation stays usable with an
    /// incomplete deployment; the gap is logged, not fatal.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(graph) => {
                tracing::info!(
                    path = %path.as_ref().display(),
                    nodes = graph.len(),
                    "dialogue graph loaded"
                );
                graph
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "falling back to built-in dialogue graph"
                );
                Self::default_graph()
            }
        }
    }

    /// Minimal single-node script used when no graph resource is available.
    pub fn default_graph() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "M1-01".to_string(),
            DialogueNode {
                character: Character::Counselor,
                goal: "Open the session".to_string(),
                examples: vec!["Hello, please have a seat.".to_string()],
                choices: vec![Choice {
                    text: None,
                    next_node: END_NODE.to_string(),
                }],
            },
        );
        Self { nodes }
    }

    pub fn get(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Derive the stage partition key from a node id (`"M1-01"` → `"M1"`).
pub fn stage_of(node_id: &str) -> &str {
    match node_id.split_once('-') {
        Some((stage, _)) => stage,
        None => "default",
    }
}
