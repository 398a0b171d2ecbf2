//! Turn-taking orchestration over the dialogue graph and session store.
//!
//! The pointer-advance rule is deliberate: a counselor turn records the line
//! but leaves the graph pointer in place; the pointer moves only when the
//! paired client turn has been generated successfully. Counselor line plus
//! generated reply commit as one combined step.

use crate::graph::{stage_of, Character, DialogueGraph, DialogueNode, ENDED_GOAL, END_NODE};
use crate::prompt::{build_client_prompt, build_custom_question_prompt};
use crate::session::{SessionData, SessionState, SessionStore, Speaker, Turn};
use consim_llm::{GenError, GenerationClient};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Line attributed to a static client node when it carries no examples.
const DEFAULT_CLIENT_LINE: &str = "Hello.";

/// Stand-in counselor line when generation is requested before any
/// counselor turn was recorded.
const DEFAULT_COUNSELOR_LINE: &str = "Hello.";

#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("no active dialogue for this session")]
    NoActiveDialogue,

    #[error("dialogue node not found: {0}")]
    UnknownNode(String),

    #[error("successor node {0} is not a client node")]
    NotClientNode(String),

    #[error(transparent)]
    Generation(#[from] GenError),
}

/// What the UI needs to render a node: the goal text and, for counselor
/// nodes, the example utterances as selectable options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub goal: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StartOutcome {
    /// New stage at a counselor node: the caller picks an option.
    Started { node_info: NodeInfo },
    /// New stage at a client node: its first example is committed as a
    /// static line and the pointer already advanced past it.
    StartedStatic {
        speaker: Speaker,
        dialogue: String,
        node_info: NodeInfo,
    },
    /// The stage already existed; state returned unchanged.
    Resumed {
        resuming: bool,
        history: Vec<Turn>,
        node_info: NodeInfo,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CounselorTurn {
    pub speaker: Speaker,
    pub dialogue: String,
    pub node_info: NodeInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClientTurn {
    Generated {
        speaker: Speaker,
        dialogue: String,
        node_info: NodeInfo,
    },
    /// Traversal has left the script; no provider call was made.
    Ended { ended: bool, node_info: NodeInfo },
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomAnswer {
    pub speaker: Speaker,
    pub dialogue: String,
    pub is_custom: bool,
    pub options_to_restore: Vec<String>,
}

/// Wire frames for the streaming generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueStreamEvent {
    Start {
        speaker: Speaker,
    },
    Chunk {
        text: String,
    },
    Complete {
        full_text: String,
        node_info: NodeInfo,
    },
    Error {
        message: String,
        need_api_key: bool,
    },
}

pub type DialogueStream = Pin<Box<dyn Stream<Item = DialogueStreamEvent> + Send>>;

/// Outcome of starting a streamed client turn: either the terminal response
/// (no stream, no provider call) or the live fragment stream.
pub enum StreamStart {
    Ended { node_info: NodeInfo },
    Stream(DialogueStream),
}

// Inputs resolved under the session lock before streaming begins.
struct StreamPlan {
    prompt: String,
    stage: String,
    snapshot_node_id: String,
    after_node_id: String,
}

pub struct DialogueController {
    graph: Arc<DialogueGraph>,
    sessions: SessionStore,
}

impl DialogueController {
    pub fn new(graph: Arc<DialogueGraph>) -> Self {
        Self {
            graph,
            sessions: SessionStore::new(),
        }
    }

    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    pub async fn list_stages(&self, session_id: &str) -> Vec<String> {
        self.sessions.list_stages(session_id).await
    }

    /// Begin or resume the stage derived from `seed_node_id`.
    ///
    /// A failed start leaves the session exactly as it was: the active
    /// stage only moves once the seed node is known to be resumable or
    /// valid, and a session that never started is not created at all.
    pub async fn start(
        &self,
        session_id: &str,
        seed_node_id: &str,
    ) -> Result<StartOutcome, DialogueError> {
        let stage = stage_of(seed_node_id).to_string();

        if let Some(entry) = self.sessions.get(session_id).await {
            let mut data = entry.lock().await;
            if let Some(resumed) = self.resume_stage(&mut data, &stage) {
                return Ok(resumed);
            }
        }

        let node = self
            .graph
            .get(seed_node_id)
            .ok_or_else(|| DialogueError::UnknownNode(seed_node_id.to_string()))?;

        let entry = self.sessions.entry(session_id).await;
        let mut data = entry.lock().await;

        // A concurrent start may have created the stage between the lookup
        // above and taking this lock.
        if let Some(resumed) = self.resume_stage(&mut data, &stage) {
            return Ok(resumed);
        }

        data.active_stage = Some(stage.clone());

        if node.character == Character::Counselor {
            data.stages
                .insert(stage, SessionState::new(seed_node_id));
            return Ok(StartOutcome::Started {
                node_info: self.node_info(seed_node_id),
            });
        }

        // Client (or unlabeled) seed: its first example is a static opening
        // line, committed directly, and the pointer moves to the successor.
        let dialogue = node
            .examples
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CLIENT_LINE.to_string());
        let next_id = node.next_node_id().to_string();

        let mut state = SessionState::new(next_id.clone());
        state.history.push(Turn::client(dialogue.clone()));
        data.stages.insert(stage, state);

        Ok(StartOutcome::StartedStatic {
            speaker: Speaker::Client,
            dialogue,
            node_info: self.node_info(&next_id),
        })
    }

    /// Record a counselor line. The graph pointer stays put; it advances
    /// together with the generated client reply.
    pub async fn counselor_turn(
        &self,
        session_id: &str,
        dialogue: &str,
    ) -> Result<CounselorTurn, DialogueError> {
        let entry = self
            .sessions
            .get(session_id)
            .await
            .ok_or(DialogueError::NoActiveDialogue)?;
        let mut data = entry.lock().await;

        let stage = data
            .active_stage
            .clone()
            .ok_or(DialogueError::NoActiveDialogue)?;
        let state = data
            .stages
            .get_mut(&stage)
            .ok_or(DialogueError::NoActiveDialogue)?;

        state.last_counselor_message = dialogue.to_string();
        state.history.push(Turn::counselor(dialogue));
        let current_node_id = state.current_node_id.clone();

        let node_info = self.node_info(&current_node_id);
        Ok(CounselorTurn {
            speaker: Speaker::Counselor,
            dialogue: dialogue.to_string(),
            node_info,
        })
    }

    /// Generate the client half of the current turn pair and, on success,
    /// advance the pointer past the client node. Any failure leaves the
    /// session state exactly as it was.
    pub async fn generate_client_turn(
        &self,
        session_id: &str,
        client: &dyn GenerationClient,
    ) -> Result<ClientTurn, DialogueError> {
        let entry = self
            .sessions
            .get(session_id)
            .await
            .ok_or(DialogueError::NoActiveDialogue)?;
        let mut data = entry.lock().await;

        let stage = data
            .active_stage
            .clone()
            .ok_or(DialogueError::NoActiveDialogue)?;
        let state = data
            .stages
            .get_mut(&stage)
            .ok_or(DialogueError::NoActiveDialogue)?;

        let plan = match self.plan_generation(&stage, state)? {
            Some(plan) => plan,
            None => {
                return Ok(ClientTurn::Ended {
                    ended: true,
                    node_info: ended_info(),
                })
            }
        };

        let reply = client.generate(&plan.prompt).await?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(GenError::Endpoint("provider returned an empty reply".to_string()).into());
        }

        state.history.push(Turn::client(reply.clone()));
        state.current_node_id = plan.after_node_id.clone();

        Ok(ClientTurn::Generated {
            speaker: Speaker::Client,
            dialogue: reply,
            node_info: self.node_info(&plan.after_node_id),
        })
    }

    /// Streaming variant: preconditions are resolved up front under the
    /// session lock, fragments are forwarded as they arrive, and state
    /// commits only after the full text is assembled. A consumer that drops
    /// the stream mid-way commits nothing.
    pub async fn generate_client_turn_stream(
        self: &Arc<Self>,
        session_id: &str,
        client: Arc<dyn GenerationClient>,
    ) -> Result<StreamStart, DialogueError> {
        let entry = self
            .sessions
            .get(session_id)
            .await
            .ok_or(DialogueError::NoActiveDialogue)?;

        let plan = {
            let mut data = entry.lock().await;
            let stage = data
                .active_stage
                .clone()
                .ok_or(DialogueError::NoActiveDialogue)?;
            let state = data
                .stages
                .get_mut(&stage)
                .ok_or(DialogueError::NoActiveDialogue)?;
            match self.plan_generation(&stage, state)? {
                Some(plan) => plan,
                None => {
                    return Ok(StreamStart::Ended {
                        node_info: ended_info(),
                    })
                }
            }
        };

        let controller = Arc::clone(self);
        let stream = async_stream::stream! {
            yield DialogueStreamEvent::Start { speaker: Speaker::Client };

            let mut fragments = match client.generate_stream(&plan.prompt).await {
                Ok(fragments) => fragments,
                Err(e) => {
                    yield DialogueStreamEvent::Error {
                        message: e.to_string(),
                        need_api_key: e.need_api_key(),
                    };
                    return;
                }
            };

            let mut full_text = String::new();
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => {
                        full_text.push_str(&text);
                        yield DialogueStreamEvent::Chunk { text };
                    }
                    Err(e) => {
                        yield DialogueStreamEvent::Error {
                            message: e.to_string(),
                            need_api_key: e.need_api_key(),
                        };
                        return;
                    }
                }
            }

            let full_text = full_text.trim().to_string();
            if full_text.is_empty() {
                yield DialogueStreamEvent::Error {
                    message: "provider returned an empty reply".to_string(),
                    need_api_key: false,
                };
                return;
            }

            // Optimistic commit: only if the pointer is still where the
            // snapshot left it. A concurrent mutation makes this attempt
            // stale, and a stale attempt must not half-save. The final
            // frame always reports where the session actually is.
            let committed_node_id = {
                let mut data = entry.lock().await;
                match data.stages.get_mut(&plan.stage) {
                    Some(state) if state.current_node_id == plan.snapshot_node_id => {
                        state.history.push(Turn::client(full_text.clone()));
                        state.current_node_id = plan.after_node_id.clone();
                        plan.after_node_id.clone()
                    }
                    Some(state) => {
                        tracing::warn!(
                            stage = %plan.stage,
                            "dialogue advanced during streaming; discarding generated turn"
                        );
                        state.current_node_id.clone()
                    }
                    None => {
                        tracing::warn!(
                            stage = %plan.stage,
                            "stage removed during streaming; discarding generated turn"
                        );
                        plan.snapshot_node_id.clone()
                    }
                }
            };

            yield DialogueStreamEvent::Complete {
                full_text,
                node_info: controller.node_info(&committed_node_id),
            };
        };

        Ok(StreamStart::Stream(Box::pin(stream)))
    }

    /// Out-of-band question to the client persona. Reads the history for
    /// context but never touches traversal state; the caller gets the
    /// current node's options back so the UI can re-render them unchanged.
    pub async fn ask_custom_question(
        &self,
        session_id: &str,
        question: &str,
        client: &dyn GenerationClient,
    ) -> Result<CustomAnswer, DialogueError> {
        let entry = self
            .sessions
            .get(session_id)
            .await
            .ok_or(DialogueError::NoActiveDialogue)?;

        let (prompt, options) = {
            let data = entry.lock().await;
            let stage = data
                .active_stage
                .as_deref()
                .ok_or(DialogueError::NoActiveDialogue)?;
            let state = data
                .stages
                .get(stage)
                .ok_or(DialogueError::NoActiveDialogue)?;

            let options = self
                .graph
                .get(&state.current_node_id)
                .map(|node| node.examples.clone())
                .unwrap_or_default();
            (build_custom_question_prompt(question, &state.history), options)
        };

        let reply = client.generate(&prompt).await?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(GenError::Endpoint("provider returned an empty reply".to_string()).into());
        }

        Ok(CustomAnswer {
            speaker: Speaker::Client,
            dialogue: reply,
            is_custom: true,
            options_to_restore: options,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// If the stage already has state, make it active again and return the
    /// unchanged history.
    fn resume_stage(&self, data: &mut SessionData, stage: &str) -> Option<StartOutcome> {
        let state = data.stages.get(stage)?;
        let history = state.history.clone();
        let node_info = self.node_info(&state.current_node_id);
        data.active_stage = Some(stage.to_string());
        Some(StartOutcome::Resumed {
            resuming: true,
            history,
            node_info,
        })
    }

    /// Resolve the generation inputs for the current state, or `None` when
    /// traversal is terminal (pointer at END, or an authoring gap left the
    /// pointer on a missing node).
    fn plan_generation(
        &self,
        stage: &str,
        state: &SessionState,
    ) -> Result<Option<StreamPlan>, DialogueError> {
        let current_id = state.current_node_id.clone();
        if current_id == END_NODE {
            return Ok(None);
        }

        let current_node = match self.graph.get(&current_id) {
            Some(node) => node,
            None => return Ok(None),
        };

        let next_id = current_node.next_node_id().to_string();
        if next_id == END_NODE {
            return Ok(None);
        }
        let next_node = match self.graph.get(&next_id) {
            Some(node) => node,
            None => return Ok(None),
        };

        if next_node.character != Character::Client {
            return Err(DialogueError::NotClientNode(next_id));
        }

        let counselor_message = if state.last_counselor_message.is_empty() {
            fallback_counselor_line(current_node)
        } else {
            state.last_counselor_message.clone()
        };

        let prompt = build_client_prompt(&counselor_message, &next_node.goal, &next_node.examples);

        Ok(Some(StreamPlan {
            prompt,
            stage: stage.to_string(),
            snapshot_node_id: current_id,
            after_node_id: next_node.next_node_id().to_string(),
        }))
    }

    fn node_info(&self, node_id: &str) -> NodeInfo {
        match self.graph.get(node_id) {
            Some(node) if node_id != END_NODE => NodeInfo {
                id: node_id.to_string(),
                goal: node.goal.clone(),
                options: node.examples.clone(),
            },
            _ => NodeInfo {
                id: node_id.to_string(),
                goal: ENDED_GOAL.to_string(),
                options: Vec::new(),
            },
        }
    }
}

fn ended_info() -> NodeInfo {
    NodeInfo {
        id: END_NODE.to_string(),
        goal: ENDED_GOAL.to_string(),
        options: Vec::new(),
    }
}

fn fallback_counselor_line(node: &DialogueNode) -> String {
    node.examples
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_COUNSELOR_LINE.to_string())
}
