pub mod controller;
pub mod graph;
pub mod prompt;
pub mod session;

pub use controller::{
    ClientTurn, CounselorTurn, CustomAnswer, DialogueController, DialogueError, DialogueStream,
    DialogueStreamEvent, NodeInfo, StartOutcome, StreamStart,
};
pub use graph::{stage_of, Character, Choice, DialogueGraph, DialogueNode, GraphError, ENDED_GOAL, END_NODE};
pub use session::{SessionData, SessionState, SessionStore, Speaker, Turn, SESSION_SCHEMA_VERSION};
