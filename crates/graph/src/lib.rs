//! # Thread graph
//!
//! Relationships between threads, either loaded from a committed map or inferred
//! from which threads share sessions, and the expansion ranking derived from them.
//!
//! ## Architecture
//!
//! ```text
//! SessionRecord[]                     RelationshipMap (committed / legacy file)
//!     │                                        │
//!     └──> CooccurrenceInference ──────────────┤
//!            ├─ per-thread session counts      │
//!            ├─ symmetric co-occurrence        │
//!            └─ prop = co / count (directed)   │
//!                                              ▼
//!                                   ThreadGraph (petgraph)
//!                                     ├─ Nodes: thread names
//!                                     ├─ Edges: tier + weight 1.0 / 0.6 / 0.3
//!                                     └─ recommended_expansion per thread
//! ```

mod error;
mod expansion;
mod graph;
mod inference;
mod types;

pub use error::{GraphError, Result};
pub use expansion::recommend_expansion;
pub use graph::{RelatedThread, ThreadGraph};
pub use inference::{
    synthetic_thread, thread_set, CooccurrenceInference, Inference, InferenceConfig,
};
pub use types::{RelationTiers, RelationshipMap};
