//! # Threadmap Indexer
//!
//! Turns a repository's session context files into the combined thread index.
//!
//! ## Pipeline
//!
//! ```text
//! .github/copilot/contexts/*.md
//!     │
//!     ├──> Context Scanner (sorted, non-recursive)
//!     │      └─> Session records (frontmatter + machine block)
//!     │
//!     ├──> Relationship Resolver
//!     │      ├─ committed thread-map.json
//!     │      ├─ legacy thread-relationships.{json,yaml}
//!     │      └─ none found -> co-occurrence inference
//!     │
//!     └──> Index Builder
//!            └─> index.json, last_run.json, thread-map.inferred.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use threadmap_indexer::{IndexBuilder, IndexOptions};
//! use threadmap_protocol::RepoLayout;
//!
//! fn main() -> threadmap_indexer::Result<()> {
//!     let layout = RepoLayout::new("/path/to/repo");
//!     let outcome = IndexBuilder::new(layout, IndexOptions::default())?.run()?;
//!
//!     println!("Wrote {}", outcome.index_path.display());
//!     Ok(())
//! }
//! ```

mod error;
mod indexer;
mod resolver;
mod scanner;
mod session;
mod stats;
mod validate;

pub use error::{IndexerError, Result};
pub use indexer::{BuiltIndex, IndexBuilder, IndexOptions, IndexOutcome};
pub use resolver::{load_candidate, resolve_relationships, Resolution, SkippedCandidate};
pub use scanner::ContextScanner;
pub use session::{
    frontmatter_text, parse_frontmatter, ContextParser, MACHINE_BLOCK_END, MACHINE_BLOCK_START,
};
pub use stats::IndexStats;
pub use validate::{ContextValidator, Finding, FindingLevel, ValidationReport};
