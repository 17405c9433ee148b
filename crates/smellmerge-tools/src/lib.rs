//! smellmerge tools
//!
//! Runs the external test-smell detectors (snutsjs, steel) with bounded
//! execution, reads their artifacts back, resolves method context through an
//! external resolver and drives the per-repository pipeline.

pub mod adapter;
pub mod artifact;
pub mod enrich;
pub mod pipeline;
pub mod process;
pub mod snuts;
pub mod steel;

pub use adapter::{locate_install, ToolAdapter};
pub use artifact::{load_tool_rows, read_tool_rows};
pub use enrich::{
    MethodAnswer, MethodBatchRequest, MethodContextExtractor, MethodQuery, MethodResolver,
    ProcessMethodResolver,
};
pub use pipeline::{adapter_for, discover_corpus, SmellPipeline};
pub use process::{invoke, Invocation, ProcessOutput};
pub use snuts::SnutsAdapter;
pub use steel::SteelAdapter;
