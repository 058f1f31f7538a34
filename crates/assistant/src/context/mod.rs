//! Prompt context assembly.
//!
//! | Section | Source | Trim strategy |
//! |---------|--------|---------------|
//! | Persona | `[prompt]` config | Never trimmed |
//! | Paper title / text | Session | Never trimmed |
//! | Initial analysis | Session | Never trimmed |
//! | Conversation history | Session turns | Oldest pairs dropped, only when bounded |
//! | Current question | Caller | Never trimmed |

pub mod assembler;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyMetadata, ContextAssembler, DropInfo, HistoryBudget, PromptProfile,
};
