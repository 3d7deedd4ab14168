//! Prompt domain - fixed generation templates with variable slots

mod builder;
mod template;

pub use builder::{PromptBuilder, PromptStyle};
pub use template::{PromptTemplate, PromptVariable, TemplateError};
