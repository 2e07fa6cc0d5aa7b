pub mod abstract_text;
pub mod content;
pub mod orchestrator;
pub mod outline;
pub mod runner;
pub mod section_refs;
pub mod subsections;
pub mod title;

pub use abstract_text::*;
pub use content::*;
pub use orchestrator::*;
pub use outline::*;
pub use runner::*;
pub use section_refs::*;
pub use subsections::*;
pub use title::*;
