pub mod document;
pub mod reference;
pub mod stage;

pub use document::*;
pub use reference::*;
pub use stage::*;
