pub mod cause_list_flow;
pub mod selection_source;
pub mod selection_waiter;

pub use cause_list_flow::CauseListFlow;
pub use selection_source::{SelectionRequest, SelectionSource, SessionQueue, TerminalPrompt};
pub use selection_waiter::SelectionWaiter;
