pub mod case_record;
pub mod session;

pub use case_record::{CaseCategory, CaseRecord, RecordMetadata};
pub use session::{
    FieldKind, PendingInput, Session, SessionHandle, SessionOutputs, SessionSnapshot,
    SessionStatus, Step,
};
