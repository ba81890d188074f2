pub mod session;

pub use session::{
    MemorySessionLog, SessionRecord, SessionSink, SessionStatus,
};
