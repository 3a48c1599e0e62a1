//! Pass lifecycle
//!
//! ```text
//! decode: Idle -> ReadingHeader -> DecodingMainPass -> DrainingDeferred -> Done
//! encode: Idle -> WritingHeader -> EncodingMainPass -> Done
//! ```
//!
//! `Failed` is reachable from every non-terminal state. `Done` and `Failed`
//! are terminal: a finished or failed pass is discarded, never reused.

use crate::error::{CodecError, CodecResult};

/// State of an encode or decode pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Created, not started
    Idle,
    /// Decoder reading the stream header
    ReadingHeader,
    /// Decoder reading the root value
    DecodingMainPass,
    /// Decoder running deferred actions
    DrainingDeferred,
    /// Encoder writing the stream header
    WritingHeader,
    /// Encoder writing the root value
    EncodingMainPass,
    /// Finished successfully
    Done,
    /// Aborted by an error
    Failed,
}

impl PassState {
    /// Name used in errors and logs
    pub fn name(self) -> &'static str {
        match self {
            PassState::Idle => "Idle",
            PassState::ReadingHeader => "ReadingHeader",
            PassState::DecodingMainPass => "DecodingMainPass",
            PassState::DrainingDeferred => "DrainingDeferred",
            PassState::WritingHeader => "WritingHeader",
            PassState::EncodingMainPass => "EncodingMainPass",
            PassState::Done => "Done",
            PassState::Failed => "Failed",
        }
    }

    /// True for `Done` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, PassState::Done | PassState::Failed)
    }

    /// True if `next` may follow `self`
    pub fn can_advance_to(self, next: PassState) -> bool {
        use PassState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, ReadingHeader) | (Idle, WritingHeader) => true,
            (ReadingHeader, DecodingMainPass) => true,
            (DecodingMainPass, DrainingDeferred) => true,
            (DrainingDeferred, Done) => true,
            (WritingHeader, EncodingMainPass) => true,
            (EncodingMainPass, Done) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: PassState) -> CodecResult<()> {
        if !self.can_advance_to(next) {
            return Err(CodecError::PassState {
                expected: expected_before(next),
                actual: self.name(),
            });
        }
        *self = next;
        Ok(())
    }
}

fn expected_before(next: PassState) -> &'static str {
    match next {
        PassState::ReadingHeader | PassState::WritingHeader => "Idle",
        PassState::DecodingMainPass => "ReadingHeader",
        PassState::DrainingDeferred => "DecodingMainPass",
        PassState::EncodingMainPass => "WritingHeader",
        PassState::Done => "DrainingDeferred or EncodingMainPass",
        PassState::Failed => "a running pass",
        PassState::Idle => "nothing",
    }
}
