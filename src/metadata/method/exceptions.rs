//! Exception handler regions of method bodies.
//!
//! Region boundaries refer to instructions by [`InstrId`], so regions survive splicing and
//! relocation of the instruction list. End boundaries are exclusive: they name the first
//! instruction after the region, or `None` when the region runs to the end of the body.

use bitflags::bitflags;

use crate::{assembly::InstrId, metadata::signatures::TypeSignature};

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        const EXCEPTION = 0x0000;

        /// An exception filter and handler clause.
        const FILTER = 0x0001;

        /// A finally clause.
        const FINALLY = 0x0002;

        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// Exception handler defining try/catch/finally blocks within a method.
///
/// # Layout
///
/// ```text
/// try_start ..< try_end            protected region
/// filter_start ..< handler_start   filter block (FILTER only)
/// handler_start ..< handler_end    handler block
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    pub flags: ExceptionHandlerFlags,
    /// First instruction of the protected region
    pub try_start: InstrId,
    /// First instruction after the protected region
    pub try_end: InstrId,
    /// First instruction of the handler
    pub handler_start: InstrId,
    /// First instruction after the handler, `None` if the handler ends the body
    pub handler_end: Option<InstrId>,
    /// First instruction of the filter block, for FILTER clauses
    pub filter_start: Option<InstrId>,
    /// If flags == EXCEPTION, then this type will handle the exception.
    pub catch_type: Option<TypeSignature>,
}

impl ExceptionHandler {
    /// Returns every instruction this handler refers to.
    #[must_use]
    pub fn boundaries(&self) -> Vec<InstrId> {
        let mut ids = vec![self.try_start, self.try_end, self.handler_start];
        ids.extend(self.handler_end);
        ids.extend(self.filter_start);
        ids
    }

    /// Moves exclusive end boundaries that name `from` over to `to`.
    ///
    /// Start boundaries are left alone: code spliced in front of a region start stays outside
    /// the region.
    pub fn retarget_ends(&mut self, from: InstrId, to: InstrId) {
        if self.try_end == from {
            self.try_end = to;
        }
        if self.handler_end == Some(from) {
            self.handler_end = Some(to);
        }
    }
}
