//! Async propagation for enclosing functions
//!
//! Global invariants enforced:
//! - A function is marked suspend-capable at most once
//! - A function already declared `async` is never marked again
//! - Each function yields at most one conversion record per run

use crate::naming::FunctionKind;
use swc_common::Span;

/// Bookkeeping for one open function scope during traversal
#[derive(Debug, Clone)]
pub struct FunctionScope {
    pub kind: FunctionKind,
    pub name: Option<String>,
    /// Span reported for conversions and skips
    pub span: Span,
    /// Byte offset where `async ` goes when the scope gets marked
    pub async_at: usize,
    declared_async: bool,
    marked: bool,
    recorded: bool,
}

impl FunctionScope {
    pub fn new(kind: FunctionKind, name: Option<String>, span: Span, async_at: usize, declared_async: bool) -> Self {
        FunctionScope {
            kind,
            name,
            span,
            async_at,
            declared_async,
            marked: false,
            recorded: false,
        }
    }

    /// The module top level, used when a call has no enclosing function
    pub fn program(span: Span) -> Self {
        FunctionScope::new(FunctionKind::Program, None, span, 0, false)
    }

    pub fn is_suspend_capable(&self) -> bool {
        self.declared_async || self.marked
    }

    /// Mark the function suspend-capable
    ///
    /// Returns `true` only the first time a not-yet-async function is marked;
    /// the caller inserts the `async` keyword exactly then.
    pub fn mark_suspend_capable(&mut self) -> bool {
        if self.is_suspend_capable() {
            return false;
        }
        self.marked = true;
        true
    }

    /// Whether this run changed the function's signature
    pub fn was_marked(&self) -> bool {
        self.marked
    }

    /// Claim the conversion record for this function
    ///
    /// Returns `true` for the first converted call site only.
    pub fn claim_record(&mut self) -> bool {
        !std::mem::replace(&mut self.recorded, true)
    }
}
