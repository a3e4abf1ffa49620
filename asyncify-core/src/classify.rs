//! Call-site classification
//!
//! Global invariants enforced:
//! - Classification is pure and local to one call node
//! - A call that already sits under `await` is never eligible

use serde::{Deserialize, Serialize};
use swc_ecma_ast::{CallExpr, Callee, Expr, MemberProp};

/// The blocking call to rewrite, `Promise.await` by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPattern {
    pub namespace: String,
    pub method: String,
}

impl Default for CallPattern {
    fn default() -> Self {
        CallPattern {
            namespace: "Promise".to_string(),
            method: "await".to_string(),
        }
    }
}

impl CallPattern {
    /// Display form used in logs, e.g. `Promise.await`
    pub fn display(&self) -> String {
        format!("{}.{}", self.namespace, self.method)
    }
}

/// Syntactic position of an expression relative to its parent
///
/// Parentheses and TypeScript non-null assertions are transparent: the
/// expression inside them inherits the position of the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Anywhere a prefixed `await` binds the whole expression
    #[default]
    Plain,
    /// Member object, call/new callee, tag, or left operand of `**`
    Operand,
    /// Direct argument of an `await` expression
    Awaited,
}

impl Position {
    /// Whether an `await` inserted here needs surrounding parentheses
    pub fn needs_parens(self) -> bool {
        matches!(self, Position::Operand)
    }
}

/// Check whether a call is an un-rewritten blocking-await call
pub fn is_blocking_await(call: &CallExpr, pattern: &CallPattern, position: Position) -> bool {
    if position == Position::Awaited {
        return false;
    }

    let callee = match &call.callee {
        Callee::Expr(expr) => expr,
        Callee::Super(_) | Callee::Import(_) => return false,
    };

    let member = match &**callee {
        Expr::Member(member) => member,
        _ => return false,
    };

    let object_matches = match &*member.obj {
        Expr::Ident(ident) => &*ident.sym == pattern.namespace,
        _ => false,
    };

    let property_matches = match &member.prop {
        MemberProp::Ident(name) => &*name.sym == pattern.method,
        MemberProp::PrivateName(_) | MemberProp::Computed(_) => false,
    };

    object_matches && property_matches
}
