//! Display names for enclosing functions
//!
//! Global invariants enforced:
//! - Resolution depends only on the function and its immediate syntactic parents
//! - Absence of a name is a skip signal, never an error
//!
//! Precedence:
//! 1. Method key (`load() {}`, `class A { run() {} }`, `#private() {}`)
//! 2. Binding the function initializes (`const greet = () => {}`,
//!    `obj.load = function () {}`, class and object property values)
//!
//! Anything else is anonymous, including `function foo() {}` and named
//! function expressions passed as arguments.
//!
//! An object-literal method whose object is the right-hand side of an
//! assignment is named `<target>.<method>`.

use swc_ecma_ast::{AssignTarget, Expr, MemberExpr, MemberProp, PrivateName, PropName, SimpleAssignTarget};

/// Function variants, tagged the way the report names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunctionExpression,
    ObjectMethod,
    ClassMethod,
    ClassPrivateMethod,
    ObjectGetter,
    ObjectSetter,
    ClassGetter,
    ClassSetter,
    ClassConstructor,
    ClassProperty,
    StaticBlock,
    Program,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::FunctionDeclaration => "FunctionDeclaration",
            FunctionKind::FunctionExpression => "FunctionExpression",
            FunctionKind::ArrowFunctionExpression => "ArrowFunctionExpression",
            FunctionKind::ObjectMethod => "ObjectMethod",
            FunctionKind::ClassMethod => "ClassMethod",
            FunctionKind::ClassPrivateMethod => "ClassPrivateMethod",
            FunctionKind::ObjectGetter => "ObjectGetter",
            FunctionKind::ObjectSetter => "ObjectSetter",
            FunctionKind::ClassGetter => "ClassGetter",
            FunctionKind::ClassSetter => "ClassSetter",
            FunctionKind::ClassConstructor => "ClassConstructor",
            FunctionKind::ClassProperty => "ClassProperty",
            FunctionKind::StaticBlock => "StaticBlock",
            FunctionKind::Program => "Program",
        }
    }

    /// Whether this scope may legally be declared `async`
    pub fn can_suspend(&self) -> bool {
        match self {
            FunctionKind::FunctionDeclaration
            | FunctionKind::FunctionExpression
            | FunctionKind::ArrowFunctionExpression
            | FunctionKind::ObjectMethod
            | FunctionKind::ClassMethod
            | FunctionKind::ClassPrivateMethod => true,
            FunctionKind::ObjectGetter
            | FunctionKind::ObjectSetter
            | FunctionKind::ClassGetter
            | FunctionKind::ClassSetter
            | FunctionKind::ClassConstructor
            | FunctionKind::ClassProperty
            | FunctionKind::StaticBlock
            | FunctionKind::Program => false,
        }
    }
}

/// Name a function expression picks up from the syntax around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Variable declarator, class property or object property
    Declared(String),
    /// Right-hand side of an assignment to a renderable target
    Assigned(String),
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Binding::Declared(name) | Binding::Assigned(name) => name,
        }
    }
}

/// Everything the resolver looks at for one function
#[derive(Debug, Default)]
pub struct FunctionSite<'a> {
    pub key: Option<String>,
    pub binding: Option<&'a Binding>,
    /// For object methods: assignment target of the enclosing object literal
    pub owner: Option<&'a str>,
}

/// Resolve the display name of a function, or `None` when it is anonymous
pub fn resolve_function_name(kind: FunctionKind, site: &FunctionSite<'_>) -> Option<String> {
    if !kind.can_suspend() {
        return None;
    }

    if let Some(key) = &site.key {
        return match (kind, site.owner) {
            (FunctionKind::ObjectMethod, Some(owner)) => Some(format!("{}.{}", owner, key)),
            _ => Some(key.clone()),
        };
    }

    site.binding.map(|binding| binding.name().to_string())
}

/// Static name of a property key; computed keys have none
pub fn prop_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(str_lit) => Some(str_lit.value.to_atom_lossy().to_string()),
        PropName::Num(num) => Some(num.to_string()),
        PropName::Computed(_) | PropName::BigInt(_) => None,
    }
}

pub fn private_name(key: &PrivateName) -> String {
    format!("#{}", key.name)
}

/// Dotted rendering of an assignment target (`a.b.c`, `this.x`)
pub fn assign_target_name(target: &AssignTarget) -> Option<String> {
    match target {
        AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => Some(binding.id.sym.to_string()),
        AssignTarget::Simple(SimpleAssignTarget::Member(member)) => member_path(member),
        AssignTarget::Simple(SimpleAssignTarget::Paren(paren)) => expr_path(&paren.expr),
        AssignTarget::Simple(_) | AssignTarget::Pat(_) => None,
    }
}

fn expr_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::This(_) => Some("this".to_string()),
        Expr::Member(member) => member_path(member),
        Expr::Paren(paren) => expr_path(&paren.expr),
        _ => None,
    }
}

fn member_path(member: &MemberExpr) -> Option<String> {
    let object = expr_path(&member.obj)?;
    match &member.prop {
        MemberProp::Ident(name) => Some(format!("{}.{}", object, name.sym)),
        MemberProp::PrivateName(name) => Some(format!("{}.{}", object, private_name(name))),
        MemberProp::Computed(_) => None,
    }
}
