//! AST node types for the dfc language.

use super::types::Type;

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A complete source file: ordered top-level definitions.
#[derive(Debug, Clone)]
pub struct Definitions {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone)]
pub enum Definition {
    Var(VarDef),
    Func(FuncDef),
}

/// Storage class written in source (`var`, `game`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Line,
    Var,
    Game,
    Save,
    Local,
}

impl ScopeKind {
    /// Scope name used in the emitted template.
    pub fn wire_name(self) -> &'static str {
        match self {
            ScopeKind::Line | ScopeKind::Var => "line",
            ScopeKind::Game => "unsaved",
            ScopeKind::Save => "saved",
            ScopeKind::Local => "local",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "line" => Some(ScopeKind::Line),
            "var" => Some(ScopeKind::Var),
            "game" => Some(ScopeKind::Game),
            "save" => Some(ScopeKind::Save),
            "local" => Some(ScopeKind::Local),
            _ => None,
        }
    }
}

/// `game score: num;` or `var x: num = 1;`
#[derive(Debug, Clone)]
pub struct VarDef {
    pub scope: ScopeKind,
    pub name: String,
    pub ty: Type,
    pub value: Option<Expr>,
    pub span: Span,
}

/// `func greet(who: str, out res: num) { ... }`; a missing body marks an
/// external declaration.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<FuncParam>,
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncParam {
    pub name: String,
    pub ty: Type,
    pub optional: bool,
    pub plural: bool,
    pub output: bool,
    pub description: Option<String>,
}

/// Statements in a function body.
#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarDef),
    Expr(Expr),
}

/// Entity selector written as `@all`, `@victim`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    AllMobs,
    Default,
    Damager,
    Killer,
    Victim,
    Selection,
    Shooter,
}

impl Target {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "all" => Some(Target::All),
            "allmobs" => Some(Target::AllMobs),
            "default" => Some(Target::Default),
            "damager" => Some(Target::Damager),
            "killer" => Some(Target::Killer),
            "victim" => Some(Target::Victim),
            "selection" => Some(Target::Selection),
            "shooter" => Some(Target::Shooter),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Target::All => "AllPlayers",
            Target::AllMobs => "AllMobs",
            Target::Default => "Default",
            Target::Damager => "Damager",
            Target::Killer => "Killer",
            Target::Victim => "Victim",
            Target::Selection => "Selection",
            Target::Shooter => "Shooter",
        }
    }
}

/// `codeblock "SendMessage" <"PLAYER ACTION">`, optionally targeted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRef {
    pub action: String,
    pub category: String,
    pub target: Option<Target>,
}

/// Expressions.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `12`, `1.5`
    Number(f64),
    /// `"hello"`
    Str(String),
    /// `` `<red>hi` ``
    StyledText(String),
    /// `<1, 2, 3>`
    Vector { x: f64, y: f64, z: f64 },
    /// `x` or `$"spaced name"`
    Variable(String),
    /// `{ "a": 1, "b": 2 }`
    Dict(Vec<(String, Expr)>),
    /// `[1, 2, 3]`
    List(Vec<Expr>),
    /// `a + b`
    Binary {
        op: BinOp,
        op_span: Span,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a[i]` or `a.key`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// `a[i] = v`
    SetIndex {
        object: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    /// `x = v`
    Assign { name: String, value: Box<Expr> },
    /// `greet("hi")`
    Call { name: String, args: Vec<Expr> },
    /// `@all codeblock "SendMessage" <"PLAYER ACTION">("hi")`
    Action { action: ActionRef, args: Vec<Expr> },
    /// `(dict<num>) value`
    Cast { ty: Type, value: Box<Expr> },
}

impl ExprKind {
    /// Whether this expression may stand alone as a statement.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            ExprKind::Assign { .. }
                | ExprKind::SetIndex { .. }
                | ExprKind::Call { .. }
                | ExprKind::Action { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    /// Action name of the set-variable block computing this operator.
    pub fn action_name(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "x",
            BinOp::Div => "/",
            BinOp::Pow => "Exponent",
        }
    }
}
