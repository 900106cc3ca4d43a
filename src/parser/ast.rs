use crate::scanner::token::TokenType;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    // Primary expressions
    Num(f64),
    Str(String),
    Bool(bool),
    Nil,
    Identifier(String),
    SelfExpr,

    // Operator expressions
    Binary {
        left: Box<Expr>,
        op: TokenType,
        right: Box<Expr>,
    },
    // `and`/`or`; kept apart from Binary because the right side may not run
    Logical {
        left: Box<Expr>,
        op: TokenType,
        right: Box<Expr>,
    },
    Unary {
        op: TokenType,
        operand: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    PropertyAccess {
        object: Box<Expr>,
        property: String,
    },
    New {
        class_name: String,
        arguments: Vec<Expr>,
    },

    // Assignment targets: a plain name, `name`/`obj`[index], or a property.
    // Compound forms are desugared by the parser before this node is built.
    Assign {
        name: String,
        value: Box<Expr>,
        index: Option<Box<Expr>>,
        object: Option<Box<Expr>>,
    },
    Set {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
    },

    // Literals with element expressions
    Array(Vec<Expr>),
    Dictionary(Vec<(Expr, Expr)>),

    // An expression-bodied lambda is wrapped into a single `give` statement
    // at parse time, so every function body is a statement list.
    Lambda {
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
    },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Out(Expr),
    VarDecl {
        name: String,
        initializer: Expr,
    },
    Block(Vec<Stmt>),
    When {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Repeat {
        variable: String,
        start: Expr,
        end: Expr,
        body: Box<Stmt>,
    },
    Get {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Task {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
    },
    Give(Option<Expr>),
    Escape,
    Skip,
    Model {
        name: String,
        parent: Option<String>,
        init_params: Vec<String>,
        init_body: Rc<Vec<Stmt>>,
        members: Vec<ModelMember>,
    },
    Struct {
        name: String,
        fields: Vec<String>,
    },
    Use(String),
    Try {
        body: Box<Stmt>,
        catch_var: String,
        catch_body: Box<Stmt>,
    },
    Throw(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct ModelMember {
    pub visibility: Visibility,
    pub kind: MemberKind,
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    // The initializer is recorded but not applied at instantiation;
    // properties get their values in `init`.
    Property {
        name: String,
        initializer: Option<Expr>,
    },
    Method {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
    },
}
