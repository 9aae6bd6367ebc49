// program   ::= function*
// function  ::= 'func' ID '(' [param (',' param)*] ')' '->' type block
// param     ::= type ID
// type      ::= 'int' | 'string'
// block     ::= '{' stmt* '}'
// stmt      ::= ['manual'] type ID ['=' expr] ';'
//             | ID '=' expr ';'
//             | 'if' '(' expr ')' block ['else' block]
//             | 'while' '(' expr ')' block
//             | 'print' '(' expr ')' ';'
//             | 'return' [expr] ';'
// expr      ::= cmp (('+' | '-') cmp)*
// cmp       ::= primary (('==' | '!=' | '<' | '<=' | '>' | '>=') primary)*
// primary   ::= integer | string | ID ['(' [expr (',' expr)*] ')'] | '(' expr ')'

// Precedence (tightest first)
//
// primary
// == != < <= > >=
// + -

use std::fmt::Debug;

use crate::{token::Span, types::Type};

/// Attaches per-phase information to the tree.
///
/// The parser produces [`Untyped`] trees; the checker turns them into
/// [`Typed`] ones, in which every expression knows its type and every use of a
/// variable knows its [`Binding`].
pub trait Info {
    type Ty: Clone + Debug + PartialEq;
    type Binding: Clone + Debug + PartialEq;
}

#[derive(Debug, PartialEq)]
pub struct Untyped;

impl Info for Untyped {
    type Ty = ();
    type Binding = ();
}

#[derive(Debug, PartialEq)]
pub struct Typed;

impl Info for Typed {
    type Ty = Type;
    type Binding = Binding;
}

/// What the checker knows about a resolved variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub ty: Type,
    /// Excluded from collector management.
    pub manual: bool,
    /// Name of the variable in generated C, unique within its function.
    pub emit_name: Box<str>,
    /// Declared at the top of the function in generated C, because it stays
    /// visible after the block that declares it.
    pub hoisted: bool,
}

#[derive(Debug, PartialEq)]
pub struct Program<I: Info> {
    pub functions: Vec<Function<I>>,
}

impl<I: Info> Default for Program<I> {
    fn default() -> Self {
        Program {
            functions: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Function<I: Info> {
    pub name: Ident,
    pub params: Vec<Param<I>>,
    pub return_ty: Type,
    pub body: Block<I>,
}

#[derive(Debug, PartialEq)]
pub struct Param<I: Info> {
    pub ty: Type,
    pub name: Ident,
    pub info: I::Binding,
}

#[derive(Debug, PartialEq)]
pub struct Block<I: Info> {
    pub stmts: Vec<Stmt<I>>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Stmt<I: Info> {
    pub kind: StmtKind<I>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind<I: Info> {
    VarDecl {
        manual: bool,
        ty: Type,
        name: Ident,
        initializer: Option<Expr<I>>,
        info: I::Binding,
    },
    Assign {
        target: Ident,
        value: Expr<I>,
        info: I::Binding,
    },
    If {
        condition: Expr<I>,
        then_block: Block<I>,
        else_block: Option<Block<I>>,
    },
    While {
        condition: Expr<I>,
        body: Block<I>,
    },
    Print(Expr<I>),
    Return(Option<Expr<I>>),
}

#[derive(Debug, PartialEq)]
pub struct Expr<I: Info> {
    pub kind: ExprKind<I>,
    pub span: Span,
    pub ty: I::Ty,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind<I: Info> {
    Int(i32),
    String(Box<str>),
    Ident(Ident, I::Binding),
    Arith {
        op: ArithOperator,
        lhs: Box<Expr<I>>,
        rhs: Box<Expr<I>>,
    },
    Compare {
        op: CompareOperator,
        lhs: Box<Expr<I>>,
        rhs: Box<Expr<I>>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr<I>>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOperator {
    Add,
    Sub,
}

impl ArithOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOperator::Add => "+",
            ArithOperator::Sub => "-",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Eq => "==",
            CompareOperator::Ne => "!=",
            CompareOperator::Lt => "<",
            CompareOperator::Le => "<=",
            CompareOperator::Gt => ">",
            CompareOperator::Ge => ">=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
