use std::{
    collections::{HashMap, HashSet},
    fmt, mem,
};

use tracing::{debug, trace};

use crate::{
    ast::{
        Binding, Block, Expr, ExprKind, Function, Ident, Param, Program, Stmt, StmtKind, Typed,
        Untyped,
    },
    codegen,
    token::{Span, Spanned},
    types::Type,
    Options,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type CheckResult<T> = Result<T>;

/// How nested blocks treat the variables declared inside them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ScopePolicy {
    /// Every block opens a scope that ends with it. Inner declarations may
    /// shadow outer ones.
    #[default]
    Lexical,
    /// One scope per function: a variable declared in a nested block stays
    /// visible after the block ends and can't be redeclared.
    Flat,
}

/// Validates the program and annotates every expression with its type.
///
/// Stops at the first violation.
pub fn check(program: Program<Untyped>, options: &Options) -> CheckResult<Program<Typed>> {
    let signatures = collect_signatures(&program)?;
    let functions = program
        .functions
        .into_iter()
        .map(|function| {
            let cx = FunctionChecker::new(&signatures, options, &function);
            cx.check(function)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(functions = functions.len(), "checked program");
    Ok(Program { functions })
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Signature {
    params: Vec<Type>,
    return_ty: Type,
}

type Signatures = HashMap<Box<str>, Signature>;

/// Records every function up front, so calls may refer to functions defined
/// later in the file.
fn collect_signatures(program: &Program<Untyped>) -> Result<Signatures> {
    let mut signatures = HashMap::with_capacity(program.functions.len());
    for function in &program.functions {
        let name = &function.name;
        if signatures.contains_key(&name.name) {
            let error = Error::DuplicateFunction(name.name.clone());
            return Err(name.span.wrap(error));
        }
        let signature = Signature {
            params: function.params.iter().map(|param| param.ty).collect(),
            return_ty: function.return_ty,
        };
        signatures.insert(name.name.clone(), signature);
    }
    if !signatures.contains_key("main") {
        return Err(Span::START.wrap(Error::MissingMain));
    }
    Ok(signatures)
}

/// Checks the body of a single function. Constructed fresh for every function,
/// so no local ever outlives the function that declared it.
struct FunctionChecker<'c> {
    signatures: &'c Signatures,
    options: &'c Options,
    scopes: Scopes,
    /// C names handed out so far, shared by every block of the function.
    c_names: HashSet<Box<str>>,
    /// How many blocks deep inside the body the checker is.
    depth: usize,
    return_ty: Type,
}

impl<'c> FunctionChecker<'c> {
    fn new(
        signatures: &'c Signatures,
        options: &'c Options,
        function: &Function<Untyped>,
    ) -> FunctionChecker<'c> {
        FunctionChecker {
            signatures,
            options,
            scopes: Scopes::new(options.scopes),
            c_names: HashSet::new(),
            depth: 0,
            return_ty: function.return_ty,
        }
    }

    fn check(mut self, function: Function<Untyped>) -> Result<Function<Typed>> {
        debug!(function = %function.name, "checking function");

        // Parameters live in the outermost frame, which the body shares.
        let params = function
            .params
            .into_iter()
            .map(|param| {
                let info = self.declare(&param.name, param.ty, false)?;
                Ok(Param {
                    ty: param.ty,
                    name: param.name,
                    info,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let stmts = self.check_stmts(function.body.stmts)?;

        Ok(Function {
            name: function.name,
            params,
            return_ty: function.return_ty,
            body: Block {
                stmts,
                span: function.body.span,
            },
        })
    }

    /// Checks a block nested in the function body.
    fn check_block(&mut self, block: Block<Untyped>) -> Result<Block<Typed>> {
        self.scopes.enter();
        self.depth += 1;
        let stmts = self.check_stmts(block.stmts);
        self.depth -= 1;
        self.scopes.exit();
        Ok(Block {
            stmts: stmts?,
            span: block.span,
        })
    }

    fn check_stmts(&mut self, stmts: Vec<Stmt<Untyped>>) -> Result<Vec<Stmt<Typed>>> {
        stmts
            .into_iter()
            .map(|stmt| self.check_stmt(stmt))
            .collect()
    }

    fn check_stmt(&mut self, stmt: Stmt<Untyped>) -> Result<Stmt<Typed>> {
        let kind = match stmt.kind {
            StmtKind::VarDecl {
                manual,
                ty,
                name,
                initializer,
                ..
            } => {
                // The initializer can't see the variable it initializes.
                let initializer = initializer
                    .map(|init| {
                        let init = self.check_expr(init)?;
                        let context = Context::Initializer(name.name.clone());
                        expect_ty(context, ty, &init)?;
                        Ok(init)
                    })
                    .transpose()?;
                let info = self.declare(&name, ty, manual)?;
                StmtKind::VarDecl {
                    manual,
                    ty,
                    name,
                    initializer,
                    info,
                }
            }
            StmtKind::Assign { target, value, .. } => {
                let value = self.check_expr(value)?;
                let info = self.lookup(&target)?;
                expect_ty(Context::Assignment(target.name.clone()), info.ty, &value)?;
                StmtKind::Assign {
                    target,
                    value,
                    info,
                }
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.check_expr(condition)?;
                expect_ty(Context::IfCondition, Type::Int, &condition)?;
                StmtKind::If {
                    condition,
                    then_block: self.check_block(then_block)?,
                    else_block: else_block.map(|b| self.check_block(b)).transpose()?,
                }
            }
            StmtKind::While { condition, body } => {
                let condition = self.check_expr(condition)?;
                expect_ty(Context::WhileCondition, Type::Int, &condition)?;
                StmtKind::While {
                    condition,
                    body: self.check_block(body)?,
                }
            }
            StmtKind::Print(expr) => {
                let expr = self.check_expr(expr)?;
                if !matches!(expr.ty, Type::Int | Type::String) {
                    return Err(expr.span.wrap(Error::Unprintable(expr.ty)));
                }
                StmtKind::Print(expr)
            }
            StmtKind::Return(value) => {
                let value = value.map(|v| self.check_expr(v)).transpose()?;
                // A bare `return` is accepted whatever the return type.
                if let Some(value) = &value {
                    expect_ty(Context::Return, self.return_ty, value)?;
                }
                StmtKind::Return(value)
            }
        };
        Ok(Stmt {
            kind,
            span: stmt.span,
        })
    }

    fn check_expr(&mut self, expr: Expr<Untyped>) -> Result<Expr<Typed>> {
        let (kind, ty) = match expr.kind {
            ExprKind::Int(val) => (ExprKind::Int(val), Type::Int),
            ExprKind::String(val) => (ExprKind::String(val), Type::String),
            ExprKind::Ident(ident, ()) => {
                let binding = self.lookup(&ident)?;
                let ty = binding.ty;
                (ExprKind::Ident(ident, binding), ty)
            }
            ExprKind::Arith { op, lhs, rhs } => {
                let lhs = self.check_operand(op.symbol(), *lhs)?;
                let rhs = self.check_operand(op.symbol(), *rhs)?;
                let kind = ExprKind::Arith { op, lhs, rhs };
                (kind, Type::Int)
            }
            ExprKind::Compare { op, lhs, rhs } => {
                let lhs = self.check_operand(op.symbol(), *lhs)?;
                let rhs = self.check_operand(op.symbol(), *rhs)?;
                let kind = ExprKind::Compare { op, lhs, rhs };
                (kind, Type::Int)
            }
            ExprKind::Call { callee, args } => {
                let signatures = self.signatures;
                let Some(signature) = signatures.get(&callee.name) else {
                    let error = Error::UndefinedFunction(callee.name.clone());
                    return Err(callee.span.wrap(error));
                };
                let args = args
                    .into_iter()
                    .map(|arg| self.check_expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                if self.options.check_call_arity {
                    check_args(&callee, signature, &args)?;
                }
                let return_ty = signature.return_ty;
                (ExprKind::Call { callee, args }, return_ty)
            }
        };
        Ok(Expr {
            kind,
            span: expr.span,
            ty,
        })
    }

    fn check_operand(
        &mut self,
        op: &'static str,
        operand: Expr<Untyped>,
    ) -> Result<Box<Expr<Typed>>> {
        let operand = self.check_expr(operand)?;
        if operand.ty != Type::Int {
            let error = Error::NonIntOperand {
                op,
                actual: operand.ty,
            };
            return Err(operand.span.wrap(error));
        }
        Ok(Box::new(operand))
    }

    fn declare(&mut self, name: &Ident, ty: Type, manual: bool) -> Result<Binding> {
        if self.scopes.is_declared(&name.name) {
            return Err(name.span.wrap(Error::DuplicateVariable(name.name.clone())));
        }
        let binding = Binding {
            ty,
            manual,
            emit_name: self.c_name(&name.name),
            hoisted: self.options.scopes == ScopePolicy::Flat && self.depth > 0,
        };
        trace!(
            name = %name,
            emit_name = %binding.emit_name,
            ty = %ty,
            manual,
            hoisted = binding.hoisted,
            "declare"
        );
        self.scopes.declare(&name.name, binding.clone());
        Ok(binding)
    }

    /// Picks a C name for a local called `name`: the name itself, or the first
    /// free `name_N` when the name is taken.
    fn c_name(&mut self, name: &str) -> Box<str> {
        let mut candidate: Box<str> = name.into();
        let mut suffix = 0;
        while self.is_c_name_taken(&candidate) {
            suffix += 1;
            candidate = format!("{name}_{suffix}").into();
        }
        self.c_names.insert(candidate.clone());
        candidate
    }

    fn is_c_name_taken(&self, candidate: &str) -> bool {
        self.c_names.contains(candidate)
            || candidate == "main"
            || codegen::is_reserved(candidate)
            || candidate
                .strip_prefix(codegen::FUNCTION_PREFIX)
                .is_some_and(|function| self.signatures.contains_key(function))
    }

    fn lookup(&self, name: &Ident) -> Result<Binding> {
        self.scopes
            .lookup(&name.name)
            .ok_or_else(|| name.span.wrap(Error::UndefinedVariable(name.name.clone())))
    }
}

fn check_args(callee: &Ident, signature: &Signature, args: &[Expr<Typed>]) -> Result<()> {
    if args.len() != signature.params.len() {
        let error = Error::ArgumentCount {
            function: callee.name.clone(),
            expected: signature.params.len(),
            actual: args.len(),
        };
        return Err(callee.span.wrap(error));
    }
    for (index, (arg, &param_ty)) in args.iter().zip(&signature.params).enumerate() {
        let context = Context::Argument {
            position: index + 1,
            function: callee.name.clone(),
        };
        expect_ty(context, param_ty, arg)?;
    }
    Ok(())
}

fn expect_ty(context: Context, expected: Type, expr: &Expr<Typed>) -> Result<()> {
    if expr.ty == expected {
        return Ok(());
    }
    let error = Error::Mismatch {
        context,
        expected,
        actual: expr.ty,
    };
    Err(expr.span.wrap(error))
}

#[derive(Debug)]
struct Local {
    name: Box<str>,
    binding: Binding,
}

/// The variables visible at some point of a function body, as a stack of
/// frames. Under [`ScopePolicy::Flat`] there's only ever one frame.
#[derive(Debug)]
struct Scopes {
    policy: ScopePolicy,
    /// The innermost frame.
    current: Vec<Local>,
    /// Enclosing frames, outermost first.
    outer: Vec<Vec<Local>>,
}

impl Scopes {
    fn new(policy: ScopePolicy) -> Scopes {
        Scopes {
            policy,
            current: Vec::with_capacity(8),
            outer: Vec::new(),
        }
    }

    fn enter(&mut self) {
        if self.policy == ScopePolicy::Lexical {
            self.outer.push(mem::take(&mut self.current));
        }
    }

    fn exit(&mut self) {
        if self.policy == ScopePolicy::Lexical {
            self.current = self.outer.pop().unwrap_or_default();
        }
    }

    /// Whether `name` is already declared in the innermost frame.
    fn is_declared(&self, name: &str) -> bool {
        self.current.iter().any(|local| &*local.name == name)
    }

    /// Returns `false` if the name is already declared in the innermost frame.
    fn declare(&mut self, name: &str, binding: Binding) -> bool {
        if self.is_declared(name) {
            return false;
        }
        self.current.push(Local {
            name: name.into(),
            binding,
        });
        true
    }

    /// Finds the innermost declaration of `name`.
    fn lookup(&self, name: &str) -> Option<Binding> {
        std::iter::once(&self.current)
            .chain(self.outer.iter().rev())
            .flat_map(|frame| frame.iter().rev())
            .find(|local| &*local.name == name)
            .map(|local| local.binding.clone())
    }
}

/// Where a type was expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Context {
    Initializer(Box<str>),
    Assignment(Box<str>),
    IfCondition,
    WhileCondition,
    Return,
    Argument { position: usize, function: Box<str> },
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Initializer(name) => write!(f, "initializer of '{name}'"),
            Context::Assignment(name) => write!(f, "assignment to '{name}'"),
            Context::IfCondition => f.write_str("if condition"),
            Context::WhileCondition => f.write_str("while condition"),
            Context::Return => f.write_str("return"),
            Context::Argument { position, function } => {
                write!(f, "argument {position} of '{function}'")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no function named 'main'")]
    MissingMain,
    #[error("function '{0}' is already defined")]
    DuplicateFunction(Box<str>),
    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(Box<str>),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(Box<str>),
    #[error("undefined function '{0}'")]
    UndefinedFunction(Box<str>),
    #[error("type mismatch in {context}: expected {expected}, found {actual}")]
    Mismatch {
        context: Context,
        expected: Type,
        actual: Type,
    },
    #[error("function '{function}' expects {expected} argument(s), found {actual}")]
    ArgumentCount {
        function: Box<str>,
        expected: usize,
        actual: usize,
    },
    #[error("operands of {op} must be int, found {actual}")]
    NonIntOperand { op: &'static str, actual: Type },
    #[error("cannot print a value of type {0}")]
    Unprintable(Type),
}
