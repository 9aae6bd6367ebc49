use std::io::Write;

use crate::{ast::*, types::Type};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string<I: InfoWriter>(program: &Program<I>) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string<I: InfoWriter>(expr: &Expr<I>) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program<I: InfoWriter>(
    w: &mut impl Write,
    program: &Program<I>,
) -> std::io::Result<()> {
    for function in &program.functions {
        print_function(w, 0, function)?;
    }
    Ok(())
}

fn print_function<I: InfoWriter>(
    w: &mut impl Write,
    i: usize,
    function: &Function<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "func {}(", function.name)?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{} {}", param.ty, param.name)?;
    }
    writeln!(w, ") -> {}", function.return_ty)?;
    print_stmts(w, i + 1, &function.body)
}

fn print_stmts<I: InfoWriter>(
    w: &mut impl Write,
    i: usize,
    block: &Block<I>,
) -> std::io::Result<()> {
    for stmt in &block.stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_stmt<I: InfoWriter>(
    w: &mut impl Write,
    i: usize,
    stmt: &Stmt<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    match &stmt.kind {
        StmtKind::VarDecl {
            manual,
            ty,
            name,
            initializer,
            ..
        } => {
            let manual = if *manual { "manual " } else { "" };
            writeln!(w, "declare {manual}{ty} {name}")?;
            if let Some(initializer) = initializer {
                print_expr(w, i + 1, initializer)?;
            }
        }
        StmtKind::Assign {
            target,
            value,
            info,
        } => {
            writeln!(w, "assign {target}{}", info.write_resolved())?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::If {
            condition,
            then_block,
            else_block,
        } => {
            writeln!(w, "if")?;
            print_expr(w, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            print_stmts(w, i + 2, then_block)?;
            if let Some(else_block) = else_block {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_stmts(w, i + 2, else_block)?;
            }
        }
        StmtKind::While { condition, body } => {
            writeln!(w, "while")?;
            print_expr(w, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "do")?;
            print_stmts(w, i + 2, body)?;
        }
        StmtKind::Print(expr) => {
            writeln!(w, "print")?;
            print_expr(w, i + 1, expr)?;
        }
        StmtKind::Return(value) => {
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_expr(w, i + 1, value)?;
            }
        }
    }
    Ok(())
}

pub fn print_expr<I: InfoWriter>(
    w: &mut impl Write,
    i: usize,
    expr: &Expr<I>,
) -> std::io::Result<()> {
    sp(w, i)?;
    let info = expr.ty.write_resolved(); // inferred type, for typed trees
    match &expr.kind {
        ExprKind::Int(val) => writeln!(w, "int {val}{info}")?,
        ExprKind::String(val) => writeln!(w, "string {val:?}{info}")?,
        ExprKind::Ident(ident, _) => writeln!(w, "ident {ident}{info}")?,
        ExprKind::Arith { op, lhs, rhs } => {
            writeln!(w, "arith {}{info}", op.symbol())?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Compare { op, lhs, rhs } => {
            writeln!(w, "compare {}{info}", op.symbol())?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call {callee}{info}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub trait InfoWriter: Info<Ty: ResolvedWriter, Binding: ResolvedWriter> {}

impl<I> InfoWriter for I
where
    I: Info,
    I::Ty: ResolvedWriter,
    I::Binding: ResolvedWriter,
{
}

/// Renders what the checker resolved for a node, if anything.
pub trait ResolvedWriter {
    fn write_resolved(&self) -> String;
}

impl ResolvedWriter for () {
    fn write_resolved(&self) -> String {
        String::new()
    }
}

impl ResolvedWriter for Type {
    fn write_resolved(&self) -> String {
        format!(" : {self}")
    }
}

impl ResolvedWriter for Binding {
    fn write_resolved(&self) -> String {
        if self.manual {
            format!(" : manual {}", self.ty)
        } else {
            format!(" : {}", self.ty)
        }
    }
}
