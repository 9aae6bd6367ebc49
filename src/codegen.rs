use std::{fmt, format_args as f, io};

use tracing::debug;

use crate::{
    ast::{Binding, Block, Expr, ExprKind, Function, Program, Stmt, StmtKind, Typed},
    types::Type,
};

/// Renders a checked program as a C translation unit linked against the
/// collector runtime.
pub fn generate<W>(writer: W, program: &Program<Typed>) -> io::Result<()>
where
    W: io::Write,
{
    debug!(functions = program.functions.len(), "generating C");
    Generator::new(writer).generate(program)
}

/// Prepended to the C name of every function but `main`, so that functions
/// can't collide with C keywords, libc or the runtime.
pub(crate) const FUNCTION_PREFIX: &str = "kl_";

/// Names a local can't take in the generated C: keywords, the identifiers
/// `stdio.h` and `gc.h` bring into scope as objects, types or macros, and the
/// functions the generated code calls.
static RESERVED: phf::Set<&'static str> = phf::phf_set! {
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while",
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic",
    "_Imaginary", "_Noreturn", "_Static_assert", "_Thread_local",
    "alignas", "alignof", "bool", "constexpr", "false", "nullptr",
    "static_assert", "thread_local", "true", "typeof", "typeof_unqual",
    "BUFSIZ", "EOF", "FILENAME_MAX", "FOPEN_MAX", "L_tmpnam", "NULL",
    "SEEK_CUR", "SEEK_END", "SEEK_SET", "TMP_MAX",
    "FILE", "fpos_t", "max_align_t", "off_t", "ptrdiff_t", "size_t",
    "ssize_t", "va_list", "wchar_t",
    "stdin", "stdout", "stderr", "printf",
    "KILO_GC_H", "gc_init", "gc_alloc", "gc_strdup", "gc_collect",
    "gc_collect_range",
};

/// Whether a local named `name` would break the generated C.
pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED.contains(name)
}

const INDENT: &str = "    ";

struct Generator<W> {
    writer: W,
    depth: usize,
}

impl<W> Generator<W>
where
    W: io::Write,
{
    fn new(writer: W) -> Generator<W> {
        Generator { writer, depth: 0 }
    }

    fn generate(mut self, program: &Program<Typed>) -> io::Result<()> {
        self.out("#include <stdio.h>")?;
        self.out("#include \"gc.h\"")?;
        self.out_line()?;

        // Functions may be called before they are defined.
        for function in &program.functions {
            self.out(f!("{};", Prototype(function)))?;
        }

        for function in &program.functions {
            self.out_line()?;
            self.g_function(function)?;
        }
        self.writer.flush()
    }

    fn g_function(&mut self, function: &Function<Typed>) -> io::Result<()> {
        self.out(f!("{} {{", Prototype(function)))?;
        self.indented(|this| {
            this.g_hoisted(&function.body)?;
            this.g_stmts(&function.body, function.return_ty)?;
            this.g_return(None, function.return_ty)
        })?;
        self.out("}")
    }

    /// Declares, ahead of the body, the locals whose declaration sits in a
    /// nested block but whose scope is the whole function.
    fn g_hoisted(&mut self, block: &Block<Typed>) -> io::Result<()> {
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::VarDecl { info, .. } if info.hoisted => {
                    self.out(f!("{} {};", c_type(info.ty), info.emit_name))?;
                }
                StmtKind::If {
                    then_block,
                    else_block,
                    ..
                } => {
                    self.g_hoisted(then_block)?;
                    if let Some(else_block) = else_block {
                        self.g_hoisted(else_block)?;
                    }
                }
                StmtKind::While { body, .. } => self.g_hoisted(body)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn g_stmts(&mut self, block: &Block<Typed>, return_ty: Type) -> io::Result<()> {
        for stmt in &block.stmts {
            self.g_stmt(stmt, return_ty)?;
        }
        Ok(())
    }

    fn g_stmt(&mut self, stmt: &Stmt<Typed>, return_ty: Type) -> io::Result<()> {
        match &stmt.kind {
            StmtKind::VarDecl {
                initializer,
                info,
                ..
            } => {
                let (c_ty, name) = (c_type(info.ty), &info.emit_name);
                let value = initializer.as_ref().map(|init| Stored::new(init, info));
                match value {
                    Some(value) if info.hoisted => self.out(f!("{name} = {value};")),
                    Some(value) => self.out(f!("{c_ty} {name} = {value};")),
                    // Already declared at the top of the function.
                    None if info.hoisted => Ok(()),
                    None => self.out(f!("{c_ty} {name};")),
                }
            }
            StmtKind::Assign { value, info, .. } => {
                let value = Stored::new(value, info);
                self.out(f!("{} = {value};", info.emit_name))
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.out(f!("if ({}) {{", CExpr::top(condition)))?;
                self.indented(|this| this.g_stmts(then_block, return_ty))?;
                if let Some(else_block) = else_block {
                    self.out("} else {")?;
                    self.indented(|this| this.g_stmts(else_block, return_ty))?;
                }
                self.out("}")
            }
            StmtKind::While { condition, body } => {
                self.out(f!("while ({}) {{", CExpr::top(condition)))?;
                self.indented(|this| this.g_stmts(body, return_ty))?;
                self.out("}")
            }
            StmtKind::Print(expr) => {
                let placeholder = if expr.ty == Type::String { "%s" } else { "%d" };
                self.out(f!("printf(\"{placeholder}\\n\", {});", CExpr::top(expr)))
            }
            StmtKind::Return(value) => self.g_return(value.as_ref(), return_ty),
        }
    }

    fn g_return(&mut self, value: Option<&Expr<Typed>>, return_ty: Type) -> io::Result<()> {
        match value {
            Some(value) => self.out(f!("return {};", CExpr::top(value))),
            None if return_ty == Type::Void => self.out("return;"),
            None => self.out("return 0;"),
        }
    }
}

/// Utility functions.
impl<W> Generator<W>
where
    W: io::Write,
{
    /// Prints a line at the current depth.
    fn out(&mut self, f: impl fmt::Display) -> io::Result<()> {
        for _ in 0..self.depth {
            self.writer.write_all(INDENT.as_bytes())?;
        }
        writeln!(self.writer, "{f}")
    }

    /// Prints an empty line.
    fn out_line(&mut self) -> io::Result<()> {
        writeln!(self.writer)
    }

    /// Writes one level deeper.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }
}

/// Non-manual strings hold a copy owned by the collector.
fn is_collected(binding: &Binding) -> bool {
    binding.ty == Type::String && !binding.manual
}

/// A value about to be stored in a variable.
struct Stored<'a> {
    expr: &'a Expr<Typed>,
    collected: bool,
}

impl<'a> Stored<'a> {
    fn new(expr: &'a Expr<Typed>, target: &Binding) -> Stored<'a> {
        Stored {
            expr,
            collected: is_collected(target),
        }
    }
}

impl fmt::Display for Stored<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.collected {
            write!(f, "gc_strdup({})", CExpr::top(self.expr))
        } else {
            write!(f, "{}", CExpr::top(self.expr))
        }
    }
}

/// The C name of a function.
struct FunctionName<'a>(&'a str);

impl fmt::Display for FunctionName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == "main" {
            f.write_str("main")
        } else {
            write!(f, "{FUNCTION_PREFIX}{}", self.0)
        }
    }
}

fn c_type(ty: Type) -> &'static str {
    match ty {
        Type::Int => "int",
        Type::String => "char*",
        Type::Void => "void",
    }
}

/// A function signature, without the trailing `;` or body.
struct Prototype<'a>(&'a Function<Typed>);

impl fmt::Display for Prototype<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.0;
        let name = FunctionName(&function.name.name);
        write!(f, "{} {name}(", c_type(function.return_ty))?;
        if function.params.is_empty() {
            f.write_str("void")?;
        }
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", c_type(param.ty), param.info.emit_name)?;
        }
        f.write_str(")")
    }
}

/// An expression in C syntax.
struct CExpr<'a> {
    expr: &'a Expr<Typed>,
    /// Whether the expression is an operand of another operator.
    nested: bool,
}

impl<'a> CExpr<'a> {
    fn top(expr: &'a Expr<Typed>) -> CExpr<'a> {
        CExpr {
            expr,
            nested: false,
        }
    }

    fn operand(expr: &'a Expr<Typed>) -> CExpr<'a> {
        CExpr { expr, nested: true }
    }
}

impl fmt::Display for CExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr.kind {
            ExprKind::Int(val) => write!(f, "{val}"),
            ExprKind::String(val) => write_c_string(f, val),
            ExprKind::Ident(_, binding) => f.write_str(&binding.emit_name),
            ExprKind::Arith { op, lhs, rhs } => {
                let (lhs, rhs) = (CExpr::operand(lhs), CExpr::operand(rhs));
                write!(f, "({lhs} {} {rhs})", op.symbol())
            }
            ExprKind::Compare { op, lhs, rhs } => {
                let (lhs, rhs) = (CExpr::operand(lhs), CExpr::operand(rhs));
                if self.nested {
                    write!(f, "({lhs} {} {rhs})", op.symbol())
                } else {
                    write!(f, "{lhs} {} {rhs}", op.symbol())
                }
            }
            ExprKind::Call { callee, args } => {
                write!(f, "{}(", FunctionName(&callee.name))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", CExpr::top(arg))?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_c_string(f: &mut fmt::Formatter<'_>, val: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in val.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::{checker, parser, Options, ScopePolicy};

    fn generate(src: &str) -> String {
        generate_with(src, &Options::default())
    }

    fn generate_with(src: &str, options: &Options) -> String {
        let prog = parser::parse_program(src).expect("failed to parse");
        let prog = checker::check(prog, options).expect("failed to check");
        let mut buf = Vec::with_capacity(1024);
        super::generate(&mut buf, &prog).expect("failed to write");
        String::from_utf8(buf).expect("generated C is not UTF-8")
    }

    #[test]
    fn test_simple_main() {
        let c = generate("func main() -> int { int x = 1; print(x); return x; }");
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int main(void);

                int main(void) {
                    int x = 1;
                    printf("%d\n", x);
                    return x;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_prototypes_precede_definitions() {
        let c = generate(
            "
            func main() -> int { print(f()); return 0; }
            func f() -> int { return 1; }
            ",
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int main(void);
                int kl_f(void);

                int main(void) {
                    printf("%d\n", kl_f());
                    return 0;
                    return 0;
                }

                int kl_f(void) {
                    return 1;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_control_flow_and_params() {
        let c = generate(
            "
            func count(int n, string label) -> string {
                while (n > 0) {
                    if (n == 1) { print(label); } else { print(n); }
                    n = n - 1;
                }
                return;
            }
            func main() -> int { print(count(3, \"go\")); return 0; }
            ",
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                char* kl_count(int n, char* label);
                int main(void);

                char* kl_count(int n, char* label) {
                    while (n > 0) {
                        if (n == 1) {
                            printf("%s\n", label);
                        } else {
                            printf("%d\n", n);
                        }
                        n = (n - 1);
                    }
                    return 0;
                    return 0;
                }

                int main(void) {
                    printf("%s\n", kl_count(3, "go"));
                    return 0;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_nested_comparisons_keep_grouping() {
        let c = generate("func main() -> int { print(1 + 2 < 3); print(1 < 2 < 3); return 0; }");
        assert!(c.contains("printf(\"%d\\n\", (1 + (2 < 3)));"), "{c}");
        assert!(c.contains("printf(\"%d\\n\", (1 < 2) < 3);"), "{c}");
    }

    #[test]
    fn test_collected_and_manual_strings() {
        let c = generate(
            r#"
            func main() -> int {
                string s = "a";
                manual string m = "b";
                string t;
                s = m;
                m = s;
                t = "c";
                return 0;
            }
            "#,
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int main(void);

                int main(void) {
                    char* s = gc_strdup("a");
                    char* m = "b";
                    char* t;
                    s = gc_strdup(m);
                    m = s;
                    t = gc_strdup("c");
                    return 0;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_shadowing_initializer_reads_outer_variable() {
        let c = generate(
            "
            func main() -> int {
                int x = 5;
                if (1) { int x = x + 1; print(x); }
                print(x);
                return 0;
            }
            ",
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int main(void);

                int main(void) {
                    int x = 5;
                    if (1) {
                        int x_1 = (x + 1);
                        printf("%d\n", x_1);
                    }
                    printf("%d\n", x);
                    return 0;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_locals_named_like_functions_or_c_words() {
        let c = generate(
            r#"
            func f(int char) -> int { return char; }
            func main() -> int {
                int f = f(2);
                string printf = "p";
                print(printf);
                return f;
            }
            "#,
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int kl_f(int char_1);
                int main(void);

                int kl_f(int char_1) {
                    return char_1;
                    return 0;
                }

                int main(void) {
                    int f = kl_f(2);
                    char* printf_1 = gc_strdup("p");
                    printf("%s\n", printf_1);
                    return f;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_flat_block_locals_are_declared_up_front() {
        let flat = Options {
            scopes: ScopePolicy::Flat,
            ..Options::default()
        };
        let c = generate_with(
            r#"
            func main() -> int {
                int a = 1;
                while (a) { int b = 2; string s = "x"; manual string m; a = 0; }
                if (1) { int c; } else { int d = 4; }
                return b;
            }
            "#,
            &flat,
        );
        assert_eq!(
            c,
            indoc! {r#"
                #include <stdio.h>
                #include "gc.h"

                int main(void);

                int main(void) {
                    int b;
                    char* s;
                    char* m;
                    int c;
                    int d;
                    int a = 1;
                    while (a) {
                        b = 2;
                        s = gc_strdup("x");
                        a = 0;
                    }
                    if (1) {
                    } else {
                        d = 4;
                    }
                    return b;
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn test_string_escapes() {
        let c = generate("func main() -> int { print(\"a\\b\t\"); return 0; }");
        assert!(c.contains(r#"printf("%s\n", "a\\b\t");"#), "{c}");
    }

    #[test]
    fn test_multiline_string_literal() {
        let c = generate("func main() -> int { manual string s = \"one\ntwo\"; return 0; }");
        assert!(c.contains(r#"char* s = "one\ntwo";"#), "{c}");
    }

    #[test]
    fn test_output_is_deterministic() {
        let src = "
            func b(int x) -> int { return x + 1; }
            func a() -> string { return \"a\"; }
            func main() -> int { print(b(1)); print(a()); return 0; }
        ";
        assert_eq!(generate(src), generate(src));
    }
}
