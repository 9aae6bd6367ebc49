use std::fmt::Write;

/// Builds a well-typed program with `functions` helpers and a `main` calling
/// each of them.
pub fn synthetic_program(functions: usize) -> String {
    let mut src = String::with_capacity(functions * 256);
    for i in 0..functions {
        _ = write!(
            src,
            r#"
// helper {i}
func f{i}(int n, string label) -> int {{
    int acc = 0;
    while (n > 0) {{
        if (n == {i}) {{ print(label); }} else {{ acc = acc + n - 1; }}
        n = n - 1;
    }}
    return acc;
}}
"#
        );
    }
    src.push_str("func main() -> int {\n");
    for i in 0..functions {
        _ = writeln!(src, "    print(f{i}({i}, \"f{i}\"));");
    }
    src.push_str("    return 0;\n}\n");
    src
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_synthetic_program_compiles() {
        let src = super::synthetic_program(8);
        let mut out = Vec::new();
        kilo::compile(&src, &mut out, &kilo::Options::default()).unwrap();
        assert!(!out.is_empty());
    }
}
