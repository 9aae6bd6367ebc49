use crate::{
    checker::{self, ScopePolicy},
    parser,
    util::fmt::tree,
    Options,
};

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CheckerProgram(&'static str),
    CheckerFlatProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedError(&'static str),
}

/// Runs the front end up to the stage the test asks for, returning either the
/// printed tree or the first formatted error.
#[track_caller]
pub fn run_pipeline(test: Test) -> Result<String, String> {
    match test {
        Test::ParserProgram(input) => parser::parse_program(input)
            .map(|prog| tree::print_program_string(&prog))
            .map_err(|e| e.to_string()),
        Test::ParserExpr(input) => parser::parse_expr(input)
            .map(|expr| tree::print_expr_string(&expr))
            .map_err(|e| e.to_string()),
        Test::CheckerProgram(input) => check(input, &Options::default()),
        Test::CheckerFlatProgram(input) => {
            let options = Options {
                scopes: ScopePolicy::Flat,
                ..Options::default()
            };
            check(input, &options)
        }
    }
}

fn check(input: &str, options: &Options) -> Result<String, String> {
    let prog = parser::parse_program(input).map_err(|e| e.to_string())?;
    let prog = checker::check(prog, options).map_err(|e| e.to_string())?;
    Ok(tree::print_program_string(&prog))
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual: &Result<String, String>) {
    match (assertion, actual) {
        (Assertion::TreeOk(expected_tree), Ok(actual_tree)) => {
            ::pretty_assertions::assert_eq!(actual_tree.trim(), expected_tree.trim());
        }
        (Assertion::TreeOk(_), Err(error)) => {
            panic!("expected a tree, got error: {error}");
        }
        (Assertion::ExpectedError(expected_error), Err(error)) => {
            ::pretty_assertions::assert_eq!(error.as_str(), expected_error);
        }
        (Assertion::ExpectedError(expected_error), Ok(tree)) => {
            panic!("expected error `{expected_error}`, got tree:\n{tree}");
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let actual = crate::util::test_utils::run_pipeline(test);
                tree_tests!(@@expand_assertions, &actual, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $actual:expr, []) => {};
    (@@expand_assertions, $actual:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $actual,
        );
        tree_tests!(@@expand_assertions, $actual, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_error, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedError($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerProgram($source)
    };
    (@@get_test(checker_flat, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerFlatProgram($source)
    };
}
pub(crate) use tree_tests;
