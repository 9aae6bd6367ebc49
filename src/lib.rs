use std::io;

use tracing::info;

use crate::{
    ast::{Program, Typed},
    token::Spanned,
};

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser pulls tokens from the lexer on demand, mapping them into an AST.
pub mod parser;

/// The checker takes an untyped AST, resolves its names, checks its types, and
/// maps it into a typed AST.
pub mod checker;

/// The code generator renders a typed AST as C.
pub mod codegen;

pub mod ast;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use checker::ScopePolicy;

/// Knobs for a single compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub scopes: ScopePolicy,
    /// Check argument count and types at every call site.
    pub check_call_arity: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            scopes: ScopePolicy::default(),
            check_call_arity: true,
        }
    }
}

/// Runs the lexer, parser and checker over `src`.
pub fn front_end(src: &str, options: &Options) -> Result<Program<Typed>, Error> {
    let program = parser::parse_program(src)?;
    let program = checker::check(program, options)?;
    Ok(program)
}

/// Compiles `src` into C, written to `sink`.
///
/// Nothing is written unless the whole front end succeeds.
pub fn compile<W>(src: &str, sink: W, options: &Options) -> Result<(), Error>
where
    W: io::Write,
{
    let program = front_end(src, options)?;
    codegen::generate(sink, &program)?;
    info!(functions = program.functions.len(), "compiled");
    Ok(())
}

/// The first problem found in a compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Lex(#[from] Spanned<lexer::Error>),
    #[error("{0}")]
    Parse(Spanned<parser::Error>),
    #[error("{0}")]
    Check(#[from] Spanned<checker::Error>),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl From<Spanned<parser::Error>> for Error {
    fn from(error: Spanned<parser::Error>) -> Self {
        match error.inner {
            parser::Error::Lexer(inner) => Error::Lex(error.span.wrap(inner)),
            _ => Error::Parse(error),
        }
    }
}

impl Error {
    /// The line the error was detected at, if it came from the source.
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::Lex(e) => Some(e.span.line),
            Error::Parse(e) => Some(e.span.line),
            Error::Check(e) => Some(e.span.line),
            Error::Io(_) => None,
        }
    }
}
