use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use clap::{ArgAction, Parser, ValueEnum};
use kilo::{lexer, util::fmt::tree, Options, ScopePolicy};
use tracing::{debug, level_filters::LevelFilter};

#[derive(Parser, Debug)]
#[command(name = "kiloc", version)]
#[command(about = "Compiles a kilo source file to C")]
struct Cli {
    /// Source file.
    input: PathBuf,

    /// Where to write the result; `-` writes to stdout.
    #[arg(short, long, default_value = "out.c")]
    output: PathBuf,

    /// What to write.
    #[arg(long, value_enum, default_value_t = Emit::C)]
    emit: Emit,

    /// Let variables declared in nested blocks stay visible until the end of
    /// the function.
    #[arg(long)]
    flat_scopes: bool,

    /// Don't check argument counts and types at call sites.
    #[arg(long)]
    no_arity_check: bool,

    /// Log more; repeat for even more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// C source, to be linked with the collector runtime.
    C,
    /// One token per line.
    Tokens,
    /// The checked syntax tree.
    Ast,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            scopes: if self.flat_scopes {
                ScopePolicy::Flat
            } else {
                ScopePolicy::Lexical
            },
            check_call_arity: !self.no_arity_check,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let src = fs::read_to_string(&cli.input)
        .unwrap_or_else(|e| die(format_args!("can't read {}: {e}", cli.input.display())));

    // Render everything first, so a failure never leaves a partial file.
    let mut out = Vec::with_capacity(src.len() * 2);
    if let Err(e) = render(&cli, &src, &mut out) {
        die(format_args!("{}: {e}", cli.input.display()));
    }

    if let Err(e) = write_output(&cli.output, &out) {
        die(format_args!("can't write {}: {e}", cli.output.display()));
    }
    debug!(bytes = out.len(), output = %cli.output.display(), "done");
}

fn render(cli: &Cli, src: &str, out: &mut Vec<u8>) -> Result<(), kilo::Error> {
    match cli.emit {
        Emit::C => kilo::compile(src, out, &cli.options()),
        Emit::Tokens => {
            for token in lexer::lex(src)? {
                writeln!(out, "{}\t{:?}\t{}", token.line(), token.kind, token.text)?;
            }
            Ok(())
        }
        Emit::Ast => {
            let program = kilo::front_end(src, &cli.options())?;
            tree::print_program(out, &program)?;
            Ok(())
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()
    } else {
        fs::write(path, bytes)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Reports an unrecoverable error and exits.
fn die(args: fmt::Arguments<'_>) -> ! {
    eprintln!("kiloc: {args}");
    process::exit(1);
}
