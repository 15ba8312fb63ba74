//! axenc compiler driver.
//!
//! Usage:
//!   axenc -f <source file>              # print LLVM IR to stdout
//!   axenc -f <source file> -o out.o     # write a native object file
//!
//! Pipeline:  source → Lexer → Parser → typed AST → LLVM IR → stdout / .o

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;

use axenc::compiler::Compiler;
use axenc::errors::{self, ErrorKind};
use axenc::parser::SourceLoader;

#[derive(Parser, Debug)]
#[command(name = "axenc", version, about = "Ahead-of-time compiler for the axen language")]
struct Cli {
    /// Source file to compile
    #[arg(short = 'f', value_name = "source file")]
    file: PathBuf,

    /// Write a native object file here instead of printing IR to stdout
    #[arg(short = 'o', value_name = "output file")]
    output: Option<PathBuf>,
}

/// Serves `import`ed sources from the local filesystem.
struct FsLoader;

impl SourceLoader for FsLoader {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn load(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

fn main() {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.file).unwrap_or_else(|err| {
        errors::fatal(
            ErrorKind::Syntax,
            format!("Could not open file: '{}': {err}", cli.file.display()),
        );
    });

    let program =
        axenc::parser::Parser::new(&source, cli.file.clone(), Box::new(FsLoader)).parse();

    let context = inkwell::context::Context::create();
    let compiler = Compiler::new(&context, &cli.file.display().to_string());
    compiler.compile(&program);
    compiler.verify();

    match cli.output {
        Some(path) => {
            compiler.write_object_file(&path);
            errors::info(format!("wrote object → {}", path.display()));
        }
        None => print!("{}", compiler.ir_string()),
    }
}
