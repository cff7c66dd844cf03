use clap::Parser as ClapParser;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use scc::error::{format_error, format_simple_error};
use scc::{checker, CodeGenerator, CompileError, Lexer, Parser};

#[derive(ClapParser, Debug)]
#[command(name = "scc")]
#[command(about = "A Simple C compiler targeting x86-64 System V assembly", long_about = None)]
struct Args {
    #[arg(help = "Input Simple C source file (reads standard input when omitted)")]
    input: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Output assembly file (writes standard output when omitted)"
    )]
    output: Option<PathBuf>,

    #[arg(long, help = "Print tokens (lexer output)")]
    lex_only: bool,

    #[arg(long, help = "Print AST (parser output)")]
    parse_only: bool,
}

fn main() {
    let args = Args::parse();

    let (filename, source) = match &args.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (path.display().to_string(), content),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => {
            let mut content = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut content) {
                eprintln!("Error reading standard input: {}", e);
                process::exit(1);
            }
            ("<stdin>".to_string(), content)
        }
    };

    let mut lexer = Lexer::new(&source);
    let tokens = match lexer.tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            report(&filename, &source, &e);
            process::exit(1);
        }
    };

    if args.lex_only {
        for token in &tokens {
            println!("{}", token.token);
        }
        return;
    }

    let parser = Parser::new(tokens);
    let mut ast = match parser.parse() {
        Ok(ast) => ast,
        Err(e) => {
            report(&filename, &source, &e);
            process::exit(1);
        }
    };

    if args.parse_only {
        print!("{}", ast.dump());
        return;
    }

    if let Err(errors) = checker::check(&mut ast) {
        for error in &errors {
            eprintln!("{}", format_simple_error(&error.to_string()));
        }
        process::exit(1);
    }

    let mut codegen = CodeGenerator::new();
    let assembly = codegen.generate(&mut ast);

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &assembly) {
                eprintln!("Error writing output file '{}': {}", path.display(), e);
                process::exit(1);
            }
            println!("Compiled {} to {}", filename, path.display());
        }
        None => print!("{}", assembly),
    }
}

fn report(filename: &str, source: &str, error: &CompileError) {
    match error.location {
        Some(location) => {
            eprint!("{}", format_error(filename, source, location, &error.message));
        }
        None => eprintln!("{}", format_simple_error(&error.message)),
    }
}
