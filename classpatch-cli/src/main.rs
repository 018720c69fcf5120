use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod doc;

#[derive(Parser)]
#[command(name = "classpatch", about = "Class unit inspector for the classpatch engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a per-method instruction listing for a class document
    Dump {
        /// Path to the class YAML document
        input: PathBuf,
    },
    /// Check every structural invariant of a class document
    Verify {
        /// Path to the class YAML document
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump { input } => cmd_dump(&input),
        Commands::Verify { input } => cmd_verify(&input),
    }
}

fn load_doc(path: &PathBuf) -> doc::ClassDoc {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            std::process::exit(1);
        }
    };
    match serde_yaml::from_str::<doc::ClassDoc>(&text) {
        Ok(d) => {
            log::debug!("loaded class document {} from {}", d.name, path.display());
            d
        }
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn cmd_dump(path: &PathBuf) {
    let doc = load_doc(path);
    let class = match doc.to_class() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("# Class: {}", class.name());
    println!("# Super: {}", class.super_name);
    if !class.fields().is_empty() {
        println!("# Fields:");
        for field in class.fields() {
            println!("#   {}:{}", field.name, field.descriptor);
        }
    }
    println!();

    for method in class.methods() {
        println!(
            "{} (max_stack={}, max_locals={})",
            method.sig(),
            method.max_stack,
            method.max_locals
        );
        for (i, insn) in method.insns().iter().enumerate() {
            println!("  {i:4}: {insn}");
        }
        for local in &method.locals {
            println!(
                "  local {} {}:{} [{}..{}]",
                local.slot, local.name, local.descriptor, local.start, local.end
            );
        }
        for range in &method.exception_ranges {
            let ty = range.catch_type.as_deref().unwrap_or("<any>");
            println!(
                "  try {}..{} handler {} catch {ty}",
                range.start, range.end, range.handler
            );
        }
        println!();
    }
}

fn cmd_verify(path: &PathBuf) {
    let doc = load_doc(path);
    // Conversion routes every method through the engine's structural
    // checks, so a violation surfaces here with its class/method context.
    match doc.to_class() {
        Ok(class) => {
            println!(
                "{}: {} method(s) verified",
                class.name(),
                class.methods().len()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
