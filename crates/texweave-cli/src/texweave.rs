use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use colored::Colorize;
use texweave::doc::BibRecord;
use texweave_render::{HtmlRenderer, HtmlVersion, XmlRenderer};

/// Convert TeX source into XHTML or TEI-flavoured XML.
#[derive(Parser)]
#[command(name = "texweave", version, about)]
struct Cli {
    /// The TeX input file.
    input: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Target::Html)]
    target: Target,

    /// A BibTeX database to resolve citations against.
    #[arg(short, long)]
    bibfile: Option<PathBuf>,

    /// Output file (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print progress notes to stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Html,
    Xml,
}

fn main() {
    let args: Cli = Cli::parse();
    if let Err(message) = run(&args) {
        eprintln!["{} {message}", "error:".red().bold()];
        std::process::exit(1);
    }
}

fn run(args: &Cli) -> Result<(), String> {
    let bib = match &args.bibfile {
        None => HashMap::new(),
        Some(path) => read_bib(args, path)?,
    };

    let source = fs::read_to_string(&args.input)
        .map_err(|err| format!["could not read {}: {err}", args.input.display()])?;
    note(args, "reading document");
    let document = texweave::convert(&args.input.to_string_lossy(), &source, bib)
        .map_err(|err| err.to_string())?;
    for warning in &document.meta.warnings {
        warn(warning);
    }

    note(args, "rendering");
    let (text, warnings) = match args.target {
        Target::Html => {
            let mut renderer = HtmlRenderer::new(HtmlVersion::Xhtml5);
            let text = renderer.render(&document);
            (text, renderer.take_warnings())
        }
        Target::Xml => {
            let mut renderer = XmlRenderer::new();
            let text = renderer.render(&document);
            (text, renderer.take_warnings())
        }
    };
    for warning in &warnings {
        warn(warning);
    }

    match &args.output {
        None => {
            std::io::stdout()
                .write_all(text.as_bytes())
                .map_err(|err| format!["could not write to stdout: {err}"])?;
        }
        Some(path) => {
            fs::write(path, text)
                .map_err(|err| format!["could not write {}: {err}", path.display()])?;
        }
    }
    Ok(())
}

fn read_bib(args: &Cli, path: &PathBuf) -> Result<HashMap<String, BibRecord>, String> {
    note(args, "reading bibliography");
    let source = fs::read_to_string(path)
        .map_err(|err| format!["could not read {}: {err}", path.display()])?;
    let database = texweave_bib::read_database(&source)
        .map_err(|err| format!["{}: {err}", path.display()])?;
    for warning in &database.warnings {
        warn(warning);
    }
    Ok(texweave_bib::records(&database))
}

fn note(args: &Cli, message: &str) {
    if args.verbose {
        eprintln!["{} {message}", "texweave:".dimmed()];
    }
}

fn warn(message: &str) {
    eprintln!["{} {message}", "warning:".yellow().bold()];
}
