//! chapterize - web pages into ebook chapters

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use chapterize::GistExpander;

#[derive(Parser)]
#[command(name = "chapterize")]
#[command(version, about = "Convert a web page or HTML file into an ebook chapter", long_about = None)]
#[command(after_help = "EXAMPLES:
    chapterize https://example.com/post chapter.xhtml
    chapterize saved.html chapter.xhtml --url https://example.com/post
    chapterize article.html out/chapter.xhtml --title 'My Chapter'")]
struct Cli {
    /// Input: an http(s) URL or a local HTML file
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output chapter file (must end in .xhtml)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Chapter title (inferred from the page when omitted)
    #[arg(short, long)]
    title: Option<String>,

    /// Base URL for resolving relative references in file input
    #[arg(short, long)]
    url: Option<String>,

    /// Leave image references untouched
    #[arg(long)]
    no_images: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> chapterize::Result<()> {
    let expander = GistExpander::new();

    let mut chapter = if is_url(&cli.input) {
        expander.from_url(&cli.input, cli.title.as_deref())?
    } else {
        expander.from_file(&cli.input, cli.url.as_deref(), cli.title.as_deref())?
    };

    if !cli.no_images {
        let ebook_dir = match cli.output.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // The library treats a missing images directory as a configuration
        // error; creating it is this caller's job.
        fs::create_dir_all(ebook_dir.join("images"))?;
        chapter.localize_images(&ebook_dir)?;
    }

    chapter.write(&cli.output)?;

    if !cli.quiet {
        println!("{} -> {}", chapter.title(), cli.output.display());
    }
    Ok(())
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}
