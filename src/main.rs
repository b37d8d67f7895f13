use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::debug;

use trre::{Cached, Matcher, Transducer, scan};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transductive regular expression
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// File to read (stdin if absent)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Transduce whole lines; print outputs of matching lines
    #[arg(short = 'm', long = "match")]
    whole: bool,

    /// With --match, print every output (backtracking)
    #[arg(short, long, requires = "whole")]
    all: bool,

    /// Executor to run the pattern with
    #[arg(short, long, value_enum, default_value_t = Engine::Dft)]
    engine: Engine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    Backtrack,
    Dft,
}

fn main() {
    env_logger::init();
    if let Err(err) = run(Args::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let transducer = Transducer::new(&args.pattern)
        .with_context(|| format!("invalid pattern {:?}", args.pattern))?;
    debug!(
        "compiled {:?} to {} states",
        args.pattern,
        transducer.graph().len()
    );

    let input: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut matcher: Box<dyn Matcher + '_> = match args.engine {
        Engine::Backtrack => Box::new(transducer.backtracker()),
        Engine::Dft => Box::new(Cached::new(transducer.graph())),
    };
    let mut generator = transducer.backtracker();

    let mut out = BufWriter::new(io::stdout().lock());
    for line in input.split(b'\n') {
        let line = line.context("failed to read input")?;
        if !args.whole {
            out.write_all(&scan(matcher.as_mut(), &line))?;
            out.write_all(b"\n")?;
        } else if args.all {
            for output in generator.outputs(&line) {
                out.write_all(&output)?;
                out.write_all(b"\n")?;
            }
        } else if let Some(output) = matcher.transduce(&line) {
            out.write_all(&output)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush().context("failed to write output")?;
    Ok(())
}
