//! Mython interpreter command-line.
//!
//! Interprets the files named on the command line, each as a complete
//! program.  When called without arguments it reads a whole program from
//! standard input instead.

use std::env;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::io::BufReader;

use anyhow::{self, Context};

use mython::interpreter::Interpreter;

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        run(io::stdin().lock())?;
    } else {
        for path in &args {
            let reader =
                BufReader::new(File::open(path).with_context(|| format!("failed to open {}", path))?);
            run(reader)?;
        }
    }
    Ok(())
}

fn run<R: BufRead>(input: R) -> Result<(), anyhow::Error> {
    let mut stdout = io::stdout();
    let mut interp = Interpreter::new(&mut stdout);
    interp.eval(input)?;
    Ok(())
}
