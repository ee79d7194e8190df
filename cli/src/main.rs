use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use treebeam::{
  Err, HeadRules, TableHeadRules, Tree, TreebankConfig, build_dictionary, read_treebank,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} COMMAND TREEBANK [options]

TREEBANK holds one bracketed tree per line.

Commands:
  dict    Mine an n-gram dictionary from the trees and print it
  show    Print the trees back out

Options:
  -h, --help            Print this message
  -f, --function-tags   Keep function tags on labels (defaults to stripping them)
  -c, --cutoff N        Drop n-grams seen fewer than N times (dict, defaults to 5)
  -r, --rules FILE      Head rule table (dict, defaults to the built-in English table)
  -p, --prune           Remove vacuous unary nodes first (show)

Set RUST_LOG=debug for progress on stderr.",
    prog_name
  )
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Command {
  Dict,
  Show,
}

struct Args {
  command: Command,
  filename: String,
  function_tags: bool,
  cutoff: usize,
  rules: Option<String>,
  prune: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "treebeam"));
    };

    let mut command: Option<Command> = None;
    let mut filename: Option<String> = None;
    let mut function_tags = false;
    let mut cutoff = 5;
    let mut rules: Option<String> = None;
    let mut prune = false;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-f" || o == "--function-tags" {
        function_tags = true;
      } else if o == "-p" || o == "--prune" {
        prune = true;
      } else if o == "-c" || o == "--cutoff" {
        cutoff = match iter.next().map(|n| n.parse::<usize>()) {
          Some(Ok(n)) => n,
          _ => return Err(Self::make_error_message("--cutoff needs a count", prog_name)),
        };
      } else if o == "-r" || o == "--rules" {
        match iter.next() {
          Some(path) => rules = Some(path),
          None => return Err(Self::make_error_message("--rules needs a file", prog_name)),
        }
      } else if command.is_none() {
        command = match o.as_str() {
          "dict" => Some(Command::Dict),
          "show" => Some(Command::Show),
          _ => return Err(Self::make_error_message("unknown command", prog_name)),
        };
      } else if filename.is_none() {
        filename = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    match (command, filename) {
      (Some(command), Some(filename)) => Ok(Self {
        command,
        filename,
        function_tags,
        cutoff,
        rules,
        prune,
      }),
      (None, _) => Err(Self::make_error_message("missing command", prog_name)),
      (_, None) => Err(Self::make_error_message("missing treebank", prog_name)),
    }
  }
}

fn load_rules(path: Option<&str>) -> Result<TableHeadRules, Err> {
  let english = TableHeadRules::english();
  match path {
    Some(path) => {
      let rules = fs::read_to_string(path)?.parse::<TableHeadRules>()?;
      Ok(rules.with_punctuation(english.punctuation_tags().iter().cloned()))
    }
    None => Ok(english),
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let config = TreebankConfig {
    function_tags: opts.function_tags,
  };
  let text = fs::read_to_string(&opts.filename)?;
  let trees = read_treebank(&text, &config);
  info!(trees = trees.len(), file = %opts.filename, "read treebank");

  let mut out = io::BufWriter::new(io::stdout().lock());
  match opts.command {
    Command::Dict => {
      let rules = load_rules(opts.rules.as_deref())?;
      let dict = build_dictionary(trees, &rules, opts.cutoff);
      info!(entries = dict.len(), cutoff = opts.cutoff, "built dictionary");
      dict.write_to(&mut out)?;
    }
    Command::Show => {
      for Tree { mut arena, root } in trees {
        if opts.prune {
          arena.prune_vacuous(root);
        }
        writeln!(out, "{}", arena.display(root))?;
      }
    }
  }
  out.flush()?;
  Ok(())
}
