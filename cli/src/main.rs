use std::env;
use std::fs;
use std::io;
use std::io::{BufRead, Write};
use std::process;

use babble::annotator::StringFormat;
use babble::{Explanation, ParserConfig, SemanticParser};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Err = Box<dyn std::error::Error + 'static>;

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} [options]

Reads explanations, one per line, as `[LABEL:] CONDITION` (label defaults to 1)
and prints every way the grammar reads them.

Options:
  -h, --help                Print this message
  -c, --chart               Print the parse chart of unparseable explanations
  -i, --implicit            Treat bare out-of-grammar words as strings
  -b, --beam N              Keep N readings per chart cell and category (default 10)
  -a, --alias NAME=A,B,...  Define a word list usable by name
  -e, --entities X,Y        Names for the first and second argument
  -g, --grammar FILE        Use the rule table in FILE instead of the built-in grammar",
    prog_name
  )
}

/// Splits an optional `LABEL:` prefix off a line. The label defaults to 1.
fn split_label(line: &str) -> (i64, &str) {
  line
    .split_once(':')
    .and_then(|(label, condition)| Some((label.trim().parse().ok()?, condition)))
    .unwrap_or((1, line))
}

fn parse(parser: &SemanticParser, line: &str, print_chart: bool) -> Result<(), Err> {
  let (label, condition) = split_label(line);
  let explanation = Explanation::new(condition, label);
  let outcome = parser.parse(std::slice::from_ref(&explanation))?;

  if outcome.parses.is_empty() {
    println!("Unparseable: {}", explanation);
    if print_chart {
      println!("chart:\n{}", parser.chart(&explanation));
    }
    return Ok(());
  }

  println!(
    "Parsed {} reading{}",
    outcome.parses.len(),
    if outcome.parses.len() == 1 { "" } else { "s" }
  );
  for parse in outcome.parses {
    println!("  {}", parser.translate(&parse.semantics));
    println!("  {}", parse.semantics);
    println!();
  }
  Ok(())
}

/// Reads explanations from `input` until it ends. A line that fails to
/// compile is reported and skipped. Returns how many lines failed.
fn repl(parser: &SemanticParser, mut input: impl BufRead, print_chart: bool) -> Result<usize, Err> {
  let mut failed = 0;
  let mut line = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    line.clear();
    if input.read_line(&mut line)? == 0 {
      // ctrl+d
      return Ok(failed);
    }
    if line.trim().is_empty() {
      continue;
    }
    if let Err(err) = parse(parser, line.trim(), print_chart) {
      eprintln!("error: {}", err);
      failed += 1;
    }
  }
}

struct Args {
  config: ParserConfig,
  grammar_file: Option<String>,
  print_chart: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "babble"));
    };

    let mut config = ParserConfig::default();
    let mut grammar_file: Option<String> = None;
    let mut print_chart = false;

    while let Some(o) = iter.next() {
      let mut value = |what: &str| {
        iter
          .next()
          .ok_or_else(|| Self::make_error_message(&format!("{} needs {}", o, what), &prog_name))
      };

      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-i" || o == "--implicit" {
        config = config.with_string_format(StringFormat::Implicit);
      } else if o == "-b" || o == "--beam" {
        let beam = value("a number")?
          .parse::<usize>()
          .map_err(|_| Self::make_error_message("beam width must be a number", &prog_name))?;
        config = config.with_beam_width(beam);
      } else if o == "-a" || o == "--alias" {
        let alias = value("NAME=A,B,...")?;
        let Some((name, members)) = alias.split_once('=') else {
          return Err(Self::make_error_message("aliases look like NAME=A,B,...", &prog_name));
        };
        config = config.with_alias(name.trim(), members.split(',').map(str::trim));
      } else if o == "-e" || o == "--entities" {
        let names = value("X,Y")?;
        config = config.with_entity_names(names.split(',').map(str::trim));
      } else if o == "-g" || o == "--grammar" {
        grammar_file = Some(value("a file")?);
      } else {
        return Err(Self::make_error_message("invalid arguments", &prog_name));
      }
    }

    Ok(Self {
      config,
      grammar_file,
      print_chart,
    })
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

  let parser = match &opts.grammar_file {
    Some(filename) => SemanticParser::from_rules(&fs::read_to_string(filename)?, &opts.config)?,
    None => SemanticParser::new(&opts.config)?,
  };
  info!(
    "loaded {} rules, beam width {}",
    parser.grammar().rules().len(),
    parser.beam_width()
  );

  let failed = repl(&parser, io::stdin().lock(), opts.print_chart)?;
  if failed > 0 {
    info!("{} explanations failed to compile", failed);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_label_prefix() {
    assert_eq!(split_label("2: X is 'foo'"), (2, " X is 'foo'"));
    assert_eq!(split_label("-1:True"), (-1, "True"));
    assert_eq!(split_label("X is 'a:b'"), (1, "X is 'a:b'"));
    assert_eq!(split_label("True"), (1, "True"));
  }

  #[test]
  fn test_compile_errors_dont_end_the_session() {
    let parser = SemanticParser::from_rules(
      r#"
        $ROOT -> $Start $LF $Stop => (.root $1);
        $LF -> $Label $Int $Because $Bool => (.label $1 $3);
        $Start -> <start>;
        $Stop -> <stop>;
        $Label -> label;
        $Because -> because;
        $Bool -> true => (.bool true);
        $Bool -> $Int $In $Colors => (.call (.in $2) $0);
        $In -> in;
        $Colors -> colors => (.user_list (.string "colors"));
      "#,
      &ParserConfig::default(),
    )
    .unwrap();
    let input = io::Cursor::new("1 in colors\n\n2: True\n2 in colors\n");
    assert_eq!(repl(&parser, input, false).unwrap(), 2);
  }
}
