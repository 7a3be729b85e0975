use criterion::{Criterion, black_box, criterion_group, criterion_main};

use babble::{Explanation, ParserConfig, SemanticParser};

fn parse(parser: &SemanticParser, explanations: &[Explanation]) -> usize {
  parser.parse(explanations).map(|o| o.parses.len()).unwrap_or(0)
}

fn criterion_benchmark(c: &mut Criterion) {
  let config = ParserConfig::default().with_alias("spouse", ["wife", "husband"]);
  let parser = SemanticParser::new(&config).unwrap();

  let simple = [Explanation::new("1 is less than 2", 1)];
  let positional = [Explanation::new(
    "the words 'his' and 'wife' are no more than three words to the left of Y",
    1,
  )];
  let batch: Vec<Explanation> = [
    "'wife' is between X and Y",
    "there are no people between X and Y",
    "at least one word to the left of Y starts with a spouse word",
    "X is more than three words to the left of Y",
    "True or False and True or False",
    "2 is less than 3 and 4",
  ]
  .iter()
  .map(|condition| Explanation::new(condition, 1))
  .collect();

  c.bench_function("parse simple", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&simple)))
  });

  c.bench_function("parse positional", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&positional)))
  });

  c.bench_function("parse batch", |b| {
    b.iter(|| parse(black_box(&parser), black_box(&batch)))
  });

  c.bench_function("parse batch on 4 threads", |b| {
    b.iter(|| {
      black_box(&parser)
        .parse_parallel(black_box(&batch), 4)
        .map(|o| o.parses.len())
        .unwrap_or(0)
    })
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
