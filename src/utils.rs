/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: regex::Regex =
        regex::Regex::new($pattern).expect(concat!("invalid static regex ", stringify!($name)));
    }
  };
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn normalize_whitespace(s: &str) -> String {
  regex_static!(WHITESPACE, r"\s+");
  WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Takes a list where each element is a set of choices, and returns all the possible sets
/// generated. Will clone the elements. The first position varies fastest.
///
/// ```
/// let v = vec![
///   vec![1],
///   vec![2, 3],
///   vec![4],
///   vec![5, 6, 7],
/// ];
///
/// assert_eq!(babble::utils::combinations(&v), vec![
///   vec![1, 2, 4, 5],
///   vec![1, 3, 4, 5],
///   vec![1, 2, 4, 6],
///   vec![1, 3, 4, 6],
///   vec![1, 2, 4, 7],
///   vec![1, 3, 4, 7],
/// ]);
/// ```
pub fn combinations<T>(list: &[Vec<T>]) -> Vec<Vec<T>>
where
  T: Clone,
{
  if list.is_empty() {
    Vec::new()
  } else if list.len() == 1 {
    list[0].iter().map(|e| vec![e.clone()]).collect()
  } else {
    let (head, tail) = list.split_at(1);
    let head = &head[0];

    combinations(tail)
      .into_iter()
      .flat_map(|subseq| {
        // prepend every element of the head to every possible subseq
        head.iter().map(move |v| {
          let mut newseq = subseq.clone();
          newseq.insert(0, v.clone());
          newseq
        })
      })
      .collect()
  }
}

#[test]
fn test_normalize_whitespace() {
  assert_eq!(normalize_whitespace("  the word\t'wife'\n is  here "), "the word 'wife' is here");
  assert_eq!(normalize_whitespace(""), "");
}

#[test]
fn test_combinations_with_an_empty_choice() {
  let v: Vec<Vec<u8>> = vec![vec![1, 2], vec![]];
  assert!(combinations(&v).is_empty());
}
