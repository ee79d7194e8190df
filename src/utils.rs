use regex::Regex;
use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: regex::Regex = regex::Regex::new($pattern).unwrap();
    }
  };
}

pub(crate) type Infallible<'a, T> = (T, &'a str);
pub(crate) type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// Try to consume a regex at the start of `s`, returning None if it doesn't match there
pub(crate) fn optional_re<'a>(re: &Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => (Some(m.as_str()), &s[m.end()..]),
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
pub(crate) fn needed_re<'a>(re: &Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, s).into())
  }
}

/// Skips whitespace and `//` line comments
pub(crate) fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(\s|//[^\n]*)*");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

/// Natural log of a probability, the unit every node and hypothesis score is kept in.
/// Zero maps to `-inf` rather than NaN so it still sorts below everything else.
pub fn log_prob(p: f64) -> f64 {
  if p <= 0.0 { f64::NEG_INFINITY } else { p.ln() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_prob() {
    assert_eq!(log_prob(1.0), 0.0);
    assert_eq!(log_prob(0.0), f64::NEG_INFINITY);
    assert!((log_prob(0.5) - 0.5f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn test_skip_whitespace() {
    assert_eq!(skip_whitespace("  // comment\n  VP left"), "VP left");
    assert_eq!(skip_whitespace("VP"), "VP");
  }

  #[test]
  fn test_needed_re() {
    regex_static!(WORD, r"[a-z]+");
    assert_eq!(needed_re(&WORD, "abc def").unwrap(), ("abc", " def"));
    assert!(needed_re(&WORD, " abc").is_err());
  }
}
