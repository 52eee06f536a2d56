//! Answer normalization.
//!
//! Chat replies are free-form. Everything here is pure and synchronous so the
//! exact same rules apply when a reply is recorded and when it is judged.

use crate::question::{OPTION_LETTERS, QuestionKind};

/// Trim, case-fold and collapse internal whitespace runs to a single space.
pub fn normalize_text(raw: &str) -> String {
  raw
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Extract a leading option letter from already-normalized text.
///
/// Accepts `b`, `b)`, `b.`, `(b)`, `b - bungie` and similar, but not words
/// that merely start with a letter (`bungie`).
pub fn extract_option_letter(normalized: &str) -> Option<char> {
  let rest = normalized.trim_start_matches(['(', '[']);
  let mut chars = rest.chars();
  let first = chars.next()?;
  if let Some(next) = chars.next()
    && next.is_alphanumeric()
  {
    return None;
  }
  OPTION_LETTERS
    .iter()
    .copied()
    .find(|letter| letter.to_ascii_lowercase() == first)
}

/// Resolve free text to an option index: an exact (normalized) option text
/// wins over a leading letter, so `a link to the past` picks that option
/// rather than option A.
pub fn resolve_option(raw: &str, options: &[String; 4]) -> Option<usize> {
  let normalized = normalize_text(raw);
  if let Some(index) = options
    .iter()
    .position(|option| normalize_text(option) == normalized)
  {
    return Some(index);
  }
  let letter = extract_option_letter(&normalized)?;
  OPTION_LETTERS.iter().position(|l| *l == letter)
}

/// Normalize a reply for storage. Multiple-choice replies collapse to their
/// option letter (`"B"`) when one can be identified.
pub fn normalize_reply(raw: &str, kind: &QuestionKind) -> String {
  match kind {
    QuestionKind::Single => normalize_text(raw),
    QuestionKind::MultipleChoice { options } => match resolve_option(raw, options) {
      Some(index) => OPTION_LETTERS[index].to_string(),
      None => normalize_text(raw),
    },
  }
}

/// Levenshtein distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  if a.is_empty() {
    return b.len();
  }

  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut curr = vec![0; b.len() + 1];

  for (i, ca) in a.iter().enumerate() {
    curr[0] = i + 1;
    for (j, cb) in b.iter().enumerate() {
      let substitution = prev[j] + usize::from(ca != cb);
      curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
    }
    std::mem::swap(&mut prev, &mut curr);
  }

  prev[b.len()]
}

/// Near miss: not equal, but within `max_distance` edits. Answers no longer
/// than `max_distance` never count as close.
pub fn is_close(candidate: &str, truth: &str, max_distance: usize) -> bool {
  candidate != truth
    && truth.chars().count() > max_distance
    && edit_distance(candidate, truth) <= max_distance
}
