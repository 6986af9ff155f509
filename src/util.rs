//! Small utility helpers used across modules.

/// Char-boundary-safe prefix of a string, at most `max` characters.
/// Used for the quiz `source_excerpt` column so we never store the whole document.
pub fn char_prefix(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model responses or request payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} bytes total)", char_prefix(s, max), s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn char_prefix_respects_multibyte_boundaries() {
    let s = "ábç déf";
    assert_eq!(char_prefix(s, 3), "ábç");
    assert_eq!(char_prefix(s, 100), s);
  }

  #[test]
  fn trunc_marks_long_strings() {
    let s = "x".repeat(50);
    assert!(trunc_for_log(&s, 10).contains("50 bytes total"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
