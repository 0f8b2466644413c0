//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a
/// single scan; inserted values are never rescanned. Unknown `{...}` stays literal.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let value = after
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
    match value {
      Some((close, v)) => {
        out.push_str(v);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Lower-cased extension of a file name or path, if any.
pub fn file_extension(name: &str) -> Option<String> {
  let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
  let base = base.split(['?', '#']).next().unwrap_or(base);
  match base.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
    _ => None,
  }
}

/// Non-empty trimmed lines of a text, in order.
pub fn content_lines(text: &str) -> Vec<&str> {
  text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Shorten to at most `max` chars, appending an ellipsis when cut.
pub fn clip(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let mut end = max;
    while !s.is_char_boundary(end) { end -= 1; }
    format!("{}… ({} bytes total)", &s[..end], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_all_keys() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn template_values_are_not_rescanned() {
    let out = fill_template("{body} / {n}", &[("body", "say {n} and {body}"), ("n", "3")]);
    assert_eq!(out, "say {n} and {body} / 3");
    let out = fill_template("{\"k\": {n}} {missing} {", &[("n", "1")]);
    assert_eq!(out, "{\"k\": 1} {missing} {");
  }

  #[test]
  fn extensions() {
    assert_eq!(file_extension("notes.TXT").as_deref(), Some("txt"));
    assert_eq!(file_extension("quiz/b1/report.final.pdf").as_deref(), Some("pdf"));
    assert_eq!(file_extension("https://x.io/a/slides.pptx?token=1").as_deref(), Some("pptx"));
    assert_eq!(file_extension(".bashrc"), None);
    assert_eq!(file_extension("README"), None);
  }

  #[test]
  fn lines_and_clipping() {
    assert_eq!(content_lines("  a \n\n b\n"), vec!["a", "b"]);
    assert_eq!(clip("abcdef", 3), "abc…");
    assert_eq!(clip("abc", 3), "abc");
    assert_eq!(trunc_for_log("héllo", 2), "h… (6 bytes total)");
  }
}
