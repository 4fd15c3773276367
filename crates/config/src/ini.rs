//! Line-oriented INI scanner.
//!
//! The scanner owns no configuration knowledge; it tokenizes the file and
//! emits section / assignment events to a caller-supplied [`IniSink`].
//! Errors carry the 1-based line number; the caller prefixes the file path.

use lava_core::{LavaError, Result};

/// Receiver for scanner events.
pub trait IniSink {
    /// A `[section]` header was read.
    fn section(&mut self, name: &str, line: usize) -> Result<()>;

    /// A `key = value` assignment was read. Quotes around the value have
    /// already been stripped and escapes resolved.
    fn assign(&mut self, key: &str, value: &str, line: usize) -> Result<()>;
}

/// Scan `text`, feeding every section and assignment to `sink`.
///
/// Blank lines and lines starting with `#` or `;` are skipped.
pub fn scan(text: &str, sink: &mut dyn IniSink) -> Result<()> {
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') {
            let name = match trimmed.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                Some(name) if !name.contains('[') && !name.contains(']') => name.trim(),
                _ => return Err(error(line, "unbalanced brackets in section header")),
            };
            if name.is_empty() {
                return Err(error(line, "empty section name"));
            }
            sink.section(name, line)?;
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(error(line, format!("expected `key = value`, got `{trimmed}`")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(error(line, "assignment with empty key"));
        }
        let value = unquote(value.trim(), line)?;
        sink.assign(key, &value, line)?;
    }
    Ok(())
}

/// Build a line-tagged configuration error. Also used by sinks so their
/// diagnostics match the scanner's.
pub fn error(line: usize, msg: impl std::fmt::Display) -> LavaError {
    LavaError::Config(format!("line {line}: {msg}"))
}

/// Strip surrounding double quotes and resolve `\"` / `\\` escapes.
fn unquote(value: &str, line: usize) -> Result<String> {
    if !value.starts_with('"') {
        return Ok(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value[1..].chars();
    loop {
        match chars.next() {
            Some('"') => {
                // Only trailing whitespace may follow the closing quote.
                let rest: &str = chars.as_str();
                if !rest.trim().is_empty() {
                    return Err(error(line, "trailing characters after closing quote"));
                }
                return Ok(out);
            }
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => return Err(error(line, "unterminated string")),
            },
            Some(c) => out.push(c),
            None => return Err(error(line, "unterminated string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl IniSink for Recorder {
        fn section(&mut self, name: &str, line: usize) -> Result<()> {
            self.events.push(format!("{line}:[{name}]"));
            Ok(())
        }

        fn assign(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
            self.events.push(format!("{line}:{key}={value}"));
            Ok(())
        }
    }

    fn scan_ok(text: &str) -> Vec<String> {
        let mut rec = Recorder::default();
        scan(text, &mut rec).unwrap();
        rec.events
    }

    #[test]
    fn sections_and_assignments() {
        let events = scan_ok("[config]\nposition = top\n\n# comment\n; also\nsize=42\n");
        assert_eq!(events, vec!["1:[config]", "2:position=top", "6:size=42"]);
    }

    #[test]
    fn quoted_values_keep_spaces_and_escapes() {
        let events = scan_ok("[item:button]\ncommand = \"notify-send \\\"hi\\\" now\"\n");
        assert_eq!(events[1], "2:command=notify-send \"hi\" now");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut rec = Recorder::default();
        let err = scan("[config]\ncursor-name = \"oops\n", &mut rec).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn unbalanced_brackets_are_an_error() {
        let mut rec = Recorder::default();
        let err = scan("[config\n", &mut rec).unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn missing_equals_is_an_error() {
        let mut rec = Recorder::default();
        assert!(scan("[config]\njust-a-word\n", &mut rec).is_err());
    }
}
