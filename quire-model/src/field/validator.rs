use crate::settings::ConfigError;
use regex_lite::Regex;

/// A compiled validation pattern.
///
/// Patterns may be written bare (`^\d+$`) or delimited with trailing flags
/// (`/^[a-z]+$/i`). Supported flags are `i`, `m`, `s` and `x`; `u` is
/// accepted and ignored.
#[derive(Debug, Clone)]
pub struct Validator {
    source: String,
    regex: Regex,
}

impl Validator {
    /// Compiles a pattern. Blank source means "no validator".
    pub fn parse(key: &str, source: &str) -> Result<Option<Self>, ConfigError> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(None);
        }
        let pattern = match delimited(source) {
            Some((body, flags)) => {
                let mut inline = String::new();
                for flag in flags.chars() {
                    match flag {
                        'i' | 'm' | 's' | 'x' => inline.push(flag),
                        'u' => {}
                        other => {
                            return Err(ConfigError::invalid(key, format!("unsupported pattern flag '{other}'")));
                        }
                    }
                }
                if inline.is_empty() {
                    body.to_string()
                } else {
                    format!("(?{inline}){body}")
                }
            }
            None => source.to_string(),
        };
        let regex = Regex::new(&pattern).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        Ok(Some(Self {
            source: source.to_string(),
            regex,
        }))
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn delimited(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    Some((&rest[..end], &rest[end + 1..]))
}
