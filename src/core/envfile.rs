//! Reading and writing dotenv-style files.
//!
//! Used both for the generated `.env`/`.env.secrets` outputs and for the
//! `KEY=value` config file layers.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Parse a `KEY=value` file into a map.
///
/// Blank lines and `#` comments are skipped; surrounding single or double
/// quotes on values are stripped.
pub fn load(path: &Path) -> Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse(&contents))
}

/// Parse dotenv-style content.
pub fn parse(contents: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            result.insert(key.trim().to_string(), value.to_string());
        }
    }
    result
}

/// Render a map as sorted `KEY=value` lines with a generation header.
///
/// Values containing whitespace, quotes, `$`, `#` or `=` are double-quoted.
pub fn render(data: &HashMap<String, String>, header: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(h) = header {
        out.push_str(&format!("# {h}\n"));
    }
    out.push_str(&format!(
        "# Generated at: {}\n\n",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S")
    ));

    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    for key in keys {
        let value = &data[key];
        if needs_quoting(value) {
            out.push_str(&format!("{key}=\"{value}\"\n"));
        } else {
            out.push_str(&format!("{key}={value}\n"));
        }
    }
    out
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, ' ' | '\'' | '"' | '$' | '#' | '=' | '\n'))
}

/// Write an env file, restricting it to the owner where the platform allows.
pub fn write(path: &Path, data: &HashMap<String, String>, header: Option<&str>) -> Result<()> {
    std::fs::write(path, render(data, header))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

/// Parse `KEY=value` command-line arguments; arguments without `=` are ignored.
pub fn parse_pairs(args: &[String]) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            result.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    result
}

/// Transform secret keys into environment-variable form: `db-pass.word` →
/// `DB_PASS_WORD`.
pub fn to_env_keys(data: &HashMap<String, String>) -> HashMap<String, String> {
    data.iter()
        .map(|(k, v)| {
            let key = k
                .replace(['-', '.', ' '], "_")
                .to_uppercase();
            (key, v.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let kv = parse("# comment\n\nFOO=bar\n  \nBAZ=qux\n");
        assert_eq!(kv.len(), 2);
        assert_eq!(kv["FOO"], "bar");
    }

    #[test]
    fn parse_strips_quotes() {
        let kv = parse("A=\"with spaces\"\nB='single'\nC=plain\n");
        assert_eq!(kv["A"], "with spaces");
        assert_eq!(kv["B"], "single");
        assert_eq!(kv["C"], "plain");
    }

    #[test]
    fn parse_keeps_equals_in_value() {
        let kv = parse("URL=postgres://u:p@h/db?sslmode=require\n");
        assert_eq!(kv["URL"], "postgres://u:p@h/db?sslmode=require");
    }

    #[test]
    fn render_quotes_special_values() {
        let out = render(&map(&[("KEY", "has space"), ("PLAIN", "value")]), None);
        assert!(out.contains("KEY=\"has space\"\n"));
        assert!(out.contains("PLAIN=value\n"));
    }

    #[test]
    fn render_sorts_keys_and_includes_header() {
        let out = render(&map(&[("B", "2"), ("A", "1")]), Some("Vault secret: n8n"));
        assert!(out.starts_with("# Vault secret: n8n\n# Generated at: "));
        let a = out.find("A=1").unwrap();
        let b = out.find("B=2").unwrap();
        assert!(a < b);
    }

    #[test]
    fn render_round_trips_through_parse() {
        let data = map(&[("DB_URL", "postgres://u:p@h/d"), ("MSG", "hello world")]);
        assert_eq!(parse(&render(&data, Some("test"))), data);
    }

    #[test]
    fn pairs_ignore_malformed_args() {
        let pairs = parse_pairs(&[
            "ip=10.0.0.1".to_string(),
            "noequals".to_string(),
            "k = v ".to_string(),
        ]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["ip"], "10.0.0.1");
        assert_eq!(pairs["k"], "v");
    }

    #[test]
    fn env_key_transform() {
        let out = to_env_keys(&map(&[("db-pass.word", "x"), ("already_UP", "y")]));
        assert!(out.contains_key("DB_PASS_WORD"));
        assert!(out.contains_key("ALREADY_UP"));
    }
}
