use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

// ---------------------------------------------------------------------------
// Session – run-scoped placeholders
// ---------------------------------------------------------------------------

/// State shared by all plugins of one run.
///
/// Currently this is only the placeholder table used to expand paths such as
/// `{HOME}/models/{DATASET}.json`.
#[derive(Debug, Clone)]
pub struct Session {
    placeholders: BTreeMap<String, String>,
}

impl Default for Session {
    fn default() -> Self {
        let mut session = Session::empty();
        if let Ok(cwd) = std::env::current_dir() {
            session.set("CWD", cwd.display().to_string());
        }
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            session.set("HOME", PathBuf::from(home).display().to_string());
        }
        session.set("TMP", std::env::temp_dir().display().to_string());
        session
    }
}

impl Session {
    /// A session without any placeholders defined.
    pub fn empty() -> Self {
        Session {
            placeholders: BTreeMap::new(),
        }
    }

    /// Define (or redefine) a placeholder.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.placeholders.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.placeholders.get(key).map(String::as_str)
    }

    /// Parse a `KEY=VALUE` definition.
    pub fn set_from_definition(&mut self, definition: &str) -> Result<()> {
        let Some((key, value)) = definition.split_once('=') else {
            bail!("Invalid placeholder definition (expected KEY=VALUE): {definition}");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty placeholder name in: {definition}");
        }
        self.set(key, value.trim());
        Ok(())
    }

    /// Load `KEY=VALUE` lines from a file; blank lines and `#` comments are skipped.
    pub fn load_placeholders(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading placeholders from {}", path.display()))?;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.set_from_definition(line)
                .with_context(|| format!("{}:{}", path.display(), line_no + 1))?;
        }
        Ok(())
    }

    /// Replace every defined `{KEY}` in `path`. Undefined placeholders are left as-is.
    pub fn expand_placeholders(&self, path: &str) -> PathBuf {
        let mut result = String::with_capacity(path.len());
        let mut rest = path;

        while let Some(start) = rest.find('{') {
            result.push_str(&rest[..start]);
            let candidate = &rest[start..];
            match candidate.find('}') {
                Some(end) => {
                    let key = &candidate[1..end];
                    match self.placeholders.get(key) {
                        Some(value) => result.push_str(value),
                        None => result.push_str(&candidate[..=end]),
                    }
                    rest = &candidate[end + 1..];
                }
                None => {
                    result.push_str(candidate);
                    rest = "";
                }
            }
        }
        result.push_str(rest);

        PathBuf::from(result)
    }
}
