//! Pool of canned reply texts.

use std::{fs, io, path::Path};

use crate::{domain::TargetAccount, Error, Result};

/// Platform character limit for a published reply.
pub const MAX_REPLY_LEN: usize = 140;

/// Exact text published for `message` when replying to `target`: the mention
/// immediately followed by the message. The length limit applies to this string.
pub fn compose_reply(target: &TargetAccount, message: &str) -> String {
    format!("{}{message}", target.mention())
}

/// Candidate replies for one target, in insertion order.
///
/// Every stored entry produces a composed reply of at most [`MAX_REPLY_LEN`]
/// characters. Over-length candidates are dropped by [`MessageCatalog::add`] and
/// kept aside in [`MessageCatalog::rejected`].
#[derive(Clone, Debug)]
pub struct MessageCatalog {
    target: TargetAccount,
    entries: Vec<String>,
    rejected: Vec<String>,
}

impl MessageCatalog {
    pub fn new(target: TargetAccount) -> Self {
        Self {
            target,
            entries: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Build a catalog from a messages file: one candidate per line, blank lines
    /// and `#` comments skipped. Leading whitespace is kept so a line can start
    /// with the space that separates it from the mention.
    pub fn load(target: TargetAccount, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                Error::Config(format!("messages file not found: {}", path.display()))
            }
            _ => Error::Config(format!(
                "failed to read messages file {}: {e}",
                path.display()
            )),
        })?;

        let mut catalog = Self::new(target);
        for line in parse_messages(&contents) {
            catalog.add(line);
        }
        Ok(catalog)
    }

    /// Add a candidate. Returns false (and records the candidate as rejected) if
    /// the composed reply would exceed the limit.
    pub fn add(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if compose_reply(&self.target, &text).chars().count() > MAX_REPLY_LEN {
            self.rejected.push(text);
            return false;
        }
        self.entries.push(text);
        true
    }

    pub fn target(&self) -> &TargetAccount {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Composed reply for the entry at `index`.
    pub fn compose(&self, index: usize) -> Option<String> {
        self.get(index).map(|m| compose_reply(&self.target, m))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Fail fast on a catalog that nothing can be selected from.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Config(format!(
                "message catalog is empty ({} candidate(s) exceeded {MAX_REPLY_LEN} characters for {})",
                self.rejected.len(),
                self.target
            )));
        }
        Ok(())
    }
}

fn parse_messages(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|l| {
            let t = l.trim_start();
            !t.is_empty() && !t.starts_with('#')
        })
}
