//! Namespace containers.
//!
//! A container names the namespace an expression was written in. A bare
//! identifier `x` inside container `a.b.c` may refer to `a.b.c.x`,
//! `a.b.x`, `a.x` or `x`, and resolution tries those candidates from most
//! to least specific. A leading dot opts out: `.x` only ever means the
//! root-level `x`.

/// The namespace an expression is planned within.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    name: String,
}

impl Container {
    /// The root container.
    pub fn root() -> Container {
        Container::default()
    }

    /// A container with the given dot-separated namespace name.
    pub fn new(name: impl Into<String>) -> Container {
        Container { name: name.into() }
    }

    /// The container's name. Empty for the root container.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate fully qualified names for an identifier, ordered from
    /// most to least qualified.
    pub fn resolve_candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![absolute.to_string()];
        }
        if self.name.is_empty() {
            return vec![name.to_string()];
        }
        let mut candidates = Vec::new();
        let mut prefix = self.name.as_str();
        loop {
            candidates.push(format!("{}.{}", prefix, name));
            match prefix.rfind('.') {
                Some(idx) => prefix = &prefix[..idx],
                None => break,
            }
        }
        candidates.push(name.to_string());
        candidates
    }
}
