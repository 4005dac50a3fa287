//! Canonical node id allocation.
//!
//! Preference order:
//!
//! 1. the cleaned internal identifier (`[Calculation_1]` → `Calculation_1`);
//! 2. `{prefix}:{slug}` from the display name, then `{prefix}:{slug}-2`,
//!    `-3`, ... up to [`MAX_ID_ATTEMPTS`];
//! 3. `{prefix}:{slug}-{random}` until unused.
//!
//! Step 3 draws from a 64-bit space against a finite used set, so allocation
//! always terminates with a unique id.

use std::collections::HashSet;

use twbgraph_core::parser::strip_brackets;

use crate::graph::model::NodeKind;

/// Numeric disambiguators tried before falling back to a random suffix.
pub const MAX_ID_ATTEMPTS: usize = 1000;

/// How an id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Internal,
    Slug,
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub id: String,
    pub source: IdSource,
    /// The cleaned internal id was non-empty but already taken.
    pub collided: bool,
}

/// Strip one bracket layer and surrounding whitespace.
#[must_use]
pub fn clean_internal_id(raw: &str) -> String {
    strip_brackets(raw).to_string()
}

/// Lowercase ASCII alphanumerics joined by single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("node");
    }
    slug
}

/// Hands out unique ids for one graph build.
#[derive(Debug)]
pub struct IdAllocator {
    used: HashSet<String>,
    max_attempts: usize,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::with_max_attempts(MAX_ID_ATTEMPTS)
    }
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            used: HashSet::new(),
            max_attempts,
        }
    }

    /// Allocate an id for a node of `kind` with internal id `raw_id` and
    /// display `name`.
    pub fn allocate(&mut self, kind: NodeKind, raw_id: &str, name: &str) -> Allocation {
        let cleaned = clean_internal_id(raw_id);
        let collided = !cleaned.is_empty() && self.used.contains(&cleaned);
        if !cleaned.is_empty() && !collided {
            return self.claim(cleaned, IdSource::Internal, false);
        }

        let base = format!("{}:{}", kind.id_prefix(), slugify(name));
        if !self.used.contains(&base) {
            return self.claim(base, IdSource::Slug, collided);
        }
        for n in 2..=self.max_attempts {
            let candidate = format!("{base}-{n}");
            if !self.used.contains(&candidate) {
                return self.claim(candidate, IdSource::Slug, collided);
            }
        }

        loop {
            let candidate = format!("{base}-{:016x}", rand::random::<u64>());
            if !self.used.contains(&candidate) {
                return self.claim(candidate, IdSource::Random, collided);
            }
        }
    }

    fn claim(&mut self, id: String, source: IdSource, collided: bool) -> Allocation {
        self.used.insert(id.clone());
        Allocation {
            id,
            source,
            collided,
        }
    }
}
