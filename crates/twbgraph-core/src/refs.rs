//! Field and parameter references inside calculation formulas.
//!
//! Tableau formulas name other entities in square brackets: `[Sales]`,
//! `[Calculation_1234]`, or `[:Growth Rate]` for a parameter. This is a flat
//! single-level scanner, not a formula parser:
//!
//! - `[` opens a token; a second `[` before the close restarts the token.
//! - `]]` inside a token is an escaped literal `]`.
//! - A stray `]` outside a token is ignored; an unterminated token at the end
//!   of the formula is dropped.
//!
//! Extraction never fails.

use std::collections::HashSet;

use crate::model::References;

/// Extract field and parameter references from `formula`.
///
/// Fields keep their brackets (`"[Sales]"`); parameters drop brackets and the
/// leading colon (`"Growth Rate"`). Both lists are deduplicated and keep
/// first-seen order. Empty tokens (`[]`, `[ ]`, `[:]`) are skipped.
#[must_use]
pub fn extract_references(formula: &str) -> References {
    let mut refs = Collector::default();
    let mut token: Option<String> = None;
    let mut chars = formula.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '[' {
            token = Some(String::new());
            continue;
        }
        let Some(buf) = token.as_mut() else {
            continue;
        };
        if c != ']' {
            buf.push(c);
            continue;
        }
        if chars.peek() == Some(&']') {
            chars.next();
            buf.push(']');
            continue;
        }
        if let Some(done) = token.take() {
            refs.push_token(&done);
        }
    }

    refs.into_references()
}

#[derive(Default)]
struct Collector {
    fields: Vec<String>,
    parameters: Vec<String>,
    seen_fields: HashSet<String>,
    seen_parameters: HashSet<String>,
}

impl Collector {
    fn push_token(&mut self, raw: &str) {
        let inner = raw.trim();
        if inner.is_empty() {
            return;
        }

        if let Some(param) = inner.strip_prefix(':') {
            let param = param.trim();
            if !param.is_empty() && self.seen_parameters.insert(param.to_string()) {
                self.parameters.push(param.to_string());
            }
            return;
        }

        let field = format!("[{inner}]");
        if self.seen_fields.insert(field.clone()) {
            self.fields.push(field);
        }
    }

    fn into_references(self) -> References {
        References {
            fields: self.fields,
            parameters: self.parameters,
        }
    }
}
