// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session variable interpolation for commands, probe paths and headers.
//!
//! Placeholders:
//! - `${port}`, `${session.port}`, `${session.port:-3000}`: a session variable
//! - `${env.HOME}`, `${env.HOME:-/root}`, `${HOME:-/root}`: the process environment
//!
//! A bare `${name}` that is not a session variable is left as written, so
//! shell variables in commands keep working. An unknown `${session.name}` is
//! left as well, but [`unresolved`] reports it.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// `${[ns.]name[:-default]}`
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?:(session|env)\.)?([A-Za-z_][A-Za-z0-9_.-]*)(?::-([^}]*))?\}")
        .expect("constant regex pattern is valid")
});

/// How substituted values are written into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    Raw,
    /// Single quotes are escaped for use inside a single-quoted shell string
    Shell,
}

#[derive(Debug, PartialEq, Eq)]
enum Placeholder<'a> {
    Session { name: &'a str, default: Option<&'a str> },
    Env { name: &'a str, default: Option<&'a str> },
}

impl<'a> Placeholder<'a> {
    fn parse(caps: &Captures<'a>) -> Self {
        let name = caps.get(2).map_or("", |m| m.as_str());
        let default = caps.get(3).map(|m| m.as_str());
        match (caps.get(1).map(|m| m.as_str()), default) {
            (Some("env"), _) | (None, Some(_)) => Placeholder::Env { name, default },
            _ => Placeholder::Session { name, default },
        }
    }

    fn resolve(&self, vars: &HashMap<String, String>) -> Option<String> {
        match self {
            Placeholder::Session { name, default } => {
                vars.get(*name).cloned().or_else(|| default.map(str::to_string))
            }
            Placeholder::Env { name, default } => {
                std::env::var(name).ok().or_else(|| default.map(str::to_string))
            }
        }
    }
}

/// Escape a value for use inside a single-quoted shell string.
pub fn escape_for_shell(s: &str) -> String {
    s.replace('\'', "'\\''")
}

pub fn render(template: &str, vars: &HashMap<String, String>, quoting: Quoting) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match Placeholder::parse(caps).resolve(vars) {
                Some(value) if quoting == Quoting::Shell => escape_for_shell(&value),
                Some(value) => value,
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace placeholders in probe paths, headers and env values.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    render(template, vars, Quoting::Raw)
}

/// Replace placeholders in a shell command.
pub fn interpolate_shell(template: &str, vars: &HashMap<String, String>) -> String {
    render(template, vars, Quoting::Shell)
}

/// Names of `${session.*}` placeholders with no value in `vars`, in order of
/// first appearance.
pub fn unresolved(template: &str, vars: &HashMap<String, String>) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if caps.get(1).map(|m| m.as_str()) != Some("session") {
            continue;
        }
        if let Placeholder::Session { name, default: None } = Placeholder::parse(&caps) {
            if !vars.contains_key(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
    }
    missing
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
