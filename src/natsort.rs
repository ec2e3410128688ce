//! Natural ordering of container paths.
//!
//! Paths are split into directory components and a file stem (extension
//! stripped, case folded). Depending on the [`SortPathMode`], components are
//! further split into a text prefix and a trailing number so that `page2`
//! sorts before `page10`.

use std::cmp::Ordering;

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;

use crate::types::SortPathMode;

lazy_static! {
    /// Text prefix followed by the trailing run of digits, e.g. `chapter` + `12`.
    static ref NUMERIC_SUFFIX: Regex = Regex::new(r"^(.*?)(\d+)$").unwrap();
}

/// One path component, pre-split for comparison.
#[derive(Debug, Clone)]
struct Component {
    prefix: String,
    number: Option<f64>,
    full: String,
}

impl Component {
    fn plain(text: String) -> Self {
        Self {
            prefix: text.clone(),
            number: None,
            full: text,
        }
    }

    fn decomposed(text: String) -> Self {
        match NUMERIC_SUFFIX.captures(&text) {
            Some(caps) => {
                let prefix = caps.get(1).map_or("", |m| m.as_str()).to_string();
                let number = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
                Self {
                    prefix,
                    number,
                    full: text,
                }
            }
            None => Self::plain(text),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Component {}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    // (prefix, number, full) lexicographically; a missing number sorts first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then_with(|| match (self.number, other.number) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.full.cmp(&other.full))
    }
}

/// Precomputed comparison key of a path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    components: Vec<Component>,
}

impl SortKey {
    pub fn new(path: &str, mode: SortPathMode) -> Self {
        let normalized = path.replace('\\', "/").to_lowercase();
        let mut parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
        let file = parts.pop().map(strip_extension).unwrap_or_default();

        let mut components: Vec<Component> = parts
            .into_iter()
            .map(|dir| match mode {
                SortPathMode::Plain => Component::plain(dir.to_string()),
                SortPathMode::Directories | SortPathMode::Full => {
                    Component::decomposed(dir.to_string())
                }
            })
            .collect();

        components.push(match mode {
            SortPathMode::Full => Component::decomposed(file),
            _ => Component::plain(file),
        });

        Self { components }
    }
}

fn strip_extension(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

/// Compares two container paths in natural order.
///
/// Components compare left to right; when every shared component is equal
/// the shorter path sorts first.
pub fn compare_paths(a: &str, b: &str, mode: SortPathMode) -> Ordering {
    SortKey::new(a, mode).cmp(&SortKey::new(b, mode))
}

/// Sorts `items` in natural path order, computing each key once.
pub fn sort_by_path<T, F>(items: Vec<T>, mode: SortPathMode, path_of: F) -> Vec<T>
where
    T: Send,
    F: Fn(&T) -> String + Sync,
{
    let mut keyed: Vec<(SortKey, T)> = items
        .into_par_iter()
        .map(|item| (SortKey::new(&path_of(&item), mode), item))
        .collect();
    keyed.par_sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, item)| item).collect()
}
