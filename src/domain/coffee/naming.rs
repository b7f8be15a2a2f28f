//! Name comparison and duplicate-name suggestions.

use std::collections::HashSet;

/// Case-insensitive name equality used for the uniqueness rule.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Finds a free name for `requested` by appending " 2", " 3", ...
///
/// Candidates are compared against `existing` ignoring case. At most
/// `existing.len()` candidates can be taken, so a free one is found within
/// `existing.len() + 1` probes.
pub fn suggest_available_name<'a, I>(requested: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<String> = existing.into_iter().map(str::to_lowercase).collect();

    let mut counter: usize = 2;
    loop {
        let candidate = format!("{} {}", requested, counter);
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        counter += 1;
    }
}
