//! Fixed content for the demo streaming procedures.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Demo item emitted by `streamFoo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Foo {
    fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// The nine items `streamFoo` emits, in order.
pub static FOOS: Lazy<Vec<Foo>> = Lazy::new(|| {
    vec![
        Foo::new("1", "Foo One", "The first foo"),
        Foo::new("2", "Foo Two", "The second foo"),
        Foo::new("3", "Foo Three", "The third foo"),
        Foo::new("4", "Foo Four", "The fourth foo"),
        Foo::new("5", "Foo Five", "The fifth foo"),
        Foo::new("6", "Foo Six", "The sixth foo"),
        Foo::new("7", "Foo Seven", "The seventh foo"),
        Foo::new("8", "Foo Eight", "The eighth foo"),
        Foo::new("9", "Foo Nine", "The ninth foo"),
    ]
});

/// Paragraph streamed by `getFooResponse`.
pub const SAMPLE_PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog. \
This is a sample paragraph that will be streamed slowly to demonstrate the streaming \
capabilities of the RPC framework. Each word appears with a small delay to simulate \
real-time text generation.";

/// Successive prefixes of `text`, each ending after one more word.
///
/// The last prefix is `text` itself.
pub fn cumulative_prefixes(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut end = 0;
    for word in text.split_inclusive(' ') {
        end += word.len();
        out.push(text[..end].trim_end().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn there_are_nine_foos_in_order() {
        assert_eq!(FOOS.len(), 9);
        assert_eq!(FOOS[0].name, "Foo One");
        assert_eq!(FOOS[8].description, "The ninth foo");
    }

    #[test]
    fn prefixes_grow_one_word_at_a_time() {
        let prefixes = cumulative_prefixes("a bc def");
        assert_eq!(prefixes, vec!["a", "a bc", "a bc def"]);
    }

    #[test]
    fn last_prefix_is_the_whole_paragraph() {
        let prefixes = cumulative_prefixes(SAMPLE_PARAGRAPH);
        assert_eq!(prefixes.last().map(String::as_str), Some(SAMPLE_PARAGRAPH));
        assert_eq!(prefixes.len(), SAMPLE_PARAGRAPH.split(' ').count());
    }
}
