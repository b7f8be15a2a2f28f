//! Demo streams used to exercise the streaming path end to end.

use futures::stream::{self, BoxStream, StreamExt};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::demo::{cumulative_prefixes, Foo, FOOS, SAMPLE_PARAGRAPH};

/// Pacing for the demo streams.
#[derive(Debug, Clone)]
pub struct FooSettings {
    pub min_jitter: Duration,
    pub max_jitter: Duration,
    pub word_delay: Duration,
}

impl Default for FooSettings {
    fn default() -> Self {
        Self {
            min_jitter: Duration::from_millis(200),
            max_jitter: Duration::from_millis(2000),
            word_delay: Duration::from_millis(60),
        }
    }
}

impl FooSettings {
    /// No pauses at all. Handy in tests.
    pub fn immediate() -> Self {
        Self {
            min_jitter: Duration::ZERO,
            max_jitter: Duration::ZERO,
            word_delay: Duration::ZERO,
        }
    }
}

pub struct FooService {
    settings: FooSettings,
}

impl FooService {
    pub fn new(settings: FooSettings) -> Self {
        Self { settings }
    }

    /// The nine demo items, each preceded by a random pause between the
    /// configured jitter bounds.
    pub fn stream_foo(&self) -> BoxStream<'static, Foo> {
        let min = self.settings.min_jitter;
        let max = self.settings.max_jitter.max(min);

        stream::iter(FOOS.iter().cloned())
            .then(move |foo| {
                let pause = if max.is_zero() {
                    Duration::ZERO
                } else {
                    rand::thread_rng().gen_range(min..=max)
                };
                async move {
                    if !pause.is_zero() {
                        sleep(pause).await;
                    }
                    foo
                }
            })
            .boxed()
    }

    /// The sample paragraph, one more word per chunk. Each chunk holds all
    /// text so far, so the last one is the whole paragraph.
    pub fn get_foo_response(&self) -> BoxStream<'static, String> {
        let delay = self.settings.word_delay;

        stream::iter(cumulative_prefixes(SAMPLE_PARAGRAPH))
            .then(move |text| async move {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                text
            })
            .boxed()
    }
}
