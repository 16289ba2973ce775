//! Non-blocking incremental reading.
//!
//! A [`NonBlockingSmileReader`] is constructed with no input at all; the
//! caller feeds byte chunks as they become available and pulls events in
//! between. When the fed bytes end mid-token the reader answers
//! [`Event::NeedMoreInput`] instead of blocking, and the next feed resumes
//! from exactly the suspended position: no byte is consumed twice and no
//! completed token is ever reported as partial.
//!
//! The reader is cooperative and single-threaded from the caller's point of
//! view. There is no internal thread; every `feed` / `next_event` call runs
//! synchronously on whichever thread the caller chooses, and abandoning the
//! reader is the only cancellation needed.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::{Event, SmileFactory, Token};
//!
//! let factory = SmileFactory::new();
//! let mut writer = factory.writer(Vec::new()).unwrap();
//! writer.write_string("hi").unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = factory.non_blocking_reader();
//! assert_eq!(reader.next_event().unwrap(), Event::NeedMoreInput);
//!
//! // Feed in two arbitrary chunks; the decoded tokens are unaffected.
//! let (a, b) = bytes.split_at(5);
//! reader.feed(a);
//! reader.feed(b);
//! reader.end_of_input();
//! assert_eq!(
//!     reader.next_event().unwrap(),
//!     Event::Token(Token::String("hi".to_string()))
//! );
//! assert_eq!(reader.next_event().unwrap(), Event::End);
//! ```

use crate::error::Result;
use crate::features::ReadFeatures;
use crate::read::{Decoder, Event};
use crate::symbols::SymbolScope;

/// Sourceless incremental Smile reader; must be fed before it produces
/// tokens. Created via
/// [`SmileFactory::non_blocking_reader`](crate::SmileFactory::non_blocking_reader).
pub struct NonBlockingSmileReader {
    decoder: Decoder,
}

impl NonBlockingSmileReader {
    pub(crate) fn new(features: ReadFeatures, scope: SymbolScope) -> Self {
        NonBlockingSmileReader {
            decoder: Decoder::new(features, scope),
        }
    }

    /// Appends bytes to the internal cursor. May be called any number of
    /// times, with chunks split at any byte offset.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.decoder.feed(bytes);
    }

    /// Declares that no further input will be fed. After this, a suspension
    /// point becomes either a clean [`Event::End`] or an
    /// unexpected-end-of-input error.
    pub fn end_of_input(&mut self) {
        self.decoder.end_of_input();
    }

    /// Decodes at most one token from the bytes fed so far.
    pub fn next_event(&mut self) -> Result<Event> {
        self.decoder.next_event()
    }

    /// Absolute offset of the next unconsumed input byte.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.decoder.offset()
    }
}
