//! Event kinds and payloads carried over the hook bus.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Named broadcast points on the hook bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Typed or recognized user input.
    InputReceived,
    /// A reply ready for rendering (speech, avatar, on-screen log).
    ReplyGenerated,
    /// A binary audio blob ready for playback.
    AudioGenerated,
    /// The avatar should switch expression.
    ExpressionChanged,
    /// Lyrics should be shown.
    LyricDisplayed,
    /// Lyrics should be hidden.
    LyricClosed,
    /// Short status line for hosts (provider in use, failures).
    StatusChanged,
    RecordingStartRequested,
    RecordingStopRequested,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputReceived => "input-received",
            Self::ReplyGenerated => "reply-generated",
            Self::AudioGenerated => "audio-generated",
            Self::ExpressionChanged => "expression-changed",
            Self::LyricDisplayed => "lyric-displayed",
            Self::LyricClosed => "lyric-closed",
            Self::StatusChanged => "status-changed",
            Self::RecordingStartRequested => "recording-start-requested",
            Self::RecordingStopRequested => "recording-stop-requested",
        }
    }

    /// Every kind the bus knows about, in declaration order.
    pub fn all() -> [EventKind; 9] {
        [
            Self::InputReceived,
            Self::ReplyGenerated,
            Self::AudioGenerated,
            Self::ExpressionChanged,
            Self::LyricDisplayed,
            Self::LyricClosed,
            Self::StatusChanged,
            Self::RecordingStartRequested,
            Self::RecordingStopRequested,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Avatar expression identifier as understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression(pub u32);

impl Expression {
    pub const NEUTRAL: Expression = Expression(12);
    pub const EXCITED: Expression = Expression(13);
    pub const HAPPY: Expression = Expression(17);
    pub const SINGING: Expression = Expression(20);

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload carried by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    /// Shared so a large track can be handed to every subscriber without copying.
    Audio(Arc<[u8]>),
    Expression(Expression),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&[u8]> {
        match self {
            Self::Audio(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<Expression> {
        match self {
            Self::Expression(expression) => Some(*expression),
            _ => None,
        }
    }
}

/// A named broadcast with its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Payload,
}

impl Event {
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    pub fn input(text: impl Into<String>) -> Self {
        Self::new(EventKind::InputReceived, Payload::Text(text.into()))
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::new(EventKind::ReplyGenerated, Payload::Text(text.into()))
    }

    pub fn audio(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(EventKind::AudioGenerated, Payload::Audio(bytes.into()))
    }

    pub fn expression(expression: Expression) -> Self {
        Self::new(EventKind::ExpressionChanged, Payload::Expression(expression))
    }

    pub fn lyric(text: impl Into<String>) -> Self {
        Self::new(EventKind::LyricDisplayed, Payload::Text(text.into()))
    }

    pub fn lyric_closed() -> Self {
        Self::new(EventKind::LyricClosed, Payload::Empty)
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(EventKind::StatusChanged, Payload::Text(text.into()))
    }

    pub fn recording_start() -> Self {
        Self::new(EventKind::RecordingStartRequested, Payload::Empty)
    }

    pub fn recording_stop() -> Self {
        Self::new(EventKind::RecordingStopRequested, Payload::Empty)
    }

    /// Text payload, if any.
    pub fn text(&self) -> Option<&str> {
        self.payload.as_text()
    }
}

/// Prefix marking a reply line that carries lyrics rather than speech.
pub const LYRIC_PREFIX: &str = "Lyric:";
/// Prefix marking a reply line that carries a control instruction.
pub const CONTROL_PREFIX: &str = "ID:";

/// How a renderer should treat a reply-generated text.
///
/// Speech renderers must skip `Lyric` and `Control` lines entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind<'a> {
    Speech(&'a str),
    Lyric(&'a str),
    Control(&'a str),
}

impl<'a> ReplyKind<'a> {
    pub fn classify(text: &'a str) -> Self {
        if let Some(rest) = text.strip_prefix(LYRIC_PREFIX) {
            Self::Lyric(rest.trim())
        } else if let Some(rest) = text.strip_prefix(CONTROL_PREFIX) {
            Self::Control(rest.trim())
        } else {
            Self::Speech(text)
        }
    }

    pub fn is_speech(&self) -> bool {
        matches!(self, Self::Speech(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_kind_classification() {
        assert_eq!(ReplyKind::classify("こんにちは"), ReplyKind::Speech("こんにちは"));
        assert_eq!(ReplyKind::classify("Lyric: la la"), ReplyKind::Lyric("la la"));
        assert_eq!(ReplyKind::classify("ID:20"), ReplyKind::Control("20"));
        assert!(!ReplyKind::classify("ID:13").is_speech());
    }

    #[test]
    fn test_event_constructors() {
        let event = Event::input("hello");
        assert_eq!(event.kind, EventKind::InputReceived);
        assert_eq!(event.text(), Some("hello"));

        let audio = Event::audio(vec![1u8, 2, 3]);
        assert_eq!(audio.payload.as_audio(), Some(&[1u8, 2, 3][..]));
        assert_eq!(audio.text(), None);

        let expression = Event::expression(Expression::SINGING);
        assert_eq!(expression.payload.as_expression(), Some(Expression(20)));
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::InputReceived.to_string(), "input-received");
        assert_eq!(EventKind::RecordingStopRequested.as_str(), "recording-stop-requested");
        assert_eq!(EventKind::all().len(), 9);
    }
}
