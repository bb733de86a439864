//! Terminal renderer: prints what the avatar would say and do.

use async_trait::async_trait;
use komo_core::{Event, EventKind, HookOutcome, HookResult, Priority, ReplyKind, Subscriber};
use tracing::debug;

/// Event kinds the console renders.
pub const RENDERED_EVENTS: [EventKind; 6] = [
    EventKind::ReplyGenerated,
    EventKind::LyricDisplayed,
    EventKind::LyricClosed,
    EventKind::ExpressionChanged,
    EventKind::AudioGenerated,
    EventKind::StatusChanged,
];

pub struct ConsoleRenderer {
    speaker: String,
    quiet: bool,
}

impl ConsoleRenderer {
    pub fn new(speaker: impl Into<String>, quiet: bool) -> Self {
        Self {
            speaker: speaker.into(),
            quiet,
        }
    }

    fn render(&self, event: &Event) -> Option<String> {
        match event.kind {
            EventKind::ReplyGenerated => match ReplyKind::classify(event.text()?) {
                ReplyKind::Speech(text) => Some(format!("💬 {}: {}", self.speaker, text)),
                ReplyKind::Lyric(text) => Some(format!("🎵 {}", text)),
                ReplyKind::Control(_) => None,
            },
            EventKind::LyricDisplayed => Some(format!("🎤 {}", event.text()?.trim())),
            EventKind::LyricClosed => Some("🎤 ―".to_string()),
            EventKind::ExpressionChanged if !self.quiet => {
                Some(format!("   (expression {})", event.payload.as_expression()?))
            }
            EventKind::AudioGenerated if !self.quiet => {
                Some(format!("🔊 {} bytes", event.payload.as_audio()?.len()))
            }
            EventKind::StatusChanged if !self.quiet => Some(format!("   … {}", event.text()?)),
            _ => None,
        }
    }
}

#[async_trait]
impl Subscriber for ConsoleRenderer {
    fn name(&self) -> &str {
        "console"
    }

    fn priority(&self) -> Priority {
        Priority::Last
    }

    async fn on_event(&self, event: &Event) -> HookResult {
        match self.render(event) {
            Some(line) => println!("{}", line),
            None => debug!("Console skipped {}", event.kind),
        }
        Ok(HookOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use komo_core::Expression;

    #[test]
    fn test_control_lines_are_not_spoken() {
        let console = ConsoleRenderer::new("こもも", false);
        assert_eq!(console.render(&Event::reply("ID:20")), None);
        assert_eq!(
            console.render(&Event::reply("やっほー")).as_deref(),
            Some("💬 こもも: やっほー")
        );
        assert_eq!(console.render(&Event::reply("Lyric: ラララ")).as_deref(), Some("🎵 ラララ"));
    }

    #[test]
    fn test_quiet_hides_status_and_expression() {
        let quiet = ConsoleRenderer::new("こもも", true);
        assert_eq!(quiet.render(&Event::status("思考中...")), None);
        assert_eq!(quiet.render(&Event::expression(Expression::SINGING)), None);
        assert!(quiet.render(&Event::lyric("ラ")).is_some());
    }
}
