//! Terminal notice sink.

use crate::notify::{Notice, NoticeKind, Notifier};
use owo_colors::OwoColorize;

/// Writes notices to stderr, colored by kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    pub fn render(notice: &Notice) -> String {
        let title = match notice.kind {
            NoticeKind::Success => format!("{}", notice.title.green().bold()),
            NoticeKind::Info => format!("{}", notice.title.cyan().bold()),
            NoticeKind::Error => format!("{}", notice.title.red().bold()),
        };
        format!("{} {}", title, notice.message)
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}", Self::render(&notice));
    }
}
