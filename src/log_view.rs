const MAX_ENTRIES: usize = 200;

/// Recent activity shown beside the chat. The full log goes to the log
/// file; this keeps only the last few hundred lines. `scroll_offset` counts
/// lines back from the newest entry.
#[derive(Debug, Default)]
pub struct LogView {
    pub entries: Vec<String>,
    pub scroll_offset: u16,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        log::debug!("{}", entry);
        self.entries.push(entry);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.remove(0);
        }
    }

    /// Moves toward older entries.
    pub fn scroll_up(&mut self) {
        let max = u16::try_from(self.entries.len().saturating_sub(1)).unwrap_or(u16::MAX);
        self.scroll_offset = self.scroll_offset.saturating_add(1).min(max);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }
}
