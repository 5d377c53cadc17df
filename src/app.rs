use crate::api::{StreamEnd, StreamEvent};
use crate::chat::ChatClient;
use crate::chat_message::MessageStatus;
use crate::exchange::{ExchangeHandle, ExchangeState};
use crate::log_view::LogView;
use crate::models::Sender;
use crate::panel::PanelHost;
use crate::status_indicator::StatusIndicator;

/// Everything the terminal front end draws from.
pub struct App {
    pub client: ChatClient,
    pub panel: PanelHost,
    pub status_indicator: StatusIndicator,
    pub logs: LogView,
    pub chat_scroll: u16,
    pub follow: bool,
    pub should_quit: bool,
    stylesheet: String,
}

impl App {
    pub fn new(client: ChatClient, panel: PanelHost) -> App {
        let stylesheet = client.stylesheet();
        let mut app = App {
            client,
            panel,
            status_indicator: StatusIndicator::new(),
            logs: LogView::new(),
            chat_scroll: 0,
            follow: true,
            should_quit: false,
            stylesheet,
        };
        app.logs.add(format!("Panel {} ready", app.panel.view_type()));
        app
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    /// Sends the input control's contents as a question.
    pub fn submit(&mut self) -> Option<ExchangeHandle> {
        let handle = self.client.submit_input()?;
        if let Some(exchange) = self.client.exchange(handle) {
            self.logs.add(format!(
                "Exchange #{} asked: {}",
                handle.id(),
                exchange.question()
            ));
        }
        self.follow = true;
        self.sync();
        Some(handle)
    }

    pub fn apply(&mut self, handle: ExchangeHandle, event: StreamEvent) {
        let ending = match &event {
            StreamEvent::End(end) => Some(end.clone()),
            StreamEvent::Chunk(_) => None,
        };
        if !self.client.apply(handle, event) {
            return;
        }
        if let Some(end) = ending {
            self.logs.add(match end {
                StreamEnd::Completed => format!("Exchange #{} completed", handle.id()),
                StreamEnd::Failed(reason) => format!("Exchange #{} failed: {}", handle.id(), reason),
                StreamEnd::Cancelled => format!("Exchange #{} cancelled", handle.id()),
            });
        }
        self.sync();
    }

    pub fn cancel_active(&mut self) {
        if let Some(handle) = self.client.active_handle() {
            if self.client.cancel_active() {
                self.logs.add(format!("Exchange #{} cancelled", handle.id()));
            }
        }
        self.sync();
    }

    /// Status to show next to the scrollback message at `index`.
    pub fn message_status(&self, index: usize) -> MessageStatus {
        let is_user = self
            .client
            .scrollback()
            .get(index)
            .is_some_and(|slot| slot.message.sender == Sender::User);
        if is_user {
            return MessageStatus::Sent;
        }
        self.client
            .exchanges()
            .iter()
            .find(|exchange| exchange.handle().assistant_index() == index)
            .map(|exchange| MessageStatus::from_exchange(exchange.state()))
            .unwrap_or(MessageStatus::Done)
    }

    pub fn is_streaming(&self) -> bool {
        self.client.current_state().is_live()
    }

    pub fn scroll_up(&mut self) {
        self.follow = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn on_tick(&mut self) {
        self.status_indicator.update_spinner();
    }

    fn sync(&mut self) {
        let state = self.client.current_state();
        self.status_indicator.sync(state);
        if state == ExchangeState::Errored {
            self.status_indicator.set_status("Answer interrupted, partial text kept");
        }
        self.panel.refresh(self.client.scrollback(), &self.stylesheet);
    }
}
