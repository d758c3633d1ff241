/// GUI smoke test: one window, one checkable button
///
/// Opening this window proves the toolkit, its renderer and the event loop
/// work on the current machine.

use iced::widget::{button, container, text};
use iced::{Element, Length, Task, Theme};

pub const WINDOW_TITLE: &str = "Test Graphics";
pub const BUTTON_LABEL: &str = "Click Me";

/// Smoke test window state
#[derive(Debug, Default)]
pub struct SmokeTest {
    /// Checkable button state, flipped on every click
    checked: bool,
    /// Number of clicks handled so far
    clicks: u64,
}

/// Application messages (events)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// User clicked the button
    Clicked,
}

impl SmokeTest {
    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Handle application messages and update state
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Clicked => {
                self.clicks += 1;
                self.checked = !self.checked;
                tracing::info!("Button clicked!");
                tracing::debug!("🖱️  click #{} (checked: {})", self.clicks(), self.is_checked());
            }
        }

        Task::none()
    }

    /// Build the user interface
    pub fn view(&self) -> Element<Message> {
        let style: fn(&Theme, button::Status) -> button::Style = if self.checked {
            button::primary
        } else {
            button::secondary
        };

        container(
            button(text(BUTTON_LABEL).size(16))
                .on_press(Message::Clicked)
                .style(style)
                .padding(10),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
    }

    /// Set the application theme
    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Open the window and block until it is closed
pub fn run() -> iced::Result {
    tracing::info!("🪟 Opening {:?} window", WINDOW_TITLE);

    iced::application(WINDOW_TITLE, SmokeTest::update, SmokeTest::view)
        .theme(SmokeTest::theme)
        .centered()
        .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unclicked() {
        let app = SmokeTest::default();
        assert_eq!(app.clicks(), 0);
        assert!(!app.is_checked());
    }

    #[test]
    fn test_one_handler_call_per_click() {
        let mut app = SmokeTest::default();

        let _ = app.update(Message::Clicked);
        assert_eq!(app.clicks(), 1);
        assert!(app.is_checked());

        let _ = app.update(Message::Clicked);
        let _ = app.update(Message::Clicked);
        assert_eq!(app.clicks(), 3);
        assert!(app.is_checked());
    }
}
