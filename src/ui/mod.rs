use std::path::PathBuf;

use iced::{
    widget::{button, column, row, text, text_input, Space},
    Color, Element, Length,
};

use crate::domain::{StatusIndicator, StatusTone};

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Neutral => Color::from_rgb(0.25, 0.25, 0.3),
        StatusTone::Success => Color::from_rgb(0.16, 0.55, 0.24),
        StatusTone::Error => Color::from_rgb(0.78, 0.18, 0.18),
    }
}

/// Main view state
pub struct DownloadView {
    pub page_url: String,
    pub save_dir: PathBuf,
    pub status: StatusIndicator,
    pub is_running: bool,
    /// False on platforms where saving is not offered at all.
    pub show_download_control: bool,
}

impl DownloadView {
    pub fn new(save_dir: PathBuf, show_download_control: bool) -> Self {
        Self {
            page_url: String::new(),
            save_dir,
            status: StatusIndicator::Absent,
            is_running: false,
            show_download_control,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    PageUrlChanged(String),
    BrowsePressed,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::PageUrlChanged(url) => {
                self.page_url = url;
            }
            DownloadMessage::BrowsePressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn can_start(&self) -> bool {
        self.show_download_control && !self.is_running && !self.page_url.trim().is_empty()
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let browse = button("Browse…")
            .on_press_maybe((!self.is_running).then_some(DownloadMessage::BrowsePressed))
            .padding([5, 10]);

        let mut content = column![
            text("Page Image Saver").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Page URL:").size(16),
            text_input("https://example.com/condo/name/101", &self.page_url)
                .on_input(DownloadMessage::PageUrlChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            row![
                text(format!("Save to: {}", self.save_dir.display())).size(14),
                browse,
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10);

        if let (Some(message), Some(tone)) = (self.status.text(), self.status.tone()) {
            content = content.push(text(message).size(14).color(tone_color(tone)));
        }

        if self.show_download_control {
            content = content.push(Space::new().height(Length::Fixed(20.0))).push(
                button("Download images")
                    .on_press_maybe(self.can_start().then_some(DownloadMessage::DownloadPressed))
                    .padding([10, 20]),
            );
        }

        content.into()
    }
}
