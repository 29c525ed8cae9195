use crate::api::{FetchConfig, PageClient};
use crate::application::{DownloadCoordinator, RunSettings};
use crate::domain::{AppError, RunEvent, RunOutcome};
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::default_save_dir;
use futures::StreamExt;
use iced::Task;
use std::path::PathBuf;
use url::Url;

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    // Events and expiry timers carry the id of the run that owns the banner
    run_id: u64,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let client = PageClient::new(FetchConfig::default());
        Self::with_coordinator(DownloadCoordinator::new(client, RunSettings::default()))
    }

    pub fn with_coordinator(coordinator: DownloadCoordinator) -> Self {
        let platform = coordinator.platform();
        if platform.hides_download_control() {
            tracing::info!(?platform, "download control hidden");
        }
        let view = DownloadView::new(default_save_dir(), !platform.hides_download_control());

        Self {
            view,
            coordinator,
            run_id: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    SaveDirSelected(Option<PathBuf>),
    /// (Run id, event)
    Run(u64, RunEvent),
    /// The terminal message of this run may go away
    StatusExpired(u64),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => return start_run(app),
                DownloadMessage::BrowsePressed if !app.view.is_running => {
                    let start_dir = app.view.save_dir.clone();
                    return Task::perform(
                        async move {
                            rfd::AsyncFileDialog::new()
                                .set_directory(&start_dir)
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::SaveDirSelected,
                    );
                }
                _ => {}
            }
        }
        Message::SaveDirSelected(Some(dir)) => {
            app.view.save_dir = dir;
        }
        Message::SaveDirSelected(None) => {
            // User cancelled dialog
        }
        Message::Run(run_id, event) if run_id == app.run_id => match event {
            RunEvent::Started {
                total,
                prefix,
                platform,
            } => {
                tracing::debug!(total, %prefix, ?platform, "run started");
                app.view.status.start(total);
            }
            RunEvent::Progress(progress) => {
                app.view.status.update(progress);
            }
            RunEvent::Finished(outcome) => {
                app.view.is_running = false;
                return finish(app, outcome);
            }
        },
        Message::Run(..) => {
            // Stale event from a superseded run
        }
        Message::StatusExpired(run_id) => {
            if run_id == app.run_id && !app.view.is_running {
                app.view.status.dismiss();
            }
        }
    }
    Task::none()
}

fn start_run(app: &mut DownloadApp) -> Task<Message> {
    if !app.view.can_start() {
        return Task::none();
    }

    app.run_id += 1;
    let page_url = app.view.page_url.trim().to_string();
    if Url::parse(&page_url).is_err() {
        return finish(app, RunOutcome::PageUnavailable(AppError::InvalidInput));
    }

    app.view.is_running = true;
    app.view.status.dismiss();

    let run_id = app.run_id;
    Task::stream(
        app.coordinator
            .run(page_url, app.view.save_dir.clone())
            .map(move |event| Message::Run(run_id, event)),
    )
}

/// Show the terminal message and schedule its removal.
fn finish(app: &mut DownloadApp, outcome: RunOutcome) -> Task<Message> {
    let linger = app.view.status.finish(outcome);
    let run_id = app.run_id;
    Task::perform(
        async move { tokio::time::sleep(linger).await },
        move |_| Message::StatusExpired(run_id),
    )
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlatformClass, ProgressState, StatusIndicator, StatusTone};

    fn app_with_agent(user_agent: &str) -> DownloadApp {
        let client = PageClient::new(FetchConfig {
            user_agent: user_agent.to_string(),
            ..FetchConfig::default()
        });
        DownloadApp::with_coordinator(DownloadCoordinator::new(client, RunSettings::default()))
    }

    fn desktop_app() -> DownloadApp {
        app_with_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
    }

    fn type_url(app: &mut DownloadApp, url: &str) {
        let _ = update(
            app,
            Message::UiMessage(DownloadMessage::PageUrlChanged(url.to_string())),
        );
    }

    #[test]
    fn test_ios_hides_download_control() {
        let app = app_with_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X)");
        assert!(!app.view.show_download_control);
        assert!(desktop_app().view.show_download_control);
    }

    #[test]
    fn test_download_ignored_when_control_hidden() {
        let mut app = app_with_agent("Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X)");
        type_url(&mut app, "https://a.example/");
        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));
        assert!(!app.view.is_running);
        assert_eq!(app.run_id, 0);
    }

    #[test]
    fn test_invalid_url_shows_error() {
        let mut app = desktop_app();
        type_url(&mut app, "example.com/no-scheme");
        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));

        assert!(!app.view.is_running);
        assert_eq!(
            app.view.status,
            StatusIndicator::Terminal(RunOutcome::PageUnavailable(AppError::InvalidInput))
        );
        assert_eq!(app.view.status.tone(), Some(StatusTone::Error));
    }

    #[test]
    fn test_run_events_drive_status() {
        let mut app = desktop_app();
        app.run_id = 3;
        app.view.is_running = true;

        let _ = update(
            &mut app,
            Message::Run(
                3,
                RunEvent::Started {
                    total: 2,
                    prefix: "images".to_string(),
                    platform: PlatformClass::Desktop,
                },
            ),
        );
        assert_eq!(app.view.status.text().as_deref(), Some("Saved 0/2"));

        let progress = ProgressState {
            processed: 1,
            failed: 1,
            total: 2,
        };
        let _ = update(&mut app, Message::Run(3, RunEvent::Progress(progress)));
        assert_eq!(app.view.status.text().as_deref(), Some("Saved 1/2, 1 failed"));

        let _ = update(
            &mut app,
            Message::Run(3, RunEvent::Finished(progress.outcome())),
        );
        assert!(!app.view.is_running);
        assert_eq!(app.view.status.tone(), Some(StatusTone::Error));

        // an expiry from an older run leaves the banner alone
        let _ = update(&mut app, Message::StatusExpired(2));
        assert!(matches!(app.view.status, StatusIndicator::Terminal(_)));

        let _ = update(&mut app, Message::StatusExpired(3));
        assert!(matches!(app.view.status, StatusIndicator::Absent));
    }

    #[test]
    fn test_stale_run_events_are_ignored() {
        let mut app = desktop_app();
        app.run_id = 5;

        let _ = update(
            &mut app,
            Message::Run(4, RunEvent::Finished(RunOutcome::NoImages)),
        );
        assert_eq!(app.view.status, StatusIndicator::Absent);
    }

    #[test]
    fn test_save_dir_selection() {
        let mut app = desktop_app();
        let _ = update(
            &mut app,
            Message::SaveDirSelected(Some(PathBuf::from("/tmp/pictures"))),
        );
        assert_eq!(app.view.save_dir, PathBuf::from("/tmp/pictures"));

        let _ = update(&mut app, Message::SaveDirSelected(None));
        assert_eq!(app.view.save_dir, PathBuf::from("/tmp/pictures"));
    }
}
