use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{
    future::BoxFuture,
    stream::{BoxStream, FuturesUnordered},
    FutureExt, StreamExt,
};

use super::pipeline::{ImagePipeline, ImageSource, JPEG_QUALITY};
use super::save::{SaveStrategy, ShareSurface, TermuxShare};
use crate::{
    api::{ImageRef, PageClient},
    domain::{AppError, ImageTask, PlatformClass, ProgressState, RunEvent, RunOutcome, TaskOutcome},
    utils::{derive_prefix, image_filename},
};

/// Per-run knobs
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Gap between the start of consecutive tasks.
    pub stagger_interval: Duration,
    pub jpeg_quality: u8,
    /// Share helper used on Android.
    pub share_program: String,
    /// Files handed to the share helper live here until the next run.
    pub share_spool_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            stagger_interval: Duration::from_millis(100),
            jpeg_quality: JPEG_QUALITY,
            share_program: "termux-share".to_string(),
            share_spool_dir: std::env::temp_dir().join("page-image-saver-share"),
        }
    }
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    client: PageClient,
    settings: RunSettings,
    images: Arc<dyn ImageSource>,
    share: Arc<dyn ShareSurface>,
}

impl DownloadCoordinator {
    pub fn new(client: PageClient, settings: RunSettings) -> Self {
        let images: Arc<dyn ImageSource> = Arc::new(client.clone());
        let share: Arc<dyn ShareSurface> = Arc::new(TermuxShare::new(
            settings.share_program.clone(),
            settings.share_spool_dir.clone(),
        ));
        Self {
            client,
            settings,
            images,
            share,
        }
    }

    #[cfg(test)]
    pub fn with_image_source(mut self, images: Arc<dyn ImageSource>) -> Self {
        self.images = images;
        self
    }

    #[cfg(test)]
    pub fn with_share_surface(mut self, share: Arc<dyn ShareSurface>) -> Self {
        self.share = share;
        self
    }

    /// Platform class of the configured user agent.
    pub fn platform(&self) -> PlatformClass {
        PlatformClass::classify(&self.client.config().user_agent)
    }

    /// Discover the page's images and save every one of them into `save_dir`.
    pub fn run(&self, page_url: String, save_dir: PathBuf) -> BoxStream<'static, RunEvent> {
        self.stream(page_url, save_dir, None)
    }

    /// Like [`run`](Self::run) with an already discovered image set.
    #[cfg(test)]
    pub fn run_with_images(
        &self,
        page_url: String,
        save_dir: PathBuf,
        images: Vec<ImageRef>,
    ) -> BoxStream<'static, RunEvent> {
        self.stream(page_url, save_dir, Some(images))
    }

    fn stream(
        &self,
        page_url: String,
        save_dir: PathBuf,
        images: Option<Vec<ImageRef>>,
    ) -> BoxStream<'static, RunEvent> {
        futures::stream::unfold(
            RunState::Start {
                coordinator: self.clone(),
                page_url,
                save_dir,
                images,
            },
            |state| async move {
                match state {
                    RunState::Start {
                        coordinator,
                        page_url,
                        save_dir,
                        images,
                    } => {
                        let images = match images {
                            Some(images) => images,
                            None => match coordinator.client.discover(&page_url).await {
                                Ok(images) => images,
                                Err(e) => {
                                    tracing::warn!(page = %page_url, error = %e, "page discovery failed");
                                    return Some((
                                        RunEvent::Finished(RunOutcome::PageUnavailable(
                                            AppError::Api(e.to_string()),
                                        )),
                                        RunState::Finished,
                                    ));
                                }
                            },
                        };

                        if images.is_empty() {
                            tracing::info!(page = %page_url, "no images found");
                            return Some((
                                RunEvent::Finished(RunOutcome::NoImages),
                                RunState::Finished,
                            ));
                        }

                        let platform = coordinator.platform();
                        if platform == PlatformClass::Android {
                            if let Err(e) = coordinator.share.begin_run().await {
                                tracing::warn!(error = %e, "could not clear share spool");
                            }
                        }

                        Some(coordinator.begin(&page_url, save_dir, images, platform))
                    }
                    RunState::Running {
                        mut pending,
                        mut progress,
                    } => match pending.next().await {
                        Some(outcome) => {
                            progress.record(&outcome);
                            Some((
                                RunEvent::Progress(progress),
                                RunState::Running { pending, progress },
                            ))
                        }
                        None => {
                            let outcome = progress.outcome();
                            tracing::info!(
                                processed = progress.processed,
                                failed = progress.failed,
                                total = progress.total,
                                "run finished"
                            );
                            Some((RunEvent::Finished(outcome), RunState::Finished))
                        }
                    },
                    RunState::Finished => None,
                }
            },
        )
        .boxed()
    }

    /// Name every image, then fan the tasks out with staggered starts.
    fn begin(
        &self,
        page_url: &str,
        save_dir: PathBuf,
        images: Vec<ImageRef>,
        platform: PlatformClass,
    ) -> (RunEvent, RunState) {
        let prefix = derive_prefix(page_url);
        let tasks = plan_tasks(&prefix, images);
        let total = tasks.len();

        tracing::info!(page = %page_url, total, %prefix, ?platform, "starting run");

        let saver = SaveStrategy::for_platform(platform, save_dir, self.share.clone(), &prefix);
        let pipeline = Arc::new(ImagePipeline::new(
            self.images.clone(),
            saver,
            self.settings.jpeg_quality,
            self.client.config().load_timeout,
        ));

        let interval = self.settings.stagger_interval;
        let pending = tasks
            .into_iter()
            .map(|task| {
                let pipeline = pipeline.clone();
                async move {
                    tokio::time::sleep(start_delay(task.index, interval)).await;
                    pipeline.process(task).await
                }
                .boxed()
            })
            .collect();

        (
            RunEvent::Started {
                total,
                prefix,
                platform,
            },
            RunState::Running {
                pending,
                progress: ProgressState::new(total),
            },
        )
    }
}

enum RunState {
    Start {
        coordinator: DownloadCoordinator,
        page_url: String,
        save_dir: PathBuf,
        images: Option<Vec<ImageRef>>,
    },
    Running {
        pending: FuturesUnordered<BoxFuture<'static, TaskOutcome>>,
        progress: ProgressState,
    },
    Finished,
}

pub fn plan_tasks(prefix: &str, images: Vec<ImageRef>) -> Vec<ImageTask> {
    images
        .into_iter()
        .enumerate()
        .map(|(index, image)| ImageTask {
            index,
            filename: image_filename(prefix, index, &image.source),
            source: image.source,
        })
        .collect()
}

pub fn start_delay(index: usize, interval: Duration) -> Duration {
    interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}
