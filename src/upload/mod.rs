//! Upload orchestration
//!
//! Drives one avatar through packaging, authorization and the five API
//! calls of the upload protocol, reporting progress per phase. Any failure
//! aborts the sequence; nothing is retried or rolled back.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::auth::{TokenStore, ensure_valid_token};
use crate::avatar::{AvatarPackager, PackagedAvatar};
use crate::client::models::UserProfile;
use crate::client::{AvalabApi, ProgressFn};
use crate::error::{Error, Result};

/// Step of the upload sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Packaging,
    Authorizing,
    Preparing,
    UploadingModel,
    UploadingThumbnail,
    Completing,
    Registering,
    RefreshingProfile,
    Done,
    Failed,
}

impl Phase {
    /// Lowercase activity, used in error messages ("failed while ...")
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "starting",
            Phase::Packaging => "packaging the avatar",
            Phase::Authorizing => "checking authorization",
            Phase::Preparing => "preparing the upload",
            Phase::UploadingModel => "uploading the model",
            Phase::UploadingThumbnail => "uploading the thumbnail",
            Phase::Completing => "completing the upload",
            Phase::Registering => "registering the avatar",
            Phase::RefreshingProfile => "refreshing the profile",
            Phase::Done => "finishing",
            Phase::Failed => "reporting a failure",
        }
    }

    /// Short title for progress displays
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Packaging => "Packaging avatar",
            Phase::Authorizing => "Checking authorization",
            Phase::Preparing => "Preparing upload",
            Phase::UploadingModel => "Uploading model",
            Phase::UploadingThumbnail => "Uploading thumbnail",
            Phase::Completing => "Completing upload",
            Phase::Registering => "Registering avatar",
            Phase::RefreshingProfile => "Refreshing profile",
            Phase::Done => "Upload complete",
            Phase::Failed => "Upload failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Progress event. `fraction` restarts at 0 for every phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UploadProgress {
    pub phase: Phase,
    pub label: &'static str,
    pub fraction: f32,
}

impl UploadProgress {
    fn new(phase: Phase, fraction: f32) -> Self {
        Self {
            phase,
            label: phase.title(),
            fraction,
        }
    }
}

/// State of one upload sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSession {
    pub avatar_id: Option<String>,
    pub upload_url: Option<String>,
    pub thumbnail_upload_url: Option<String>,
    pub model_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub current_step: Phase,
    pub progress: f32,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self {
            avatar_id: None,
            upload_url: None,
            thumbnail_upload_url: None,
            model_path: None,
            thumbnail_path: None,
            current_step: Phase::Idle,
            progress: 0.0,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub avatar_id: String,
    pub avatar: PackagedAvatar,
    pub profile: UserProfile,
    pub session: UploadSession,
}

/// Runs the upload sequence against an API client and token store
pub struct UploadOrchestrator<'a> {
    client: &'a dyn AvalabApi,
    tokens: &'a TokenStore,
    events: Option<UnboundedSender<UploadProgress>>,
    cancel: CancellationToken,
    session: Arc<Mutex<UploadSession>>,
}

impl<'a> UploadOrchestrator<'a> {
    pub fn new(client: &'a dyn AvalabApi, tokens: &'a TokenStore) -> Self {
        Self {
            client,
            tokens,
            events: None,
            cancel: CancellationToken::new(),
            session: Arc::new(Mutex::new(UploadSession::default())),
        }
    }

    /// Send progress events to `events`
    pub fn with_progress(mut self, events: UnboundedSender<UploadProgress>) -> Self {
        self.events = Some(events);
        self
    }

    /// Abort the sequence when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Snapshot of the current (or last) sequence, including the step it
    /// stopped in and how far that step got
    pub fn session(&self) -> UploadSession {
        lock(&self.session).clone()
    }

    /// Package and upload one avatar.
    ///
    /// Failures are returned as [`Error::Upload`] tagged with the phase they
    /// happened in, except cancellation which is [`Error::Cancelled`].
    pub async fn run(&self, packager: &dyn AvatarPackager) -> Result<UploadOutcome> {
        *lock(&self.session) = UploadSession::default();

        match self.drive(packager).await {
            Ok(outcome) => {
                self.emit(UploadProgress::new(Phase::Done, 1.0));
                log::info!("Uploaded avatar {}", outcome.avatar_id);
                Ok(outcome)
            }
            Err(err) => {
                let phase = lock(&self.session).current_step;
                self.emit(UploadProgress::new(Phase::Failed, 1.0));
                match err {
                    Error::Cancelled => {
                        log::info!("Upload cancelled while {}", phase.label());
                        Err(Error::Cancelled)
                    }
                    err => {
                        log::error!("Upload failed while {}: {}", phase.label(), err);
                        Err(Error::Upload {
                            phase,
                            source: Box::new(err),
                        })
                    }
                }
            }
        }
    }

    async fn drive(&self, packager: &dyn AvatarPackager) -> Result<UploadOutcome> {
        self.enter(Phase::Packaging)?;
        let avatar = self.step(packager.package()).await?;
        self.update(|session| {
            session.model_path = Some(avatar.model_path.clone());
            session.thumbnail_path = Some(avatar.thumbnail_path.clone());
        });

        self.enter(Phase::Authorizing)?;
        let token = self.step(ensure_valid_token(self.client, self.tokens)).await?;
        let access_token = token.access_token.as_str();

        self.enter(Phase::Preparing)?;
        let prepared = self
            .step(
                self.client
                    .prepare_avatar(access_token, self.progress_for(Phase::Preparing)),
            )
            .await?;
        log::debug!("Prepared avatar {}", prepared.avatar_id);
        self.update(|session| {
            session.avatar_id = Some(prepared.avatar_id.clone());
            session.upload_url = Some(prepared.upload_url.clone());
            session.thumbnail_upload_url = Some(prepared.thumbnail_upload_url.clone());
        });

        self.enter(Phase::UploadingModel)?;
        self.step(self.client.upload_model(
            access_token,
            &prepared.upload_url,
            &avatar.model_path,
            self.progress_for(Phase::UploadingModel),
        ))
        .await?;

        self.enter(Phase::UploadingThumbnail)?;
        self.step(self.client.upload_thumbnail(
            access_token,
            &prepared.thumbnail_upload_url,
            &avatar.thumbnail_path,
            self.progress_for(Phase::UploadingThumbnail),
        ))
        .await?;

        self.enter(Phase::Completing)?;
        self.step(self.client.complete_avatar(
            access_token,
            &prepared.avatar_id,
            self.progress_for(Phase::Completing),
        ))
        .await?;

        self.enter(Phase::Registering)?;
        self.step(self.client.register_lora(
            access_token,
            &prepared.avatar_id,
            self.progress_for(Phase::Registering),
        ))
        .await?;

        self.enter(Phase::RefreshingProfile)?;
        let profile = self
            .step(
                self.client
                    .current_user(access_token, self.progress_for(Phase::RefreshingProfile)),
            )
            .await?;

        self.update(|session| {
            session.current_step = Phase::Done;
            session.progress = 1.0;
        });

        Ok(UploadOutcome {
            avatar_id: prepared.avatar_id,
            avatar,
            profile,
            session: self.session(),
        })
    }

    /// Record a transition and report it with progress 0
    fn enter(&self, phase: Phase) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.update(|session| {
            log::debug!("{} -> {}", session.current_step.title(), phase.title());
            session.current_step = phase;
            session.progress = 0.0;
        });
        self.emit(UploadProgress::new(phase, 0.0));
        Ok(())
    }

    /// Await `fut` unless the sequence is cancelled first
    async fn step<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }

    fn update(&self, f: impl FnOnce(&mut UploadSession)) {
        f(&mut lock(&self.session));
    }

    /// Callback recording `phase` progress in the session and forwarding it
    fn progress_for(&self, phase: Phase) -> Option<ProgressFn> {
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        Some(Arc::new(move |fraction: f32| {
            {
                let mut session = lock(&session);
                // A late report from a finished step must not touch the next one
                if session.current_step == phase {
                    session.progress = fraction;
                }
            }
            if let Some(events) = &events {
                let _ = events.send(UploadProgress::new(phase, fraction));
            }
        }))
    }

    fn emit(&self, progress: UploadProgress) {
        if let Some(events) = &self.events {
            let _ = events.send(progress);
        }
    }
}

/// Progress values stay usable even if a callback panicked mid-update
fn lock(session: &Mutex<UploadSession>) -> MutexGuard<'_, UploadSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
