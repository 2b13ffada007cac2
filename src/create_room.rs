//! The create-room workflow.
//!
//! `CreateRoom` owns everything one open "Create room" dialog knows: the form
//! fields, what we've learned about the chosen address, and whether a
//! creation request is in flight. It never blocks: the alias check timer,
//! the availability query and the create call all run as spawned tasks that
//! report back through the dialog's own channel as `DialogEvent`s. The owner
//! (the event loop) awaits `next_event()` and hands each one to
//! `handle_event()`.
//!
//! The dialog finishes when the room directory announces a new room, not when
//! the create call returns: the two can arrive in either order, and only the
//! announcement means the room is actually usable.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::alias::{AddressStatus, AliasChecker, CheckEvent, ValidityState};
use crate::error::{LocalValidationError, SubmitError};
use crate::service::{
    CreateRoomRequest, RoomCreatedSubscription, RoomDirectory, RoomId, RoomService, ServiceError,
};

/// Power level given to a creator who picks the Founder role, one above the
/// service's default of 100.
pub const FOUNDER_POWER_LEVEL: i64 = 101;

// ── Form state ───────────────────────────────────────────────────────────────

/// The text fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Topic,
    Address,
}

/// The creator's role in the new room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Keep the service's default power level.
    #[default]
    Admin,
    /// Take `FOUNDER_POWER_LEVEL`.
    Founder,
}

impl Role {
    pub fn power_level_override(self) -> Option<i64> {
        match self {
            Role::Admin => None,
            Role::Founder => Some(FOUNDER_POWER_LEVEL),
        }
    }
}

/// Everything the user has entered.
///
/// Text fields are `None` whenever their trimmed value is empty. That rule is
/// applied by `normalize` on every edit, so nothing downstream ever sees a
/// whitespace-only name, topic or address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub title: Option<String>,
    pub topic: Option<String>,
    pub is_public: bool,
    pub is_encrypted: bool,
    pub address: Option<String>,
    pub role: Role,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            title: None,
            topic: None,
            is_public: false,
            // Encryption is on unless the user turns it off.
            is_encrypted: true,
            address: None,
            role: Role::Admin,
        }
    }
}

fn normalize(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Where the create request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    /// The service failed in a way we couldn't classify.
    Failed,
}

// ── Events and outcomes ──────────────────────────────────────────────────────

/// Messages delivered to an open dialog by its background tasks and by the
/// room directory.
#[derive(Debug)]
pub enum DialogEvent {
    AliasCheck(CheckEvent),
    /// The create call returned.
    CreateFinished(Result<(), ServiceError>),
    /// A room appeared in the directory.
    RoomCreated(RoomId),
}

/// Lets the alias checker send straight into the dialog's channel.
impl From<CheckEvent> for DialogEvent {
    fn from(event: CheckEvent) -> Self {
        DialogEvent::AliasCheck(event)
    }
}

/// How an open dialog ended. The caller closes the dialog in both cases and,
/// for `Created`, selects the new room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Created(RoomId),
    Cancelled,
}

/// What `submit()` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAttempt {
    /// A create request is now in flight.
    Started,
    /// One was already in flight; nothing happened.
    AlreadySubmitting,
    /// The form isn't ready; nothing was sent.
    Rejected(LocalValidationError),
}

// ── Controller ───────────────────────────────────────────────────────────────

/// One open create-room dialog.
pub struct CreateRoom {
    form: FormState,
    validity: ValidityState,
    submission: SubmissionState,
    error: Option<SubmitError>,
    /// Set once the dialog has completed; later notifications are ignored.
    finished: bool,

    checker: AliasChecker,
    service: Arc<dyn RoomService>,
    tx: mpsc::Sender<DialogEvent>,
    rx: mpsc::Receiver<DialogEvent>,
    /// Dropped together with the dialog, which unsubscribes it.
    created: RoomCreatedSubscription,
}

impl CreateRoom {
    /// Open a fresh dialog. `server_name` is the part after the `:` in the
    /// user's ID; aliases are checked as `#<address>:<server_name>`.
    pub fn open(
        service: Arc<dyn RoomService>,
        directory: &RoomDirectory,
        server_name: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            form: FormState::default(),
            validity: ValidityState::default(),
            submission: SubmissionState::Idle,
            error: None,
            finished: false,
            checker: AliasChecker::new(server_name),
            service,
            tx,
            rx,
            created: directory.subscribe(),
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn validity(&self) -> &ValidityState {
        &self.validity
    }

    pub fn submission(&self) -> SubmissionState {
        self.submission
    }

    /// The error to show under the form, if any.
    pub fn error(&self) -> Option<&SubmitError> {
        self.error.as_ref()
    }

    pub fn full_alias(&self, address: &str) -> String {
        self.checker.full_alias(address)
    }

    /// Whether the create button should be enabled.
    pub fn can_submit(&self) -> bool {
        self.submission != SubmissionState::Submitting
            && !(self.form.is_public && self.validity.status == AddressStatus::Invalid)
    }

    // ── Editing ──────────────────────────────────────────────────────────

    /// Store a new value for a text field.
    ///
    /// Editing the address also forgets the previous verdict and any error
    /// shown for it, and schedules a fresh availability check.
    pub fn edit_field(&mut self, field: Field, value: &str) {
        let value = normalize(value);
        match field {
            Field::Title => self.form.title = value,
            Field::Topic => self.form.topic = value,
            Field::Address => {
                self.form.address = value;
                self.validity = ValidityState::default();
                self.error = None;
                self.checker.schedule(self.form.address.as_deref(), &self.tx);
            }
        }
    }

    /// Making the room public turns encryption back on.
    pub fn set_public(&mut self, is_public: bool) {
        self.form.is_public = is_public;
        if is_public {
            self.form.is_encrypted = true;
        }
    }

    /// Toggle encryption. Public rooms can't turn it off, so this is ignored
    /// while the room is public.
    pub fn set_encrypted(&mut self, is_encrypted: bool) {
        if !self.form.is_public {
            self.form.is_encrypted = is_encrypted;
        }
    }

    pub fn set_role(&mut self, role: Role) {
        self.form.role = role;
    }

    // ── Submitting ───────────────────────────────────────────────────────

    /// Send the create request, unless one is in flight or the form isn't
    /// ready.
    pub fn submit(&mut self) -> SubmitAttempt {
        if self.submission == SubmissionState::Submitting {
            return SubmitAttempt::AlreadySubmitting;
        }
        let request = match self.build_request() {
            Ok(request) => request,
            Err(reason) => {
                tracing::debug!(%reason, "create room rejected locally");
                self.error = Some(reason.into());
                return SubmitAttempt::Rejected(reason);
            }
        };

        tracing::info!(
            name = %request.name,
            public = request.is_public,
            alias = ?request.alias,
            "creating room"
        );
        self.submission = SubmissionState::Submitting;
        self.error = None;

        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = service.create_room(request).await;
            let _ = tx.send(DialogEvent::CreateFinished(result)).await;
        });
        SubmitAttempt::Started
    }

    fn build_request(&self) -> Result<CreateRoomRequest, LocalValidationError> {
        let name = self
            .form
            .title
            .clone()
            .ok_or(LocalValidationError::MissingName)?;
        if self.form.is_public && self.validity.status == AddressStatus::Invalid {
            return Err(LocalValidationError::AddressUnavailable);
        }
        Ok(CreateRoomRequest {
            name,
            topic: self.form.topic.clone(),
            is_public: self.form.is_public,
            alias: if self.form.is_public {
                self.form.address.clone()
            } else {
                None
            },
            is_encrypted: self.form.is_encrypted,
            power_level_override: self.form.role.power_level_override(),
        })
    }

    fn finish_create(&mut self, result: Result<(), ServiceError>) {
        // The room may already have been announced and the form reset.
        if self.submission != SubmissionState::Submitting {
            return;
        }
        let Err(err) = result else {
            // Accepted; stay in Submitting until the room shows up.
            return;
        };

        let classified = SubmitError::classify(&err);
        if classified.invalidates_alias() {
            tracing::info!(error = %err, "room address rejected by server");
            self.validity = ValidityState::invalid(classified.to_string());
            self.submission = SubmissionState::Idle;
        } else {
            tracing::warn!(error = %err, "room creation failed");
            self.submission = SubmissionState::Failed;
        }
        self.error = Some(classified);
    }

    // ── Completion ───────────────────────────────────────────────────────

    /// A room now exists. Resets the dialog and reports completion; once the
    /// dialog has completed, further calls change nothing.
    pub fn on_room_created(&mut self, room_id: RoomId) -> Option<DialogOutcome> {
        self.reset();
        if self.finished {
            return None;
        }
        self.finished = true;
        tracing::info!(%room_id, "create room dialog completed");
        Some(DialogOutcome::Created(room_id))
    }

    /// Close without creating anything.
    pub fn cancel(&mut self) -> DialogOutcome {
        self.reset();
        DialogOutcome::Cancelled
    }

    fn reset(&mut self) {
        self.checker.cancel();
        self.form = FormState::default();
        self.validity = ValidityState::default();
        self.submission = SubmissionState::Idle;
        self.error = None;
    }

    // ── Event plumbing ───────────────────────────────────────────────────

    /// Wait for the next thing that happened to this dialog.
    pub async fn next_event(&mut self) -> DialogEvent {
        // Both branches borrow different fields of `self`, which the borrow
        // checker allows.
        tokio::select! {
            Some(event) = self.rx.recv() => event,
            room_id = self.created.recv() => DialogEvent::RoomCreated(room_id),
        }
    }

    /// Apply an event from `next_event`. Returns the outcome if the dialog is
    /// done.
    pub fn handle_event(&mut self, event: DialogEvent) -> Option<DialogOutcome> {
        match event {
            DialogEvent::AliasCheck(CheckEvent::Due(request)) => {
                if self.checker.is_current(&request, self.form.address.as_deref()) {
                    tracing::debug!(
                        address = %request.address,
                        waited_ms = request.scheduled_at.elapsed().as_millis() as u64,
                        "alias check due"
                    );
                    self.checker.query(request, Arc::clone(&self.service), &self.tx);
                } else {
                    tracing::debug!(address = %request.address, "stale alias check discarded");
                }
                None
            }
            DialogEvent::AliasCheck(CheckEvent::Answered { request, result }) => {
                if self.checker.is_current(&request, self.form.address.as_deref()) {
                    let alias = self.checker.full_alias(&request.address);
                    self.validity = ValidityState::from_answer(&alias, &result);
                    tracing::debug!(%alias, status = ?self.validity.status, "alias checked");
                } else {
                    tracing::debug!(address = %request.address, "stale alias answer discarded");
                }
                None
            }
            DialogEvent::CreateFinished(result) => {
                self.finish_create(result);
                None
            }
            DialogEvent::RoomCreated(room_id) => self.on_room_created(room_id),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
