//! Interactive password acquisition.
//!
//! The manager sits between callers that need a lock opened (or created) and
//! a [`DialogController`] that can ask a human for a password. Before it
//! prompts, it asks the [`PasswordCache`] whether the lock has been opened
//! before or whether any known password fits.
//!
//! # Retry Loop
//!
//! ```text
//! create_dialog(source, need_confirm)
//!        │
//!        ▼
//! ┌─► show_dialog() ── false ─────────────► InvalidPassword
//! │      │ true
//! │      ▼
//! │   processor(password) ── Ok ──────────► done
//! │      │ BadCredentials    └─ other Err ─► propagate
//! │      ▼
//! └── report_bad_password()
//!
//! on every exit: password buffer wiped, release_dialog()
//! ```
//!
//! The dialog session is a drop guard, so the wipe and release also happen
//! on `?` early returns and during unwinding.

use std::{fmt, num::NonZeroU32};

use sealwright_crypto::{Environment, Factory, KeyPair, KeySet};
use zeroize::Zeroize;

use crate::{
    cache::PasswordCache,
    error::LockError,
    factory::LockFactory,
    lock::{Lock, Lockable},
    spec::PasswordLockSpec,
};

/// Password bytes typed into a dialog.
///
/// Wiped on drop. The manager also wipes it after every attempt.
#[derive(Default)]
pub struct PasswordBuffer {
    bytes: Vec<u8>,
}

impl PasswordBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents, wiping what was there.
    pub fn set(&mut self, password: &[u8]) {
        self.bytes.zeroize();
        self.bytes.extend_from_slice(password);
    }

    /// Current contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True if nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zero the contents in place and empty the buffer.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }

    /// True if the buffer holds no password material.
    pub fn is_wiped(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for PasswordBuffer {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for PasswordBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordBuffer").field("len", &self.bytes.len()).finish()
    }
}

/// A password prompt supplied by the application.
///
/// Calls arrive in a fixed order: `create_dialog`, then any number of
/// `show_dialog` rounds (each possibly followed by `report_bad_password`),
/// then exactly one `release_dialog`.
pub trait DialogController {
    /// Prepare a prompt for `source`. `need_confirm` asks for the password
    /// to be typed twice, as when creating a new lock.
    fn create_dialog(&mut self, source: &str, need_confirm: bool);

    /// Show the prompt and block until the user answers. Returns `false` if
    /// the user cancelled.
    fn show_dialog(&mut self) -> bool;

    /// Buffer holding the password from the last `show_dialog`.
    fn password(&mut self) -> &mut PasswordBuffer;

    /// Tell the user the last password was wrong.
    fn report_bad_password(&mut self);

    /// Tear the prompt down.
    fn release_dialog(&mut self);
}

/// Open dialog; wipes the password and releases the dialog when dropped.
struct DialogSession<'a, D: DialogController + ?Sized> {
    dialog: &'a mut D,
}

impl<'a, D: DialogController + ?Sized> DialogSession<'a, D> {
    fn open(dialog: &'a mut D, source: &str, need_confirm: bool) -> Self {
        dialog.create_dialog(source, need_confirm);
        Self { dialog }
    }
}

impl<D: DialogController + ?Sized> Drop for DialogSession<'_, D> {
    fn drop(&mut self) {
        self.dialog.password().wipe();
        self.dialog.release_dialog();
    }
}

/// How many times the user may be asked before giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<NonZeroU32>,
}

impl RetryPolicy {
    /// Ask until the user cancels.
    pub fn unlimited() -> Self {
        Self { max_attempts: None }
    }

    /// Ask at most `max_attempts` times.
    pub fn with_max_attempts(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts: Some(max_attempts) }
    }

    /// Attempt limit, `None` if unlimited.
    pub fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    /// True if another attempt is allowed after `attempts_made`.
    pub fn allows(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts_made < max.get())
    }

    /// Run the prompt loop until `processor` accepts a password.
    ///
    /// Bad credentials are reported to the dialog and the user is asked
    /// again; any other error ends the loop immediately.
    ///
    /// # Errors
    ///
    /// - `InvalidPassword` if the user cancels or attempts run out
    /// - whatever non-credential error `processor` returns
    pub fn run<D, T, F>(
        &self,
        dialog: &mut D,
        source: &str,
        need_confirm: bool,
        mut processor: F,
    ) -> Result<T, LockError>
    where
        D: DialogController + ?Sized,
        F: FnMut(&[u8]) -> Result<T, LockError>,
    {
        let session = DialogSession::open(dialog, source, need_confirm);
        let mut attempts = 0u32;

        while self.allows(attempts) && session.dialog.show_dialog() {
            attempts += 1;

            let outcome = processor(session.dialog.password().as_bytes());
            session.dialog.password().wipe();

            match outcome {
                Ok(value) => {
                    tracing::debug!(source, attempts, "password accepted");
                    return Ok(value);
                },
                Err(err) if err.is_bad_credentials() => {
                    tracing::warn!(source, attempts, "bad password");
                    session.dialog.report_bad_password();
                },
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(source, attempts, "password entry abandoned");
        Err(LockError::InvalidPassword { reason: format!("no password supplied for {source}") })
    }
}

/// Password manager settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasswordManagerConfig {
    /// Spec for locks created through the manager
    pub lock_spec: PasswordLockSpec,
    /// Prompt retry policy
    pub retry: RetryPolicy,
}

/// Creates and resolves locks, prompting only when the cache cannot help.
///
/// Blocks while a dialog is open and is not reentrant.
pub struct PasswordManager<E: Environment, D: DialogController> {
    cache: PasswordCache<E>,
    dialog: D,
    config: PasswordManagerConfig,
}

impl<E: Environment, D: DialogController> PasswordManager<E, D> {
    /// Create a manager over an existing cache.
    pub fn new(cache: PasswordCache<E>, dialog: D, config: PasswordManagerConfig) -> Self {
        Self { cache, dialog, config }
    }

    /// Create a manager with a fresh cache over `factory`.
    pub fn with_factory(
        factory: LockFactory<E>,
        dialog: D,
        config: PasswordManagerConfig,
    ) -> Result<Self, LockError> {
        Ok(Self::new(PasswordCache::new(factory)?, dialog, config))
    }

    /// Password cache.
    pub fn cache(&self) -> &PasswordCache<E> {
        &self.cache
    }

    /// Mutable password cache.
    pub fn cache_mut(&mut self) -> &mut PasswordCache<E> {
        &mut self.cache
    }

    /// Dialog controller.
    pub fn dialog(&self) -> &D {
        &self.dialog
    }

    /// Mutable dialog controller.
    pub fn dialog_mut(&mut self) -> &mut D {
        &mut self.dialog
    }

    /// Active settings.
    pub fn config(&self) -> &PasswordManagerConfig {
        &self.config
    }

    /// Prompt for a password and hand it to `processor` until it succeeds.
    ///
    /// See [`RetryPolicy::run`].
    pub fn request_password<T, F>(
        &mut self,
        source: &str,
        need_confirm: bool,
        processor: F,
    ) -> Result<T, LockError>
    where
        F: FnMut(&[u8]) -> Result<T, LockError>,
    {
        self.config.retry.run(&mut self.dialog, source, need_confirm, processor)
    }

    /// Lock `payload` under a newly entered (and confirmed) password.
    pub fn new_lock<T: Lockable>(&mut self, payload: &T, source: &str) -> Result<Lock, LockError> {
        let Self { cache, dialog, config } = self;
        let spec = config.lock_spec;

        config.retry.run(dialog, source, true, |password| cache.new_lock(payload, spec, password))
    }

    /// Open a lock: cached payload, then known passwords, then the prompt.
    pub fn resolve_lock<T: Lockable>(
        &mut self,
        lock_bytes: &[u8],
        source: &str,
    ) -> Result<T, LockError> {
        if let Some(payload) = self.cache.attempt_known_passwords(lock_bytes)? {
            return Ok(payload);
        }

        let Self { cache, dialog, config } = self;
        config.retry.run(dialog, source, false, |password| cache.resolve_lock(lock_bytes, password))
    }

    /// Lock `payload` with the same password as `reference_lock_bytes`.
    ///
    /// Uses the cached password if the reference was resolved before;
    /// otherwise prompts for the reference's password and checks it against
    /// the reference before using it.
    pub fn similar_lock<T: Lockable>(
        &mut self,
        payload: &T,
        reference_lock_bytes: &[u8],
        source: &str,
    ) -> Result<Lock, LockError> {
        let spec = self.config.lock_spec;
        if let Some(lock) = self.cache.create_similar(payload, reference_lock_bytes, spec)? {
            return Ok(lock);
        }

        let Self { cache, dialog, config } = self;
        config.retry.run(dialog, source, false, |password| {
            cache.factory().verify_password(reference_lock_bytes, password)?;
            cache.new_lock(payload, spec, password)
        })
    }

    /// Lock a factory.
    pub fn new_factory_lock(&mut self, payload: &Factory, source: &str) -> Result<Lock, LockError> {
        self.new_lock(payload, source)
    }

    /// Lock a keyset.
    pub fn new_key_set_lock(&mut self, payload: &KeySet, source: &str) -> Result<Lock, LockError> {
        self.new_lock(payload, source)
    }

    /// Lock a keypair.
    pub fn new_key_pair_lock(
        &mut self,
        payload: &KeyPair,
        source: &str,
    ) -> Result<Lock, LockError> {
        self.new_lock(payload, source)
    }

    /// Resolve a factory lock.
    pub fn resolve_factory_lock(
        &mut self,
        lock_bytes: &[u8],
        source: &str,
    ) -> Result<Factory, LockError> {
        self.resolve_lock(lock_bytes, source)
    }

    /// Resolve a keyset lock.
    pub fn resolve_key_set_lock(
        &mut self,
        lock_bytes: &[u8],
        source: &str,
    ) -> Result<KeySet, LockError> {
        self.resolve_lock(lock_bytes, source)
    }

    /// Resolve a keypair lock.
    pub fn resolve_key_pair_lock(
        &mut self,
        lock_bytes: &[u8],
        source: &str,
    ) -> Result<KeyPair, LockError> {
        self.resolve_lock(lock_bytes, source)
    }

    /// Lock a factory with a reference lock's password.
    pub fn similar_factory_lock(
        &mut self,
        payload: &Factory,
        reference_lock_bytes: &[u8],
        source: &str,
    ) -> Result<Lock, LockError> {
        self.similar_lock(payload, reference_lock_bytes, source)
    }

    /// Lock a keyset with a reference lock's password.
    pub fn similar_key_set_lock(
        &mut self,
        payload: &KeySet,
        reference_lock_bytes: &[u8],
        source: &str,
    ) -> Result<Lock, LockError> {
        self.similar_lock(payload, reference_lock_bytes, source)
    }

    /// Lock a keypair with a reference lock's password.
    pub fn similar_key_pair_lock(
        &mut self,
        payload: &KeyPair,
        reference_lock_bytes: &[u8],
        source: &str,
    ) -> Result<Lock, LockError> {
        self.similar_lock(payload, reference_lock_bytes, source)
    }
}

/// Scripted dialogs for tests and non-interactive tooling.
pub mod test_utils {
    use std::collections::VecDeque;

    use super::{DialogController, PasswordBuffer};

    /// Dialog that answers from a script and records every call.
    ///
    /// Each scripted answer is one `show_dialog` round; `None` (or running
    /// out of answers) is a cancel.
    #[derive(Debug, Default)]
    pub struct ScriptedDialog {
        answers: VecDeque<Option<Vec<u8>>>,
        buffer: PasswordBuffer,
        /// `(source, need_confirm)` for every `create_dialog`
        pub created: Vec<(String, bool)>,
        /// Number of `show_dialog` calls
        pub shown: usize,
        /// Number of `report_bad_password` calls
        pub bad_password_reports: usize,
        /// Number of `release_dialog` calls
        pub released: usize,
        /// Times the buffer still held a password when it was next touched
        pub unwiped_buffers: usize,
    }

    impl ScriptedDialog {
        /// Dialog that answers `passwords` in order, then cancels.
        pub fn answering<I, P>(passwords: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: AsRef<[u8]>,
        {
            Self {
                answers: passwords.into_iter().map(|p| Some(p.as_ref().to_vec())).collect(),
                ..Self::default()
            }
        }

        /// Dialog that cancels immediately.
        pub fn cancelling() -> Self {
            Self::default()
        }

        /// Queue another answer.
        pub fn push_answer(&mut self, password: &[u8]) {
            self.answers.push_back(Some(password.to_vec()));
        }

        /// Queue a cancel.
        pub fn push_cancel(&mut self) {
            self.answers.push_back(None);
        }

        /// True if the password buffer holds nothing now.
        pub fn buffer_is_wiped(&self) -> bool {
            self.buffer.is_wiped()
        }

        /// Number of answers not yet consumed.
        pub fn remaining_answers(&self) -> usize {
            self.answers.len()
        }

        fn note_buffer(&mut self) {
            if !self.buffer.is_wiped() {
                self.unwiped_buffers += 1;
            }
        }
    }

    impl DialogController for ScriptedDialog {
        fn create_dialog(&mut self, source: &str, need_confirm: bool) {
            self.created.push((source.to_string(), need_confirm));
        }

        fn show_dialog(&mut self) -> bool {
            self.shown += 1;
            self.note_buffer();

            match self.answers.pop_front().flatten() {
                Some(password) => {
                    self.buffer.set(&password);
                    true
                },
                None => false,
            }
        }

        fn password(&mut self) -> &mut PasswordBuffer {
            &mut self.buffer
        }

        fn report_bad_password(&mut self) {
            self.bad_password_reports += 1;
        }

        fn release_dialog(&mut self) {
            self.released += 1;
            self.note_buffer();
        }
    }
}
