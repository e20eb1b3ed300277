//! Test utilities for the platform-kit crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for `cfg(test)` and behind the `test-support` feature.

use chrono::{DateTime, Local, Utc};
use mockable::Clock;

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixtureClock(DateTime<Utc>);

impl FixtureClock {
    /// Freeze time at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub mod cap_fs {
    //! Capability-safe filesystem helpers for tests, built on
    //! `cap_std::fs::Dir`.

    use std::io;
    use std::path::Path;

    use cap_std::{ambient_authority, fs::Dir};

    /// Read a UTF-8 text file.
    pub fn read_file_to_string(path: &Path) -> io::Result<String> {
        let (parent, file_name) = split(path)?;
        Dir::open_ambient_dir(parent, ambient_authority())?.read_to_string(file_name)
    }

    /// Return true when `path` exists.
    pub fn exists(path: &Path) -> io::Result<bool> {
        let (parent, file_name) = split(path)?;
        match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => Ok(dir.exists(file_name)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn split(path: &Path) -> io::Result<(&Path, &Path)> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        Ok((parent, Path::new(file_name)))
    }
}

pub mod memory {
    //! In-memory stand-in for a transactional database connection.
    //!
    //! Every connection shares one committed key/value store. Writes stay
    //! pending on the connection until `commit`; `rollback` drops them.
    //! `begin` deliberately leaves pending writes alone, so work that is
    //! never rolled back leaks into the next session on the same connection.
    //! Tests rely on that to prove the session manager always rolls back.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;

    use crate::outbound::persistence::UnitOfWork;

    /// Errors raised by the in-memory driver.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum MemoryError {
        /// Injected rollback failure.
        #[error("rollback rejected on connection {0}")]
        RollbackRejected(usize),
        /// Injected commit failure.
        #[error("commit rejected on connection {0}")]
        CommitRejected(usize),
        /// Injected connect failure.
        #[error("connection refused")]
        ConnectRefused,
    }

    /// Something that happened to a connection.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        /// A connection was opened.
        Connect(usize),
        /// A transaction began.
        Begin(usize),
        /// Pending writes became durable.
        Commit(usize),
        /// Pending writes were dropped.
        Rollback(usize),
        /// The connection went back to the pool.
        Release(usize),
    }

    #[derive(Debug, Default)]
    struct Shared {
        committed: Mutex<BTreeMap<String, String>>,
        events: Mutex<Vec<Event>>,
        reject_rollback: AtomicBool,
        reject_commit: AtomicBool,
        refuse_connect: AtomicBool,
        next_id: AtomicUsize,
    }

    impl Shared {
        fn record(&self, event: Event) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }

    /// Connection manager handing out [`MemoryConnection`]s.
    ///
    /// Clones share the same store and event log.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryManager {
        shared: Arc<Shared>,
    }

    impl MemoryManager {
        /// Snapshot of durable data.
        #[must_use]
        pub fn committed(&self) -> BTreeMap<String, String> {
            self.shared
                .committed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Everything recorded so far, in order.
        #[must_use]
        pub fn events(&self) -> Vec<Event> {
            self.shared
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Make every later rollback fail.
        pub fn reject_rollbacks(&self) {
            self.shared.reject_rollback.store(true, Ordering::SeqCst);
        }

        /// Make every later commit fail. The failed commit still ends the
        /// transaction and drops its pending writes.
        pub fn reject_commits(&self) {
            self.shared.reject_commit.store(true, Ordering::SeqCst);
        }

        /// Make every later connect fail.
        pub fn refuse_connections(&self) {
            self.shared.refuse_connect.store(true, Ordering::SeqCst);
        }
    }

    /// Connection with a private set of pending writes.
    #[derive(Debug)]
    pub struct MemoryConnection {
        id: usize,
        shared: Arc<Shared>,
        pending: BTreeMap<String, String>,
        in_transaction: bool,
    }

    impl MemoryConnection {
        /// Identifier assigned at connect time.
        #[must_use]
        pub const fn id(&self) -> usize {
            self.id
        }

        /// Stage a write.
        pub fn write(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.pending.insert(key.into(), value.into());
        }

        /// Read through pending writes into the committed store.
        #[must_use]
        pub fn read(&self, key: &str) -> Option<String> {
            self.pending.get(key).cloned().or_else(|| {
                self.shared
                    .committed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(key)
                    .cloned()
            })
        }

        /// Whether a transaction is open.
        #[must_use]
        pub const fn in_transaction(&self) -> bool {
            self.in_transaction
        }
    }

    #[async_trait]
    impl UnitOfWork for MemoryConnection {
        type Error = MemoryError;

        async fn begin(&mut self) -> Result<(), Self::Error> {
            self.in_transaction = true;
            self.shared.record(Event::Begin(self.id));
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), Self::Error> {
            if self.shared.reject_commit.load(Ordering::SeqCst) {
                self.pending.clear();
                self.in_transaction = false;
                return Err(MemoryError::CommitRejected(self.id));
            }
            let pending = std::mem::take(&mut self.pending);
            self.shared
                .committed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(pending);
            self.in_transaction = false;
            self.shared.record(Event::Commit(self.id));
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), Self::Error> {
            if self.shared.reject_rollback.load(Ordering::SeqCst) {
                return Err(MemoryError::RollbackRejected(self.id));
            }
            self.pending.clear();
            self.in_transaction = false;
            self.shared.record(Event::Rollback(self.id));
            Ok(())
        }
    }

    #[async_trait]
    impl bb8::ManageConnection for MemoryManager {
        type Connection = MemoryConnection;
        type Error = MemoryError;

        async fn connect(&self) -> Result<Self::Connection, Self::Error> {
            if self.shared.refuse_connect.load(Ordering::SeqCst) {
                return Err(MemoryError::ConnectRefused);
            }
            let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
            self.shared.record(Event::Connect(id));
            Ok(MemoryConnection {
                id,
                shared: Arc::clone(&self.shared),
                pending: BTreeMap::new(),
                in_transaction: false,
            })
        }

        async fn is_valid(&self, _conn: &mut Self::Connection) -> Result<(), Self::Error> {
            Ok(())
        }

        fn has_broken(&self, conn: &mut Self::Connection) -> bool {
            self.shared.record(Event::Release(conn.id));
            conn.in_transaction
        }
    }
}

pub mod logs {
    //! Capturing `tracing` layer for asserting on log output.

    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::{Arc, Mutex, PoisonError};

    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::{Layer, Registry};

    /// One captured event.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Captured {
        /// Event level.
        pub level: Level,
        /// Event target.
        pub target: String,
        /// The `message` field.
        pub message: String,
        /// Every other field rendered with `Debug`/`Display`.
        pub fields: BTreeMap<String, String>,
        /// Fields of the enclosing spans, innermost last.
        pub span_fields: BTreeMap<String, String>,
    }

    impl Captured {
        /// Field value from the event or its spans.
        #[must_use]
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .get(name)
                .or_else(|| self.span_fields.get(name))
                .map(String::as_str)
        }
    }

    #[derive(Default)]
    struct FieldMap(BTreeMap<String, String>);

    impl Visit for FieldMap {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }
    }

    struct SpanFields(BTreeMap<String, String>);

    /// Shared buffer of captured events.
    #[derive(Debug, Clone, Default)]
    pub struct LogCapture {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    impl LogCapture {
        /// Everything captured so far.
        #[must_use]
        pub fn events(&self) -> Vec<Captured> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Captured events whose message equals `message`.
        #[must_use]
        pub fn with_message(&self, message: &str) -> Vec<Captured> {
            self.events()
                .into_iter()
                .filter(|event| event.message == message)
                .collect()
        }

        /// A subscriber that records into this capture.
        #[must_use]
        pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
            Registry::default().with(CaptureLayer {
                events: Arc::clone(&self.events),
            })
        }
    }

    struct CaptureLayer {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    impl<S> Layer<S> for CaptureLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            id: &tracing::span::Id,
            ctx: Context<'_, S>,
        ) {
            let mut fields = FieldMap::default();
            attrs.record(&mut fields);
            if let Some(span) = ctx.span(id) {
                span.extensions_mut().insert(SpanFields(fields.0));
            }
        }

        fn on_record(
            &self,
            id: &tracing::span::Id,
            values: &tracing::span::Record<'_>,
            ctx: Context<'_, S>,
        ) {
            let Some(span) = ctx.span(id) else { return };
            let mut fields = FieldMap::default();
            values.record(&mut fields);
            let mut extensions = span.extensions_mut();
            if let Some(existing) = extensions.get_mut::<SpanFields>() {
                existing.0.extend(fields.0);
            }
        }

        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let mut fields = FieldMap::default();
            event.record(&mut fields);
            let message = fields.0.remove("message").unwrap_or_default();

            let mut span_fields = BTreeMap::new();
            if let Some(scope) = ctx.event_scope(event) {
                for span in scope.from_root() {
                    if let Some(recorded) = span.extensions().get::<SpanFields>() {
                        span_fields.extend(recorded.0.clone());
                    }
                }
            }

            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Captured {
                    level: *event.metadata().level(),
                    target: event.metadata().target().to_owned(),
                    message,
                    fields: fields.0,
                    span_fields,
                });
        }
    }
}

pub mod settings {
    //! Settings fixtures.

    use tempfile::TempDir;

    use crate::config::AppSettings;

    /// Settings suitable for tests: memory URL, small pool, no log files.
    #[must_use]
    pub fn test_settings() -> AppSettings {
        AppSettings {
            database_url: Some("memory://".to_owned()),
            db_echo: Some(false),
            db_pool_size: 1,
            db_max_overflow: 0,
            app_name: Some("platform-test".to_owned()),
            debug: Some(false),
            log_name: None,
            log_level: None,
            log_file_size_mb: 10,
            log_directory: None,
            save_log_files: Some(false),
            max_page_limit: None,
        }
    }

    /// Settings writing log files into a fresh temporary directory.
    ///
    /// Keep the returned directory alive for as long as logs are written.
    pub fn with_temp_log_dir() -> std::io::Result<(AppSettings, TempDir)> {
        let dir = tempfile::tempdir()?;
        let mut settings = test_settings();
        settings.save_log_files = Some(true);
        settings.log_directory = Some(dir.path().to_path_buf());
        Ok((settings, dir))
    }
}
