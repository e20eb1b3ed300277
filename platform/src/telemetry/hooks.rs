//! Report hooks for panics and `eyre` errors.
//!
//! Panics raised while serving a request are parked on the current thread
//! with their location and backtrace, so the error renderer can log them
//! alongside the request. Panics anywhere else are logged straight away.

use std::backtrace::Backtrace;
use std::cell::RefCell;

use color_eyre::config::HookBuilder;
use tracing::error;

use crate::domain::RequestId;

use super::TelemetryError;

thread_local! {
    static PARKED_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the `color-eyre` report handler and a panic hook feeding the
/// logs.
///
/// Call once, before [`super::init`].
///
/// # Errors
///
/// Returns [`TelemetryError::Hooks`] when an `eyre` handler is already
/// installed.
pub fn install_error_hooks() -> Result<(), TelemetryError> {
    let (panic_hook, eyre_hook) = HookBuilder::blank().into_hooks();
    eyre_hook.install()?;
    std::panic::set_hook(Box::new(move |info| {
        let report = format!(
            "{}\n{}",
            panic_hook.panic_report(info),
            Backtrace::force_capture()
        );
        record_panic(report);
    }));
    Ok(())
}

fn record_panic(report: String) {
    if RequestId::current().is_some() {
        PARKED_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
    } else {
        error!(%report, "panic outside a request");
    }
}

/// Take the report of the last panic parked on this thread.
pub(crate) fn take_panic_report() -> Option<String> {
    PARKED_PANIC.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::logs::LogCapture;
    use rstest::rstest;

    #[rstest]
    fn request_panics_are_parked_once() {
        RequestId::sync_scope(RequestId::generate(), || {
            record_panic("boom at src/orders.rs:12".to_owned());
        });
        assert_eq!(take_panic_report().as_deref(), Some("boom at src/orders.rs:12"));
        assert_eq!(take_panic_report(), None);
    }

    #[rstest]
    fn other_panics_are_logged() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        record_panic("worker died".to_owned());

        assert_eq!(take_panic_report(), None);
        let logged = capture.with_message("panic outside a request");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].field("report"), Some("worker died"));
    }
}
