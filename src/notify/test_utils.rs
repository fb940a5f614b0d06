//! Shared test utilities for the `notify` module.

use std::sync::{Arc, Mutex};

use super::{DeliveryFuture, EmailReport, Notifier};
use crate::error::DeliveryError;

/// Notifier that records every report instead of sending it.
///
/// With [`failing`](Self::failing) every delivery is recorded and then
/// rejected with HTTP 500.
#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<EmailReport>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Reports passed to `deliver` so far.
    pub(crate) fn reports(&self) -> Vec<EmailReport> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver<'a>(&'a self, report: &'a EmailReport) -> DeliveryFuture<'a> {
        Box::pin(async move {
            self.delivered.lock().unwrap().push(report.clone());
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 500,
                    body: "mock failure".to_string(),
                });
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
