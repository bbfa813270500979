//! Host collaborators: user notifications, telemetry, and the output channel.
//!
//! The core never depends on a concrete host. Frontends implement these
//! traits; [`TracingHost`] logs everything through `tracing` and
//! [`MemoryHost`] records events in memory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info};

/// User-facing notifications.
pub trait Notifier: Send + Sync {
    fn show_info(&self, message: &str);
    fn show_error(&self, message: &str);
    /// Announce that the named execution failed.
    fn show_failed_execution(&self, execution_name: &str);
}

/// Fire-and-forget usage and failure reporting.
pub trait Telemetry: Send + Sync {
    fn send_exception(&self, name: &str, message: &str);
    fn send_command_event(&self, name: &str, duration: Duration);
}

/// Line-oriented output pane.
pub trait OutputChannel: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Bundle of host collaborators handed to the workflow and executors.
#[derive(Clone)]
pub struct Host {
    pub notifier: Arc<dyn Notifier>,
    pub telemetry: Arc<dyn Telemetry>,
    pub channel: Arc<dyn OutputChannel>,
}

impl Host {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        telemetry: Arc<dyn Telemetry>,
        channel: Arc<dyn OutputChannel>,
    ) -> Self {
        Self {
            notifier,
            telemetry,
            channel,
        }
    }

    /// A host whose collaborators all log through `tracing`.
    pub fn tracing() -> Self {
        let host = Arc::new(TracingHost);
        Self::new(host.clone(), host.clone(), host)
    }

    /// Use one value for all three collaborators.
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: Notifier + Telemetry + OutputChannel + 'static,
    {
        Self::new(shared.clone(), shared.clone(), shared)
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tracing host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHost;

impl Notifier for TracingHost {
    fn show_info(&self, message: &str) {
        info!(target: "forcesync::notify", "{}", message);
    }

    fn show_error(&self, message: &str) {
        error!(target: "forcesync::notify", "{}", message);
    }

    fn show_failed_execution(&self, execution_name: &str) {
        error!(target: "forcesync::notify", "{} failed to run", execution_name);
    }
}

impl Telemetry for TracingHost {
    fn send_exception(&self, name: &str, message: &str) {
        error!(target: "forcesync::telemetry", name, message, "exception");
    }

    fn send_command_event(&self, name: &str, duration: Duration) {
        info!(
            target: "forcesync::telemetry",
            name,
            duration_ms = duration.as_millis() as u64,
            "command"
        );
    }
}

impl OutputChannel for TracingHost {
    fn append_line(&self, line: &str) {
        info!(target: "forcesync::output", "{}", line);
    }
}

// ---------------------------------------------------------------------------
// Memory host
// ---------------------------------------------------------------------------

/// One recorded host interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Info(String),
    Error(String),
    FailedExecution(String),
    Exception { name: String, message: String },
    Command(String),
    Output(String),
}

/// Records every interaction; handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    events: Mutex<Vec<HostEvent>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.lock().clone()
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Output(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: HostEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<HostEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for MemoryHost {
    fn show_info(&self, message: &str) {
        self.push(HostEvent::Info(message.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.push(HostEvent::Error(message.to_string()));
    }

    fn show_failed_execution(&self, execution_name: &str) {
        self.push(HostEvent::FailedExecution(execution_name.to_string()));
    }
}

impl Telemetry for MemoryHost {
    fn send_exception(&self, name: &str, message: &str) {
        self.push(HostEvent::Exception {
            name: name.to_string(),
            message: message.to_string(),
        });
    }

    fn send_command_event(&self, name: &str, _duration: Duration) {
        self.push(HostEvent::Command(name.to_string()));
    }
}

impl OutputChannel for MemoryHost {
    fn append_line(&self, line: &str) {
        self.push(HostEvent::Output(line.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_host_records_in_order() {
        let memory = Arc::new(MemoryHost::new());
        let host = Host::from_shared(memory.clone());

        host.notifier.show_error("boom");
        host.telemetry.send_exception("op", "boom");
        host.channel.append_line("details");

        assert_eq!(
            memory.events(),
            vec![
                HostEvent::Error("boom".into()),
                HostEvent::Exception {
                    name: "op".into(),
                    message: "boom".into()
                },
                HostEvent::Output("details".into()),
            ]
        );
        assert_eq!(memory.output_lines(), vec!["details"]);
    }

    #[test]
    fn test_tracing_host_does_not_panic() {
        let host = Host::tracing();
        host.notifier.show_info("hello");
        host.notifier.show_failed_execution("Execute Anonymous");
        host.telemetry
            .send_command_event("cmd", Duration::from_millis(5));
        host.channel.append_line("line");
    }
}
