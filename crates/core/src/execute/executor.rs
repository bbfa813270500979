//! Executor that forwards a gathered request to the execute service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::gatherer::ExecuteRequest;
use super::service::ExecuteService;
use crate::errors::ExecuteError;
use crate::host::Host;

/// Telemetry name reported for execution failures.
pub const EXECUTE_TELEMETRY_NAME: &str = "force_apex_execute_library";

/// Successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOutcome {
    pub output: String,
    pub duration: Duration,
}

pub struct AnonymousExecutor {
    service: Option<Arc<dyn ExecuteService>>,
    host: Host,
    execution_name: String,
}

impl AnonymousExecutor {
    pub fn new(host: Host) -> Self {
        Self {
            service: None,
            host,
            execution_name: "Execute Anonymous Apex".into(),
        }
    }

    /// Attach the service requests are sent to.
    pub fn establish(&mut self, service: Arc<dyn ExecuteService>) {
        self.service = Some(service);
    }

    pub fn with_service(mut self, service: Arc<dyn ExecuteService>) -> Self {
        self.establish(service);
        self
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn execution_name(&self) -> &str {
        &self.execution_name
    }

    /// Run `request`. Never fails: errors are sent to telemetry, the user is
    /// told the execution failed, and the message lands in the output channel.
    pub async fn execute(&self, request: &ExecuteRequest) -> Option<ExecuteOutcome> {
        let started = Instant::now();
        self.host
            .channel
            .append_line(&format!("Starting {}", self.execution_name));

        match self.try_execute(request).await {
            Ok(output) => {
                let duration = started.elapsed();
                for line in output.lines() {
                    self.host.channel.append_line(line);
                }
                self.host
                    .telemetry
                    .send_command_event(EXECUTE_TELEMETRY_NAME, duration);
                info!(duration_ms = duration.as_millis() as u64, "anonymous execution finished");
                Some(ExecuteOutcome { output, duration })
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "anonymous execution failed");
                self.host
                    .telemetry
                    .send_exception(EXECUTE_TELEMETRY_NAME, &message);
                self.host
                    .notifier
                    .show_failed_execution(&self.execution_name);
                self.host.channel.append_line(&message);
                None
            }
        }
    }

    async fn try_execute(&self, request: &ExecuteRequest) -> Result<String, ExecuteError> {
        let service = self
            .service
            .as_ref()
            .ok_or(ExecuteError::ServiceNotEstablished)?;
        let source = request.source()?;
        service.execute_anonymous(&source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::gatherer::ExecuteSource;
    use crate::host::{HostEvent, MemoryHost};
    use async_trait::async_trait;

    struct FakeService {
        fail: bool,
    }

    #[async_trait]
    impl ExecuteService for FakeService {
        async fn execute_anonymous(&self, source: &ExecuteSource) -> Result<String, ExecuteError> {
            if self.fail {
                return Err(ExecuteError::InvalidFile("boom.apex".into()));
            }
            Ok(match source {
                ExecuteSource::Code(code) => format!("ran: {}\nok", code),
                ExecuteSource::File(path) => format!("ran file: {}", path.display()),
            })
        }
    }

    fn fake_executor(fail: bool) -> (AnonymousExecutor, Arc<MemoryHost>) {
        let memory = Arc::new(MemoryHost::new());
        let executor = AnonymousExecutor::new(Host::from_shared(memory.clone()))
            .with_service(Arc::new(FakeService { fail }));
        (executor, memory)
    }

    #[tokio::test]
    async fn test_success_writes_output() {
        let (executor, memory) = fake_executor(false);
        let outcome = executor
            .execute(&ExecuteRequest::from_code("1 + 1"))
            .await
            .unwrap();
        assert_eq!(outcome.output, "ran: 1 + 1\nok");
        assert_eq!(
            memory.output_lines(),
            vec!["Starting Execute Anonymous Apex", "ran: 1 + 1", "ok"]
        );
        assert!(memory
            .events()
            .contains(&HostEvent::Command(EXECUTE_TELEMETRY_NAME.into())));
    }

    #[tokio::test]
    async fn test_service_failure_is_reported() {
        let (executor, memory) = fake_executor(true);
        assert!(executor
            .execute(&ExecuteRequest::from_file("boom.apex"))
            .await
            .is_none());

        let events = memory.events();
        assert!(events.contains(&HostEvent::Exception {
            name: EXECUTE_TELEMETRY_NAME.into(),
            message: "invalid file to execute: boom.apex".into(),
        }));
        assert!(events.contains(&HostEvent::FailedExecution(
            "Execute Anonymous Apex".into()
        )));
        assert_eq!(
            memory.output_lines().last().map(String::as_str),
            Some("invalid file to execute: boom.apex")
        );
    }

    #[tokio::test]
    async fn test_missing_service_and_input() {
        let memory = Arc::new(MemoryHost::new());
        let executor = AnonymousExecutor::new(Host::from_shared(memory.clone()));
        assert!(executor
            .execute(&ExecuteRequest::from_code("x"))
            .await
            .is_none());
        assert!(memory
            .output_lines()
            .contains(&"execute service is not established".to_string()));

        let (executor, memory) = fake_executor(false);
        assert!(executor.execute(&ExecuteRequest::default()).await.is_none());
        assert!(memory
            .events()
            .iter()
            .any(|e| matches!(e, HostEvent::Exception { message, .. } if message.starts_with("nothing to execute"))));
    }
}
