//! Intent extraction: free text to a [`MediaRequest`].
//!
//! The resolver is a bounded retry loop. Each attempt takes a message from a
//! [`MessageSource`], asks the completion service to call the classification
//! tool, and either returns the parsed request or reports the failure back to
//! the source and tries again. Once the attempt budget is spent (or the source
//! has nothing more to say) the loop ends in [`NewsreelError::UnresolvedIntent`].

mod tool;

pub use tool::{classify_tool, parse_invocation, TOOL_NAME};

use crate::capability::{guarded, CompletionProvider, ToolSpec};
use crate::error::{CapabilityError, NewsreelError, Result};
use crate::request::MediaRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Supplies request text to the resolver and receives its feedback.
#[async_trait]
pub trait MessageSource: Send {
    /// Message for the given 1-based attempt, or `None` when input is exhausted.
    async fn next_message(&mut self, attempt: usize) -> Option<String>;

    /// Called after an attempt that produced no usable request.
    fn report_failure(&mut self, _attempt: usize, _reason: &str) {}

    /// Called once with the resolved request.
    fn confirm(&mut self, _request: &MediaRequest) {}
}

/// Re-sends the same message on every attempt.
pub struct RepeatMessage {
    message: String,
}

impl RepeatMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl MessageSource for RepeatMessage {
    async fn next_message(&mut self, _attempt: usize) -> Option<String> {
        Some(self.message.clone())
    }
}

pub struct IntentResolver {
    completion: Arc<dyn CompletionProvider>,
    tool: ToolSpec,
    max_attempts: usize,
    timeout: Duration,
}

impl IntentResolver {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        tool_description: &str,
        max_attempts: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            completion,
            tool: classify_tool(tool_description),
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Resolve a request, retrying up to the attempt budget.
    #[instrument(skip_all, fields(max_attempts = self.max_attempts))]
    pub async fn resolve(
        &self,
        source: &mut dyn MessageSource,
        cancel: &CancellationToken,
    ) -> Result<MediaRequest> {
        let mut last = String::from("no attempt was made");
        let mut attempts = 0;

        while attempts < self.max_attempts {
            if cancel.is_cancelled() {
                return Err(NewsreelError::Cancelled);
            }

            let Some(message) = source.next_message(attempts + 1).await else {
                last = "no more input".to_string();
                break;
            };
            attempts += 1;

            let outcome = guarded(
                cancel,
                "completion",
                self.timeout,
                self.completion.complete_with_tool(&message, &self.tool),
            )
            .await;

            let parsed = match outcome {
                Ok(invocation) => parse_invocation(invocation.as_ref()),
                Err(CapabilityError::Cancelled(_)) => return Err(NewsreelError::Cancelled),
                Err(e) => Err(e.to_string()),
            };

            match parsed {
                Ok(request) => {
                    info!("{}", request.summary());
                    source.confirm(&request);
                    return Ok(request);
                }
                Err(reason) => {
                    warn!("Attempt {}/{} could not be resolved: {}", attempts, self.max_attempts, reason);
                    source.report_failure(attempts, &reason);
                    last = reason;
                }
            }
        }

        Err(NewsreelError::UnresolvedIntent { attempts, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityResult, ToolInvocation};
    use crate::request::{Category, MediaFormat};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Completion fake replaying a fixed list of tool-call outcomes.
    struct ScriptedCompletion {
        replies: Mutex<VecDeque<CapabilityResult<Option<ToolInvocation>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn new(replies: Vec<CapabilityResult<Option<ToolInvocation>>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompletion {
        async fn complete(&self, _system_prompt: &str) -> CapabilityResult<String> {
            unreachable!("resolver only uses tool calls")
        }

        async fn complete_with_tool(
            &self,
            user_message: &str,
            _tool: &ToolSpec,
        ) -> CapabilityResult<Option<ToolInvocation>> {
            self.calls.lock().unwrap().push(user_message.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    /// Source handing out scripted messages and recording feedback.
    #[derive(Default)]
    struct Scripted {
        messages: VecDeque<String>,
        failures: Vec<(usize, String)>,
        confirmed: Option<MediaRequest>,
    }

    #[async_trait]
    impl MessageSource for Scripted {
        async fn next_message(&mut self, _attempt: usize) -> Option<String> {
            self.messages.pop_front()
        }

        fn report_failure(&mut self, attempt: usize, reason: &str) {
            self.failures.push((attempt, reason.to_string()));
        }

        fn confirm(&mut self, request: &MediaRequest) {
            self.confirmed = Some(request.clone());
        }
    }

    fn valid(format: &str, category: &str, subject: &str) -> CapabilityResult<Option<ToolInvocation>> {
        Ok(Some(ToolInvocation {
            name: TOOL_NAME.to_string(),
            arguments: serde_json::json!({
                "format": format,
                "category": category,
                "subject": subject,
            })
            .to_string(),
        }))
    }

    fn malformed() -> CapabilityResult<Option<ToolInvocation>> {
        Ok(Some(ToolInvocation {
            name: TOOL_NAME.to_string(),
            arguments: "{\"format\": \"video\"".to_string(),
        }))
    }

    fn resolver(completion: Arc<ScriptedCompletion>, attempts: usize) -> IntentResolver {
        IntentResolver::new(completion, "classify", attempts, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_well_formed_response_resolves_first_try() {
        let completion = ScriptedCompletion::new(vec![valid("video", "ticker", "aapl")]);
        let mut source = RepeatMessage::new("tell me about AAPL as a video");

        let request = resolver(completion.clone(), 3)
            .resolve(&mut source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(request.format(), MediaFormat::Video);
        assert_eq!(request.category(), Category::Ticker);
        assert_eq!(request.subject(), "AAPL");
        assert_eq!(completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_takes_exactly_two_calls() {
        let completion = ScriptedCompletion::new(vec![malformed(), valid("text", "news", "interest rates")]);
        let mut source = Scripted {
            messages: VecDeque::from(vec!["rates?".to_string(), "rates as text".to_string()]),
            ..Default::default()
        };

        let request = resolver(completion.clone(), 3)
            .resolve(&mut source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.call_count(), 2);
        assert_eq!(source.failures.len(), 1);
        assert_eq!(source.failures[0].0, 1);
        assert_eq!(source.confirmed, Some(request.clone()));
        assert_eq!(
            *completion.calls.lock().unwrap(),
            vec!["rates?".to_string(), "rates as text".to_string()]
        );
    }

    #[tokio::test]
    async fn test_budget_exhausted_raises_unresolved() {
        let completion = ScriptedCompletion::new(vec![
            Ok(None),
            malformed(),
            Err(CapabilityError::service("completion", "HTTP 500")),
            valid("text", "news", "too late"),
        ]);
        let mut source = RepeatMessage::new("???");

        let err = resolver(completion.clone(), 3)
            .resolve(&mut source, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            NewsreelError::UnresolvedIntent { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("HTTP 500"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(completion.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_source_stops_early() {
        let completion = ScriptedCompletion::new(vec![Ok(None)]);
        let mut source = Scripted {
            messages: VecDeque::from(vec!["only one".to_string()]),
            ..Default::default()
        };

        let err = resolver(completion.clone(), 5)
            .resolve(&mut source, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NewsreelError::UnresolvedIntent { attempts: 1, .. }));
        assert_eq!(completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let completion = ScriptedCompletion::new(vec![valid("text", "news", "x")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver(completion.clone(), 3)
            .resolve(&mut RepeatMessage::new("x"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, NewsreelError::Cancelled));
        assert_eq!(completion.call_count(), 0);
    }
}
