//! Generation Client - Cached, retrying access to the generation endpoint
//!
//! Single path for every AI generation request:
//! - Content-keyed response cache (1 hour TTL) so repeated identical prompts
//!   cost one network call
//! - Per-attempt timeout and exponential backoff for transient failures,
//!   up to three attempts
//! - Explicit invalidation scoped to an action and project, for regeneration
//! - Abortable variant of `request` for flows the user can cancel
//!
//! The client never touches credits. Deduction happens after a successful
//! reply, in the workflow that called here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{AbortHandle, Abortable};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::application::dto::normalize_payload;
use crate::application::ports::outbound::{EndpointError, GenerationEndpointPort};
use crate::domain::entities::GeneratedArtifact;
use crate::domain::value_objects::{CreditAction, ProjectId};

/// How long a successful reply stays servable without a network call
pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Upper bound on a single network attempt
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Total attempts per request, first try included
pub const MAX_ATTEMPTS: u32 = 3;
/// Backoff before attempt n+1 is this times 2^(n-1)
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

const RESPONSE_CACHE_CAPACITY: u64 = 1024;

/// Cache key: the action plus a digest of the normalized payload.
///
/// The payload is serialized with sorted object keys, so two prompts that
/// differ only in field order or surrounding whitespace share an entry.
/// The project id is carried alongside the digest to let invalidation
/// target one project without hashing every candidate payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    action: CreditAction,
    project_id: Option<ProjectId>,
    digest: String,
}

impl CacheKey {
    fn compute(action: CreditAction, payload: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(action.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(payload.to_string().as_bytes());
        let digest = hex::encode(hasher.finalize());

        let project_id = payload
            .get("project_id")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(ProjectId::from);

        Self {
            action,
            project_id,
            digest,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedReply {
    artifact: GeneratedArtifact,
    endpoint_timestamp: DateTime<Utc>,
}

/// A parsed generation result plus how it was obtained
#[derive(Debug, Clone)]
pub struct GenerationReply {
    pub artifact: GeneratedArtifact,
    /// Completion time reported by the endpoint
    pub endpoint_timestamp: DateTime<Utc>,
    /// Network attempts made; 0 for a cache hit
    pub attempts: u32,
    pub from_cache: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("Generation rejected: {message}")]
    Rejected { message: String },
    #[error("Malformed generation response: {0}")]
    Malformed(String),
    #[error("Generation aborted")]
    Aborted,
}

pub struct GenerationClient<E: GenerationEndpointPort> {
    endpoint: Arc<E>,
    cache: Cache<CacheKey, CachedReply>,
    max_attempts: u32,
    initial_retry_delay: Duration,
    request_timeout: Duration,
}

impl<E: GenerationEndpointPort> GenerationClient<E> {
    pub fn new(endpoint: Arc<E>) -> Self {
        Self::build(endpoint, RESPONSE_CACHE_TTL)
    }

    #[cfg(test)]
    fn with_cache_ttl(endpoint: Arc<E>, ttl: Duration) -> Self {
        Self::build(endpoint, ttl)
    }

    fn build(endpoint: Arc<E>, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(RESPONSE_CACHE_CAPACITY)
            .time_to_live(cache_ttl)
            .support_invalidation_closures()
            .build();
        Self {
            endpoint,
            cache,
            max_attempts: MAX_ATTEMPTS,
            initial_retry_delay: INITIAL_RETRY_DELAY,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Run one generation request through cache, endpoint and retry policy
    pub async fn request(
        &self,
        action: CreditAction,
        mut payload: serde_json::Value,
    ) -> Result<GenerationReply, GenerationError> {
        normalize_payload(&mut payload);
        let key = CacheKey::compute(action, &payload);

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(action = %action, "Serving generation reply from cache");
            return Ok(GenerationReply {
                artifact: hit.artifact,
                endpoint_timestamp: hit.endpoint_timestamp,
                attempts: 0,
                from_cache: true,
            });
        }

        let (reply, attempts) = self.submit_with_retry(action, &payload).await?;

        // A reply we cannot parse is a failure and must not poison the cache
        let artifact = GeneratedArtifact::from_endpoint(action, &reply.data)
            .map_err(|parse_error| GenerationError::Malformed(parse_error.to_string()))?;

        self.cache
            .insert(
                key,
                CachedReply {
                    artifact: artifact.clone(),
                    endpoint_timestamp: reply.timestamp,
                },
            )
            .await;

        tracing::info!(action = %action, attempts, "Generation complete");
        Ok(GenerationReply {
            artifact,
            endpoint_timestamp: reply.timestamp,
            attempts,
            from_cache: false,
        })
    }

    /// Like `request`, but returns a handle that cancels the in-flight call.
    ///
    /// An aborted request resolves to `GenerationError::Aborted` and writes
    /// nothing to the cache.
    #[allow(dead_code)] // Kept for client-initiated cancellation of in-flight generations
    pub fn request_abortable(
        &self,
        action: CreditAction,
        payload: serde_json::Value,
    ) -> (
        AbortHandle,
        impl std::future::Future<Output = Result<GenerationReply, GenerationError>> + '_,
    ) {
        let (handle, registration) = AbortHandle::new_pair();
        let inner = Abortable::new(self.request(action, payload), registration);
        let wrapped = async move {
            match inner.await {
                Ok(result) => result,
                Err(futures_util::future::Aborted) => Err(GenerationError::Aborted),
            }
        };
        (handle, wrapped)
    }

    /// Drop cached replies for an action, optionally narrowed to one project.
    ///
    /// Used when a regeneration must bypass what was previously generated.
    pub fn invalidate(&self, action: CreditAction, project_id: Option<ProjectId>) {
        let outcome = self.cache.invalidate_entries_if(move |key, _| {
            key.action == action && project_id.map_or(true, |scope| key.project_id == Some(scope))
        });
        match outcome {
            Ok(_) => {
                tracing::debug!(action = %action, "Invalidated cached generation replies");
            }
            Err(error) => {
                tracing::warn!(action = %action, %error, "Cache invalidation failed");
            }
        }
    }

    async fn submit_with_retry(
        &self,
        action: CreditAction,
        payload: &serde_json::Value,
    ) -> Result<(crate::application::ports::outbound::EndpointReply, u32), GenerationError> {
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.max_attempts {
            let outcome = match tokio::time::timeout(
                self.request_timeout,
                self.endpoint.submit(action, payload),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(EndpointError::Timeout),
            };

            match outcome {
                Ok(reply) => return Ok((reply, attempt)),
                Err(error) if error.is_transient() => {
                    last_error = error.to_string();
                    if attempt < self.max_attempts {
                        let delay = self.initial_retry_delay * 2u32.pow(attempt - 1);
                        tracing::warn!(
                            action = %action,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "Generation attempt failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(EndpointError::Rejected { message }) => {
                    return Err(GenerationError::Rejected { message });
                }
                Err(EndpointError::Malformed(reason)) => {
                    return Err(GenerationError::Malformed(reason));
                }
                // Transient variants are matched above; nothing else remains
                Err(error) => {
                    return Err(GenerationError::Malformed(error.to_string()));
                }
            }
        }

        tracing::error!(
            action = %action,
            attempts = self.max_attempts,
            error = %last_error,
            "Generation failed after exhausting retries"
        );
        Err(GenerationError::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use crate::application::ports::outbound::EndpointReply;

    struct MockEndpoint {
        /// Outcomes consumed front-first; when empty, serves `default_data`
        script: Mutex<VecDeque<Result<serde_json::Value, EndpointError>>>,
        default_data: serde_json::Value,
        delay: Option<Duration>,
        hang: bool,
        submits: AtomicUsize,
    }

    impl MockEndpoint {
        fn ok(default_data: serde_json::Value) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                default_data,
                delay: None,
                hang: false,
                submits: AtomicUsize::new(0),
            }
        }

        fn scripted(
            outcomes: Vec<Result<serde_json::Value, EndpointError>>,
            default_data: serde_json::Value,
        ) -> Self {
            Self {
                script: Mutex::new(outcomes.into()),
                default_data,
                delay: None,
                hang: false,
                submits: AtomicUsize::new(0),
            }
        }

        fn submit_count(&self) -> usize {
            self.submits.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl GenerationEndpointPort for MockEndpoint {
        async fn submit(
            &self,
            _action: CreditAction,
            _payload: &serde_json::Value,
        ) -> Result<EndpointReply, EndpointError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(data)) => Ok(EndpointReply {
                    data,
                    timestamp: Utc::now(),
                }),
                Some(Err(error)) => Err(error),
                None => Ok(EndpointReply {
                    data: self.default_data.clone(),
                    timestamp: Utc::now(),
                }),
            }
        }
    }

    fn story_data() -> serde_json::Value {
        json!({
            "title": "Signal Lost",
            "logline": "A stranded comms officer bargains with a ghost frequency.",
            "synopsis": "Cut off after a solar storm, Vega trades station secrets for a way home.",
            "scenes": [
                { "heading": "INT. RELAY STATION - NIGHT", "summary": "Vega hears a voice on a dead channel." }
            ]
        })
    }

    fn story_payload(project_id: ProjectId, premise: &str) -> serde_json::Value {
        json!({
            "project_id": project_id.to_string(),
            "premise": premise,
        })
    }

    #[tokio::test]
    async fn test_identical_prompts_share_one_network_call() {
        let endpoint = Arc::new(MockEndpoint::ok(story_data()));
        let client = GenerationClient::new(endpoint.clone());
        let project = ProjectId::new();

        let first = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        // Same prompt, sloppier whitespace
        let second = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "  a ghost frequency  "),
            )
            .await
            .unwrap();

        assert_eq!(endpoint.submit_count(), 1);
        assert!(!first.from_cache);
        assert_eq!(first.attempts, 1);
        assert!(second.from_cache);
        assert_eq!(second.attempts, 0);
        assert_eq!(second.artifact, first.artifact);
    }

    #[tokio::test]
    async fn test_distinct_prompts_do_not_share_cache() {
        let endpoint = Arc::new(MockEndpoint::ok(story_data()));
        let client = GenerationClient::new(endpoint.clone());
        let project = ProjectId::new();

        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a derelict lighthouse"),
            )
            .await
            .unwrap();

        assert_eq!(endpoint.submit_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_then_succeeds() {
        let endpoint = Arc::new(MockEndpoint::scripted(
            vec![Err(EndpointError::Unavailable { status: 503 })],
            story_data(),
        ));
        let client = GenerationClient::new(endpoint.clone());

        let reply = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(ProjectId::new(), "a ghost frequency"),
            )
            .await
            .unwrap();

        assert_eq!(reply.attempts, 2);
        assert_eq!(endpoint.submit_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_three_attempts_with_backoff() {
        let endpoint = Arc::new(MockEndpoint::scripted(
            vec![
                Err(EndpointError::Unavailable { status: 503 }),
                Err(EndpointError::Network("connection reset".to_string())),
                Err(EndpointError::Unavailable { status: 502 }),
            ],
            story_data(),
        ));
        let client = GenerationClient::new(endpoint.clone());
        let started = tokio::time::Instant::now();

        let error = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(ProjectId::new(), "a ghost frequency"),
            )
            .await
            .unwrap_err();

        assert_eq!(endpoint.submit_count(), 3);
        match error {
            GenerationError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("502"));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        // Backoff of 1s then 2s between the three attempts
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_endpoint_times_out_each_attempt() {
        let mut endpoint = MockEndpoint::ok(story_data());
        endpoint.hang = true;
        let endpoint = Arc::new(endpoint);
        let client = GenerationClient::new(endpoint.clone());

        let error = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(ProjectId::new(), "a ghost frequency"),
            )
            .await
            .unwrap_err();

        assert_eq!(endpoint.submit_count(), 3);
        match error {
            GenerationError::Exhausted { last_error, .. } => {
                assert!(last_error.contains("timed out"));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let endpoint = Arc::new(MockEndpoint::scripted(
            vec![Err(EndpointError::Rejected {
                message: "prompt blocked".to_string(),
            })],
            story_data(),
        ));
        let client = GenerationClient::new(endpoint.clone());

        let error = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(ProjectId::new(), "a ghost frequency"),
            )
            .await
            .unwrap_err();

        assert_eq!(endpoint.submit_count(), 1);
        assert!(matches!(error, GenerationError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_not_cached() {
        let endpoint = Arc::new(MockEndpoint::scripted(
            vec![Ok(json!({ "unexpected": true }))],
            story_data(),
        ));
        let client = GenerationClient::new(endpoint.clone());
        let project = ProjectId::new();

        let error = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, GenerationError::Malformed(_)));

        // The retry serves valid data and must reach the network
        let reply = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        assert_eq!(endpoint.submit_count(), 2);
        assert!(!reply.from_cache);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_for_matching_scope() {
        let endpoint = Arc::new(MockEndpoint::ok(story_data()));
        let client = GenerationClient::new(endpoint.clone());
        let project = ProjectId::new();
        let other_project = ProjectId::new();

        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(other_project, "a ghost frequency"),
            )
            .await
            .unwrap();
        assert_eq!(endpoint.submit_count(), 2);

        client.invalidate(CreditAction::StoryGeneration, Some(project));

        // Invalidated scope refetches, the other project still hits cache
        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        assert_eq!(endpoint.submit_count(), 3);
        let untouched = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(other_project, "a ghost frequency"),
            )
            .await
            .unwrap();
        assert!(untouched.from_cache);
        assert_eq!(endpoint.submit_count(), 3);
    }

    #[tokio::test]
    async fn test_cache_entries_expire() {
        let endpoint = Arc::new(MockEndpoint::ok(story_data()));
        // The cache runs on wall-clock time, so use a tiny TTL and really wait
        let client = GenerationClient::with_cache_ttl(endpoint.clone(), Duration::from_millis(50));
        let project = ProjectId::new();

        client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let reply = client
            .request(
                CreditAction::StoryGeneration,
                story_payload(project, "a ghost frequency"),
            )
            .await
            .unwrap();

        assert!(!reply.from_cache);
        assert_eq!(endpoint.submit_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_leaves_no_cache_entry() {
        let mut endpoint = MockEndpoint::ok(story_data());
        endpoint.delay = Some(Duration::from_secs(10));
        let endpoint = Arc::new(endpoint);
        let client = GenerationClient::new(endpoint.clone());
        let project = ProjectId::new();

        let (handle, fut) =
            client.request_abortable(CreditAction::StoryGeneration, story_payload(project, "x"));
        tokio::pin!(fut);
        let early = tokio::select! {
            result = &mut fut => Some(result),
            _ = tokio::time::sleep(Duration::from_millis(100)) => None,
        };
        assert!(early.is_none());
        assert_eq!(endpoint.submit_count(), 1);

        handle.abort();
        let result = fut.await;
        assert!(matches!(result, Err(GenerationError::Aborted)));

        // Nothing was cached, so the same prompt goes back to the network
        let reply = client
            .request(CreditAction::StoryGeneration, story_payload(project, "x"))
            .await
            .unwrap();
        assert!(!reply.from_cache);
        assert_eq!(endpoint.submit_count(), 2);
    }
}
