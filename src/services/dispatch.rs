//! Dispatch worker - moves due posts through publishing to a terminal state
//!
//! The worker polls for fully-resolved posts whose publish time has arrived,
//! claims each one atomically (`scheduled` -> `publishing`, so a post is never
//! double-dispatched), hands every target to the configured `Publisher`, and
//! records the aggregate outcome. Any rejected target fails the post overall;
//! the failing providers are kept on the post as `delivery_failed` issues.
//!
//! Platform wire formats live behind the `Publisher` seam - the production
//! implementation forwards payloads to per-provider adapter services.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use std::future::Future;

use crate::constants::DISPATCH_BATCH_SIZE;
use crate::domain::platforms::{IssueReason, PlatformIssue, PlatformTarget};
use crate::domain::schedule::queries;
use crate::domain::schedule::{PostStatus, ScheduledPost};

/// Confirmation that one target accepted the post
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub provider: crate::domain::platforms::Provider,
    pub remote_id: String,
}

/// One target's rejection
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub provider: crate::domain::platforms::Provider,
    pub message: String,
}

/// Seam to the external platform adapters
pub trait Publisher: Send + Sync + 'static {
    fn publish(
        &self,
        post: &ScheduledPost,
        target: &PlatformTarget,
    ) -> impl Future<Output = Result<DeliveryReceipt, DeliveryFailure>> + Send;
}

/// Terminal status and issue list for a finished dispatch.
///
/// Policy: the post fails overall if any target rejects; successful targets
/// are not re-sent on a later attempt (the post is terminal either way).
pub fn outcome_from_deliveries(failures: &[DeliveryFailure]) -> (PostStatus, Vec<PlatformIssue>) {
    if failures.is_empty() {
        return (PostStatus::Published, Vec::new());
    }

    let issues = failures
        .iter()
        .map(|f| PlatformIssue {
            provider: f.provider,
            reason: IssueReason::DeliveryFailed,
            detail: Some(f.message.clone()),
        })
        .collect();

    (PostStatus::Failed, issues)
}

/// Forwards posts to per-provider adapter services over HTTP.
///
/// POSTs to `{base_url}/{provider}` and expects a 2xx with
/// `{"remoteId": "..."}`.
#[derive(Clone)]
pub struct WebhookPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl WebhookPublisher {
    pub fn new(base_url: String) -> Self {
        WebhookPublisher {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(serde::Deserialize)]
struct AdapterResponse {
    #[serde(rename = "remoteId")]
    remote_id: String,
}

impl Publisher for WebhookPublisher {
    async fn publish(
        &self,
        post: &ScheduledPost,
        target: &PlatformTarget,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let provider = target.provider;
        let fail = |message: String| DeliveryFailure { provider, message };

        let url = format!("{}/{}", self.base_url, provider);
        let payload = json!({
            "postId": post.id,
            "userId": post.user_id,
            "caption": post.caption,
            "mediaKind": post.media_kind,
            "mediaUrl": post.media_url,
            "options": target.options,
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| fail(format!("adapter unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(fail(format!("adapter returned {}", response.status())));
        }

        let body: AdapterResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("bad adapter response: {}", e)))?;

        Ok(DeliveryReceipt {
            provider,
            remote_id: body.remote_id,
        })
    }
}

/// Claim and publish one post. Returns the terminal status, or None if the
/// post was already claimed (or deleted) by the time we got to it.
async fn dispatch_post<P: Publisher>(
    db: &PgPool,
    publisher: &P,
    post_id: i64,
) -> Result<Option<PostStatus>, sqlx::Error> {
    let Some(post) = queries::claim_for_publishing(db, post_id).await? else {
        return Ok(None);
    };

    let mut failures: Vec<DeliveryFailure> = Vec::new();
    for target in post.platforms.0.iter() {
        match publisher.publish(&post, target).await {
            Ok(receipt) => {
                println!(
                    "[dispatch] post {} delivered to {} as {}",
                    post.id, receipt.provider, receipt.remote_id
                );
            }
            Err(failure) => {
                eprintln!(
                    "[dispatch] post {} rejected by {}: {}",
                    post.id, failure.provider, failure.message
                );
                failures.push(failure);
            }
        }
    }

    let (status, issues) = outcome_from_deliveries(&failures);
    let recorded = queries::record_publish_outcome(db, post.id, status, &issues).await?;
    if !recorded {
        // Row deleted mid-flight; nothing to record against
        eprintln!("[dispatch] post {} vanished before outcome write", post.id);
    }

    Ok(Some(status))
}

/// Background loop: poll for due posts and dispatch them
pub async fn run_dispatch_loop<P: Publisher>(db: PgPool, publisher: P, poll_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(poll_secs));

    loop {
        interval.tick().await;

        let due = match queries::find_due_post_ids(&db, Utc::now(), DISPATCH_BATCH_SIZE).await {
            Ok(ids) => ids,
            Err(e) => {
                eprintln!("[dispatch] error finding due posts: {}", e);
                continue;
            }
        };

        for post_id in due {
            match dispatch_post(&db, &publisher, post_id).await {
                Ok(Some(status)) => {
                    println!("[dispatch] post {} -> {}", post_id, status.as_str());
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("[dispatch] post {} - error: {}", post_id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::platforms::Provider;

    #[test]
    fn test_clean_deliveries_publish() {
        let (status, issues) = outcome_from_deliveries(&[]);
        assert_eq!(status, PostStatus::Published);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_any_failure_fails_overall() {
        let failures = vec![DeliveryFailure {
            provider: Provider::Tiktok,
            message: "adapter returned 502".to_string(),
        }];

        let (status, issues) = outcome_from_deliveries(&failures);

        assert_eq!(status, PostStatus::Failed);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].provider, Provider::Tiktok);
        assert_eq!(issues[0].reason, IssueReason::DeliveryFailed);
        assert_eq!(issues[0].detail.as_deref(), Some("adapter returned 502"));
    }
}
