//! Session and share lifecycle protocol.
//!
//! Every operation loads the records it needs, mutates them in memory and
//! writes them back as a sequence of independent store writes. There are no
//! transactions: each operation orders its writes so that a failure part way
//! through leaves at worst an orphaned reference, which expires on its own.
//!
//! | operation  | write order                                   | partial failure          |
//! |------------|-----------------------------------------------|--------------------------|
//! | create     | share (+ PIN index), then session             | share without a session  |
//! | adopt      | group share, then session                     | host not targeting group |
//! | new-link   | solo share, then session                      | share without a target   |
//! | stop       | each share, then session                      | session keeps old target |

mod adopt;
mod create;
mod error;
mod fetch;
mod new_link;
mod post;
mod stop;

pub use adopt::AdoptRequest;
pub use create::{CreateRequest, Created, ShareMode};
pub use error::{
    INVALID_LOCATION, INVALID_PIN, INVALID_SESSION, LifecycleError, LifecycleResult,
    MISSING_DATA, SESSION_EXPIRED, SHARE_NOT_FOUND,
};
pub use fetch::{FetchQuery, GroupView, ShareView, SoloView};
pub use new_link::{NewLink, NewLinkRequest};
pub use post::{PostRequest, Posted};
pub use stop::StopRequest;

use crate::auth::Authenticator;
use crate::linkgen::LinkGenerator;
use beacon_core::config::{AppConfig, LimitsConfig, LinkConfig};
use beacon_storage::RecordStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Orchestrates sessions and shares over a [`RecordStore`].
#[derive(Clone)]
pub struct Lifecycle {
    records: RecordStore,
    links: LinkGenerator,
    authenticator: Arc<dyn Authenticator>,
    limits: LimitsConfig,
    link_config: LinkConfig,
    public_url: String,
    deadline: Duration,
}

impl Lifecycle {
    pub fn new(
        config: &AppConfig,
        records: RecordStore,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            links: LinkGenerator::new(records.clone(), config.links.style),
            records,
            authenticator,
            limits: config.limits.clone(),
            link_config: config.links.clone(),
            public_url: config.server.public_url.clone(),
            deadline: config.server.request_timeout(),
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Run `operation` under the request deadline.
    ///
    /// When the deadline elapses the operation is dropped at its current
    /// await point, so no further writes are issued. Writes already made stay.
    pub async fn bounded<T>(
        &self,
        operation: impl Future<Output = LifecycleResult<T>>,
    ) -> LifecycleResult<T> {
        with_deadline(self.deadline, operation).await
    }
}

pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    operation: impl Future<Output = LifecycleResult<T>>,
) -> LifecycleResult<T> {
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                deadline_secs = deadline.as_secs_f64(),
                "Operation abandoned at request deadline"
            );
            Err(LifecycleError::DeadlineExceeded)
        }
    }
}

/// First eight characters of a session id, for logs.
pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(idx, _)| &id[..idx])
}

/// Treat empty form values as absent.
pub(crate) fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_to_eight_chars() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("ääääääääää"), "ääääääää");
    }

    #[tokio::test]
    async fn deadline_abandons_slow_operations() {
        let result: LifecycleResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(LifecycleError::DeadlineExceeded)));

        let result = with_deadline(Duration::from_secs(5), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
