use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::error::Error;

/// A set of tasks sharing one cancellation scope where the first failure wins.
///
/// The first task to return an error cancels the shared token; the remaining tasks are
/// expected to observe it and finish with `Ok`. [`TaskGroup::wait`] reports that first error
/// only. A panicking task counts as a failure.
pub struct TaskGroup {
    tasks: JoinSet<Result<()>>,
    token: CancellationToken,
}

impl TaskGroup {
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
        }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task to finish and return the first error, if any.
    pub async fn wait(mut self) -> Result<()> {
        let mut first: Option<Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(e) => Err(Error::from(e)),
            };

            if let Err(e) = outcome {
                if first.is_none() {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, "Task failed, cancelling siblings");
                    self.token.cancel();
                    first = Some(e);
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %e, "Suppressing error after first failure");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                }
            }
        }

        first.map_or(Ok(()), Err)
    }
}
