/// Execute a callback on dropping of the container type.
///
/// The callback must not panic under any circumstance. Since it is called while dropping an item,
/// this might result in aborting program execution.
pub struct CallOnDrop {
    f: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CallOnDrop {
    /// Creates a new `CallOnDrop`.
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> CallOnDrop {
        CallOnDrop {
            f: Some(Box::new(f)),
        }
    }
}

impl Drop for CallOnDrop {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_runs_when_task_is_aborted() {
        let calls = Arc::new(AtomicUsize::new(0));

        let guard = {
            let calls = Arc::clone(&calls);
            CallOnDrop::new(move || {
                calls.fetch_add(1, Ordering::Relaxed);
            })
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
