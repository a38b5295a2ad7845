//! Bounded concurrent fan-out.
//!
//! Every task runs detached on the runtime. Results are collected until all
//! tasks succeed or the first error arrives. Tasks still running when an
//! error is returned are not cancelled and their side effects are not
//! rolled back.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::{ServiceError, ServiceResult};

/// Run `tasks` concurrently and return their results in input order
pub async fn fan_out<T, F>(tasks: Vec<F>) -> ServiceResult<Vec<T>>
where
    F: Future<Output = ServiceResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let total = tasks.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let (result_tx, mut result_rx) = mpsc::channel::<(usize, T)>(total);
    let (error_tx, mut error_rx) = mpsc::channel::<ServiceError>(total);

    for (index, task) in tasks.into_iter().enumerate() {
        let result_tx = result_tx.clone();
        let error_tx = error_tx.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(value) => {
                    let _ = result_tx.send((index, value)).await;
                }
                Err(e) => {
                    let _ = error_tx.send(e).await;
                }
            }
        });
    }
    drop(result_tx);
    drop(error_tx);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut received = 0;
    while received < total {
        tokio::select! {
            Some(e) = error_rx.recv() => return Err(e),
            Some((index, value)) = result_rx.recv() => {
                slots[index] = Some(value);
                received += 1;
            }
            else => {
                return Err(ServiceError::Internal {
                    message: format!("fan-out task ended without a result ({received}/{total})"),
                });
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let tasks: Vec<_> = [30u64, 0, 10]
            .into_iter()
            .map(|delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, ServiceError>(delay)
            })
            .collect();

        assert_eq!(fan_out(tasks).await.unwrap(), vec![30, 0, 10]);
    }

    #[tokio::test]
    async fn test_first_error_returns_without_cancelling_siblings() {
        let finished = Arc::new(AtomicBool::new(false));

        let slow = {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.store(true, Ordering::SeqCst);
                Ok::<(), ServiceError>(())
            }
        };
        let failing = async {
            Err::<(), ServiceError>(ServiceError::Internal {
                message: "boom".to_string(),
            })
        };
        let tasks: Vec<Pin<Box<dyn Future<Output = ServiceResult<()>> + Send>>> =
            vec![Box::pin(slow), Box::pin(failing)];

        let err = fan_out(tasks).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal { .. }));
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicked_task_is_an_error() {
        let tasks = vec![async {
            if true {
                panic!("task died");
            }
            Ok::<u8, ServiceError>(1)
        }];

        assert!(fan_out(tasks).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let tasks: Vec<std::future::Ready<ServiceResult<u8>>> = Vec::new();
        assert!(fan_out(tasks).await.unwrap().is_empty());
    }
}
