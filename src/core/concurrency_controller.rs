use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 同时在途请求数的硬上限。默认不启用，启用后拿不到许可会阻塞读取
pub struct ConcurrencyController {
    semaphore: Arc<Semaphore>,
    total_permits: usize,
}

impl ConcurrencyController {
    pub fn new(total_permits: usize) -> Self {
        ConcurrencyController {
            semaphore: Arc::new(Semaphore::new(total_permits)),
            total_permits,
        }
    }

    // 获取许可，信号量不会被关闭
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    pub fn in_flight(&self) -> usize {
        self.total_permits - self.semaphore.available_permits()
    }

    pub fn total_permits(&self) -> usize {
        self.total_permits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let controller = ConcurrencyController::new(2);
        let first = controller.acquire().await.unwrap();
        let _second = controller.acquire().await.unwrap();
        assert_eq!(controller.in_flight(), 2);
        assert!(controller.semaphore.clone().try_acquire_owned().is_err());
        drop(first);
        assert_eq!(controller.in_flight(), 1);
        assert_eq!(controller.total_permits(), 2);
    }
}
