//! Lifespan management for the vehicle link.
//!
//! The link is opened lazily by whichever comes first: the warm-up probe or
//! a genuine client request. Both may race, so acquisition is serialized
//! behind an async mutex and yields the same link to every caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::{LifespanError, VehicleConfig, VehicleLink};

/// Acquire/release lifecycle of the backend resource served to tools.
#[async_trait]
pub trait Lifespan: Send + Sync {
    /// Return the live link, opening it on first use.
    ///
    /// Must be safe to call concurrently and any number of times.
    async fn acquire(&self) -> Result<Arc<VehicleLink>, LifespanError>;

    /// Drop the link. A later `acquire` opens a new one.
    async fn release(&self);

    /// Whether a link is currently open.
    fn is_ready(&self) -> bool;
}

/// Lifespan backed by a UDP MAVLink socket.
pub struct VehicleLifespan {
    config: VehicleConfig,
    link: Mutex<Option<Arc<VehicleLink>>>,
    ready: AtomicBool,
    connects: AtomicUsize,
}

impl VehicleLifespan {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            config,
            link: Mutex::new(None),
            ready: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    /// Number of times a link was actually opened.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }
}

#[async_trait]
impl Lifespan for VehicleLifespan {
    #[instrument(skip(self), fields(address = %self.config.address))]
    async fn acquire(&self) -> Result<Arc<VehicleLink>, LifespanError> {
        let mut slot = self.link.lock().await;

        if let Some(link) = slot.as_ref() {
            return Ok(Arc::clone(link));
        }

        info!("Opening vehicle link");
        let link = Arc::new(VehicleLink::bind(&self.config.address).await?);

        self.connects.fetch_add(1, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
        *slot = Some(Arc::clone(&link));

        Ok(link)
    }

    async fn release(&self) {
        let mut slot = self.link.lock().await;
        if slot.take().is_some() {
            info!("Vehicle link released");
        }
        self.ready.store(false, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    fn loopback() -> VehicleConfig {
        VehicleConfig {
            address: "udpin://127.0.0.1:0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_acquire_is_lazy() {
        let lifespan = VehicleLifespan::new(loopback());
        assert!(!lifespan.is_ready());
        assert_eq!(lifespan.connect_count(), 0);

        lifespan.acquire().await.unwrap();
        assert!(lifespan.is_ready());
        assert_eq!(lifespan.connect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_acquire_opens_once() {
        let lifespan = Arc::new(VehicleLifespan::new(loopback()));

        let attempts = (0..8).map(|_| {
            let lifespan = Arc::clone(&lifespan);
            tokio::spawn(async move { lifespan.acquire().await })
        });

        let links: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(lifespan.connect_count(), 1);
        assert!(links.iter().all(|link| Arc::ptr_eq(link, &links[0])));
    }

    #[tokio::test]
    async fn test_release_then_reacquire() {
        let lifespan = VehicleLifespan::new(loopback());
        lifespan.acquire().await.unwrap();
        lifespan.release().await;
        assert!(!lifespan.is_ready());

        lifespan.acquire().await.unwrap();
        assert_eq!(lifespan.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_acquire_leaves_lifespan_unready() {
        let lifespan = VehicleLifespan::new(VehicleConfig {
            address: "serial:///dev/ttyACM0".to_string(),
        });

        assert!(lifespan.acquire().await.is_err());
        assert!(!lifespan.is_ready());
        assert_eq!(lifespan.connect_count(), 0);
    }
}
