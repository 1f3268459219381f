// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::errors::SubmitError;

/// Held by a frame from acceptance until its delivery.
pub(crate) type FramePermit = OwnedSemaphorePermit;

/// Hands out one permit per accepted frame.
///
/// Enforces the in-flight limit and lets shutdown wait until every accepted
/// frame has been delivered.
#[derive(Debug)]
pub(crate) struct FrameGauge {
    permits: Arc<Semaphore>,
    capacity: u32,
    limit: Option<usize>,
    closing: AtomicBool,
    submitted: AtomicU64,
}

impl FrameGauge {
    pub fn new(limit: Option<usize>) -> Self {
        let unbounded = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        let capacity = limit.map_or(unbounded, |limit| limit.clamp(1, unbounded));
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity: capacity as u32,
            limit,
            closing: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn acquire(&self) -> Result<FramePermit, SubmitError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(SubmitError::ShuttingDown);
        }
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => {
                self.submitted.fetch_add(1, Ordering::SeqCst);
                Ok(permit)
            }
            Err(TryAcquireError::Closed) => Err(SubmitError::ShuttingDown),
            Err(TryAcquireError::NoPermits) if self.closing.load(Ordering::SeqCst) => {
                Err(SubmitError::ShuttingDown)
            }
            Err(TryAcquireError::NoPermits) => Err(SubmitError::Backpressure {
                limit: self.limit.unwrap_or(self.capacity as usize),
            }),
        }
    }

    /// Refuse new frames and wait until the accepted ones are delivered.
    pub async fn close_and_wait(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let drained = self.permits.acquire_many(self.capacity).await;
        self.permits.close();
        drop(drained);
    }

    pub fn in_flight(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.permits.available_permits())
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }
}
