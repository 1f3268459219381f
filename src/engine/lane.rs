// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-(stage, source) admission queue and reorder buffer.
//!
//! A lane sees every frame of one source exactly once. Frames are *offered* when
//! all predecessor stages finished them, *admitted* into the stage, *completed*
//! when the invocation produced outputs, *exited* when the invocation returned,
//! and *released* when the outputs may become visible to successors.
//!
//! Policies, derived from the stage's descriptor:
//! * ordered admission: frames are admitted strictly by sequence id
//! * exclusive: at most one admitted frame that has not exited
//! * reorder: completions are released strictly by sequence id
//!
//! A missing sequence id blocks admission and release of everything above it.
//! With a capacity, a reorder buffer holding more than `capacity` completions
//! gives up on the missing id and flushes; late completions below the release
//! point are then released as they arrive.

use std::collections::BTreeMap;

use crate::data::SequenceId;
use crate::traits::StageDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LanePolicy {
    pub ordered_admission: bool,
    pub exclusive: bool,
    pub reorder: bool,
    pub capacity: Option<usize>,
}

impl LanePolicy {
    pub fn from_descriptor(descriptor: &StageDescriptor, capacity: Option<usize>) -> Self {
        Self {
            ordered_admission: descriptor.needs_reorder || descriptor.source_context_dependent,
            exclusive: descriptor.source_context_dependent,
            reorder: descriptor.needs_reorder,
            capacity,
        }
    }
}

/// Result of a forced flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Overflow {
    pub missing_from: SequenceId,
    pub flushed: usize,
}

#[derive(Debug)]
pub(crate) struct Lane<P, C> {
    policy: LanePolicy,
    next_admit: SequenceId,
    waiting: BTreeMap<SequenceId, P>,
    in_flight: usize,
    next_release: SequenceId,
    completed: BTreeMap<SequenceId, C>,
}

impl<P, C> Lane<P, C> {
    pub fn new(policy: LanePolicy) -> Self {
        Self {
            policy,
            next_admit: 0,
            waiting: BTreeMap::new(),
            in_flight: 0,
            next_release: 0,
            completed: BTreeMap::new(),
        }
    }

    pub fn offer(&mut self, sequence_id: SequenceId, pending: P) {
        self.waiting.insert(sequence_id, pending);
    }

    /// Next frame allowed into the stage, if any.
    pub fn next_admission(&mut self) -> Option<(SequenceId, P)> {
        if self.policy.exclusive && self.in_flight > 0 {
            return None;
        }
        let (&sequence_id, _) = self.waiting.first_key_value()?;
        if self.policy.ordered_admission && sequence_id != self.next_admit {
            return None;
        }
        let pending = self.waiting.remove(&sequence_id)?;
        self.next_admit = self.next_admit.max(sequence_id + 1);
        self.in_flight += 1;
        Some((sequence_id, pending))
    }

    pub fn exit(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn complete(&mut self, sequence_id: SequenceId, completion: C) {
        self.completed.insert(sequence_id, completion);
    }

    /// Next completion that may become visible, if any.
    pub fn next_release(&mut self) -> Option<(SequenceId, C)> {
        if !self.policy.reorder {
            return self.completed.pop_first();
        }
        let (&sequence_id, _) = self.completed.first_key_value()?;
        if sequence_id > self.next_release {
            return None;
        }
        let completion = self.completed.remove(&sequence_id)?;
        if sequence_id == self.next_release {
            self.next_release += 1;
        }
        Some((sequence_id, completion))
    }

    /// Flush past a missing id when the buffer outgrew its capacity.
    pub fn check_overflow(&mut self) -> Option<Overflow> {
        let capacity = self.policy.capacity?;
        if !self.policy.reorder || self.completed.len() <= capacity {
            return None;
        }
        let (&last, _) = self.completed.last_key_value()?;
        let overflow = Overflow {
            missing_from: self.next_release,
            flushed: self.completed.len(),
        };
        self.next_release = last + 1;
        Some(overflow)
    }

    /// Completions held back behind a missing id.
    pub fn held(&self) -> usize {
        self.completed.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.policy.capacity
    }
}
