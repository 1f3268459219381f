// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::data::InputFrame;

/// An asynchronous producer of frames, typically a subscription on a message bus.
///
/// Each call yields one logical frame for one source. `None` ends the stream.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<InputFrame>;
}

#[async_trait]
impl FrameSource for tokio::sync::mpsc::Receiver<InputFrame> {
    async fn next_frame(&mut self) -> Option<InputFrame> {
        self.recv().await
    }
}
