//! Trait abstraction for receiver byte sources to enable testing

use async_trait::async_trait;
use bytes::Bytes;
use std::io;

/// Source of raw receiver bytes
#[async_trait]
pub trait Transport: Send {
    /// Read whatever bytes are available
    ///
    /// Returns an empty buffer when nothing arrived within the poll timeout.
    async fn read_available(&mut self) -> io::Result<Bytes>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn read_available(&mut self) -> io::Result<Bytes> {
        (**self).read_available().await
    }
}

/// Replays a recorded byte stream in fixed-size chunks
///
/// Used by the `--replay` mode of the binary and by loopback tests.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    data: Bytes,
    chunk_size: usize,
}

impl ReplayTransport {
    pub fn new(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Bytes not yet read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn read_available(&mut self) -> io::Result<Bytes> {
        let take = self.chunk_size.min(self.data.len());
        Ok(self.data.split_to(take))
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock transport returning scripted chunks and errors
    #[derive(Clone, Default)]
    pub struct MockTransport {
        pub chunks: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        pub reads: Arc<Mutex<usize>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_chunk(&self, data: &[u8]) {
            self.chunks.lock().unwrap().push_back(Ok(data.to_vec()));
        }

        pub fn push_error(&self, error: io::ErrorKind) {
            self.chunks
                .lock()
                .unwrap()
                .push_back(Err(io::Error::new(error, "Mock read error")));
        }

        pub fn read_count(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn read_available(&mut self) -> io::Result<Bytes> {
            *self.reads.lock().unwrap() += 1;
            match self.chunks.lock().unwrap().pop_front() {
                Some(Ok(data)) => Ok(Bytes::from(data)),
                Some(Err(e)) => Err(e),
                None => Ok(Bytes::new()),
            }
        }
    }
}
