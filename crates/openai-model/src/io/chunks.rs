#[cfg(test)]
use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Response;
use tokio::time::timeout;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Transport(String),
    /// No data arrived within the unresponsiveness window.
    TimedOut(Duration),
}

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Response {
        response: Response,
        unresponsive_timeout: Option<Duration>,
    },
    #[cfg(test)]
    VecDeque(VecDeque<Bytes>),
    /// Chunks that each arrive after a delay.
    #[cfg(test)]
    Delayed {
        chunks: VecDeque<(Duration, Bytes)>,
        unresponsive_timeout: Option<Duration>,
    },
}

impl Chunks {
    pub fn from_response(
        response: Response,
        unresponsive_timeout: Option<Duration>,
    ) -> Self {
        Chunks::Response {
            response,
            unresponsive_timeout,
        }
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    #[cfg(test)]
    pub fn delayed(
        chunks: VecDeque<(Duration, Bytes)>,
        unresponsive_timeout: Option<Duration>,
    ) -> Self {
        Chunks::Delayed {
            chunks,
            unresponsive_timeout,
        }
    }

    /// Reads the next chunk.
    ///
    /// The unresponsiveness timeout restarts with every call, so it bounds
    /// the gap between two chunks rather than the whole body.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response {
                response,
                unresponsive_timeout,
            } => within(*unresponsive_timeout, response.chunk())
                .await?
                .map_err(|err| Error::Transport(format!("{err}"))),
            #[cfg(test)]
            Chunks::VecDeque(vec) => {
                let chunk = vec.pop_front();
                Ok(chunk)
            }
            #[cfg(test)]
            Chunks::Delayed {
                chunks,
                unresponsive_timeout,
            } => {
                let next = chunks.pop_front();
                within(*unresponsive_timeout, async move {
                    let (delay, chunk) = next?;
                    tokio::time::sleep(delay).await;
                    Some(chunk)
                })
                .await
            }
        }
    }

    /// Reads all the remaining chunks into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

async fn within<F: Future>(
    window: Option<Duration>,
    fut: F,
) -> Result<F::Output, Error> {
    match window {
        Some(window) => {
            timeout(window, fut).await.map_err(|_| Error::TimedOut(window))
        }
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use parley_model::{ErrorKind, ModelProviderError};

    use super::*;

    fn steady(count: usize, gap: Duration) -> VecDeque<(Duration, Bytes)> {
        (0..count)
            .map(|i| (gap, Bytes::from(format!("{i}"))))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_gaps_not_total_time() {
        let window = Duration::from_millis(500);
        let started = tokio::time::Instant::now();
        let gap = Duration::from_millis(300);
        let mut chunks = Chunks::delayed(steady(5, gap), Some(window));

        let body = chunks.read_to_end().await.unwrap();
        assert_eq!(body, b"01234");
        assert!(started.elapsed() > window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_body_times_out() {
        let window = Duration::from_millis(500);
        let mut chunks = Chunks::delayed(
            [
                (Duration::from_millis(100), Bytes::from_static(b"data: ")),
                (Duration::from_secs(2), Bytes::from_static(b"[DONE]\n")),
            ]
            .into(),
            Some(window),
        );

        assert_eq!(
            chunks.next_chunk().await,
            Ok(Some(Bytes::from_static(b"data: ")))
        );
        let err = chunks.next_chunk().await.unwrap_err();
        assert_eq!(err, Error::TimedOut(window));
        assert_eq!(crate::Error::from(err).kind(), ErrorKind::Transient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_allows_long_gaps() {
        let gap = Duration::from_secs(60);
        let mut chunks = Chunks::delayed(steady(2, gap), None);
        assert_eq!(chunks.read_to_end().await.unwrap(), b"01");
    }
}
