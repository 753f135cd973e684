use super::{Chunks, ChunksError};

const DATA_FIELD: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    /// The line is not valid UTF-8.
    InvalidPayload,
    /// The line is not a `data:` field.
    UnexpectedLine(String),
    /// The body is a plain JSON document instead of an event stream. The
    /// whole body is carried.
    ErrorObject(String),
}

/// A frame read from the event stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// The payload of a `data:` line.
    Data(String),
    /// The terminal sentinel, no more data will follow.
    Done,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Frames are newline-delimited and may be split across chunks in any
/// way, the reader buffers until a full line is available.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
    started: bool,
    eof: bool,
    done: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            started: false,
            eof: false,
            done: false,
        }
    }

    /// Reads the next frame, returns `None` when the stream has ended,
    /// either by the sentinel or by the transport closing.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        if self.done {
            return Ok(None);
        }

        loop {
            // There may be complete lines in the buffer already.
            if let Some(frame) = self.try_parse_frame()? {
                if frame == Frame::Done {
                    self.done = true;
                }
                return Ok(Some(frame));
            }

            if self.eof {
                return Ok(None);
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // Flush the last line even if it has no terminator.
                self.eof = true;
                if !self.buf.is_empty() {
                    self.buf.push(b'\n');
                }
                continue;
            };
            if bytes.is_empty() {
                continue;
            }

            if !self.started {
                self.started = true;
                if bytes[0] == b'{' {
                    // Not an event stream at all, the server responded with
                    // a JSON document (usually an error object).
                    let mut body = bytes.to_vec();
                    body.extend(
                        self.chunks
                            .read_to_end()
                            .await
                            .map_err(Error::ChunksError)?,
                    );
                    return Err(Error::ErrorObject(
                        String::from_utf8_lossy(&body).into_owned(),
                    ));
                }
            }
            self.buf.extend_from_slice(&bytes);
        }
    }

    fn try_parse_frame(&mut self) -> Result<Option<Frame>, Error> {
        // For `end-of-line`, we handle line feed and carriage return plus
        // line feed. Only `data` fields are supported.
        while let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=eol_idx).collect();
            let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                continue;
            }

            let Ok(line) = str::from_utf8(line) else {
                return Err(Error::InvalidPayload);
            };
            let Some(data) = line.strip_prefix(DATA_FIELD) else {
                return Err(Error::UnexpectedLine(line.to_owned()));
            };
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data == DONE_SENTINEL {
                return Ok(Some(Frame::Done));
            }
            return Ok(Some(Frame::Data(data.to_owned())));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        let chunks = chunks.iter().map(|c| Bytes::from_static(*c)).collect();
        Sse::new(Chunks::from_vec_deque(chunks))
    }

    #[tokio::test]
    async fn test_normal_frames() {
        let mut sse = sse_from(&[
            b"data: hello\n\n",
            b"data: bye\n\ndata: [DONE]\n\n",
        ]);
        assert_eq!(
            sse.next_frame().await.unwrap(),
            Some(Frame::Data("hello".to_owned()))
        );
        assert_eq!(
            sse.next_frame().await.unwrap(),
            Some(Frame::Data("bye".to_owned()))
        );
        assert_eq!(sse.next_frame().await.unwrap(), Some(Frame::Done));
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_frames() {
        let mut sse = sse_from(&[b"da", b"ta:", b" hel", b"lo\r", b"\n\r\n"]);
        assert_eq!(
            sse.next_frame().await.unwrap(),
            Some(Frame::Data("hello".to_owned()))
        );
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multibyte_split() {
        let mut sse = sse_from(&[b"data: caf\xc3", b"\xa9\n"]);
        assert_eq!(
            sse.next_frame().await.unwrap(),
            Some(Frame::Data("caf\u{e9}".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_transport_close_without_sentinel() {
        let mut sse = sse_from(&[b"\n\ndata: last"]);
        assert_eq!(
            sse.next_frame().await.unwrap(),
            Some(Frame::Data("last".to_owned()))
        );
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sentinel_stops_reading() {
        let mut sse = sse_from(&[b"data: [DONE]\n", b"garbage\n"]);
        assert_eq!(sse.next_frame().await.unwrap(), Some(Frame::Done));
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_lines() {
        let mut sse = sse_from(&[b"xxxxxx\n\n"]);
        assert_eq!(
            sse.next_frame().await.unwrap_err(),
            Error::UnexpectedLine("xxxxxx".to_owned())
        );

        let mut sse = sse_from(&[b"event: ping\n"]);
        assert!(matches!(
            sse.next_frame().await.unwrap_err(),
            Error::UnexpectedLine(_)
        ));

        let mut sse = sse_from(&[b"data: \xff\xfe\n"]);
        assert_eq!(sse.next_frame().await.unwrap_err(), Error::InvalidPayload);
    }

    #[tokio::test]
    async fn test_error_object() {
        let mut sse = sse_from(&[
            b"{\"error\": {\"message\": ",
            b"\"too long\"}}",
        ]);
        assert_eq!(
            sse.next_frame().await.unwrap_err(),
            Error::ErrorObject(
                "{\"error\": {\"message\": \"too long\"}}".to_owned()
            )
        );
    }
}
