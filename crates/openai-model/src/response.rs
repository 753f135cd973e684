use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use parley_model::{ErrorKind, ModelResponse, ResponseChunk};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::{Frame, Sse};
use crate::proto::{ChatCompletion, ChatCompletionChunk};

struct PartialState {
    sse: Option<Sse>,
    // A frame may carry deltas for several choices, they are handed out
    // one by one.
    pending_chunks: VecDeque<ResponseChunk>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = Result<(Option<ResponseChunk>, PartialState), Error>;

pin_project! {
    /// A response from an OpenAI-compatible endpoint, either streamed or
    /// buffered.
    pub struct OpenAIResponse {
        next_chunk_fut: Option<PinnedFuture<NextChunk>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        Self::from_state(PartialState {
            sse: Some(sse),
            pending_chunks: Default::default(),
        })
    }

    #[inline]
    pub fn from_completion(completion: ChatCompletion) -> Self {
        Self::from_state(PartialState {
            sse: None,
            pending_chunks: completion.into_response_chunks().collect(),
        })
    }

    fn from_state(partial_state: PartialState) -> Self {
        let next_chunk_fut = async move { next_chunk(partial_state).await };
        Self {
            next_chunk_fut: Some(Box::pin(next_chunk_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        let (chunk, partial_state) =
            match ready!(next_chunk_fut.as_mut().poll(cx)) {
                Ok((Some(chunk), partial_state)) => (chunk, partial_state),
                Ok((None, _)) => {
                    *this.next_chunk_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_chunk_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next chunk.
        let next_chunk_fut = async move { next_chunk(partial_state).await };
        *this.next_chunk_fut = Some(Box::pin(next_chunk_fut));

        Poll::Ready(Ok(Some(chunk)))
    }
}

async fn next_chunk(mut partial_state: PartialState) -> NextChunk {
    loop {
        if let Some(chunk) = partial_state.pending_chunks.pop_front() {
            return Ok((Some(chunk), partial_state));
        }

        let frame = match partial_state.sse.as_mut() {
            Some(sse) => sse.next_frame().await?,
            None => return Ok((None, partial_state)),
        };
        let data = match frame {
            Some(Frame::Data(data)) => data,
            Some(Frame::Done) | None => {
                partial_state.sse = None;
                continue;
            }
        };
        trace!("got sse frame: {data}");

        let value = serde_json::from_str::<Value>(&data).map_err(|err| {
            Error::new(format!("malformed frame: {err}"), ErrorKind::Protocol)
        })?;
        if value.get("error").is_some() {
            return Err(Error::from_error_body(value));
        }
        let chunk = serde_json::from_value::<ChatCompletionChunk>(value)
            .map_err(|err| {
                Error::new(format!("invalid frame: {err}"), ErrorKind::Protocol)
            })?;
        partial_state
            .pending_chunks
            .extend(chunk.into_response_chunks());
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use parley_model::{FunctionCallDelta, Role};

    use super::*;
    use crate::io::Chunks;

    async fn collect_chunks(
        resp: OpenAIResponse,
    ) -> Result<Vec<ResponseChunk>, Error> {
        let mut resp = pin!(resp);
        let mut chunks = vec![];
        while let Some(chunk) =
            poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await?
        {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn sse_response(body: &'static [u8]) -> OpenAIResponse {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(body)].into(),
        );
        OpenAIResponse::from_sse(Sse::new(chunks))
    }

    #[tokio::test]
    async fn test_pong_stream() {
        let resp = sse_response(include_bytes!("../fixtures/pong.txt"));
        let chunks = collect_chunks(resp).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].role, Some(Role::Assistant));
        assert_eq!(chunks[1].content.as_deref(), Some("Pong"));
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_function_call_stream() {
        let resp =
            sse_response(include_bytes!("../fixtures/function_call.txt"));
        let chunks = collect_chunks(resp).await.unwrap();

        let mut name = String::new();
        let mut arguments = String::new();
        for chunk in &chunks {
            if let Some(FunctionCallDelta {
                name: n,
                arguments: a,
            }) = &chunk.function_call
            {
                name.push_str(n.as_deref().unwrap_or_default());
                arguments.push_str(a.as_deref().unwrap_or_default());
            }
        }
        assert_eq!(name, "get_current_weather");
        assert_eq!(arguments, "{\"location\":\"Albuquerque\"}");
        assert_eq!(
            chunks.last().unwrap().finish_reason.as_deref(),
            Some("function_call")
        );
    }

    #[tokio::test]
    async fn test_multi_choice_frame() {
        let resp = sse_response(
            b"data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"a\"}},{\"index\":1,\"delta\":{\"content\":\"b\"}}]}\n\ndata: [DONE]\n\n",
        );
        let chunks = collect_chunks(resp).await.unwrap();
        let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_malformed_frames() {
        let resp = sse_response(b"data: {not json\n\n");
        let err = collect_chunks(resp).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);

        let resp = sse_response(b"data: {\"choices\":[{\"delta\":{}}]}\n\n");
        let err = collect_chunks(resp).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);

        let resp = sse_response(b"retry: 100\n\n");
        let err = collect_chunks(resp).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_error_in_stream() {
        let resp = sse_response(
            b"{\"error\":{\"message\":\"This model's maximum context length is 4097 tokens.\",\"code\":\"context_length_exceeded\"}}",
        );
        let err = collect_chunks(resp).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Remote);
        assert_eq!(
            err.payload.unwrap()["error"]["code"],
            "context_length_exceeded"
        );

        let resp =
            sse_response(b"data: {\"error\":{\"message\":\"overloaded\"}}\n\n");
        let err = collect_chunks(resp).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Remote);
        assert_eq!(err.message(), "overloaded");
    }

    #[tokio::test]
    async fn test_buffered_completion() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"content":"Hi"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        let chunks =
            collect_chunks(OpenAIResponse::from_completion(completion))
                .await
                .unwrap();
        assert_eq!(
            chunks,
            vec![ResponseChunk {
                index: 0,
                role: None,
                content: Some("Hi".to_owned()),
                function_call: None,
                finish_reason: Some("stop".to_owned()),
            }]
        );
    }
}
