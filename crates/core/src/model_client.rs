use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use parley_model::{
    Choice, ModelProvider, ModelRequest, ModelResponse, ResponseChunk,
};
use tracing::Instrument;

use crate::Error;
use crate::aggregator::{Aggregator, Canceller, StreamDelta};

/// Receives every chunk of a streamed response while it arrives.
///
/// The callback is shared by all attempts of a request, so it may see the
/// beginning of a reply more than once when a transient failure happens in
/// the middle of a stream.
pub type DeltaCallback =
    Arc<dyn Fn(&StreamDelta<'_>, &Canceller) + Send + Sync>;

type SendRequestResult = Result<Vec<Choice>, Error>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Option<DeltaCallback>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // `Conversation` doesn't carry the provider type, so it's erased
        // here once.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the aggregated choices.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response is dropped, and with it
    /// the underlying connection, when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: Option<DeltaCallback>,
    ) -> SendRequestResult {
        (self.handler_fn)(req, on_delta).await
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: Option<DeltaCallback>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Error::from_provider(&err));
        }
    };

    let mut aggregator = Aggregator::default();
    let canceller = Canceller::default();

    trace!("start receiving chunks");

    let mut pinned_resp = pin!(resp);
    loop {
        let chunk_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_chunk(cx)).await;
        let chunk: ResponseChunk = match chunk_or_err {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Error::from_provider(&err));
            }
        };
        trace!("got a chunk: {chunk:?}");

        if let Some(on_delta) = &on_delta {
            on_delta(&StreamDelta::from(&chunk), &canceller);
        }
        aggregator.push(chunk);

        if canceller.is_cancelled() {
            debug!("the stream was cancelled by the delta callback");
            return Err(Error::Cancelled {
                choices: aggregator.into_partial_choices(),
            });
        }
    }

    trace!("finished a request");

    aggregator.finish()
}
