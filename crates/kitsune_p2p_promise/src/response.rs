//! Response future for a request/response exchange with a remote peer.
//!
//! Two completion disciplines:
//!
//! - immediate: [`FutureResponse::respond`] (or a failure) completes the
//!   exchange as soon as the reply is known.
//! - deferred: [`FutureResponse::respond_later`] records the outcome without
//!   completing, because a later stage (e.g. the transport closing the
//!   channel) still has to run. That stage calls
//!   [`FutureResponse::respond_now`] to publish the recorded outcome. Once an
//!   outcome is deferred, every ordinary completion call is refused.
//!
//! Streaming replies hand a progress callback from the side owning the
//! outgoing stream to the side allowed to push more data through two
//! single-use gates: the first opens once the handler is set, the second
//! once the first progress step ran.

use crate::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Decides whether a received reply counts as a success.
pub trait SuccessEvaluator<Req, Resp>: 'static + Send + Sync {
    /// `Ok(())` if `response` to `request` is a success,
    /// otherwise the reason it is not.
    fn evaluate(&self, request: &Req, response: &Resp) -> Result<(), FailReason>;
}

/// Any reply at all means the exchange succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommunicationEvaluator;

impl<Req, Resp> SuccessEvaluator<Req, Resp> for CommunicationEvaluator {
    fn evaluate(&self, _request: &Req, _response: &Resp) -> Result<(), FailReason> {
        Ok(())
    }
}

/// Receives intermediate replies of a streaming exchange.
pub type ProgressListener<Resp> = Arc<dyn Fn(&Resp) + 'static + Send + Sync>;

/// Pushes the next chunk of a streaming exchange.
pub type ProgressHandler = Arc<dyn Fn() + 'static + Send + Sync>;

#[derive(Default)]
struct ProgressGates {
    handler: Mutex<Option<ProgressHandler>>,
    first: Latch,
    second: Latch,
}

impl ProgressGates {
    fn run_handler(&self) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// Extension state of a [`FutureResponse`].
pub struct Exchange<Req, Resp> {
    request: Arc<Req>,
    evaluator: Arc<dyn SuccessEvaluator<Req, Resp>>,
    progress_listener: Option<ProgressListener<Resp>>,
    deferred: Option<Terminal<Resp>>,
    gates: Arc<ProgressGates>,
}

impl<Req, Resp> Extension for Exchange<Req, Resp>
where
    Req: 'static + Send + Sync,
    Resp: 'static + Send,
{
    fn defers_completion(&self) -> bool {
        self.deferred.is_some()
    }
}

/// The future of a request sent to a remote peer.
pub type FutureResponse<Req, Resp> = CompletionCell<Resp, Exchange<Req, Resp>>;

impl<Req, Resp> CompletionCell<Resp, Exchange<Req, Resp>>
where
    Req: 'static + Send + Sync,
    Resp: 'static + Send,
{
    /// A pending response to `request`; any reply counts as success.
    pub fn new(request: Req) -> Self {
        Self::with_evaluator(request, CommunicationEvaluator)
    }

    /// A pending response to `request`, judged by `evaluator`.
    pub fn with_evaluator(request: Req, evaluator: impl SuccessEvaluator<Req, Resp>) -> Self {
        Self::with_progress(request, evaluator, None)
    }

    /// A pending streaming response whose intermediate replies
    /// are passed to `progress_listener`.
    pub fn with_progress(
        request: Req,
        evaluator: impl SuccessEvaluator<Req, Resp>,
        progress_listener: Option<ProgressListener<Resp>>,
    ) -> Self {
        Self::with_extension(Exchange {
            request: Arc::new(request),
            evaluator: Arc::new(evaluator),
            progress_listener,
            deferred: None,
            gates: Arc::new(ProgressGates::default()),
        })
    }

    /// The request this exchange answers.
    pub fn request(&self) -> Arc<Req> {
        self.with_ext(|x| x.request.clone())
    }

    /// The reply, once one was delivered.
    /// A reply evaluated as a failure is still available here.
    pub fn response(&self) -> Option<Resp>
    where
        Resp: Clone,
    {
        self.object()
    }

    /// Is an outcome recorded but not yet published?
    pub fn is_deferred(&self) -> bool {
        self.with_ext(|x| x.deferred.is_some())
    }

    fn evaluate(&self, response: Resp) -> Terminal<Resp> {
        let (request, evaluator) = self.with_ext(|x| (x.request.clone(), x.evaluator.clone()));
        let reason = evaluator.evaluate(&request, &response).err();
        match reason {
            None => Terminal::success(Some(response)),
            Some(reason) => Terminal {
                state: PromiseState::Failure,
                value: Some(response),
                reason: Some(reason),
            },
        }
    }

    /// Complete with the reply from the remote peer.
    /// Refused if an outcome was deferred.
    pub fn respond(&self, response: Resp) -> bool {
        let t = self.evaluate(response);
        self.complete(t)
    }

    /// Complete successfully when no reply is expected.
    pub fn respond_empty(&self) -> bool {
        self.complete_empty()
    }

    fn defer(&self, t: Terminal<Resp>) -> bool {
        self.update(|x| {
            if x.deferred.is_some() {
                return (false, None);
            }
            x.deferred = Some(t);
            (true, None)
        })
        .unwrap_or(false)
    }

    /// Record the reply without completing.
    /// Returns false if already terminal or already deferred.
    pub fn respond_later(&self, response: Resp) -> bool {
        let t = self.evaluate(response);
        self.defer(t)
    }

    /// Record that no reply is expected, without completing.
    pub fn respond_empty_later(&self) -> bool {
        self.defer(Terminal::success(None))
    }

    /// Record a failure without completing.
    pub fn fail_later(&self, reason: impl Into<FailReason>) -> bool {
        self.defer(Terminal::failure(reason.into()))
    }

    /// Publish the deferred outcome.
    ///
    /// `Ok(false)` if the exchange was already terminal. If nothing was
    /// recorded, the exchange fails with [`FailReason::no_result_recorded`]
    /// and that reason is returned as the error.
    pub fn respond_now(&self) -> PromiseResult<bool> {
        let res = self.update(|x| match x.deferred.take() {
            Some(t) => (Ok(true), Some(t)),
            None => {
                let reason = FailReason::no_result_recorded();
                (Err(reason.clone()), Some(Terminal::failure(reason)))
            }
        });
        match res {
            None => Ok(false),
            Some(r) => r.map_err(PromiseError::from),
        }
    }

    /// Deliver an intermediate reply to the progress listener.
    pub fn report_progress(&self, intermediate: &Resp) {
        let listener = self.with_ext(|x| x.progress_listener.clone());
        if let Some(listener) = listener {
            listener(intermediate);
        }
    }

    /// Hand over the callback pushing the next chunk of the stream.
    /// Opens the first gate.
    pub fn set_progress_handler<F>(&self, handler: F)
    where
        F: Fn() + 'static + Send + Sync,
    {
        let gates = self.with_ext(|x| x.gates.clone());
        *gates.handler.lock() = Some(Arc::new(handler));
        gates.first.open();
    }

    /// Wait for the handler, run it once, then open the second gate.
    pub fn progress_first(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        let gates = self.with_ext(|x| x.gates.clone());
        gates.first.wait(guard)?;
        gates.run_handler();
        gates.second.open();
        Ok(())
    }

    /// Wait until the first progress step ran, then run the handler again.
    pub fn progress(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        let gates = self.with_ext(|x| x.gates.clone());
        gates.second.wait(guard)?;
        gates.run_handler();
        Ok(())
    }
}
