use crate::model::{FramePass, InferenceRequest, PassOutput};
use anyhow::Result;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::JoinHandle;
use thiserror::Error;

/// Terminal report of one dispatched pass
pub struct PassCompletion {
    pub outcome: Result<PassOutput>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("a pass is already in flight")]
    Busy,

    #[error("inference worker terminated")]
    WorkerGone,
}

/// Boundary between the tick loop and the suspended inference work.
///
/// `dispatch` hands off exactly one request; `poll` never blocks. The loop
/// guards dispatch with its own in-flight state, so a well-behaved caller
/// never sees `Busy`.
pub trait PassDispatcher {
    fn dispatch(&mut self, request: InferenceRequest) -> Result<(), DispatchError>;

    fn poll(&mut self) -> Result<Option<PassCompletion>, DispatchError>;
}

/// Production dispatcher: a dedicated worker thread owning the model pass.
///
/// The request channel holds a single slot; completions flow back on an
/// unbounded channel drained every tick.
pub struct WorkerDispatcher {
    request_tx: SyncSender<InferenceRequest>,
    completion_rx: Receiver<PassCompletion>,
    worker: Option<JoinHandle<()>>,
}

impl WorkerDispatcher {
    pub fn spawn(mut pass: Box<dyn FramePass>) -> Self {
        let (request_tx, request_rx) = mpsc::sync_channel::<InferenceRequest>(1);
        let (completion_tx, completion_rx) = mpsc::channel::<PassCompletion>();

        let worker = std::thread::Builder::new()
            .name("inference-worker".into())
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    let outcome = pass.process(request);
                    if completion_tx.send(PassCompletion { outcome }).is_err() {
                        break;
                    }
                }
                tracing::debug!("Inference worker shutting down");
            })
            .expect("failed to spawn inference worker");

        Self {
            request_tx,
            completion_rx,
            worker: Some(worker),
        }
    }
}

impl PassDispatcher for WorkerDispatcher {
    fn dispatch(&mut self, request: InferenceRequest) -> Result<(), DispatchError> {
        match self.request_tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DispatchError::Busy),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::WorkerGone),
        }
    }

    fn poll(&mut self) -> Result<Option<PassCompletion>, DispatchError> {
        match self.completion_rx.try_recv() {
            Ok(completion) => Ok(Some(completion)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DispatchError::WorkerGone),
        }
    }
}

impl Drop for WorkerDispatcher {
    fn drop(&mut self) {
        // Closing the request channel lets the worker run its in-flight pass
        // to completion and exit.
        let (orphan_tx, _) = mpsc::sync_channel::<InferenceRequest>(1);
        self.request_tx = orphan_tx;

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatteMask;
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    struct UniformMatte(u8);

    impl FramePass for UniformMatte {
        fn process(&mut self, request: InferenceRequest) -> Result<PassOutput> {
            let (width, height) = request.pixels.dimensions();
            Ok(PassOutput::Matte(MatteMask {
                data: vec![self.0; (width * height) as usize],
                width,
                height,
            }))
        }
    }

    fn request() -> InferenceRequest {
        InferenceRequest {
            pixels: RgbaImage::new(2, 2),
            model_size: 64,
        }
    }

    fn poll_until_complete(dispatcher: &mut WorkerDispatcher) -> PassCompletion {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(completion) = dispatcher.poll().unwrap() {
                return completion;
            }
            assert!(Instant::now() < deadline, "worker never completed");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn dispatch_and_poll_roundtrip() {
        let mut dispatcher = WorkerDispatcher::spawn(Box::new(UniformMatte(200)));

        dispatcher.dispatch(request()).unwrap();
        let completion = poll_until_complete(&mut dispatcher);

        match completion.outcome.unwrap() {
            PassOutput::Matte(mask) => assert!(mask.data.iter().all(|&v| v == 200)),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn failed_pass_reports_error() {
        struct FailingPass;

        impl FramePass for FailingPass {
            fn process(&mut self, _request: InferenceRequest) -> Result<PassOutput> {
                anyhow::bail!("tensor layout mismatch")
            }
        }

        let mut dispatcher = WorkerDispatcher::spawn(Box::new(FailingPass));

        dispatcher.dispatch(request()).unwrap();
        let completion = poll_until_complete(&mut dispatcher);

        assert!(completion.outcome.is_err());
    }
}
