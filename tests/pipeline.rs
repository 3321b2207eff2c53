use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rowpipe::error::{Error, Result};
use rowpipe::pipeline::cancel::CancelToken;
use rowpipe::pipeline::chain::PipeExt;
use rowpipe::pipeline::pipe::Pipe;
use rowpipe::pipeline::runtime::Runtime;
use tokio::sync::mpsc::{Receiver, Sender};

mod common;
use common::{CollectSink, VecSource};

struct FailOn(u32);

#[async_trait]
impl Pipe<u32, u32> for FailOn {
    async fn process(
        &self,
        mut input: Receiver<u32>,
        output: Sender<u32>,
        _buffer: usize,
        _cancel: CancelToken,
    ) -> Result<()> {
        while let Some(v) = input.recv().await {
            if v == self.0 {
                return Err(Error::pipeline("intentional error"));
            }
            if output.send(v).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

struct NeverEnding {
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl Pipe<(), ()> for NeverEnding {
    async fn process(
        &self,
        mut input: Receiver<()>,
        _output: Sender<()>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let _ = input.recv().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn skip_drops_leading_items_in_order() -> Result<()> {
    let collected = Arc::new(Mutex::new(Vec::<u32>::new()));

    let pipe = VecSource::new(vec![1u32, 2, 3, 4, 5])
        .skip(2)
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(2);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);
    handle.await??;

    assert_eq!(*collected.lock().unwrap(), vec![3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn skip_more_than_available_yields_nothing() -> Result<()> {
    let collected = Arc::new(Mutex::new(Vec::<u32>::new()));
    let pipe = VecSource::new(vec![1u32])
        .skip(1)
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let (tx, _cancel, handle) = Runtime::new().spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);
    handle.await??;

    assert!(collected.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn stage_error_propagates_through_handle() {
    let pipe = VecSource::new(vec![1u32, 2, 3])
        .pipe(FailOn(2))
        .pipe::<(), _>(CollectSink::new(Arc::new(Mutex::new(Vec::new()))));

    let (tx, cancel, handle) = Runtime::new().buffer(4).spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("intentional error"));
    assert!(cancel.is_cancelled(), "a failing stage cancels its neighbours");
}

#[tokio::test]
async fn cancel_stops_pipeline() -> Result<()> {
    let stopped = Arc::new(AtomicBool::new(false));
    let (tx, cancel, handle) = Runtime::new().spawn_sink(NeverEnding {
        stopped: stopped.clone(),
    });

    tx.send(()).await.ok();
    cancel.cancel();

    tokio::time::timeout(Duration::from_millis(500), handle)
        .await
        .expect("pipeline should stop promptly after cancel")??;
    assert!(stopped.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn child_tokens_follow_parent_only() {
    let parent = CancelToken::new();
    let child = parent.child();
    let sibling = parent.child();

    child.cancel();
    assert!(child.is_cancelled());
    assert!(!parent.is_cancelled());
    assert!(!sibling.is_cancelled());

    parent.cancel();
    tokio::time::timeout(Duration::from_millis(100), sibling.cancelled())
        .await
        .expect("child observes parent cancellation");
}

#[tokio::test]
async fn with_cancel_uses_the_given_token() -> Result<()> {
    let token = CancelToken::new();
    let stopped = Arc::new(AtomicBool::new(false));
    let rt = Runtime::new().with_cancel(token.clone());
    let (tx, _cancel, handle) = rt.spawn_sink(NeverEnding {
        stopped: stopped.clone(),
    });

    tx.send(()).await.ok();
    token.cancel();
    tokio::time::timeout(Duration::from_millis(500), handle)
        .await
        .expect("external token stops the pipeline")??;
    assert!(stopped.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn failure_under_a_child_token_spares_the_parent() {
    let parent = CancelToken::new();
    let run = parent.child();

    let pipe = VecSource::new(vec![1u32, 2, 3])
        .pipe(FailOn(1))
        .pipe::<(), _>(CollectSink::new(Arc::new(Mutex::new(Vec::new()))));
    let (tx, cancel, handle) = Runtime::new().with_cancel(run.clone()).spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    assert!(handle.await.unwrap().is_err());
    assert!(cancel.is_cancelled() && run.is_cancelled());
    assert!(!parent.is_cancelled(), "sibling runs keep going");
}
