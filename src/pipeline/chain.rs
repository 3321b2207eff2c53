use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::pipeline::adapters::SkipPipe;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Two stages joined by a bounded channel of `M`.
pub struct Chain<A, B, M> {
    a: A,
    b: B,
    _m: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(a: A, b: B) -> Self {
        Self {
            a,
            b,
            _m: PhantomData,
        }
    }
}

#[async_trait]
impl<I, M, O, A, B> Pipe<I, O> for Chain<A, B, M>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
    A: Pipe<I, M> + Send + Sync,
    B: Pipe<M, O> + Send + Sync,
{
    fn stage_name(&self) -> &'static str {
        "chain"
    }

    async fn process(
        &self,
        input: mpsc::Receiver<I>,
        output: mpsc::Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let (tx_mid, rx_mid) = mpsc::channel::<M>(buffer.max(1));

        let left = self.a.process(input, tx_mid, buffer, cancel.clone());
        let right = self.b.process(rx_mid, output, buffer, cancel.clone());

        tokio::pin!(left);
        tokio::pin!(right);

        let mut left_done = false;
        let mut right_done = false;
        let mut first_err = None;

        while !(left_done && right_done) {
            let res = tokio::select! {
                res = &mut left, if !left_done => {
                    left_done = true;
                    res
                }
                res = &mut right, if !right_done => {
                    right_done = true;
                    res
                }
            };

            if let Err(err) = res {
                // A failed stage takes its neighbours down with it.
                cancel.cancel();
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub trait PipeExt<I, O>: Pipe<I, O> + Sized
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn pipe<N, P2>(self, next: P2) -> Chain<Self, P2, O>
    where
        N: Send + 'static,
        P2: Pipe<O, N> + Send + Sync,
        Self: Send + Sync,
    {
        Chain::new(self, next)
    }

    fn skip(self, n: usize) -> Chain<Self, SkipPipe, O>
    where
        Self: Send + Sync,
    {
        Chain::new(self, SkipPipe::new(n))
    }
}

impl<I, O, P> PipeExt<I, O> for P
where
    I: Send + 'static,
    O: Send + 'static,
    P: Pipe<I, O> + Sized + Send + Sync,
{
}
