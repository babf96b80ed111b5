//! Result sequences.

use crate::error::{Issue, WeaveError, WeaveResult};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A lazily evaluated sequence of results.
///
/// Elements are produced strictly one after another: nothing runs until the
/// consumer polls, and the sequence ends after the first error.
#[must_use = "streams do nothing unless polled"]
pub struct QueryStream<T> {
    inner: Pin<Box<dyn Stream<Item = WeaveResult<T>> + Send>>,
}

impl<T> QueryStream<T> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = WeaveResult<T>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Pull the next element.
    pub async fn try_next(&mut self) -> WeaveResult<Option<T>> {
        self.inner.next().await.transpose()
    }

    /// Drain the sequence, stopping at the first error.
    pub async fn try_collect(mut self) -> WeaveResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.try_next().await? {
            out.push(item);
        }
        Ok(out)
    }
}

impl<T: Send + 'static> QueryStream<T> {
    /// A one-element sequence.
    pub fn once(value: T) -> Self {
        Self::new(futures_util::stream::once(async move { Ok(value) }))
    }
}

impl QueryStream<Value> {
    /// Deserialize each record into `U`.
    pub fn decode<U: DeserializeOwned>(self) -> DecodeStream<U> {
        DecodeStream {
            inner: self,
            _marker: PhantomData,
        }
    }
}

impl<T> Stream for QueryStream<T> {
    type Item = WeaveResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for QueryStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QueryStream(..)")
    }
}

/// Stream adapter that deserializes records into `U`.
#[must_use = "streams do nothing unless polled"]
pub struct DecodeStream<U> {
    inner: QueryStream<Value>,
    _marker: PhantomData<fn() -> U>,
}

impl<U: DeserializeOwned> Stream for DecodeStream<U> {
    type Item = WeaveResult<U>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(decode_value(value))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Deserialize one record, reporting failures as result validation errors.
pub fn decode_value<U: DeserializeOwned>(value: Value) -> WeaveResult<U> {
    match U::deserialize(&value) {
        Ok(decoded) => Ok(decoded),
        Err(e) => Err(WeaveError::result_validation(
            vec![Issue::new(e.to_string())],
            value,
        )),
    }
}

/// What an entry point returns: one result or a sequence of them.
#[derive(Debug)]
pub enum Execution<T> {
    Single(T),
    Sequence(QueryStream<T>),
}

impl<T: Send + 'static> Execution<T> {
    pub fn is_sequence(&self) -> bool {
        matches!(self, Execution::Sequence(_))
    }

    /// The single result; a sequence is a configuration error.
    pub fn into_single(self) -> WeaveResult<T> {
        match self {
            Execution::Single(value) => Ok(value),
            Execution::Sequence(_) => Err(WeaveError::configuration(
                "expected a single result, got a sequence",
            )),
        }
    }

    pub fn into_stream(self) -> QueryStream<T> {
        match self {
            Execution::Single(value) => QueryStream::once(value),
            Execution::Sequence(stream) => stream,
        }
    }

    /// Every result, in order.
    pub async fn collect(self) -> WeaveResult<Vec<T>> {
        match self {
            Execution::Single(value) => Ok(vec![value]),
            Execution::Sequence(stream) => stream.try_collect().await,
        }
    }
}
