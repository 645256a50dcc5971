//! Function-backed stages.

use super::{spawn_worker, Stage, StageScope};
use crate::stream::Stream;
use std::fmt::Debug;
use std::future::{ready, Future};
use std::marker::PhantomData;
use std::sync::Arc;

/// A stage applying a synchronous function to every value.
pub struct FnStage<I, O, F> {
    name: String,
    func: Arc<F>,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnStage<I, O, F>
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Debug for FnStage<I, O, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

impl<I, O, F> Stage<I, O> for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O> {
        let func = Arc::clone(&self.func);
        spawn_worker(scope, &self.name, input, move |value| ready(Some(func(value))))
    }
}

/// A stage applying an async function to every value.
pub struct AsyncFnStage<I, O, F, Fut> {
    name: String,
    func: Arc<F>,
    _phantom: PhantomData<fn(I) -> (O, Fut)>,
}

impl<I, O, F, Fut> AsyncFnStage<I, O, F, Fut>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    /// Creates a new async function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F, Fut> Debug for AsyncFnStage<I, O, F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("name", &self.name).finish()
    }
}

impl<I, O, F, Fut> Stage<I, O> for AsyncFnStage<I, O, F, Fut>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O> {
        let func = Arc::clone(&self.func);
        spawn_worker(scope, &self.name, input, move |value| {
            let fut = func(value);
            async move { Some(fut.await) }
        })
    }
}

/// A stage that maps values asynchronously and drops those mapped to `None`.
pub struct FilterMapStage<I, O, F, Fut> {
    name: String,
    func: Arc<F>,
    _phantom: PhantomData<fn(I) -> (O, Fut)>,
}

impl<I, O, F, Fut> FilterMapStage<I, O, F, Fut>
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<O>> + Send + 'static,
{
    /// Creates a new filtering stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F, Fut> Debug for FilterMapStage<I, O, F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterMapStage").field("name", &self.name).finish()
    }
}

impl<I, O, F, Fut> Stage<I, O> for FilterMapStage<I, O, F, Fut>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<O>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<I>, scope: &StageScope) -> Stream<O> {
        let func = Arc::clone(&self.func);
        spawn_worker(scope, &self.name, input, move |value| func(value))
    }
}

/// A stage that passes values through unchanged.
#[derive(Debug, Clone)]
pub struct IdentityStage {
    name: String,
}

impl IdentityStage {
    /// Creates a new identity stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<V: Send + 'static> Stage<V> for IdentityStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: Stream<V>, scope: &StageScope) -> Stream<V> {
        spawn_worker(scope, &self.name, input, |value| ready(Some(value)))
    }
}
