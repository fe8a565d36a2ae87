//! The runtime handle.
//!
//! A [`Runtime`] ties together one host [`Document`], its [`Lifecycle`], the
//! configuration, the expression evaluator, the registries and the component
//! collaborators. It is a cheap `Rc` handle: the compiler clones it into
//! every effect and handler it creates.
//!
//! Child components are loaded asynchronously. Their mounts are spawned onto
//! the runtime and driven by [`Runtime::settle`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::task::Poll;

use futures_util::future::{poll_fn, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::task::AtomicWaker;

use crate::compiler::CompileContext;
use crate::component::{
    ComponentRegistry, DirectiveRegistry, MemorySource, ScriptExecutor, SourceProvider,
    StructuralParser,
};
use crate::config::RuntimeConfig;
use crate::dom::{Document, NodeId, TemplateNode};
use crate::error::EvalError;
use crate::eval::{BasicEvaluator, Evaluator};
use crate::lifecycle::Lifecycle;
use crate::scope::Scope;
use crate::value::Value;

/// Handle to a reactive template runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    document: Document,
    lifecycle: Lifecycle,
    config: RuntimeConfig,
    evaluator: Rc<dyn Evaluator>,
    directives: DirectiveRegistry,
    components: ComponentRegistry,
    provider: Rc<dyn SourceProvider>,
    parser: Option<Rc<dyn StructuralParser>>,
    executor: Option<Rc<dyn ScriptExecutor>>,
    spawned: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
    in_flight: Cell<usize>,
    waker: AtomicWaker,
}

impl Runtime {
    /// A runtime over a fresh document with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.inner.directives
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.inner.components
    }

    pub(crate) fn source_provider(&self) -> Rc<dyn SourceProvider> {
        Rc::clone(&self.inner.provider)
    }

    pub(crate) fn structural_parser(&self) -> Option<Rc<dyn StructuralParser>> {
        self.inner.parser.clone()
    }

    pub(crate) fn script_executor(&self) -> Option<Rc<dyn ScriptExecutor>> {
        self.inner.executor.clone()
    }

    /// Evaluate `expression` against `scope` with the configured evaluator.
    pub fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Value, EvalError> {
        self.inner.evaluator.evaluate(expression, scope)
    }

    /// Materialize `template` as the last child of `parent` and compile it.
    ///
    /// Returns the node that ended up in the tree, which is an anchor when
    /// the template's root carries a structural directive.
    pub fn render(&self, template: &TemplateNode, parent: NodeId, ctx: &CompileContext) -> NodeId {
        let node = self.document().materialize(template);
        self.document().append_child(parent, node);
        self.compile_node(node, ctx)
    }

    /// Run every teardown under `node`, then detach and free it.
    pub fn cleanup_and_remove(&self, node: NodeId) -> usize {
        self.inner.lifecycle.cleanup_and_remove(node)
    }

    pub(crate) fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        let inner = Rc::clone(&self.inner);
        inner.in_flight.set(inner.in_flight.get() + 1);
        let tracked = {
            let inner = Rc::clone(&inner);
            async move {
                task.await;
                inner.in_flight.set(inner.in_flight.get() - 1);
            }
        };
        inner.spawned.borrow_mut().push(Box::pin(tracked));
        inner.waker.wake();
    }

    /// Child mounts spawned but not yet finished.
    pub fn pending_mounts(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// Drive spawned mounts until none are left, including mounts spawned
    /// along the way. Returns how many completed.
    pub async fn settle(&self) -> usize {
        let mut running = FuturesUnordered::new();
        let mut completed = 0;
        poll_fn(|cx| {
            self.inner.waker.register(cx.waker());
            loop {
                let queued: Vec<_> = self.inner.spawned.borrow_mut().drain(..).collect();
                running.extend(queued);
                match running.poll_next_unpin(cx) {
                    Poll::Ready(Some(())) => completed += 1,
                    Poll::Ready(None) if self.inner.spawned.borrow().is_empty() => {
                        return Poll::Ready(());
                    }
                    Poll::Pending if self.inner.spawned.borrow().is_empty() => {
                        return Poll::Pending;
                    }
                    _ => {}
                }
            }
        })
        .await;
        tracing::debug!(completed, "runtime settled");
        completed
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("document", &self.inner.document)
            .field("config", &self.inner.config)
            .field("pending_mounts", &self.pending_mounts())
            .finish_non_exhaustive()
    }
}

/// Configures a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    document: Option<Document>,
    evaluator: Option<Rc<dyn Evaluator>>,
    provider: Option<Rc<dyn SourceProvider>>,
    parser: Option<Rc<dyn StructuralParser>>,
    executor: Option<Rc<dyn ScriptExecutor>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Work on an existing document instead of a fresh one.
    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Rc::new(evaluator));
        self
    }

    pub fn source_provider(mut self, provider: impl SourceProvider + 'static) -> Self {
        self.provider = Some(Rc::new(provider));
        self
    }

    pub fn parser(mut self, parser: impl StructuralParser + 'static) -> Self {
        self.parser = Some(Rc::new(parser));
        self
    }

    pub fn script_executor(mut self, executor: impl ScriptExecutor + 'static) -> Self {
        self.executor = Some(Rc::new(executor));
        self
    }

    pub fn build(self) -> Runtime {
        let document = self.document.unwrap_or_default();
        let lifecycle = Lifecycle::new(document.clone());
        Runtime {
            inner: Rc::new(RuntimeInner {
                document,
                lifecycle,
                config: self.config,
                evaluator: self.evaluator.unwrap_or_else(|| Rc::new(BasicEvaluator::new())),
                directives: DirectiveRegistry::new(),
                components: ComponentRegistry::new(),
                provider: self.provider.unwrap_or_else(|| Rc::new(MemorySource::new())),
                parser: self.parser,
                executor: self.executor,
                spawned: RefCell::new(Vec::new()),
                in_flight: Cell::new(0),
                waker: AtomicWaker::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    #[test]
    fn settle_drives_tasks_spawned_while_settling() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (inner_rt, inner_log) = (rt.clone(), Rc::clone(&log));
        rt.spawn(async move {
            inner_log.borrow_mut().push("outer");
            let log = Rc::clone(&inner_log);
            inner_rt.spawn(async move { log.borrow_mut().push("inner") });
        });
        assert_eq!(rt.pending_mounts(), 1);

        let completed = rt.settle().now_or_never();
        assert_eq!(completed, Some(2));
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
        assert_eq!(rt.pending_mounts(), 0);
    }

    #[test]
    fn evaluates_with_the_configured_evaluator() {
        let rt = Runtime::builder()
            .evaluator(|expression: &str, _: &Scope| Ok::<_, EvalError>(Value::from(expression.len())))
            .build();
        assert_eq!(rt.evaluate("abc", &Scope::new()).unwrap(), Value::from(3));
    }
}
