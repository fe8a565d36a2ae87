//! Chained name-resolution environments.
//!
//! A [`Scope`] is an ordered chain of binding layers. Lookups walk from the
//! innermost layer outwards; definitions only ever touch the innermost layer,
//! so list iterations and event handlers can shadow names without mutating
//! the scope they were derived from.

use std::fmt;
use std::rc::Rc;
use std::cell::RefCell;

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::reactive::Signal;
use crate::value::{self, Value};

type CallbackFn = dyn Fn(&[Value]) -> Result<Value, EvalError>;

/// A function exposed to template expressions.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// What a name in a scope refers to.
#[derive(Clone, Debug)]
pub enum Binding {
    /// A plain value.
    Value(Value),
    /// A reactive cell; reading it inside an effect subscribes the effect.
    Cell(Signal<Value>),
    /// A callable.
    Function(Callback),
    /// A list item alias; see [`ListItem`].
    Item(ListItem),
}

impl Binding {
    pub fn cell(signal: &Signal<Value>) -> Self {
        Self::Cell(signal.clone())
    }

    /// Current value, tracking cell reads.
    pub fn get(&self) -> Value {
        match self {
            Binding::Value(value) => value.clone(),
            Binding::Cell(signal) => signal.get(),
            Binding::Function(_) => Value::Null,
            Binding::Item(item) => item.cell.get(),
        }
    }
}

/// The item alias of one `v-for` entry.
///
/// Reads come from the entry's own cell. Writes replace the element of the
/// source collection the item was taken from, so the next reconcile sees
/// the edit instead of restoring the old item.
#[derive(Clone, Debug)]
pub struct ListItem {
    cell: Signal<Value>,
    index: Signal<Value>,
    /// Scope the list was compiled in, and the iterable path within it.
    /// `None` when the iterable is not an assignable path.
    source: Option<(Scope, String)>,
}

impl ListItem {
    pub(crate) fn new(cell: Signal<Value>, index: Signal<Value>, source: Option<(Scope, String)>) -> Self {
        Self { cell, index, source }
    }

    pub fn cell(&self) -> &Signal<Value> {
        &self.cell
    }

    fn assign(&self, alias: &str, rest: &[&str], new_value: Value) -> Result<(), EvalError> {
        let Some((scope, iterable)) = &self.source else {
            return Err(EvalError::ReadOnly {
                name: alias.to_string(),
            });
        };

        let mut next = self.cell.get_untracked();
        if !value::set_path(&mut next, rest, new_value) {
            return Err(EvalError::Type(format!(
                "cannot assign to `{alias}.{}`",
                rest.join(".")
            )));
        }

        let index = value::key_string(&self.index.get_untracked());
        let mut target = value::split_path(iterable);
        target.push(&index);
        scope.assign_segments(&target, next.clone())?;
        self.cell.set(next);
        Ok(())
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<Signal<Value>> for Binding {
    fn from(signal: Signal<Value>) -> Self {
        Binding::Cell(signal)
    }
}

impl From<Callback> for Binding {
    fn from(callback: Callback) -> Self {
        Binding::Function(callback)
    }
}

/// A chained environment of bindings.
///
/// Cloning a scope yields another handle to the same chain.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Rc<Layer>,
}

#[derive(Default)]
struct Layer {
    bindings: RefCell<IndexMap<String, Binding>>,
    parent: Option<Scope>,
}

impl Scope {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root scope from bindings.
    pub fn from_bindings<I, K>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Binding)>,
        K: Into<String>,
    {
        let scope = Self::new();
        scope.extend(bindings);
        scope
    }

    /// Create an empty layer that delegates failed lookups to `self`.
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(Layer {
                bindings: RefCell::new(IndexMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// Bind `name` in this layer, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, binding: impl Into<Binding>) {
        self.inner
            .bindings
            .borrow_mut()
            .insert(name.into(), binding.into());
    }

    /// Bind several names in this layer.
    pub fn extend<I, K>(&self, bindings: I)
    where
        I: IntoIterator<Item = (K, Binding)>,
        K: Into<String>,
    {
        let mut layer = self.inner.bindings.borrow_mut();
        for (name, binding) in bindings {
            layer.insert(name.into(), binding);
        }
    }

    /// Look `name` up through the chain.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.inner.bindings.borrow().get(name) {
                return Some(binding.clone());
            }
            scope = scope.inner.parent.as_ref()?;
        }
    }

    /// Check whether this layer itself binds `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.inner.bindings.borrow().contains_key(name)
    }

    /// Read `name`, subscribing the running effect when it is a cell.
    pub fn get(&self, name: &str) -> Result<Value, EvalError> {
        self.lookup(name)
            .map(|binding| binding.get())
            .ok_or_else(|| EvalError::UnknownName {
                name: name.to_string(),
            })
    }

    /// Resolve a dotted path to a value.
    pub fn resolve_path(&self, path: &str) -> Result<Value, EvalError> {
        let segments = value::split_path(path);
        let (root, rest) = segments
            .split_first()
            .ok_or_else(|| EvalError::UnknownName {
                name: path.to_string(),
            })?;
        let base = self.get(root)?;
        Ok(value::get_path(&base, rest).cloned().unwrap_or(Value::Null))
    }

    /// The callable bound at `name`, if any.
    pub fn function(&self, name: &str) -> Option<Callback> {
        match self.lookup(name)? {
            Binding::Function(callback) => Some(callback),
            _ => None,
        }
    }

    /// Write `new_value` at a dotted path.
    ///
    /// Cells are written wherever they live in the chain; that is how child
    /// scopes update shared state. A plain value is only replaced when this
    /// layer owns it; plain values owned by an enclosing layer are read-only.
    pub fn assign(&self, path: &str, new_value: Value) -> Result<(), EvalError> {
        self.assign_segments(&value::split_path(path), new_value)
    }

    fn assign_segments(&self, segments: &[&str], new_value: Value) -> Result<(), EvalError> {
        let (root, rest) = segments
            .split_first()
            .ok_or_else(|| EvalError::UnknownName {
                name: segments.join("."),
            })?;
        let cannot_assign = || EvalError::Type(format!("cannot assign to `{}`", segments.join(".")));

        let Some((owner, binding)) = self.find(root) else {
            if rest.is_empty() {
                self.define(*root, Binding::Value(new_value));
                return Ok(());
            }
            return Err(EvalError::UnknownName {
                name: (*root).to_string(),
            });
        };

        match binding {
            Binding::Cell(signal) => {
                if rest.is_empty() {
                    signal.set(new_value);
                    return Ok(());
                }
                let mut next = signal.get_untracked();
                if !value::set_path(&mut next, rest, new_value) {
                    return Err(cannot_assign());
                }
                signal.set(next);
                Ok(())
            }
            Binding::Item(item) => item.assign(root, rest, new_value),
            Binding::Value(mut current) => {
                if !Rc::ptr_eq(&owner.inner, &self.inner) {
                    return Err(EvalError::ReadOnly {
                        name: (*root).to_string(),
                    });
                }
                if !value::set_path(&mut current, rest, new_value) {
                    return Err(cannot_assign());
                }
                self.define(*root, Binding::Value(current));
                Ok(())
            }
            Binding::Function(_) => Err(EvalError::Type(format!(
                "cannot assign to function `{root}`"
            ))),
        }
    }

    fn find(&self, name: &str) -> Option<(Scope, Binding)> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.inner.bindings.borrow().get(name) {
                return Some((scope.clone(), binding.clone()));
            }
            scope = scope.inner.parent.as_ref()?;
        }
    }

    /// Names bound in this layer, in definition order.
    pub fn local_names(&self) -> Vec<String> {
        self.inner.bindings.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("names", &self.local_names())
            .field("parent", &self.inner.parent)
            .finish()
    }
}
