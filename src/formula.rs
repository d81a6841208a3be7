use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::registry::{Registry, Slot};
use crate::store::DEFAULT_CAPACITY;
use crate::{Args, Value, profile};

/// A node in a graph of derived values.
///
/// Implemented by [`Formula`] and [`Select`](crate::Select). Formulas depend on
/// other nodes through this trait, so a graph may freely mix node types.
pub trait Calculate: Send + Sync {
    /// Derive a value from `state` and `context`.
    fn calculate(&self, state: &Value, context: &Value) -> Value;

    /// The function-call surface. Same as [`calculate`](Self::calculate).
    fn call(&self, state: &Value, context: &Value) -> Value {
        self.calculate(state, context)
    }

    /// The argument-list surface: the first argument is the state and the
    /// second the context. Missing arguments are null.
    fn apply(&self, args: &[Value]) -> Value {
        static NULL: Value = Value::Null;
        let state = args.first().unwrap_or(&NULL);
        let context = args.get(1).unwrap_or(&NULL);
        self.calculate(state, context)
    }

    /// The most recently calculated value, if any.
    fn value(&self) -> Option<Value>;

    /// A human-readable name for the node's type.
    fn name(&self) -> &'static str;
}

/// The behaviour of one formula type.
///
/// A recipe says what a formula depends on and how its value follows from its
/// dependencies. Every formula built from the same recipe shares one memo
/// store, so equal arguments yield the stored value no matter which instance
/// is asked.
///
/// ```
/// use formulary::{Args, Dependencies, Dependency, Formula, Recipe, Value, select};
///
/// struct Greeting;
///
/// impl Recipe for Greeting {
///     type Params = &'static str;
///
///     fn track(prefix: Self::Params) -> Dependencies {
///         Dependencies::keyed([
///             ("prefix", Dependency::value(prefix)),
///             ("name", Dependency::node(select("name"))),
///         ])
///     }
///
///     fn compute(args: &Args, _: &Value) -> Value {
///         let prefix = args.get("prefix").and_then(Value::as_str).unwrap_or_default();
///         let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
///         format!("{prefix} {name}").into()
///     }
/// }
///
/// use formulary::Calculate;
/// let greeting = Formula::<Greeting>::new("Sir");
/// let state = Value::map([("name", "Bob")]);
/// assert_eq!(greeting.calculate(&state, &Value::Null), "Sir Bob".into());
/// ```
pub trait Recipe: 'static {
    /// What the formula is constructed from.
    type Params;

    /// How many results the type's memo store keeps.
    const CAPACITY: usize = DEFAULT_CAPACITY;

    /// Declare the dependencies for the given construction parameters.
    fn track(params: Self::Params) -> Dependencies;

    /// Compute the value from resolved dependencies. Hands the arguments back
    /// unchanged by default.
    fn compute(args: &Args, context: &Value) -> Value {
        let _ = context;
        args.clone().into_value()
    }

    /// Observe a freshly computed value. Not called for stored values.
    fn update(value: &Value, args: &Args, context: &Value) {
        let _ = (value, args, context);
    }
}

/// The base recipe: depends on its construction argument and returns it.
pub struct Identity;

impl Recipe for Identity {
    type Params = Value;

    fn track(params: Value) -> Dependencies {
        Dependencies::list([Dependency::Value(params)])
    }
}

/// One declared input of a formula.
#[derive(Clone)]
pub enum Dependency {
    /// Another node, calculated with the same state and context.
    Node(Arc<dyn Calculate>),
    /// A fixed value.
    Value(Value),
}

impl Dependency {
    /// Depend on another node.
    pub fn node(node: impl Calculate + 'static) -> Self {
        Self::Node(Arc::new(node))
    }

    /// Depend on a fixed value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    fn resolve(&self, state: &Value, context: &Value) -> Value {
        match self {
            Self::Node(node) => node.call(state, context),
            Self::Value(value) => value.clone(),
        }
    }
}

impl From<Value> for Dependency {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Arc<dyn Calculate>> for Dependency {
    fn from(node: Arc<dyn Calculate>) -> Self {
        Self::Node(node)
    }
}

impl<R: Recipe> From<Formula<R>> for Dependency {
    fn from(formula: Formula<R>) -> Self {
        Self::node(formula)
    }
}

impl Debug for Dependency {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Node(node) => write!(f, "<{}>", node.name()),
            Self::Value(value) => value.fmt(f),
        }
    }
}

/// The declared inputs of a formula.
#[derive(Clone)]
pub enum Dependencies {
    /// Positional dependencies.
    List(Vec<Dependency>),
    /// Named dependencies, resolved in declaration order.
    Keyed(Vec<(Arc<str>, Dependency)>),
}

impl Dependencies {
    /// Depend on nothing.
    pub fn none() -> Self {
        Self::List(Vec::new())
    }

    /// Positional dependencies, resolved in order.
    pub fn list(deps: impl IntoIterator<Item = Dependency>) -> Self {
        Self::List(deps.into_iter().collect())
    }

    /// Named dependencies. Their names become part of the cache key.
    pub fn keyed<N: Into<Arc<str>>>(deps: impl IntoIterator<Item = (N, Dependency)>) -> Self {
        Self::Keyed(deps.into_iter().map(|(n, d)| (n.into(), d)).collect())
    }

    /// The number of dependencies.
    pub fn len(&self) -> usize {
        match self {
            Self::List(deps) => deps.len(),
            Self::Keyed(deps) => deps.len(),
        }
    }

    /// Whether there are no dependencies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every dependency into an argument.
    fn resolve(&self, state: &Value, context: &Value) -> Args {
        match self {
            Self::List(deps) => {
                Args::List(deps.iter().map(|d| d.resolve(state, context)).collect())
            }
            Self::Keyed(deps) => Args::Keyed(
                deps.iter()
                    .map(|(n, d)| (n.clone(), d.resolve(state, context)))
                    .collect(),
            ),
        }
    }
}

impl Debug for Dependencies {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::List(deps) => f.debug_list().entries(deps).finish(),
            Self::Keyed(deps) => {
                f.debug_map().entries(deps.iter().map(|(n, d)| (n, d))).finish()
            }
        }
    }
}

/// A memoized formula of type `R`.
pub struct Formula<R: Recipe> {
    dependencies: Dependencies,
    slot: Arc<Slot>,
    value: Mutex<Option<Value>>,
    recipe: PhantomData<fn() -> R>,
}

impl<R: Recipe> Formula<R> {
    /// Create a formula that shares its type's cache in the global registry.
    pub fn new(params: R::Params) -> Self {
        Self::new_in(Registry::global(), params)
    }

    /// Create a formula that shares its type's cache in `registry`.
    pub fn new_in(registry: &Registry, params: R::Params) -> Self {
        Self {
            dependencies: R::track(params),
            slot: registry.slot::<R>(),
            value: Mutex::new(None),
            recipe: PhantomData,
        }
    }

    /// The dependencies declared at construction.
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// The cache shared by all formulas of this type.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }
}

impl<R: Recipe> Calculate for Formula<R> {
    fn calculate(&self, state: &Value, context: &Value) -> Value {
        let start = profile::mark("start");

        let args = self.dependencies.resolve(state, context);
        let key = self.slot.key(&args);

        // The store is not locked while computing, so formulas of the same
        // type may appear among the dependencies.
        let value = match self.slot.store().get(&key) {
            Some(value) => {
                tracing::trace!(formula = self.slot.name(), key = %key, "hit");
                #[cfg(feature = "testing")]
                crate::testing::register(true);
                value
            }
            None => {
                tracing::trace!(formula = self.slot.name(), key = %key, "miss");
                let value = R::compute(&args, context);
                R::update(&value, &args, context);
                self.slot.store().set(key, value.clone());
                #[cfg(feature = "testing")]
                crate::testing::register(false);
                value
            }
        };

        let end = profile::mark("end");
        if profile::enabled() {
            profile::measure(&format!("Calculated {}", self.slot.name()), start, end);
        }

        *self.value.lock() = Some(value.clone());
        value
    }

    fn value(&self) -> Option<Value> {
        self.value.lock().clone()
    }

    fn name(&self) -> &'static str {
        self.slot.name()
    }
}

impl<R: Recipe> Debug for Formula<R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Formula")
            .field("name", &self.slot.name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
