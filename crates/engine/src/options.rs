//! Open-time configuration.

use daybreak_core::Serializer;

/// What a [`Database::get`](crate::Database::get) miss produces.
///
/// With a configured default, the miss installs the default via the normal
/// `set` path, so it becomes durable like any other write.
pub enum DefaultValue<V> {
    /// Misses return `None`.
    None,
    /// Misses install a clone of this value.
    Constant(V),
    /// Misses install the result of calling this with the key.
    Factory(Box<dyn Fn(&str) -> V + Send + Sync>),
}

impl<V> std::fmt::Debug for DefaultValue<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultValue::None => f.write_str("None"),
            DefaultValue::Constant(_) => f.write_str("Constant(..)"),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Builder-style options for [`Database::open_with`](crate::Database::open_with).
pub struct Options<S: Serializer> {
    pub(crate) serializer: S,
    pub(crate) default: DefaultValue<S::Value>,
}

impl<S: Serializer> Options<S> {
    /// Options using `serializer` and no default value.
    pub fn new(serializer: S) -> Self {
        Options {
            serializer,
            default: DefaultValue::None,
        }
    }

    /// Install a clone of `value` on every `get` miss.
    pub fn default_value(mut self, value: S::Value) -> Self {
        self.default = DefaultValue::Constant(value);
        self
    }

    /// Install `factory(key)` on every `get` miss.
    pub fn default_factory(
        mut self,
        factory: impl Fn(&str) -> S::Value + Send + Sync + 'static,
    ) -> Self {
        self.default = DefaultValue::Factory(Box::new(factory));
        self
    }
}

impl<S: Serializer + Default> Default for Options<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}
