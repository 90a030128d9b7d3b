//! Registry trait for self-registering implementations.
//!
//! Backend and realtime implementations each expose a `Registry` type that
//! declares the name used to reference them in configuration together with
//! the factory that builds them.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Configuration key of this implementation, e.g. "memory" for
	/// `backend.implementations.memory`.
	const NAME: &'static str;

	/// Factory function type provided by the implementation.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
