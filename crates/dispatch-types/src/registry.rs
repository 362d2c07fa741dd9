//! Registry trait for self-registering implementations.
//!
//! Storage backends and gateway clients register themselves under the name
//! used in the configuration file together with a factory function.

/// Base trait for implementation registries.
///
/// Each pluggable module (storage, geocoding, routing) provides a Registry
/// struct implementing this trait, declaring its configuration name and a
/// factory that builds the implementation from its TOML section.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "memory" for storage.implementations.memory
	/// - "dadata" for geocoding.implementations.dadata
	/// - "osrm" for routing.implementations.osrm
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
