//! In-memory storage backend implementation for the dispatch service.
//!
//! This module provides a memory-based implementation of the StorageInterface
//! trait, used in tests and development where durability is not required. The
//! compare-and-swap primitive holds the single write lock for the whole
//! compare-then-write step, which is what makes claim races safe on this
//! backend.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use dispatch_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Stores data in a HashMap guarded by a read-write lock; no persistence
/// across restarts.
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.keys()
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect())
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Vec<u8>,
		new: Vec<u8>,
	) -> Result<bool, StorageError> {
		// The write lock is held across compare and write; concurrent
		// claimers serialize here.
		let mut store = self.store.write().await;
		match store.get(key) {
			Some(current) if *current == expected => {
				store.insert(key.to_string(), new);
				Ok(true)
			},
			Some(_) => Ok(false),
			None => Err(StorageError::NotFound),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "orders:abc";
		let value = b"order_payload".to_vec();
		storage.set_bytes(key, value.clone()).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_list_keys_filters_by_prefix() {
		let storage = MemoryStorage::new();
		storage.set_bytes("orders:1", b"a".to_vec()).await.unwrap();
		storage.set_bytes("orders:2", b"b".to_vec()).await.unwrap();
		storage.set_bytes("shops:1", b"c".to_vec()).await.unwrap();

		let mut keys = storage.list_keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:1".to_string(), "orders:2".to_string()]);
	}

	#[tokio::test]
	async fn test_compare_and_swap_succeeds_once() {
		let storage = MemoryStorage::new();
		let key = "orders:race";
		storage.set_bytes(key, b"new".to_vec()).await.unwrap();

		let first = storage
			.compare_and_swap(key, b"new".to_vec(), b"accepted".to_vec())
			.await
			.unwrap();
		assert!(first);

		// Second swap against the stale expectation must fail.
		let second = storage
			.compare_and_swap(key, b"new".to_vec(), b"accepted2".to_vec())
			.await
			.unwrap();
		assert!(!second);

		assert_eq!(storage.get_bytes(key).await.unwrap(), b"accepted".to_vec());
	}

	#[tokio::test]
	async fn test_compare_and_swap_missing_key_is_not_found() {
		let storage = MemoryStorage::new();
		let result = storage
			.compare_and_swap("orders:ghost", b"x".to_vec(), b"y".to_vec())
			.await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}
}
