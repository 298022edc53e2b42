// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keyed factory registry.
//!
//! A [`Registry`] maps an enum key to a constructor closure. Registration
//! happens once at startup; after that the table is only read, so it can be
//! shared across request tasks without locking.
//!
//! [`Registry::resolve`] runs the constructor on every call against the
//! dependency context handed in by the caller. Nothing is cached between
//! calls, which keeps per-request instances independent of each other.
//!
//! ```ignore
//! let mut senders: Registry<Channel, dyn Sender, Deps> = Registry::new("senders");
//! senders.register(Channel::Log, |_| Arc::new(LogSender));
//! senders.ensure_registered(Channel::all().iter().copied())?;
//! let sender = senders.resolve(Channel::Log, &deps)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Errors raised when resolving from a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
	#[error("{registry}: no factory registered for key {key}")]
	Unregistered { registry: &'static str, key: String },
}

type Factory<T, C> = Box<dyn Fn(&C) -> Arc<T> + Send + Sync>;

/// Table from key `K` to a constructor producing `Arc<T>` from context `C`.
pub struct Registry<K, T: ?Sized, C> {
	name: &'static str,
	factories: HashMap<K, Factory<T, C>>,
}

impl<K, T, C> Registry<K, T, C>
where
	K: Eq + Hash + Copy + fmt::Debug,
	T: ?Sized,
{
	/// Create an empty registry. `name` shows up in errors and logs.
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			factories: HashMap::new(),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Register (or replace) the constructor for `key`.
	pub fn register<F>(&mut self, key: K, factory: F)
	where
		F: Fn(&C) -> Arc<T> + Send + Sync + 'static,
	{
		tracing::debug!(registry = self.name, key = ?key, "registering factory");
		if self.factories.insert(key, Box::new(factory)).is_some() {
			tracing::warn!(registry = self.name, key = ?key, "factory replaced");
		}
	}

	/// Builder form of [`Registry::register`].
	pub fn with<F>(mut self, key: K, factory: F) -> Self
	where
		F: Fn(&C) -> Arc<T> + Send + Sync + 'static,
	{
		self.register(key, factory);
		self
	}

	/// Construct the instance registered under `key`.
	pub fn resolve(&self, key: K, deps: &C) -> Result<Arc<T>, RegistryError> {
		self
			.try_resolve(key, deps)
			.ok_or_else(|| RegistryError::Unregistered {
				registry: self.name,
				key: format!("{key:?}"),
			})
	}

	/// Like [`Registry::resolve`], but returns `None` for unknown keys.
	pub fn try_resolve(&self, key: K, deps: &C) -> Option<Arc<T>> {
		self.factories.get(&key).map(|factory| factory(deps))
	}

	pub fn contains(&self, key: K) -> bool {
		self.factories.contains_key(&key)
	}

	pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
		self.factories.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.factories.len()
	}

	pub fn is_empty(&self) -> bool {
		self.factories.is_empty()
	}

	/// Fail if any of `keys` has no registration.
	///
	/// Called at startup so a missing registration stops the process instead
	/// of surfacing on the first request that needs it.
	pub fn ensure_registered(
		&self,
		keys: impl IntoIterator<Item = K>,
	) -> Result<(), RegistryError> {
		for key in keys {
			if !self.contains(key) {
				return Err(RegistryError::Unregistered {
					registry: self.name,
					key: format!("{key:?}"),
				});
			}
		}
		Ok(())
	}
}

impl<K, T: ?Sized, C> fmt::Debug for Registry<K, T, C>
where
	K: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("name", &self.name)
			.field("keys", &self.factories.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	enum Channel {
		Email,
		Sms,
		Push,
	}

	trait Sender: Send + Sync {
		fn channel(&self) -> &'static str;
	}

	struct EmailSender;
	impl Sender for EmailSender {
		fn channel(&self) -> &'static str {
			"email"
		}
	}

	struct SmsSender;
	impl Sender for SmsSender {
		fn channel(&self) -> &'static str {
			"sms"
		}
	}

	struct Deps {
		built: AtomicUsize,
	}

	fn registry() -> Registry<Channel, dyn Sender, Deps> {
		Registry::new("senders")
			.with(Channel::Email, |deps: &Deps| {
				deps.built.fetch_add(1, Ordering::SeqCst);
				Arc::new(EmailSender) as Arc<dyn Sender>
			})
			.with(Channel::Sms, |_deps: &Deps| Arc::new(SmsSender) as Arc<dyn Sender>)
	}

	fn deps() -> Deps {
		Deps {
			built: AtomicUsize::new(0),
		}
	}

	#[test]
	fn resolves_registered_key() {
		let registry = registry();
		let sender = registry.resolve(Channel::Sms, &deps()).unwrap();
		assert_eq!(sender.channel(), "sms");
	}

	#[test]
	fn resolve_constructs_on_every_call() {
		let registry = registry();
		let deps = deps();
		let first = registry.resolve(Channel::Email, &deps).unwrap();
		let second = registry.resolve(Channel::Email, &deps).unwrap();
		assert!(!Arc::ptr_eq(&first, &second));
		assert_eq!(deps.built.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn unregistered_key_is_an_error() {
		let registry = registry();
		let err = registry.resolve(Channel::Push, &deps()).err().unwrap();
		assert_eq!(
			err,
			RegistryError::Unregistered {
				registry: "senders",
				key: "Push".to_string(),
			}
		);
		assert!(registry.try_resolve(Channel::Push, &deps()).is_none());
	}

	#[test]
	fn ensure_registered_reports_first_missing_key() {
		let registry = registry();
		assert!(registry
			.ensure_registered([Channel::Email, Channel::Sms])
			.is_ok());
		let err = registry
			.ensure_registered([Channel::Email, Channel::Push])
			.unwrap_err();
		assert!(err.to_string().contains("Push"));
	}

	#[test]
	fn debug_lists_name() {
		let registry = registry();
		assert!(format!("{registry:?}").contains("senders"));
	}

	proptest! {
		/// Every key registered is resolvable and the count matches the distinct keys.
		#[test]
		fn registered_keys_resolve(keys in prop::collection::hash_set(0u8..32, 0..16)) {
			let mut registry: Registry<u8, u8, ()> = Registry::new("numbers");
			for key in &keys {
				let value = *key;
				registry.register(value, move |_| Arc::new(value));
			}
			prop_assert_eq!(registry.len(), keys.len());
			for key in &keys {
				prop_assert_eq!(*registry.resolve(*key, &()).unwrap(), *key);
			}
			prop_assert!(registry.ensure_registered(keys.iter().copied()).is_ok());
		}
	}
}
