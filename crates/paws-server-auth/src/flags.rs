// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization paths as a bitmask.
//!
//! A check names the paths that may satisfy it; any one of them is enough.
//! [`AuthorizationFlags::NONE`] names no path and therefore never succeeds.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthorizationFlags(u8);

impl AuthorizationFlags {
	pub const NONE: Self = Self(0);
	/// Caller's roles hold the permission outright.
	pub const PERMISSION: Self = Self(1 << 0);
	/// Caller is one of the resource's owners.
	pub const OWNER: Self = Self(1 << 1);
	/// Caller holds an affiliated role for the permission.
	pub const AFFILIATION: Self = Self(1 << 2);
	pub const OWNER_OR_PERMISSION: Self = Self(Self::OWNER.0 | Self::PERMISSION.0);
	pub const OWNER_OR_PERMISSION_OR_AFFILIATION: Self =
		Self(Self::OWNER.0 | Self::PERMISSION.0 | Self::AFFILIATION.0);

	const NAMED: [(Self, &'static str); 3] = [
		(Self::PERMISSION, "permission"),
		(Self::OWNER, "owner"),
		(Self::AFFILIATION, "affiliation"),
	];

	pub const fn bits(self) -> u8 {
		self.0
	}

	pub const fn from_bits_truncate(bits: u8) -> Self {
		Self(bits & Self::OWNER_OR_PERMISSION_OR_AFFILIATION.0)
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// True when every path in `other` is also in `self`.
	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	pub const fn intersects(self, other: Self) -> bool {
		self.0 & other.0 != 0
	}

	/// Parse the flag names used in the policy tables. An empty list, or the
	/// single name `none`, yields [`AuthorizationFlags::NONE`].
	pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self, AuthError> {
		let mut flags = Self::NONE;
		for name in names {
			let name = name.as_ref();
			if name == "none" {
				continue;
			}
			let (flag, _) = Self::NAMED
				.iter()
				.find(|(_, n)| *n == name)
				.ok_or_else(|| {
					AuthError::Configuration(format!("unknown authorization flag '{name}'"))
				})?;
			flags |= *flag;
		}
		Ok(flags)
	}

	/// Individual paths in evaluation order.
	pub fn iter(self) -> impl Iterator<Item = Self> {
		Self::NAMED
			.into_iter()
			.map(|(flag, _)| flag)
			.filter(move |flag| self.contains(*flag))
	}
}

impl BitOr for AuthorizationFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for AuthorizationFlags {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}

impl BitAnd for AuthorizationFlags {
	type Output = Self;

	fn bitand(self, rhs: Self) -> Self {
		Self(self.0 & rhs.0)
	}
}

impl fmt::Display for AuthorizationFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_empty() {
			return f.write_str("none");
		}
		let names: Vec<_> = Self::NAMED
			.iter()
			.filter(|(flag, _)| self.contains(*flag))
			.map(|(_, name)| *name)
			.collect();
		f.write_str(&names.join("|"))
	}
}
