//! Access policy and principal administration for the signoff services.
//!
//! Visibility is grant-based: users hold explicit grants on directories and
//! files, handed out when they create a node or by an administrator. Role
//! membership only gates the administrative surfaces. Every service in the
//! workspace funnels its checks through [`AccessResolver`] so the policy
//! lives in one place.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod principals;
mod resolver;

pub use principals::PrincipalRegistry;
pub use resolver::{AccessResolver, ADMIN_ROLE};
