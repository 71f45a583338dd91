//! The operation kinds issued by the load generator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of operations issued against the registry.
///
/// Variants are declared in alphabetical order of their names, so the derived [`Ord`] sorts
/// operations the same way as their string representation.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `POST <base>` with a fresh descriptor body.
    #[serde(alias = "post")]
    Create,
    /// `GET <base>` without any filters.
    #[serde(alias = "search_all")]
    List,
    /// `GET <base>/<encoded-id>` for a previously created descriptor.
    #[serde(alias = "get", alias = "getById")]
    Read,
    /// `GET <base>?limit=<n>&cursor=<id>`.
    #[serde(alias = "search_limit100")]
    SearchPaginated,
}

impl Operation {
    /// All operations, in sort order.
    pub const ALL: [Operation; 4] = [
        Operation::Create,
        Operation::List,
        Operation::Read,
        Operation::SearchPaginated,
    ];

    /// The name used in logs and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::List => "list",
            Operation::Read => "read",
            Operation::SearchPaginated => "search_paginated",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
