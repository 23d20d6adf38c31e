use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A write operation that the access policy can gate behind a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Edit,
    Delete,
    Like,
    Comment,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::Create,
        Self::Edit,
        Self::Delete,
        Self::Like,
        Self::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Like => "like",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// Type-level names for each [`Operation`], so a route can state what it
/// performs in its extractor list.
pub trait GatedOperation: Send + Sync + 'static {
    const OPERATION: Operation;
}

pub mod op {
    use super::{GatedOperation, Operation};

    macro_rules! gated_operation {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Clone, Copy, Debug)]
                pub struct $name;

                impl GatedOperation for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    gated_operation!(Create, Edit, Delete, Like, Comment);
}

/// Which write operations require an authenticated session.
///
/// Reads (`GET /posts`) are always public. The default gates create, edit,
/// and delete, and leaves like and comment open to anonymous callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub like: bool,
    pub comment: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            create: true,
            edit: true,
            delete: true,
            like: false,
            comment: false,
        }
    }
}

impl AccessPolicy {
    /// Every write requires a session.
    pub fn locked() -> Self {
        Self::only(&Operation::ALL)
    }

    /// Exactly the listed operations require a session.
    pub fn only(ops: &[Operation]) -> Self {
        Self {
            create: ops.contains(&Operation::Create),
            edit: ops.contains(&Operation::Edit),
            delete: ops.contains(&Operation::Delete),
            like: ops.contains(&Operation::Like),
            comment: ops.contains(&Operation::Comment),
        }
    }

    /// Parse a comma-separated operation list such as `"create,edit,delete"`.
    ///
    /// `"none"` or an empty string opens every operation.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let list = list.trim();
        if list.is_empty() || list.eq_ignore_ascii_case("none") {
            return Ok(Self::only(&[]));
        }
        let ops = list
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Operation>, _>>()?;
        Ok(Self::only(&ops))
    }

    pub fn requires_session(&self, op: Operation) -> bool {
        match op {
            Operation::Create => self.create,
            Operation::Edit => self.edit,
            Operation::Delete => self.delete,
            Operation::Like => self.like,
            Operation::Comment => self.comment,
        }
    }

    /// The gated operations, in declaration order.
    pub fn gated(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.requires_session(*op))
            .collect()
    }
}
