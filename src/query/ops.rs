//! Query operators understood by the backend
//!
//! Comparison operators prefix the value (`gt5`); the blank tests are sent bare.

use crate::value::as_text;
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Blank,
    NBlank,
}

impl QueryOp {
    pub fn token(&self) -> &'static str {
        match self {
            QueryOp::Ne => "ne",
            QueryOp::Gt => "gt",
            QueryOp::Lt => "lt",
            QueryOp::Gte => "gte",
            QueryOp::Lte => "lte",
            QueryOp::Blank => "blank",
            QueryOp::NBlank => "nblank",
        }
    }

    pub fn takes_value(&self) -> bool {
        !matches!(self, QueryOp::Blank | QueryOp::NBlank)
    }

    /// Operator prefixed query value
    pub fn to_param(&self, value: Option<&Value>) -> String {
        match value {
            Some(value) if self.takes_value() => format!("{}{}", self.token(), as_text(value)),
            _ => self.token().to_string(),
        }
    }
}

impl FromStr for QueryOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ne" => Ok(QueryOp::Ne),
            "gt" => Ok(QueryOp::Gt),
            "lt" => Ok(QueryOp::Lt),
            "gte" => Ok(QueryOp::Gte),
            "lte" => Ok(QueryOp::Lte),
            "blank" => Ok(QueryOp::Blank),
            "nblank" => Ok(QueryOp::NBlank),
            other => Err(anyhow!("Unknown query operator '{}'", other)),
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Query value for an operator token, e.g. `op_param("gt", Some(&json!(5)))` gives `"gt5"`
pub fn op_param(op: &str, value: Option<&Value>) -> Result<String> {
    Ok(op.parse::<QueryOp>()?.to_param(value))
}

/// Multi-field operators, each sent as its own query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiOp {
    Or,
    And,
    Nor,
}

impl MultiOp {
    pub fn key(&self) -> &'static str {
        match self {
            MultiOp::Or => "or",
            MultiOp::And => "and",
            MultiOp::Nor => "nor",
        }
    }
}
