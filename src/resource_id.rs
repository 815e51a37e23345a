//! # Resource ID Parsing
//!
//! Extracts the subscription, resource group and resource name from an ARM
//! resource path by position:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ContainerService/managedClusters/{name}
//!  0      1        2         3          4      5               6                       7          8
//! ```
//!
//! The segment contents are not validated here; the resource manager rejects
//! names it does not recognise.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SUBSCRIPTION_SEGMENT: usize = 2;
const RESOURCE_GROUP_SEGMENT: usize = 4;
const RESOURCE_NAME_SEGMENT: usize = 8;
const MIN_SEGMENTS: usize = RESOURCE_NAME_SEGMENT + 1;

/// Identifiers of a single managed cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub resource_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed resource ID {path:?}: {reason}")]
    MalformedResourceId { path: String, reason: String },
}

/// Parse a slash-delimited resource path
///
/// # Errors
///
/// Returns [`ParseError::MalformedResourceId`] when the path has fewer than
/// nine segments or any of the subscription, resource group or name
/// segments is empty.
pub fn parse_resource_id(path: &str) -> Result<ParsedResourceId, ParseError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(malformed(
            path,
            format!(
                "expected at least {MIN_SEGMENTS} '/'-separated segments, found {}",
                segments.len()
            ),
        ));
    }

    let segment = |index: usize, label: &str| -> Result<String, ParseError> {
        let value = segments[index];
        if value.is_empty() {
            return Err(malformed(path, format!("{label} segment (index {index}) is empty")));
        }
        Ok(value.to_string())
    };

    Ok(ParsedResourceId {
        subscription_id: segment(SUBSCRIPTION_SEGMENT, "subscription")?,
        resource_group: segment(RESOURCE_GROUP_SEGMENT, "resource group")?,
        resource_name: segment(RESOURCE_NAME_SEGMENT, "resource name")?,
    })
}

fn malformed(path: &str, reason: String) -> ParseError {
    ParseError::MalformedResourceId {
        path: path.to_string(),
        reason,
    }
}

impl FromStr for ParsedResourceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_resource_id(s)
    }
}

impl fmt::Display for ParsedResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.resource_name
        )
    }
}
