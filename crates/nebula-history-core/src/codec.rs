//! Identifier codec: embeds an access scope into composite identifiers.
//!
//! A composite identifier is `<scope>:<local>`. The scope may not contain the
//! delimiter, so splitting at the first `:` is unambiguous and two distinct
//! `(scope, local)` pairs never encode to the same string. The local part is
//! free-form and may itself contain `:`.
//!
//! Everything here is a pure function over its arguments.

use crate::error::{CoreError, Result};
use crate::types::AccessScope;

/// Separator between the scope segment and the local part.
pub const DELIMITER: char = ':';

/// Encode a scope and a local part into a composite identifier.
pub fn encode(scope: &AccessScope, local: &str) -> String {
    let mut id = String::with_capacity(scope.as_str().len() + 1 + local.len());
    id.push_str(scope.as_str());
    id.push(DELIMITER);
    id.push_str(local);
    id
}

/// Extract the access scope embedded in a composite identifier.
pub fn extract_access_scope(id: &str) -> Result<AccessScope> {
    split(id).map(|(scope, _)| scope)
}

/// Split a composite identifier into its scope and local part.
pub(crate) fn split(id: &str) -> Result<(AccessScope, &str)> {
    let (scope, local) = id
        .split_once(DELIMITER)
        .ok_or_else(|| CoreError::MalformedIdentifier(format!("{id:?} has no scope delimiter")))?;

    if local.is_empty() {
        return Err(CoreError::MalformedIdentifier(format!(
            "{id:?} has an empty local part"
        )));
    }

    let scope = AccessScope::new(scope).map_err(|_| {
        CoreError::MalformedIdentifier(format!("{id:?} has an invalid scope segment"))
    })?;

    Ok((scope, local))
}
