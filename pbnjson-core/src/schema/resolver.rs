//! Reference resolver (§4.7): drives a caller-supplied callback to fill in
//! `$ref` edges the compiler could not resolve from the document itself.

use url::Url;

use crate::error::{Error, ResolutionStatus};
use crate::value::Value;

use super::compiler::{compile_document_into, CompiledSchema};

/// What the caller's resolver callback returned for one requested URI.
pub enum ResolveOutcome {
    /// A parsed sub-schema document for the requested URI. It is *stolen*
    /// into the host schema's graph and recursively resolved.
    Schema(Value),
    Status(ResolutionStatus),
}

const RELATIVE_BASE: &str = "relative:///";

fn normalize(uri: &str) -> String {
    if let Ok(parsed) = Url::parse(uri) {
        return parsed.to_string();
    }
    if let Ok(base) = Url::parse(RELATIVE_BASE) {
        if let Ok(joined) = base.join(uri) {
            return joined.to_string();
        }
    }
    uri.to_string()
}

/// Repeatedly asks `schema` for its next unresolved document URI and calls
/// `resolver` for it, until every `$ref` resolves or progress stalls.
///
/// Progress guarantee: if two consecutive iterations request the same
/// document URI, resolution fails — the caller returned a sub-schema that
/// did not actually satisfy the request.
pub fn resolve(
    schema: &CompiledSchema,
    mut resolver: impl FnMut(&str) -> ResolveOutcome,
) -> Result<(), Error> {
    let mut last_requested: Option<String> = None;

    loop {
        let document_uri = {
            let graph = schema.graph().read().expect("schema graph lock poisoned");
            next_unresolved_document(&graph.unresolved_ref_uris())
        };
        let Some(document_uri) = document_uri else {
            return Ok(());
        };

        if last_requested.as_deref() == Some(document_uri.as_str()) {
            return Err(Error::Resolution(format!(
                "resolver made no progress on '{document_uri}'"
            )));
        }
        last_requested = Some(document_uri.clone());

        match resolver(&document_uri) {
            ResolveOutcome::Schema(document) => {
                let mut graph = schema.graph().write().expect("schema graph lock poisoned");
                compile_document_into(&mut graph, &document, &document_uri)?;
            }
            ResolveOutcome::Status(status) => {
                return Err(Error::Resolution(format!(
                    "resolver returned {status:?} for '{document_uri}'"
                )));
            }
        }
    }
}

/// The document portion (strip any `#fragment`) of the first still-dangling
/// `$ref` URI, normalized against the resolver's private base.
fn next_unresolved_document(uris: &[String]) -> Option<String> {
    let raw = uris.first()?;
    let normalized = normalize(raw);
    let document = normalized.split('#').next().unwrap_or(&normalized);
    Some(document.to_string())
}
