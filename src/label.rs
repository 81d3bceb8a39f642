//! Binding a logical service name to a Marathon application port.
//!
//! An application advertises a service by carrying a label
//! `<PREFIX>_<index>_NAME=<service name>`, where `<index>` is the
//! zero-based position of the service's port in each task's port list.

use log::debug;

use crate::error::{ResolverError, Result};
use crate::marathon::Application;
use crate::types::ServiceBinding;

/// Label prefix used when none is configured.
pub const DEFAULT_LABEL_PREFIX: &str = "RESOLVER";

const LABEL_SUFFIX: &str = "_NAME";

/// Picks the application and port index bound to `service_name`.
///
/// `apps` is the orchestrator's answer to a label query for the service
/// and must contain exactly one application.  Within it exactly one label
/// may bind the service name.
pub fn resolve_binding(
    service_name: &str,
    prefix: &str,
    apps: &[Application],
) -> Result<ServiceBinding> {
    let app = match apps {
        [] => return Err(ResolverError::ServiceNotFound(service_name.to_string())),
        [app] => app,
        _ => {
            return Err(ResolverError::ServiceNameCollision {
                name: service_name.to_string(),
                count: apps.len(),
            })
        }
    };

    let mut candidates: Vec<(&str, &str)> = app
        .labels
        .iter()
        .filter(|(_, value)| value.as_str() == service_name)
        .filter_map(|(key, _)| index_segment(key, prefix).map(|segment| (key.as_str(), segment)))
        .collect();

    let (label, segment) = match candidates.len() {
        0 => {
            return Err(ResolverError::LabelNotFound {
                name: service_name.to_string(),
                app_id: app.id.clone(),
            })
        }
        1 => candidates.remove(0),
        _ => {
            let mut labels: Vec<String> = candidates.iter().map(|(k, _)| k.to_string()).collect();
            labels.sort();
            return Err(ResolverError::AmbiguousLabel {
                name: service_name.to_string(),
                labels,
            });
        }
    };

    let port_index = parse_port_index(segment).ok_or_else(|| ResolverError::InvalidPortIndex {
        label: label.to_string(),
    })?;

    debug!(
        "Service {} bound to {} port index {} via {}",
        service_name, app.id, port_index, label
    );

    Ok(ServiceBinding {
        app_id: app.id.clone(),
        port_index,
    })
}

/// Returns the raw `<index>` segment of a `<PREFIX>_<index>_NAME` key.
fn index_segment<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(LABEL_SUFFIX)
}

fn parse_port_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
