use serde::Deserialize;

use lease_engine_core::config::{StaticConfigSource, TenantConfig};
use lease_engine_core::engine::TenantKey;

use crate::input;

/// A tenant settings file holds either one configuration, applied to the
/// selected tenant, or a list of configurations keyed by tenant and app.
#[derive(Deserialize)]
#[serde(untagged)]
enum TenantFile {
    Many { tenants: Vec<TenantEntry> },
    One(TenantConfig),
}

#[derive(Deserialize)]
struct TenantEntry {
    tenant_id: String,
    app_id: String,
    #[serde(flatten)]
    config: TenantConfig,
}

/// Build the configuration source for this invocation. Without a file the
/// source is empty and every lookup reports the configuration as unavailable.
pub fn load_source(
    path: Option<&str>,
    selected: &TenantKey,
) -> Result<StaticConfigSource, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(StaticConfigSource::new());
    };
    let source = match input::file::read_yaml::<TenantFile>(path)? {
        TenantFile::One(config) => {
            StaticConfigSource::new().with_tenant(&selected.tenant_id, &selected.app_id, config)
        }
        TenantFile::Many { tenants } => tenants
            .into_iter()
            .fold(StaticConfigSource::new(), |source, entry| {
                source.with_tenant(&entry.tenant_id, &entry.app_id, entry.config)
            }),
    };
    Ok(source)
}
