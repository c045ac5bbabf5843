//! Flattening of NX-OS JSON payloads into metric samples.
//!
//! Each field is extracted on its own: a missing or malformed value only
//! loses that one sample. Registry misuse (wrong label arity, undefined
//! metric) is a defect and aborts the extraction.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use netscrape_common::{RecordError, Registry, RegistryError, ValueError};

use super::metrics::{
    BGP_AF, BGP_NEIGHBOR, COMMAND_RUNTIME, ETH_ADMIN_STATE, ETH_COUNTERS, ETH_DETAILS, ETH_STATE,
    Field, SVI_ADMIN_STATE, SVI_COUNTERS, SVI_DETAILS, SVI_STATE, SYSTEM_RESOURCES,
};
use crate::poller::{CommandResult, PayloadShape};

/// Interface names starting with this prefix are SVIs.
pub const SVI_PREFIX: &str = "Vlan";

/// Fields only SVI rows carry.
pub const SVI_ONLY_FIELDS: &[&str] = &["svi_admin_state", "svi_total_pkts_in", "svi_ucast_bytes_in"];

/// Label value used when a physical interface has no description.
pub const UNKNOWN_LABEL: &str = "unknown";

type Row = Map<String, Value>;

/// Interface variant, each with its own label schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Physical,
    Svi,
}

/// Classify an interface row by name, falling back to SVI-only fields.
pub fn classify(row: &Row) -> InterfaceKind {
    let named_svi = row
        .get("interface")
        .and_then(Value::as_str)
        .is_some_and(|name| name.starts_with(SVI_PREFIX));

    if named_svi || SVI_ONLY_FIELDS.iter().any(|f| row.contains_key(*f)) {
        InterfaceKind::Svi
    } else {
        InterfaceKind::Physical
    }
}

/// Why a field produced no sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldGap {
    Missing(&'static str),
    Invalid {
        field: &'static str,
        error: ValueError,
    },
}

impl fmt::Display for FieldGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldGap::Missing(field) => write!(f, "field {} is missing", field),
            FieldGap::Invalid { field, error } => write!(f, "field {}: {}", field, error),
        }
    }
}

/// Rows of a table value. A bare object is a table with one row.
pub fn normalize_rows(value: &Value) -> Vec<&Row> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(row) => vec![row],
        _ => Vec::new(),
    }
}

/// Rows of `parent[table][row]`, empty when absent.
fn table_rows<'a>(parent: &'a Row, table: &str, row: &str) -> Vec<&'a Row> {
    parent
        .get(table)
        .and_then(|t| t.get(row))
        .map(normalize_rows)
        .unwrap_or_default()
}

/// A scalar field rendered as a label value.
fn label_value(row: &Row, key: &'static str) -> Result<String, FieldGap> {
    match row.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(FieldGap::Invalid {
            field: key,
            error: ValueError::NotScalar,
        }),
        None => Err(FieldGap::Missing(key)),
    }
}

/// Record one field. The single place deciding what a failure means:
/// gaps are logged and skipped, registry errors propagate.
fn emit(
    registry: &mut Registry,
    field: &Field,
    labels: &[&str],
    row: &Row,
) -> Result<Option<f64>, RegistryError> {
    let gap = match row.get(field.source) {
        None => FieldGap::Missing(field.source),
        Some(raw) => match registry.record(field.metric, labels, raw) {
            Ok(value) => return Ok(Some(value)),
            Err(RecordError::Registry(e)) => return Err(e),
            Err(RecordError::Value(error)) => FieldGap::Invalid {
                field: field.source,
                error,
            },
        },
    };

    trace!(
        metric = field.metric,
        labels = ?labels,
        gap = %gap,
        "Sample not extracted"
    );
    Ok(None)
}

/// Record state and admin state; detail fields only when the state is up.
fn gated(
    registry: &mut Registry,
    labels: &[&str],
    row: &Row,
    state: &Field,
    admin_state: &Field,
    details: &[Field],
) -> Result<bool, RegistryError> {
    let current = emit(registry, state, labels, row)?;
    emit(registry, admin_state, labels, row)?;

    let up = current.is_some_and(|v| v >= 1.0);
    if !up {
        trace!(labels = ?labels, "Interface not up, skipping details");
        return Ok(false);
    }

    for field in details {
        emit(registry, field, labels, row)?;
    }

    Ok(true)
}

#[derive(Debug, Clone)]
struct InterfaceInfo {
    description: Option<String>,
    up: bool,
}

/// Extracts one device's payloads into a registry.
///
/// Holds the per-device interface cache (descriptions and states seen in
/// the interface listing); it lives only as long as the extractor.
pub struct Extractor<'r> {
    registry: &'r mut Registry,
    device: String,
    interfaces: HashMap<String, InterfaceInfo>,
}

impl<'r> Extractor<'r> {
    pub fn new(registry: &'r mut Registry, device: impl Into<String>) -> Self {
        Self {
            registry,
            device: device.into(),
            interfaces: HashMap::new(),
        }
    }

    /// Extract every result, in payload-shape order, and record how long
    /// each command took.
    pub fn extract(&mut self, results: &[CommandResult]) -> Result<(), RegistryError> {
        let mut ordered: Vec<&CommandResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.shape);

        for result in ordered {
            let seconds = (result.elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
            self.registry
                .observe(COMMAND_RUNTIME, &[self.device.as_str(), result.name.as_str()], seconds)?;

            match result.shape {
                PayloadShape::SystemResources => self.system_resources(&result.payload)?,
                PayloadShape::BgpSummary => self.bgp_summary(&result.payload)?,
                PayloadShape::Interfaces => self.interfaces(&result.payload)?,
                PayloadShape::InterfaceCounters => self.interface_counters(&result.payload)?,
            }
        }

        Ok(())
    }

    /// `show system resources`
    pub fn system_resources(&mut self, payload: &Value) -> Result<(), RegistryError> {
        let Some(row) = self.top_level(payload, "system_resources") else {
            return Ok(());
        };

        let labels = [self.device.as_str()];
        for field in SYSTEM_RESOURCES {
            emit(self.registry, field, &labels, row)?;
        }

        Ok(())
    }

    /// `show interface`
    pub fn interfaces(&mut self, payload: &Value) -> Result<(), RegistryError> {
        let Some(top) = self.top_level(payload, "interfaces") else {
            return Ok(());
        };

        for row in table_rows(top, "TABLE_interface", "ROW_interface") {
            let Ok(name) = label_value(row, "interface") else {
                debug!(device = %self.device, "Interface row without a name");
                continue;
            };

            let info = match classify(row) {
                InterfaceKind::Svi => self.svi(row, &name)?,
                InterfaceKind::Physical => self.physical(row, &name)?,
            };
            self.interfaces.insert(name, info);
        }

        Ok(())
    }

    fn physical(&mut self, row: &Row, name: &str) -> Result<InterfaceInfo, RegistryError> {
        let description = label_value(row, "desc").unwrap_or_else(|_| UNKNOWN_LABEL.to_string());
        let hwaddr = label_value(row, "eth_hw_addr").unwrap_or_else(|_| UNKNOWN_LABEL.to_string());
        let labels = [self.device.as_str(), name, hwaddr.as_str(), description.as_str()];

        let up = gated(self.registry, &labels, row, &ETH_STATE, &ETH_ADMIN_STATE, ETH_DETAILS)?;

        Ok(InterfaceInfo {
            description: Some(description),
            up,
        })
    }

    fn svi(&mut self, row: &Row, name: &str) -> Result<InterfaceInfo, RegistryError> {
        let hwaddr = label_value(row, "svi_mac").unwrap_or_else(|_| UNKNOWN_LABEL.to_string());
        let labels = [self.device.as_str(), name, hwaddr.as_str()];

        let up = gated(self.registry, &labels, row, &SVI_STATE, &SVI_ADMIN_STATE, SVI_DETAILS)?;

        Ok(InterfaceInfo {
            description: None,
            up,
        })
    }

    /// `show interface counters detailed`
    ///
    /// Reuses descriptions from the interface listing; interfaces the
    /// listing reported as not up get no counters.
    pub fn interface_counters(&mut self, payload: &Value) -> Result<(), RegistryError> {
        let Some(top) = self.top_level(payload, "interface_counters") else {
            return Ok(());
        };

        for row in table_rows(top, "TABLE_interface", "ROW_interface") {
            let Ok(name) = label_value(row, "interface") else {
                continue;
            };

            let known = self.interfaces.get(&name);
            if known.is_some_and(|info| !info.up) {
                continue;
            }

            match classify(row) {
                InterfaceKind::Svi => {
                    let labels = [self.device.as_str(), name.as_str()];
                    for field in SVI_COUNTERS {
                        emit(self.registry, field, &labels, row)?;
                    }
                }
                InterfaceKind::Physical => {
                    let description = known
                        .and_then(|info| info.description.clone())
                        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
                    let labels = [self.device.as_str(), name.as_str(), description.as_str()];
                    for field in ETH_COUNTERS {
                        emit(self.registry, field, &labels, row)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// `show bgp all summary`
    ///
    /// Tables at every level (VRF, address family, SAF, neighbor) may be a
    /// list or a bare object.
    pub fn bgp_summary(&mut self, payload: &Value) -> Result<(), RegistryError> {
        let Some(top) = self.top_level(payload, "bgp_summary") else {
            return Ok(());
        };

        for vrf in table_rows(top, "TABLE_vrf", "ROW_vrf") {
            let (Ok(router_id), Ok(local_as)) = (
                label_value(vrf, "vrf-router-id"),
                label_value(vrf, "vrf-local-as"),
            ) else {
                debug!(device = %self.device, "VRF row without router id or local AS");
                continue;
            };

            for af in table_rows(vrf, "TABLE_af", "ROW_af") {
                let Ok(af_id) = label_value(af, "af-id") else {
                    continue;
                };

                for saf in table_rows(af, "TABLE_saf", "ROW_saf") {
                    let labels = [
                        self.device.as_str(),
                        af_id.as_str(),
                        router_id.as_str(),
                        local_as.as_str(),
                    ];
                    for field in BGP_AF {
                        emit(self.registry, field, &labels, saf)?;
                    }

                    for neighbor in table_rows(saf, "TABLE_neighbor", "ROW_neighbor") {
                        let (Ok(neighbor_id), Ok(neighbor_as)) = (
                            label_value(neighbor, "neighborid"),
                            label_value(neighbor, "neighboras"),
                        ) else {
                            continue;
                        };

                        let labels = [
                            self.device.as_str(),
                            af_id.as_str(),
                            neighbor_id.as_str(),
                            router_id.as_str(),
                            local_as.as_str(),
                            neighbor_as.as_str(),
                        ];
                        for field in BGP_NEIGHBOR {
                            emit(self.registry, field, &labels, neighbor)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn top_level<'p>(&self, payload: &'p Value, command: &str) -> Option<&'p Row> {
        let row = payload.as_object();
        if row.is_none() {
            debug!(device = %self.device, command, "Payload is not an object");
        }
        row
    }
}

/// Extract one device's command results into `registry`.
pub fn extract_device(
    registry: &mut Registry,
    device: &str,
    results: &[CommandResult],
) -> Result<(), RegistryError> {
    Extractor::new(registry, device).extract(results)
}
