//! Metric catalog for NX-OS switches.

use netscrape_common::{MetricDefinition, MetricKind, Registry, RegistryError, ValueFormat};

use super::symbols::{BgpState, InterfaceState, PortMode};

/// One metric fed from one payload field.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Full metric name.
    pub metric: &'static str,
    /// Key of the value in the payload row.
    pub source: &'static str,
    pub kind: MetricKind,
    pub format: ValueFormat,
}

impl Field {
    const fn gauge(metric: &'static str, source: &'static str) -> Self {
        Self {
            metric,
            source,
            kind: MetricKind::Gauge,
            format: ValueFormat::Numeric,
        }
    }

    const fn counter(metric: &'static str, source: &'static str) -> Self {
        Self {
            metric,
            source,
            kind: MetricKind::Counter,
            format: ValueFormat::Numeric,
        }
    }

    const fn state(metric: &'static str, source: &'static str) -> Self {
        Self {
            metric,
            source,
            kind: MetricKind::Gauge,
            format: ValueFormat::Symbol(InterfaceState::code),
        }
    }
}

/// Metrics sharing a help text and label schema.
#[derive(Debug)]
pub struct Family {
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub fields: &'static [Field],
}

const SHOW_INTERFACES: &str = "From show interfaces";
const SHOW_COUNTERS: &str = "From show interface counters detailed";
const SHOW_BGP: &str = "From show bgp summary all";
const SHOW_RESOURCES: &str = "From show system resources";

pub const ETH_LABELS: &[&str] = &["instance", "interface", "hwaddr", "description"];
pub const SVI_LABELS: &[&str] = &["instance", "interface", "hwaddr"];
pub const ETH_COUNTER_LABELS: &[&str] = &["instance", "interface", "description"];
pub const SVI_COUNTER_LABELS: &[&str] = &["instance", "interface"];
pub const BGP_AF_LABELS: &[&str] = &["instance", "af_id", "router_id", "local_as"];
pub const BGP_NEIGHBOR_LABELS: &[&str] = &[
    "instance",
    "af_id",
    "neighborid",
    "router_id",
    "local_as",
    "neighboras",
];
pub const SYSTEM_LABELS: &[&str] = &["instance"];

pub const ETH_STATE: Field = Field::state("cisco_eth_state", "state");
pub const ETH_ADMIN_STATE: Field = Field::state("cisco_eth_admin_state", "admin_state");
pub const ETH_DETAILS: &[Field] = &[
    Field::gauge("cisco_eth_txload", "eth_txload"),
    Field::gauge("cisco_eth_rxload", "eth_rxload"),
    Field::gauge("cisco_eth_bw", "eth_bw"),
    Field {
        metric: "cisco_eth_mode",
        source: "eth_mode",
        kind: MetricKind::Gauge,
        format: ValueFormat::Symbol(PortMode::code),
    },
];

pub const SVI_STATE: Field = Field::state("cisco_svi_state", "svi_line_proto");
pub const SVI_ADMIN_STATE: Field = Field::state("cisco_svi_admin_state", "svi_admin_state");
pub const SVI_DETAILS: &[Field] = &[
    Field::gauge("cisco_svi_bw", "svi_bw"),
    Field::gauge("cisco_svi_rx_load", "svi_rx_load"),
    Field::gauge("cisco_svi_tx_load", "svi_tx_load"),
];

pub const ETH_COUNTERS: &[Field] = &[
    Field::counter("cisco_eth_inbytes", "eth_inbytes"),
    Field::counter("cisco_eth_indiscard", "eth_indiscard"),
    Field::counter("cisco_eth_inerr", "eth_inerr"),
    Field::counter("cisco_eth_inpkts", "eth_inpkts"),
    Field::counter("cisco_eth_ingiants", "eth_ingiants"),
    Field::counter("cisco_eth_outbytes", "eth_outbytes"),
    Field::counter("cisco_eth_outdiscard", "eth_outdiscard"),
    Field::counter("cisco_eth_outerr", "eth_outerr"),
    Field::counter("cisco_eth_outpkts", "eth_outpkts"),
    Field::counter("cisco_eth_outgiants", "eth_outgiants"),
];

pub const SVI_COUNTERS: &[Field] = &[
    Field::counter("cisco_svi_total_pkts_out", "svi_total_pkts_out"),
    Field::counter("cisco_svi_total_bytes_out", "svi_total_bytes_out"),
    Field::counter("cisco_svi_total_pkts_in", "svi_total_pkts_in"),
    Field::counter("cisco_svi_total_bytes_in", "svi_total_bytes_in"),
    Field::counter("cisco_svi_ucast_bytes_out", "svi_ucast_bytes_out"),
    Field::counter("cisco_svi_ucast_pkts_out", "svi_ucast_pkts_out"),
    Field::counter("cisco_svi_ucast_bytes_in", "svi_ucast_bytes_in"),
    Field::counter("cisco_svi_ucast_pkts_in", "svi_ucast_pkts_in"),
];

pub const BGP_AF: &[Field] = &[
    Field::gauge("cisco_bgp_saf_configuredpeers", "configuredpeers"),
    Field::gauge("cisco_bgp_saf_capablepeers", "capablepeers"),
    Field::gauge("cisco_bgp_saf_totalnetworks", "totalnetworks"),
    Field::gauge("cisco_bgp_saf_totalpaths", "totalpaths"),
    Field::gauge("cisco_bgp_saf_memoryused", "memoryused"),
    Field::gauge("cisco_bgp_saf_numberattrs", "numberattrs"),
    Field::gauge("cisco_bgp_saf_bytesattrs", "bytesattrs"),
    Field::gauge("cisco_bgp_saf_numberpaths", "numberpaths"),
    Field::gauge("cisco_bgp_saf_bytespaths", "bytespaths"),
    Field::gauge("cisco_bgp_saf_numbercommunities", "numbercommunities"),
    Field::gauge("cisco_bgp_saf_bytescommunities", "bytescommunities"),
    Field::gauge("cisco_bgp_saf_numberclusterlist", "numberclusterlist"),
    Field::gauge("cisco_bgp_saf_bytesclusterlist", "bytesclusterlist"),
];

pub const BGP_NEIGHBOR: &[Field] = &[
    Field {
        metric: "cisco_bgp_saf_neighbor_state",
        source: "state",
        kind: MetricKind::Gauge,
        format: ValueFormat::Symbol(BgpState::code),
    },
    Field::gauge("cisco_bgp_saf_neighbor_neighbortableversion", "neighbortableversion"),
    Field::gauge("cisco_bgp_saf_neighbor_prefixreceived", "prefixreceived"),
    Field::counter("cisco_bgp_saf_neighbor_msgrecvd", "msgrecvd"),
    Field::counter("cisco_bgp_saf_neighbor_msgsent", "msgsent"),
    Field::counter("cisco_bgp_saf_neighbor_inq", "inq"),
    Field::counter("cisco_bgp_saf_neighbor_outq", "outq"),
];

pub const SYSTEM_RESOURCES: &[Field] = &[
    Field::gauge("cisco_memory_usage_total", "memory_usage_total"),
    Field::gauge("cisco_memory_usage_used", "memory_usage_used"),
    Field::gauge("cisco_memory_usage_free", "memory_usage_free"),
    Field::gauge("cisco_processes_total", "processes_total"),
    Field::gauge("cisco_processes_running", "processes_running"),
    Field::gauge("cisco_cpu_state_user", "cpu_state_user"),
    Field::gauge("cisco_cpu_state_kernel", "cpu_state_kernel"),
    Field::gauge("cisco_cpu_state_idle", "cpu_state_idle"),
];

pub const COMMAND_RUNTIME: &str = "cisco_command_runtime";
pub const COMMAND_RUNTIME_LABELS: &[&str] = &["instance", "command"];

const ETH_STATES: &[Field] = &[ETH_STATE, ETH_ADMIN_STATE];
const SVI_STATES: &[Field] = &[SVI_STATE, SVI_ADMIN_STATE];

/// Every family, in exposition order.
pub const FAMILIES: &[Family] = &[
    Family {
        help: SHOW_INTERFACES,
        labels: ETH_LABELS,
        fields: ETH_STATES,
    },
    Family {
        help: SHOW_INTERFACES,
        labels: ETH_LABELS,
        fields: ETH_DETAILS,
    },
    Family {
        help: SHOW_INTERFACES,
        labels: SVI_LABELS,
        fields: SVI_STATES,
    },
    Family {
        help: SHOW_INTERFACES,
        labels: SVI_LABELS,
        fields: SVI_DETAILS,
    },
    Family {
        help: SHOW_BGP,
        labels: BGP_AF_LABELS,
        fields: BGP_AF,
    },
    Family {
        help: SHOW_BGP,
        labels: BGP_NEIGHBOR_LABELS,
        fields: BGP_NEIGHBOR,
    },
    Family {
        help: SHOW_COUNTERS,
        labels: ETH_COUNTER_LABELS,
        fields: ETH_COUNTERS,
    },
    Family {
        help: SHOW_COUNTERS,
        labels: SVI_COUNTER_LABELS,
        fields: SVI_COUNTERS,
    },
    Family {
        help: SHOW_RESOURCES,
        labels: SYSTEM_LABELS,
        fields: SYSTEM_RESOURCES,
    },
];

/// Build the metric definitions for one scrape.
pub fn definitions() -> Vec<MetricDefinition> {
    let mut definitions: Vec<MetricDefinition> = FAMILIES
        .iter()
        .flat_map(|family| {
            family.fields.iter().map(|field| {
                MetricDefinition::new(field.metric, field.kind, family.help, family.labels)
                    .with_format(field.format)
            })
        })
        .collect();

    definitions.push(MetricDefinition::gauge(
        COMMAND_RUNTIME,
        "Time taken to obtain data from switch",
        COMMAND_RUNTIME_LABELS,
    ));

    definitions
}

/// A fresh registry holding every Cisco metric.
pub fn registry() -> Result<Registry, RegistryError> {
    Registry::with_definitions(definitions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_are_unique() {
        let registry = registry().unwrap();
        assert!(registry.definition("cisco_eth_state").is_some());
        assert!(registry.definition("cisco_bgp_saf_neighbor_msgsent").is_some());
        assert!(registry.definition(COMMAND_RUNTIME).is_some());
    }

    #[test]
    fn test_kinds_and_labels() {
        let registry = registry().unwrap();

        let state = registry.definition("cisco_eth_state").unwrap();
        assert_eq!(state.kind, MetricKind::Gauge);
        assert_eq!(state.labels, ETH_LABELS);

        let msgsent = registry
            .definition("cisco_bgp_saf_neighbor_msgsent")
            .unwrap();
        assert_eq!(msgsent.kind, MetricKind::Counter);
        assert_eq!(msgsent.labels.len(), 6);

        let inbytes = registry.definition("cisco_svi_total_bytes_in").unwrap();
        assert_eq!(inbytes.help, "From show interface counters detailed");
        assert_eq!(inbytes.labels, SVI_COUNTER_LABELS);
    }

    #[test]
    fn test_definition_count() {
        let expected: usize = FAMILIES.iter().map(|f| f.fields.len()).sum::<usize>() + 1;
        assert_eq!(definitions().len(), expected);
    }
}
