// ── Network diagnostics ──

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a `netcheck` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCheckReport {
    pub udp: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    pub global_v4: Option<String>,
    pub global_v6: Option<String>,
    /// `None` means the check did not run.
    pub upnp: Option<bool>,
    pub pmp: Option<bool>,
    pub pcp: Option<bool>,
    pub captive_portal: Option<bool>,
    pub hair_pinning: Option<bool>,
    /// Region ID of the preferred relay, 0 when none.
    pub preferred_derp: u32,
    pub region_latency: BTreeMap<u32, Duration>,
}

/// One relay region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerpRegion {
    pub id: u32,
    pub code: String,
    pub name: String,
}

/// The relay map, keyed by region ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerpMap {
    pub regions: BTreeMap<u32, DerpRegion>,
}

impl DerpMap {
    /// Human-readable name for a region, falling back to its code, then
    /// its numeric ID.
    pub fn region_name(&self, id: u32) -> String {
        match self.regions.get(&id) {
            Some(r) if !r.name.is_empty() => r.name.clone(),
            Some(r) if !r.code.is_empty() => r.code.clone(),
            _ => id.to_string(),
        }
    }
}

impl NetCheckReport {
    /// `(region name, latency)` sorted ascending by latency, then name.
    pub fn derp_latencies(&self, map: &DerpMap) -> Vec<(String, Duration)> {
        let mut out: Vec<(String, Duration)> = self
            .region_latency
            .iter()
            .map(|(id, lat)| (map.region_name(*id), *lat))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn preferred_derp_name(&self, map: &DerpMap) -> Option<String> {
        (self.preferred_derp != 0).then(|| map.region_name(self.preferred_derp))
    }
}
