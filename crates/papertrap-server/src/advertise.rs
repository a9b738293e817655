// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DNS-SD service advertisement.
//
// Discovery clients (CUPS, AirPrint-style stacks, network scanners) find
// the virtual printer by browsing `_ipp._tcp.`.  The registration runs
// through a small trait so tests and alternative backends can stand in
// for the mDNS daemon.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use papertrap_core::error::{PapertrapError, Result};
use tracing::{info, warn};

/// Opaque registration handle returned by [`ServiceAdvertiser::register`].
#[derive(Debug, Clone)]
pub struct AdvertisementHandle {
    /// The mDNS fullname used for unregistration.
    pub fullname: String,
}

/// Abstraction over the platform's service advertisement mechanism.
pub trait ServiceAdvertiser: Send {
    fn register(
        &mut self,
        instance_name: &str,
        service_type: &str,
        port: u16,
        txt: &[(String, String)],
    ) -> Result<AdvertisementHandle>;

    fn unregister(&mut self, handle: AdvertisementHandle) -> Result<()>;
}

/// TXT records advertised for the IPP endpoint.
pub fn ipp_txt_records(port: u16) -> Vec<(String, String)> {
    let host = local_hostname();
    vec![
        ("URF".into(), "none".into()),
        ("adminurl".into(), format!("http://{host}:{port}/")),
        ("rp".into(), "ipp/print".into()),
        ("pdl".into(), "application/pdf,image/urf".into()),
        ("txtvers".into(), "1".into()),
        ("priority".into(), "30".into()),
        ("qtotal".into(), "1".into()),
        ("kind".into(), "document".into()),
        ("TLS".into(), "1.2".into()),
    ]
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "papertrap".into())
}

/// mDNS-backed advertiser using the `mdns-sd` daemon.
pub struct MdnsAdvertiser {
    daemon: Option<ServiceDaemon>,
}

impl MdnsAdvertiser {
    pub fn new() -> Self {
        Self { daemon: None }
    }
}

impl Default for MdnsAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceAdvertiser for MdnsAdvertiser {
    fn register(
        &mut self,
        instance_name: &str,
        service_type: &str,
        port: u16,
        txt: &[(String, String)],
    ) -> Result<AdvertisementHandle> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| PapertrapError::Advertise(format!("mDNS daemon: {e}")))?;

        let hostname = format!("{}.local.", local_hostname());
        let properties: Vec<(&str, &str)> = txt
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let service_info = ServiceInfo::new(
            service_type,
            instance_name,
            &hostname,
            "", // empty = auto-detect addresses
            port,
            &properties[..],
        )
        .map_err(|e| PapertrapError::Advertise(format!("service info: {e}")))?;

        let fullname = service_info.get_fullname().to_owned();
        daemon
            .register(service_info)
            .map_err(|e| PapertrapError::Advertise(format!("register: {e}")))?;

        info!(
            service_type,
            name = instance_name,
            port,
            "DNS-SD service registered"
        );

        self.daemon = Some(daemon);
        Ok(AdvertisementHandle { fullname })
    }

    fn unregister(&mut self, handle: AdvertisementHandle) -> Result<()> {
        let Some(daemon) = self.daemon.take() else {
            return Ok(());
        };

        if let Err(e) = daemon.unregister(&handle.fullname) {
            warn!(name = %handle.fullname, error = %e, "DNS-SD unregister failed");
        } else {
            info!(name = %handle.fullname, "DNS-SD service unregistered");
        }
        if let Err(e) = daemon.shutdown() {
            warn!(error = %e, "mDNS daemon shutdown failed");
        }
        Ok(())
    }
}
