// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// papertrap-server — HTTP/IPP listener, operation dispatcher, DNS-SD
// advertisement, and the top-level `PrinterService` application object.

pub mod advertise;
pub mod dispatch;
pub mod server;
pub mod service;

pub use advertise::{MdnsAdvertiser, ServiceAdvertiser};
pub use server::IppServer;
pub use service::{ErrorSimulation, PrinterService, ServiceState, SimulatedFault};
