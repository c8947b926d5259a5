use std::net;
use std::sync::{Arc, Mutex};

use crate::error::OspfError;
use crate::rtable::RouteInstaller;

pub fn id(a: u8, b: u8, c: u8, d: u8) -> net::Ipv4Addr {
    net::Ipv4Addr::new(a, b, c, d)
}

pub fn v6(address: &str) -> net::Ipv6Addr {
    address.parse().unwrap()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RouteEvent {
    Install {
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
        metric: u32,
    },
    Withdraw {
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
    },
}

/// a forwarding plane that just remembers what it was told.
#[derive(Default)]
pub struct RecordingInstaller {
    events: Mutex<Vec<RouteEvent>>,
}

impl RecordingInstaller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RouteEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<RouteEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    pub fn installed(&self, prefix: net::Ipv6Addr) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, RouteEvent::Install { prefix: p, .. } if *p == prefix))
    }

    pub fn withdrawn(&self, prefix: net::Ipv6Addr) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, RouteEvent::Withdraw { prefix: p, .. } if *p == prefix))
    }
}

impl RouteInstaller for RecordingInstaller {
    fn install(
        &self,
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
        _next_hop: Option<net::Ipv6Addr>,
        metric: u32,
    ) -> Result<(), OspfError> {
        self.events.lock().unwrap().push(RouteEvent::Install {
            prefix,
            length,
            interface,
            metric,
        });
        Ok(())
    }

    fn withdraw(
        &self,
        prefix: net::Ipv6Addr,
        length: u8,
        interface: u32,
    ) -> Result<(), OspfError> {
        self.events.lock().unwrap().push(RouteEvent::Withdraw {
            prefix,
            length,
            interface,
        });
        Ok(())
    }
}
