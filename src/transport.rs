use std::collections::HashMap;
use std::net;
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::time::Duration;

use pnet::datalink::{self, Channel, Config, DataLinkReceiver};
use pnet::packet::ethernet::EtherTypes;
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::Packet as PnetPacket;
use pnet::transport::{self, TransportChannelType, TransportProtocol, TransportSender};

use crate::error::OspfError;
use crate::{util, OSPF_IP_PROTOCOL_NUMBER, OSPF_MULTICAST_GROUP};

/// # Transport
/// how packets reach the wire. `recv` blocks, so it is only ever called
/// from a dedicated per-interface receive task.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        interface: u32,
        destination: net::Ipv6Addr,
        payload: &[u8],
    ) -> Result<(), OspfError>;
    fn recv(&self, interface: u32) -> Result<(Vec<u8>, net::Ipv6Addr), OspfError>;
    fn join_multicast(&self, interface: u32) -> Result<(), OspfError>;
    fn leave_multicast(&self, interface: u32) -> Result<(), OspfError>;
}

struct RawPayload<'a>(&'a [u8]);

impl<'a> pnet::packet::Packet for RawPayload<'a> {
    fn packet(&self) -> &[u8] {
        self.0
    }

    fn payload(&self) -> &[u8] {
        self.0
    }
}

/// # RawTransport
/// sends over a layer-4 protocol-89 channel, so the kernel handles IPv6
/// framing and hop limit 1 keeps everything on-link. Receiving captures
/// IPv6 frames per interface and filters for protocol 89 itself.
pub struct RawTransport {
    sender: Mutex<TransportSender>,
    receivers: RwLock<HashMap<u32, Arc<Mutex<Box<dyn DataLinkReceiver>>>>>,
}

impl RawTransport {
    pub fn new() -> Result<Self, OspfError> {
        let (mut sender, _) = transport::transport_channel(
            4096,
            TransportChannelType::Layer4(TransportProtocol::Ipv6(IpNextHeaderProtocol(
                OSPF_IP_PROTOCOL_NUMBER,
            ))),
        )
        .map_err(|err| OspfError::Transport(err.to_string()))?;
        sender
            .set_ttl(1)
            .map_err(|err| OspfError::Transport(err.to_string()))?;
        Ok(Self {
            sender: Mutex::new(sender),
            receivers: RwLock::new(HashMap::new()),
        })
    }

    fn receiver(&self, interface: u32) -> Result<Arc<Mutex<Box<dyn DataLinkReceiver>>>, OspfError> {
        self.receivers
            .read()
            .map_err(|_| OspfError::Transport("receiver lock poisoned".to_string()))?
            .get(&interface)
            .cloned()
            .ok_or(OspfError::UnknownInterface(interface))
    }
}

impl Transport for RawTransport {
    fn send(
        &self,
        _interface: u32,
        destination: net::Ipv6Addr,
        payload: &[u8],
    ) -> Result<(), OspfError> {
        let mut sender = self
            .sender
            .lock()
            .map_err(|_| OspfError::Transport("sender lock poisoned".to_string()))?;
        sender
            .send_to(RawPayload(payload), net::IpAddr::V6(destination))
            .map_err(|err| OspfError::Transport(err.to_string()))?;
        Ok(())
    }

    fn recv(&self, interface: u32) -> Result<(Vec<u8>, net::Ipv6Addr), OspfError> {
        let receiver = self.receiver(interface)?;
        let mut receiver = receiver
            .lock()
            .map_err(|_| OspfError::Transport("receiver lock poisoned".to_string()))?;
        loop {
            let frame = receiver
                .next()
                .map_err(|err| OspfError::Transport(err.to_string()))?;
            let packet = match Ipv6Packet::new(frame) {
                Some(packet) => packet,
                None => continue,
            };
            if packet.get_next_header() != IpNextHeaderProtocol(OSPF_IP_PROTOCOL_NUMBER) {
                continue;
            }
            return Ok((packet.payload().to_vec(), packet.get_source()));
        }
    }

    /// open the interface's IPv6 capture; packets for the multicast group
    /// arrive through it along with everything else on the link, `recv`
    /// keeps only protocol 89.
    fn join_multicast(&self, interface: u32) -> Result<(), OspfError> {
        let os_interface = datalink::interfaces()
            .into_iter()
            .find(|candidate| candidate.index == interface)
            .ok_or(OspfError::UnknownInterface(interface))?;
        let mut config = Config::default();
        config.channel_type = datalink::ChannelType::Layer3(EtherTypes::Ipv6.0);
        config.read_timeout = Some(Duration::from_secs(1));
        let receiver = match datalink::channel(&os_interface, config) {
            Ok(Channel::Ethernet(_, receiver)) => receiver,
            Ok(_) => {
                return Err(OspfError::Transport(format!(
                    "unsupported channel on {}",
                    os_interface.name
                )))
            }
            Err(err) => return Err(OspfError::Transport(err.to_string())),
        };
        self.receivers
            .write()
            .map_err(|_| OspfError::Transport("receiver lock poisoned".to_string()))?
            .insert(interface, Arc::new(Mutex::new(receiver)));
        util::log(&format!(
            "interface {} listening on {}",
            interface, OSPF_MULTICAST_GROUP
        ));
        Ok(())
    }

    fn leave_multicast(&self, interface: u32) -> Result<(), OspfError> {
        self.receivers
            .write()
            .map_err(|_| OspfError::Transport("receiver lock poisoned".to_string()))?
            .remove(&interface);
        Ok(())
    }
}

type Frame = (Vec<u8>, net::Ipv6Addr);

struct MemoryEndpoint {
    segment: u32,
    address: net::Ipv6Addr,
    sender: mpsc::Sender<Frame>,
}

/// # MemoryHub
/// an in-process fabric of broadcast segments. Every attached port sees
/// multicast traffic on its segment and unicast traffic to its address.
#[derive(Default)]
pub struct MemoryHub {
    endpoints: Mutex<Vec<MemoryEndpoint>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn attach(&self, segment: u32, address: net::Ipv6Addr) -> mpsc::Receiver<Frame> {
        let (sender, receiver) = mpsc::channel();
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.push(MemoryEndpoint {
                segment,
                address,
                sender,
            });
        }
        receiver
    }

    fn deliver(
        &self,
        source: net::Ipv6Addr,
        segment: u32,
        destination: net::Ipv6Addr,
        payload: &[u8],
    ) {
        let endpoints = match self.endpoints.lock() {
            Ok(endpoints) => endpoints,
            Err(_) => return,
        };
        for endpoint in endpoints.iter() {
            if endpoint.segment != segment || endpoint.address == source {
                continue;
            }
            if destination == OSPF_MULTICAST_GROUP || destination == endpoint.address {
                let _ = endpoint.sender.send((payload.to_vec(), source));
            }
        }
    }
}

#[derive(Clone)]
struct MemoryPort {
    segment: u32,
    address: net::Ipv6Addr,
    receiver: Arc<Mutex<mpsc::Receiver<Frame>>>,
}

/// # MemoryTransport
/// one router's view of a `MemoryHub`. Interfaces are attached to segments
/// explicitly before the router brings them up.
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    ports: RwLock<HashMap<u32, MemoryPort>>,
}

impl MemoryTransport {
    pub fn new(hub: Arc<MemoryHub>) -> Arc<Self> {
        Arc::new(Self {
            hub,
            ports: RwLock::new(HashMap::new()),
        })
    }

    pub fn attach(&self, interface: u32, segment: u32, address: net::Ipv6Addr) {
        let receiver = self.hub.attach(segment, address);
        if let Ok(mut ports) = self.ports.write() {
            ports.insert(
                interface,
                MemoryPort {
                    segment,
                    address,
                    receiver: Arc::new(Mutex::new(receiver)),
                },
            );
        }
    }

    fn port(&self, interface: u32) -> Result<MemoryPort, OspfError> {
        self.ports
            .read()
            .map_err(|_| OspfError::Transport("port lock poisoned".to_string()))?
            .get(&interface)
            .cloned()
            .ok_or(OspfError::UnknownInterface(interface))
    }
}

impl Transport for MemoryTransport {
    fn send(
        &self,
        interface: u32,
        destination: net::Ipv6Addr,
        payload: &[u8],
    ) -> Result<(), OspfError> {
        let port = self.port(interface)?;
        self.hub
            .deliver(port.address, port.segment, destination, payload);
        Ok(())
    }

    fn recv(&self, interface: u32) -> Result<(Vec<u8>, net::Ipv6Addr), OspfError> {
        let port = self.port(interface)?;
        let receiver = port
            .receiver
            .lock()
            .map_err(|_| OspfError::Transport("receiver lock poisoned".to_string()))?;
        receiver
            .recv_timeout(Duration::from_secs(1))
            .map_err(|err| OspfError::Transport(err.to_string()))
    }

    fn join_multicast(&self, _interface: u32) -> Result<(), OspfError> {
        Ok(())
    }

    fn leave_multicast(&self, _interface: u32) -> Result<(), OspfError> {
        Ok(())
    }
}
