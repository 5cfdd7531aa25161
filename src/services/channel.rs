//! Channel-backed transport.
//!
//! [`ChannelTransport`] turns every `Transport` call into a
//! [`TransportRequest`] on an unbounded channel, so the manager never waits
//! on I/O. Whoever owns the real radio or serial stack drains the receiver.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::address::DeviceAddress;
use crate::traits::Transport;

/// An operation the manager asked the transport to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportRequest {
    /// Open a stream.
    Connect(DeviceAddress),
    /// Close a stream.
    Disconnect(DeviceAddress),
    /// Write one encoded frame.
    Write {
        /// Destination device.
        address: DeviceAddress,
        /// Encoded frame.
        bytes: Vec<u8>,
    },
}

/// The request receiver was dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("transport request channel closed")]
pub struct ChannelClosed;

/// [`Transport`] that forwards requests over an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<TransportRequest>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its requests arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }

    fn forward(&self, request: TransportRequest) -> Result<(), ChannelClosed> {
        self.requests.send(request).map_err(|_| ChannelClosed)
    }
}

impl Transport for ChannelTransport {
    type Error = ChannelClosed;

    fn connect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
        self.forward(TransportRequest::Connect(address.clone()))
    }

    fn disconnect(&mut self, address: &DeviceAddress) -> Result<(), Self::Error> {
        self.forward(TransportRequest::Disconnect(address.clone()))
    }

    fn write(&mut self, address: &DeviceAddress, bytes: &[u8]) -> Result<usize, Self::Error> {
        self.forward(TransportRequest::Write {
            address: address.clone(),
            bytes: bytes.to_vec(),
        })?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_forwarded_in_order() {
        let (mut transport, mut rx) = ChannelTransport::new();
        let addr: DeviceAddress = "AA".into();

        transport.connect(&addr).unwrap();
        assert_eq!(transport.write(&addr, &[1, 2, 3]).unwrap(), 3);
        transport.disconnect(&addr).unwrap();

        assert_eq!(rx.try_recv().unwrap(), TransportRequest::Connect(addr.clone()));
        assert_eq!(
            rx.try_recv().unwrap(),
            TransportRequest::Write {
                address: addr.clone(),
                bytes: vec![1, 2, 3]
            }
        );
        assert_eq!(rx.try_recv().unwrap(), TransportRequest::Disconnect(addr));
    }

    #[test]
    fn closed_receiver_is_an_error() {
        let (mut transport, rx) = ChannelTransport::new();
        drop(rx);
        assert_eq!(transport.write(&"AA".into(), &[1]), Err(ChannelClosed));
    }
}
