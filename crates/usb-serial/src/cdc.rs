//! Backend for the CDC-ACM class of `embassy-usb`.

use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::{Driver, EndpointError};

use crate::error::TransmitError;
use crate::ring::RxProducer;
use crate::serial::CdcTransmit;

/// Largest full-speed bulk packet.
const PACKET_SIZE: usize = 64;

impl From<EndpointError> for TransmitError {
    fn from(error: EndpointError) -> Self {
        match error {
            EndpointError::BufferOverflow => TransmitError::Overflow,
            EndpointError::Disabled => TransmitError::Disconnected,
        }
    }
}

impl<'d, D: Driver<'d>> CdcTransmit for Sender<'d, D> {
    /// Split into packets; a transfer that ends on a packet boundary is
    /// closed with a zero-length packet so the host sees it at once.
    async fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        let max = usize::from(self.max_packet_size()).max(1);
        for packet in data.chunks(max) {
            self.write_packet(packet).await?;
        }
        if data.len() % max == 0 {
            self.write_packet(&[]).await?;
        }
        Ok(())
    }
}

/// Feed packets from the host into the input ring, forever.
///
/// Meant to run as its own task next to the USB device task. A packet that
/// does not fit is dropped whole.
pub async fn run_receiver<'d, D: Driver<'d>>(
    receiver: &mut Receiver<'d, D>,
    producer: &mut RxProducer<'_>,
) -> ! {
    let mut packet = [0u8; PACKET_SIZE];
    loop {
        receiver.wait_connection().await;
        info!("usb: host connected");

        loop {
            match receiver.read_packet(&mut packet).await {
                Ok(n) => {
                    if !producer.put_rx_data(&packet[..n]) {
                        warn!("usb: input full, dropped {=usize} bytes", n);
                    }
                }
                Err(EndpointError::BufferOverflow) => {
                    warn!("usb: oversized packet dropped");
                }
                Err(EndpointError::Disabled) => break,
            }
        }
        info!("usb: host disconnected");
    }
}
