//! BLE client for the torque sensor.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::protocol::{decode_sample, CHARACTERISTIC_UUID, SERVICE_UUID};

/// A notification as received, with its arrival time.
#[derive(Debug, Clone)]
pub struct ReceivedSample {
    pub raw: Vec<u8>,
    pub at: Instant,
}

impl ReceivedSample {
    pub fn value(&self) -> Result<i32> {
        decode_sample(&self.raw)
    }
}

/// BLE client subscribed to the torque characteristic.
pub struct SampleClient {
    adapter: Adapter,
    peripheral: Peripheral,
    characteristic: Characteristic,
    /// Notifications received since the last clear
    samples: Arc<Mutex<Vec<ReceivedSample>>>,
    collector: Option<JoinHandle<()>>,
}

impl SampleClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        let characteristic = Self::setup(&peripheral).await?;

        let mut client = Self {
            adapter,
            peripheral,
            characteristic,
            samples: Arc::new(Mutex::new(Vec::new())),
            collector: None,
        };
        client.spawn_collector();

        Ok(client)
    }

    /// Discover the torque characteristic and subscribe to it.
    async fn setup(peripheral: &Peripheral) -> Result<Characteristic> {
        peripheral.discover_services().await?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID && c.service_uuid == SERVICE_UUID)
            .ok_or_else(|| anyhow!("Torque characteristic not found"))?;

        peripheral.subscribe(&characteristic).await?;
        Ok(characteristic)
    }

    /// Spawn a task appending notifications to the sample buffer.
    fn spawn_collector(&mut self) {
        if let Some(previous) = self.collector.take() {
            previous.abort();
        }

        let buffer = self.samples.clone();
        let peripheral = self.peripheral.clone();
        self.collector = Some(tokio::spawn(async move {
            let mut stream = match peripheral.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == CHARACTERISTIC_UUID {
                    buffer.lock().await.push(ReceivedSample {
                        raw: data.value,
                        at: Instant::now(),
                    });
                }
            }
        }));
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Properties advertised for the torque characteristic.
    pub fn properties(&self) -> CharPropFlags {
        self.characteristic.properties
    }

    /// Wait until at least `count` notifications have been received.
    pub async fn wait_for_samples(
        &self,
        count: usize,
        wait_timeout: Duration,
    ) -> Result<Vec<ReceivedSample>> {
        let result = timeout(wait_timeout, async {
            loop {
                {
                    let buf = self.samples.lock().await;
                    if buf.len() >= count {
                        return buf.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        result.map_err(|_| anyhow!("Timeout waiting for {} notifications", count))
    }

    /// Read the characteristic value.
    pub async fn read_value(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.characteristic).await?)
    }

    /// Write to the characteristic.
    pub async fn write_value(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.characteristic, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    /// Drop the link.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.characteristic).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// Connect again once the device advertises, retrying until the timeout.
    pub async fn reconnect(&mut self, reconnect_timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        self.adapter.start_scan(ScanFilter::default()).await?;

        let result = loop {
            if start.elapsed() >= reconnect_timeout {
                break Err(anyhow!("Device did not accept a new connection within timeout"));
            }
            if self.peripheral.connect().await.is_ok() {
                break Ok(start.elapsed());
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        self.adapter.stop_scan().await?;
        let elapsed = result?;

        self.characteristic = Self::setup(&self.peripheral).await?;
        self.spawn_collector();
        Ok(elapsed)
    }

    /// Clear the notification buffer.
    pub async fn clear_buffer(&self) {
        self.samples.lock().await.clear();
    }
}
