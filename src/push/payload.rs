use std::collections::HashMap;
use std::io::Read;
use std::io::Write;

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::PUSH_PACKET_TYPE_DOM;
use crate::Instance;
use crate::PushError;
use crate::ResourceKey;
use crate::ServiceView;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Service snapshot in the shape Nacos clients deserialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// `group@@name`
    pub dom: String,
    pub name: String,
    /// Requested clusters, comma separated
    pub clusters: String,
    pub cache_millis: u64,
    pub last_ref_time: u64,
    pub checksum: String,
    pub hosts: Vec<Instance>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub reach_protection_threshold: bool,
}

impl ServiceInfo {
    pub fn from_view(
        view: &ServiceView,
        clusters: &[String],
        cache_millis: u64,
    ) -> Self {
        let grouped = view.key.grouped_name();
        Self {
            dom: grouped.clone(),
            name: grouped,
            clusters: clusters.join(","),
            cache_millis,
            last_ref_time: view.last_ref_time,
            checksum: view.revision.clone(),
            hosts: view.instances.clone(),
            metadata: view.metadata.clone(),
            reach_protection_threshold: view.reached_protect_threshold,
        }
    }
}

/// Datagram envelope. `data` carries the service info as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPacket {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    #[serde(rename = "lastRefTime")]
    pub last_ref_time: u64,
}

/// A change rendered once and shared by every watch client with the same
/// filter. Both wire encodings are prepared up front.
#[derive(Debug, Clone)]
pub struct PushPayload {
    pub key: ResourceKey,
    /// Service info JSON, the body of a stream push
    pub service_info: Bytes,
    /// Datagram envelope JSON
    pub packet: Bytes,
    /// Gzip of `packet`, present when it exceeds the compression threshold
    pub compressed: Option<Bytes>,
}

impl PushPayload {
    pub fn render(
        view: &ServiceView,
        clusters: &[String],
        cache_millis: u64,
        compress_threshold: usize,
    ) -> Result<Self, PushError> {
        let info = ServiceInfo::from_view(view, clusters, cache_millis);
        let data = serde_json::to_string(&info)?;
        let packet = serde_json::to_vec(&PushPacket {
            kind: PUSH_PACKET_TYPE_DOM.to_string(),
            data: data.clone(),
            last_ref_time: info.last_ref_time,
        })?;
        Self::from_parts(
            view.key.clone(),
            Bytes::from(data),
            Bytes::from(packet),
            compress_threshold,
        )
    }

    pub(crate) fn from_parts(
        key: ResourceKey,
        service_info: Bytes,
        packet: Bytes,
        compress_threshold: usize,
    ) -> Result<Self, PushError> {
        let compressed = if packet.len() > compress_threshold {
            Some(gzip(&packet)?)
        } else {
            None
        };
        Ok(Self {
            key,
            service_info,
            packet,
            compressed,
        })
    }

    /// Bytes written to a datagram peer
    pub fn wire_bytes(&self) -> &Bytes {
        self.compressed.as_ref().unwrap_or(&self.packet)
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }

    /// Parses datagram wire bytes, compressed or not
    pub fn decode_packet(wire: &[u8]) -> Result<PushPacket, PushError> {
        if wire.starts_with(&GZIP_MAGIC) {
            Ok(serde_json::from_slice(&gunzip(wire)?)?)
        } else {
            Ok(serde_json::from_slice(wire)?)
        }
    }
}

pub fn gzip(raw: &[u8]) -> Result<Bytes, PushError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw).map_err(|e| PushError::Compress(e.to_string()))?;
    let out = encoder.finish().map_err(|e| PushError::Compress(e.to_string()))?;
    Ok(Bytes::from(out))
}

pub fn gunzip(compressed: &[u8]) -> Result<Vec<u8>, PushError> {
    let mut out = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| PushError::Compress(e.to_string()))?;
    Ok(out)
}
