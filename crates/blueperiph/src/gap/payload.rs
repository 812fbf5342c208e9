//! Advertising payload packing.
//!
//! Legacy advertising carries at most 31 bytes of AD structures per packet.
//! Following common peripheral practice, the advertising packet holds the
//! flags and the service UUID list, and the complete local name rides in
//! the scan response packet. Overlong input is an error, never a silent
//! truncation.

use super::advertiser::AdvertisingError;
use crate::uuid::Uuid;

/// Maximum AD payload per legacy advertising packet.
pub const ADV_DATA_MAX: usize = 31;

/// Maximum advertised local name length. 31 bytes minus the flags structure
/// (3) and the name structure header (2) leaves 26 usable bytes.
pub const ADV_NAME_MAX: usize = 26;

// AD structure type codes (Bluetooth Assigned Numbers, "Common Data Types")
const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_16BIT_UUIDS: u8 = 0x03;
const AD_TYPE_COMPLETE_128BIT_UUIDS: u8 = 0x07;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

// LE General Discoverable Mode | BR/EDR Not Supported
const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Packed advertising and scan-response payloads, each validated against
/// the 31-byte legacy limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    adv: Vec<u8>,
    scan_rsp: Vec<u8>,
}

impl AdvertisingData {
    /// Packs the local name and service UUID list into advertising and
    /// scan-response payloads.
    ///
    /// The UUID list is emitted in the 16-bit form when every UUID is
    /// SIG-base derived, otherwise in the 128-bit form.
    pub fn build(local_name: &str, service_uuids: &[Uuid]) -> Result<Self, AdvertisingError> {
        let name_bytes = local_name.as_bytes();
        if name_bytes.len() > ADV_NAME_MAX {
            return Err(AdvertisingError::NameTooLong(name_bytes.len()));
        }

        let mut adv = Vec::with_capacity(ADV_DATA_MAX);

        // Flags structure
        adv.push(2);
        adv.push(AD_TYPE_FLAGS);
        adv.push(FLAGS_GENERAL_DISCOVERABLE);

        if !service_uuids.is_empty() {
            let shorts: Option<Vec<u16>> = service_uuids.iter().map(Uuid::as_u16).collect();
            match shorts {
                Some(shorts) => {
                    adv.push((shorts.len() * 2 + 1) as u8);
                    adv.push(AD_TYPE_COMPLETE_16BIT_UUIDS);
                    for short in shorts {
                        adv.extend_from_slice(&short.to_le_bytes());
                    }
                }
                None => {
                    adv.push((service_uuids.len() * 16 + 1) as u8);
                    adv.push(AD_TYPE_COMPLETE_128BIT_UUIDS);
                    for uuid in service_uuids {
                        adv.extend_from_slice(uuid.as_bytes_le());
                    }
                }
            }
        }

        if adv.len() > ADV_DATA_MAX {
            return Err(AdvertisingError::DataTooLong {
                len: adv.len(),
                limit: ADV_DATA_MAX,
            });
        }

        let mut scan_rsp = Vec::with_capacity(name_bytes.len() + 2);
        if !name_bytes.is_empty() {
            scan_rsp.push((name_bytes.len() + 1) as u8);
            scan_rsp.push(AD_TYPE_COMPLETE_LOCAL_NAME);
            scan_rsp.extend_from_slice(name_bytes);
        }

        Ok(Self { adv, scan_rsp })
    }

    /// The packed advertising packet payload.
    pub fn advertising_bytes(&self) -> &[u8] {
        &self.adv
    }

    /// The packed scan response payload (may be empty).
    pub fn scan_response_bytes(&self) -> &[u8] {
        &self.scan_rsp
    }
}
