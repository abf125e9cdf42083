//! IPv4 link-local address derivation
//!
//! The address is a pure function of the hardware address, so a device comes
//! back on the same 169.254.0.0/16 address after every reboot.

use std::net::Ipv4Addr;

/// Prefix length of the link-local network
pub const LINK_LOCAL_PREFIX: u8 = 16;

/// Derive the link-local address for a hardware address
pub fn link_local_address(hardware_address: &[u8]) -> Ipv4Addr {
    let digest = md5::compute(hardware_address).0;
    address_from_digest(digest[0], digest[1])
}

/// Build 169.254.x.y, steering clear of the broadcast and network addresses
pub fn address_from_digest(x: u8, y: u8) -> Ipv4Addr {
    let y = match (x, y) {
        (255, 255) => 254,
        (0, 0) => 1,
        _ => y,
    };
    Ipv4Addr::new(169, 254, x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(link_local_address(&[]), Ipv4Addr::new(169, 254, 212, 29));
        assert_eq!(
            link_local_address(&[0x02, 0x42, 0xac, 0x11, 0x00, 0x02]),
            Ipv4Addr::new(169, 254, 221, 229)
        );
    }

    #[test]
    fn test_deterministic() {
        let mac = [0x02, 0x42, 0xac, 0x11, 0x00, 0x02];
        assert_eq!(link_local_address(&mac), link_local_address(&mac));
        assert_ne!(
            link_local_address(&mac),
            link_local_address(&[0x02, 0x42, 0xac, 0x11, 0x00, 0x03])
        );
    }

    #[test]
    fn test_corner_octets_are_remapped() {
        assert_eq!(address_from_digest(255, 255), Ipv4Addr::new(169, 254, 255, 254));
        assert_eq!(address_from_digest(0, 0), Ipv4Addr::new(169, 254, 0, 1));
        assert_eq!(address_from_digest(0, 255), Ipv4Addr::new(169, 254, 0, 255));
        assert_eq!(address_from_digest(255, 0), Ipv4Addr::new(169, 254, 255, 0));
    }

    #[test]
    fn test_never_network_or_broadcast() {
        for a in 0..=255u8 {
            for b in [0u8, 1, 7, 254, 255] {
                let mac = [0x00, 0x1b, 0x21, a, b, a ^ b];
                let octets = link_local_address(&mac).octets();
                assert_eq!(&octets[..2], &[169, 254]);
                assert_ne!((octets[2], octets[3]), (0, 0));
                assert_ne!((octets[2], octets[3]), (255, 255));
            }
        }
    }
}
