/*!
Provides IO utility functions for read bytes of different length and converting to corresponding structs.
*/
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::models::*;
use bytes::{Buf, Bytes};

use crate::error::ParserError;
use crate::ParserError::IoNotEnoughBytes;

impl ReadUtils for Bytes {}

/// Bounds-checked reads over a payload buffer.
pub trait ReadUtils: Buf {
    #[inline]
    fn has_n_remaining(&self, n: usize) -> Result<(), ParserError> {
        if self.remaining() < n {
            Err(IoNotEnoughBytes())
        } else {
            Ok(())
        }
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8, ParserError> {
        self.has_n_remaining(1)?;
        Ok(self.get_u8())
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, ParserError> {
        self.has_n_remaining(2)?;
        Ok(self.get_u16())
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, ParserError> {
        self.has_n_remaining(4)?;
        Ok(self.get_u32())
    }

    fn read_address(&mut self, afi: &Afi) -> Result<IpAddr, ParserError> {
        match afi {
            Afi::Ipv4 => self.read_ipv4_address().map(IpAddr::V4),
            Afi::Ipv6 => self.read_ipv6_address().map(IpAddr::V6),
        }
    }

    fn read_ipv4_address(&mut self) -> Result<Ipv4Addr, ParserError> {
        let addr = self.read_u32()?;
        Ok(Ipv4Addr::from(addr))
    }

    fn read_ipv6_address(&mut self) -> Result<Ipv6Addr, ParserError> {
        self.has_n_remaining(16)?;
        let buf = self.get_u128();
        Ok(Ipv6Addr::from(buf))
    }

    #[inline]
    fn read_asn(&mut self, as_length: AsnLength) -> Result<u32, ParserError> {
        match as_length {
            AsnLength::Bits16 => self.read_u16().map(u32::from),
            AsnLength::Bits32 => self.read_u32(),
        }
    }

    fn read_n_bytes(&mut self, n_bytes: usize) -> Result<Vec<u8>, ParserError> {
        self.has_n_remaining(n_bytes)?;
        Ok(self.copy_to_bytes(n_bytes).into())
    }

    /// Read a prefix in NLRI form.
    ///
    /// The length in bits is 1 byte, followed by `ceil(bits / 8)` address bytes. A length beyond
    /// the family maximum is reported as [ParserError::InvalidPrefixLength] before any address
    /// byte is consumed.
    fn read_nlri_prefix(&mut self, afi: &Afi) -> Result<NetworkPrefix, ParserError> {
        // Length in bits
        let bit_len = self.read_u8()?;
        let max = afi.max_prefix_len();
        if bit_len > max {
            return Err(ParserError::InvalidPrefixLength { bits: bit_len, max });
        }

        // Convert to bytes
        let byte_len: usize = (bit_len as usize).div_ceil(8);
        self.has_n_remaining(byte_len)?;
        let addr: IpAddr = match afi {
            Afi::Ipv4 => {
                let mut buff = [0; 4];
                self.copy_to_slice(&mut buff[..byte_len]);
                IpAddr::V4(Ipv4Addr::from(buff))
            }
            Afi::Ipv6 => {
                let mut buff = [0; 16];
                self.copy_to_slice(&mut buff[..byte_len]);
                IpAddr::V6(Ipv6Addr::from(buff))
            }
        };
        let prefix = IpNet::new(addr, bit_len).map_err(|_| {
            ParserError::ParseError(format!("Invalid network prefix length: {}", bit_len))
        })?;

        Ok(NetworkPrefix::new(prefix))
    }

    /// Splits off the next `n` bytes as a standalone buffer.
    fn split_n(&mut self, n: usize) -> Result<Bytes, ParserError> {
        self.has_n_remaining(n)?;
        Ok(self.copy_to_bytes(n))
    }
}
