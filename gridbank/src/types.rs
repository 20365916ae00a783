use crate::error::*;
use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt, BE};
use pulsegrid::param::{Bounded, Param};
use std::convert::TryFrom;
use std::fmt;

#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ID([u8; 4]);

impl ID {
    pub const fn new(id: [u8; 4]) -> Self {
        Self(id)
    }

    pub fn data(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> TryFrom<&'a [u8]> for ID {
    type Error = BankError;

    fn try_from(value: &'a [u8]) -> Result<Self> {
        let bytes = <[u8; 4]>::try_from(value).map_err(|_| BankError::InvalidFormat)?;

        // printable ASCII, trailing spaces only
        let mut has_spaces = false;
        for b in bytes.iter() {
            match b {
                b' ' => {
                    has_spaces = true;
                }
                0x21..=0x7e => {
                    if has_spaces {
                        return Err(BankError::InvalidFormat);
                    }
                }
                _ => return Err(BankError::InvalidFormat),
            }
        }

        Ok(Self(bytes))
    }
}

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID(")?;
        fmt::Display::fmt(&self, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.0[0] as char, self.0[1] as char, self.0[2] as char, self.0[3] as char,
        )
    }
}

/// Splits the next chunk off `data`. Odd-sized chunks carry one pad byte.
pub fn read_chunk<'a>(data: &mut &'a [u8]) -> Result<(ID, &'a [u8])> {
    if data.len() < 8 {
        return Err(BankError::InvalidFormat);
    }
    let id = ID::try_from(&data[0..4])?;
    let size = BE::read_u32(&data[4..8]) as usize;

    if data.len() < 8 + size {
        return Err(BankError::InvalidFormat);
    }
    let chunk_data = &data[8..][..size];

    *data = &data[8..][size..];
    if size % 2 == 1 && !data.is_empty() {
        *data = &data[1..];
    }

    Ok((id, chunk_data))
}

pub fn write_chunk(out: &mut Vec<u8>, id: ID, body: &[u8]) -> Result<()> {
    let size = u32::try_from(body.len()).map_err(|_| BankError::InvalidFormat)?;
    out.extend_from_slice(id.data());
    out.write_u32::<BE>(size)?;
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.write_u8(0)?;
    }
    Ok(())
}

/// A `u8` parameter as base and jitter. The range is implied by the field.
pub fn read_param_u8(data: &mut &[u8]) -> Result<(u8, i32)> {
    let base = data.read_u8()?;
    let jitter = data.read_i16::<BE>()?;
    Ok((base, i32::from(jitter)))
}

pub fn write_param_u8(out: &mut Vec<u8>, param: &Param<u8>) -> Result<()> {
    out.write_u8(param.value())?;
    write_jitter(out, param)
}

pub fn read_param_i16(data: &mut &[u8]) -> Result<(i32, i32)> {
    let base = data.read_i16::<BE>()?;
    let jitter = data.read_i16::<BE>()?;
    Ok((i32::from(base), i32::from(jitter)))
}

pub fn write_param_i16(out: &mut Vec<u8>, param: &Param<i32>) -> Result<()> {
    let base = i16::try_from(param.value()).map_err(|_| BankError::InvalidFormat)?;
    out.write_i16::<BE>(base)?;
    write_jitter(out, param)
}

fn write_jitter<T: Bounded>(out: &mut Vec<u8>, param: &Param<T>) -> Result<()> {
    let jitter = i16::try_from(param.random_amount()).map_err(|_| BankError::InvalidFormat)?;
    out.write_i16::<BE>(jitter)?;
    Ok(())
}

/// Rebuilds a parameter from stored values on top of `param`'s range.
/// Values the range rejects keep `param`'s defaults.
pub fn apply_param<T: Bounded>(param: &mut Param<T>, base: T, jitter: i32) {
    param.set(base);
    param.set_random_amount(jitter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_pad_to_even_length() {
        let mut out = Vec::new();
        write_chunk(&mut out, ID::new(*b"ABCD"), &[1, 2, 3]).unwrap();
        write_chunk(&mut out, ID::new(*b"EFGH"), &[4, 5]).unwrap();
        assert_eq!(out.len(), 8 + 4 + 8 + 2);

        let mut data = &out[..];
        let (id, body) = read_chunk(&mut data).unwrap();
        assert_eq!(id.data(), b"ABCD");
        assert_eq!(body, &[1, 2, 3]);
        let (id, body) = read_chunk(&mut data).unwrap();
        assert_eq!(id.to_string(), "EFGH");
        assert_eq!(body, &[4, 5]);
        assert!(data.is_empty());
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        let mut data: &[u8] = b"NODE\x00\x00\x00\x10abc";
        assert!(matches!(read_chunk(&mut data), Err(BankError::InvalidFormat)));
    }

    #[test]
    fn ids_must_be_printable() {
        assert!(ID::try_from(&b"AB C"[..]).is_err());
        assert!(ID::try_from(&b"AB\x01C"[..]).is_err());
        assert!(ID::try_from(&b"AB  "[..]).is_ok());
        assert!(ID::try_from(&b"ABC"[..]).is_err());
    }
}
