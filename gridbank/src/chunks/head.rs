use crate::error::*;
use byteorder::{ByteOrder, WriteBytesExt, BE};
use pulsegrid::Scale;

pub const VERSION: u16 = 1;

/// Grid-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub width: u16,
    pub height: u16,
    pub root: u8,
    pub scale: Scale,
    pub tempo: u16,
    pub default_channel: u8,
}

impl Header {
    const SIZE: usize = 12;

    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BankError::InvalidFormat);
        }

        let version = BE::read_u16(&data[0..2]);
        if version != VERSION {
            return Err(BankError::UnsupportedVersion(version));
        }
        let scale = Scale::from_index(data[7]).ok_or(BankError::UnknownScale(data[7]))?;

        Ok(Self {
            width: BE::read_u16(&data[2..4]),
            height: BE::read_u16(&data[4..6]),
            root: data[6],
            scale,
            tempo: BE::read_u16(&data[8..10]),
            default_channel: data[10],
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u16::<BE>(VERSION)?;
        out.write_u16::<BE>(self.width)?;
        out.write_u16::<BE>(self.height)?;
        out.write_u8(self.root)?;
        out.write_u8(self.scale.index())?;
        out.write_u16::<BE>(self.tempo)?;
        out.write_u8(self.default_channel)?;
        // reserved
        out.write_u8(0)?;
        Ok(())
    }
}
